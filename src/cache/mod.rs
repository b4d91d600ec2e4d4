use crate::redis_client::RedisClient;

pub mod seats;

/// Кеш поверх Redis. Любая ошибка Redis только логируется:
/// источник правды всегда хранилище.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    seat_ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, seat_ttl_seconds: u64) -> Self {
        Self { redis, seat_ttl_seconds }
    }
}
