use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::cache::CacheService;
use crate::models::Seat;
use crate::services::SeatChangeListener;

// Инвалидация = INCR поколения. Снимок, прочитанный до инвалидации, пишется
// под старым поколением, и его больше никто не читает.
pub fn section_generation_key(section_id: i64) -> String {
    format!("seats:section:{}:gen", section_id)
}

pub fn section_seats_key(section_id: i64, generation: u64) -> String {
    format!("seats:section:{}:v{}", section_id, generation)
}

impl CacheService {
    /// Текущее поколение кеша секции; None, если Redis недоступен.
    pub async fn section_generation(&self, section_id: i64) -> Option<u64> {
        let mut conn = self.redis.conn.clone();
        match conn.get::<_, Option<u64>>(section_generation_key(section_id)).await {
            Ok(generation) => Some(generation.unwrap_or(0)),
            Err(e) => {
                warn!("Seat cache generation read failed for section {}: {:?}", section_id, e);
                None
            }
        }
    }

    // Места секции из кеша; None при промахе или любой ошибке
    pub async fn get_section_seats(&self, section_id: i64, generation: u64) -> Option<Vec<Seat>> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = match conn.get(section_seats_key(section_id, generation)).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Seat cache read failed for section {}: {:?}", section_id, e);
                return None;
            }
        };

        match serde_json::from_str(&data?) {
            Ok(seats) => {
                debug!("Seat cache hit for section {} (gen {})", section_id, generation);
                Some(seats)
            }
            Err(e) => {
                warn!("Seat cache entry for section {} is corrupt: {:?}", section_id, e);
                None
            }
        }
    }

    pub async fn save_section_seats(&self, section_id: i64, generation: u64, seats: &[Seat]) {
        let data = match serde_json::to_string(seats) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to serialize seats of section {}: {:?}", section_id, e);
                return;
            }
        };
        let mut conn = self.redis.conn.clone();
        let result: redis::RedisResult<()> = conn
            .set_ex(section_seats_key(section_id, generation), data, self.seat_ttl_seconds)
            .await;
        if let Err(e) = result {
            warn!("Seat cache write failed for section {}: {:?}", section_id, e);
        }
    }

    pub async fn invalidate_section_seats(&self, section_id: i64) {
        let mut conn = self.redis.conn.clone();
        let result: redis::RedisResult<u64> = conn.incr(section_generation_key(section_id), 1).await;
        if let Err(e) = result {
            warn!("Seat cache invalidation failed for section {}: {:?}", section_id, e);
        }
    }
}

#[async_trait]
impl SeatChangeListener for CacheService {
    async fn seats_changed(&self, section_ids: &BTreeSet<i64>) {
        for section_id in section_ids {
            self.invalidate_section_seats(*section_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis_client::RedisClient;

    #[test]
    fn key_layout() {
        assert_eq!(section_generation_key(7), "seats:section:7:gen");
        assert_eq!(section_seats_key(7, 3), "seats:section:7:v3");
    }

    fn seat(id: i64, section_id: i64) -> Seat {
        Seat {
            id,
            section_id,
            row_index: 1,
            column_index: id as i32,
            status: crate::models::SeatStatus::Available,
            revision: 0,
        }
    }

    // Нужен живой Redis: REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored
    #[tokio::test]
    #[ignore = "requires REDIS_URL"]
    async fn snapshot_read_before_invalidation_is_never_served() {
        let url = std::env::var("REDIS_URL").unwrap();
        let cache = CacheService::new(RedisClient::new(&url).await.unwrap(), 30);
        let section_id = 900_000 + i64::from(std::process::id() % 1000);

        let generation = cache.section_generation(section_id).await.unwrap();
        let stale = vec![seat(1, section_id)];

        // Reserve коммитит и инвалидирует между чтением из БД и записью в кеш
        cache.seats_changed(&BTreeSet::from([section_id])).await;
        cache.save_section_seats(section_id, generation, &stale).await;

        let current = cache.section_generation(section_id).await.unwrap();
        assert_eq!(current, generation + 1);
        assert!(cache.get_section_seats(section_id, current).await.is_none());

        cache.save_section_seats(section_id, current, &stale).await;
        assert_eq!(cache.get_section_seats(section_id, current).await, Some(stale));
    }
}
