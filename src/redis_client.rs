use redis::{aio::MultiplexedConnection, Client};
use tracing::info;

#[derive(Clone)]
pub struct RedisClient {
    pub conn: MultiplexedConnection,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_tokio_connection().await?;
        // Недоступный Redis должен обнаружиться на старте, а не на первом запросе
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        info!("Redis connected");
        Ok(RedisClient { conn })
    }
}
