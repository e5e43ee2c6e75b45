use async_trait::async_trait;
use localbid_core::events::RateLimiter;
use localbid_core::{CoreError, CoreResult};
use redis::RedisResult;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// INCR + EXPIRE in one round trip; `true` while the key is under `limit`
    pub async fn hit_window(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

#[async_trait]
impl RateLimiter for RedisClient {
    async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> CoreResult<bool> {
        self.hit_window(key, limit, window_seconds)
            .await
            .map_err(|e| CoreError::InternalError(format!("rate limiter unavailable: {}", e)))
    }
}
