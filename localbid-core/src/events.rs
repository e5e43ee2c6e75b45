use async_trait::async_trait;
use localbid_shared::MarketEvent;

use crate::CoreResult;

/// Outbound channel for committed marketplace events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &MarketEvent) -> CoreResult<()>;
}

/// Fixed-window request counter keyed by caller
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// `true` while the key is within `limit` hits for the current window
    async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> CoreResult<bool>;
}

/// Publisher that only logs; used when no broker is configured
pub struct LoggingPublisher;

#[async_trait]
impl EventPublisher for LoggingPublisher {
    async fn publish(&self, event: &MarketEvent) -> CoreResult<()> {
        tracing::info!(topic = event.topic(), key = %event.key(), "Event published (no broker)");
        Ok(())
    }
}
