use std::sync::Arc;

use localbid_core::events::{EventPublisher, RateLimiter};
use localbid_core::repository::{
    BidRepository, NotificationRepository, OrderRepository, ProfileRepository, RequestRepository,
    UserRepository,
};
use localbid_shared::MarketEvent;
use localbid_store::app_config::BusinessRules;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::warn;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    pub bcrypt_cost: u32,
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub requests: Arc<dyn RequestRepository>,
    pub bids: Arc<dyn BidRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub publisher: Arc<dyn EventPublisher>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub sse_tx: broadcast::Sender<MarketEvent>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

impl AppState {
    /// State backed by one store that implements every repository
    pub fn from_store<S>(
        store: Arc<S>,
        publisher: Arc<dyn EventPublisher>,
        rate_limiter: Arc<dyn RateLimiter>,
        auth: AuthConfig,
        business_rules: BusinessRules,
    ) -> Result<Self, prometheus::Error>
    where
        S: UserRepository
            + ProfileRepository
            + RequestRepository
            + BidRepository
            + OrderRepository
            + NotificationRepository
            + 'static,
    {
        let (sse_tx, _) = broadcast::channel(100);
        Ok(Self {
            users: store.clone(),
            profiles: store.clone(),
            requests: store.clone(),
            bids: store.clone(),
            orders: store.clone(),
            notifications: store,
            publisher,
            rate_limiter,
            sse_tx,
            metrics: Arc::new(Metrics::new()?),
            auth,
            business_rules,
        })
    }

    pub fn fee_rate(&self) -> Decimal {
        Decimal::try_from(self.business_rules.platform_fee_rate)
            .map(|rate| rate.round_dp(4))
            .unwrap_or_else(|_| Decimal::new(5, 2))
    }

    /// Fans a committed event out to live streams and the broker.
    /// Delivery failures are logged; the write they describe already happened.
    pub async fn announce(&self, event: MarketEvent) {
        // No subscribers is not an error
        let _ = self.sse_tx.send(event.clone());
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(topic = event.topic(), error = %e, "Event publish failed");
        }
    }
}
