use std::sync::Arc;

use chrono::{DateTime, Utc};
use localbid_core::repository::RequestRepository;
use localbid_core::CoreResult;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

/// One pass: every active request whose bidding window has elapsed becomes `expired`
pub async fn sweep_expired_requests(
    requests: &dyn RequestRepository,
    now: DateTime<Utc>,
) -> CoreResult<usize> {
    let expired = requests.expire_due_requests(now).await?;
    if !expired.is_empty() {
        info!(count = expired.len(), ids = ?expired, "Expired requests past their bidding window");
    }
    Ok(expired.len())
}

pub async fn start_expiry_worker(requests: Arc<dyn RequestRepository>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(every_seconds = every.as_secs(), "Expiry worker started");

    loop {
        ticker.tick().await;
        if let Err(e) = sweep_expired_requests(requests.as_ref(), Utc::now()).await {
            error!("Expiry sweep failed: {}", e);
        }
    }
}
