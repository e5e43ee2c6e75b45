use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::{error::AppError, state::AppState};

/// Business counters exposed on `/metrics`
pub struct Metrics {
    registry: Registry,
    pub requests_created: IntCounter,
    pub bids_submitted: IntCounter,
    pub bids_accepted: IntCounter,
    pub order_status_changes: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_created = IntCounter::new(
            "localbid_requests_created_total",
            "Product requests posted by customers",
        )?;
        let bids_submitted = IntCounter::new(
            "localbid_bids_submitted_total",
            "Bids submitted by shops",
        )?;
        let bids_accepted = IntCounter::new(
            "localbid_bids_accepted_total",
            "Bids accepted into orders",
        )?;
        let order_status_changes = IntCounterVec::new(
            Opts::new(
                "localbid_order_status_changes_total",
                "Fulfillment status changes by target status",
            ),
            &["to_status"],
        )?;

        registry.register(Box::new(requests_created.clone()))?;
        registry.register(Box::new(bids_submitted.clone()))?;
        registry.register(Box::new(bids_accepted.clone()))?;
        registry.register(Box::new(order_status_changes.clone()))?;

        Ok(Self {
            registry,
            requests_created,
            bids_submitted,
            bids_accepted,
            order_status_changes,
        })
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::InternalServerError(format!("metrics encoding failed: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.bids_submitted.inc();
        metrics.order_status_changes.with_label_values(&["ready"]).inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("localbid_bids_submitted_total 1"));
        assert!(text.contains("localbid_order_status_changes_total{to_status=\"ready\"} 1"));
    }
}
