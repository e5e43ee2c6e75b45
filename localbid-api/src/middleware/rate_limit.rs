use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, state::AppState};

/// Per-IP fixed window of one minute. A limiter outage lets traffic through.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("ratelimit:{}", addr.ip());
    let limit = state.business_rules.rate_limit_per_minute;

    match state.rate_limiter.check_rate_limit(&key, limit, 60).await {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => Err(AppError::RateLimited("Rate limit exceeded".to_string())),
        Err(e) => {
            tracing::warn!(error = %e, "Rate limiter unavailable, failing open");
            Ok(next.run(req).await)
        }
    }
}
