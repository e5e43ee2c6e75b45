pub mod accounts;
pub mod notifications;
pub mod repository;
pub mod events;

use localbid_market::MarketError;
use localbid_order::OrderError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<MarketError> for CoreError {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::RequestExpired(_)
            | MarketError::RequestNotOpen { .. }
            | MarketError::BidNotActive { .. }
            | MarketError::DuplicateBid => CoreError::Conflict(err.to_string()),
            MarketError::OwnRequest | MarketError::NotOwner => CoreError::Forbidden(err.to_string()),
            MarketError::Invalid(msg) => CoreError::ValidationError(msg),
            MarketError::UnknownStatus(_) => CoreError::InternalError(err.to_string()),
        }
    }
}

impl From<OrderError> for CoreError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(id) => CoreError::NotFound(format!("order {}", id)),
            OrderError::NotOwner(_) | OrderError::PickupCodeMismatch => CoreError::Forbidden(err.to_string()),
            OrderError::InvalidTransition { from, to } => CoreError::InvalidTransition { from, to },
            OrderError::UnknownStatus(_) => CoreError::InternalError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_market_errors_map_to_http_meaningful_kinds() {
        assert!(matches!(CoreError::from(MarketError::DuplicateBid), CoreError::Conflict(msg) if msg == "You already bid on this request"));
        assert!(matches!(CoreError::from(MarketError::NotOwner), CoreError::Forbidden(_)));
        assert!(matches!(CoreError::from(MarketError::RequestExpired(Uuid::nil())), CoreError::Conflict(_)));
        assert!(matches!(CoreError::from(MarketError::Invalid("x".into())), CoreError::ValidationError(_)));
    }

    #[test]
    fn test_order_errors_map() {
        let err = CoreError::from(OrderError::InvalidTransition {
            from: "ready".into(),
            to: "pending".into(),
        });
        assert_eq!(err.to_string(), "Invalid state transition from ready to pending");
        assert!(matches!(CoreError::from(OrderError::PickupCodeMismatch), CoreError::Forbidden(_)));
    }
}
