use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{BidStatus, RequestStatus};

pub const MIN_BID_PRICE: i64 = 5;
pub const MAX_BID_PRICE: i64 = 50_000;
/// Largest whole amount a NUMERIC(10,2) money column holds
pub const MAX_AMOUNT: i64 = 99_999_999;

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("Request {0} is past its bidding window")]
    RequestExpired(Uuid),

    #[error("Request {id} is {status}")]
    RequestNotOpen { id: Uuid, status: RequestStatus },

    #[error("Bid {id} is {status}")]
    BidNotActive { id: Uuid, status: BidStatus },

    #[error("You already bid on this request")]
    DuplicateBid,

    #[error("Cannot bid on your own request")]
    OwnRequest,

    #[error("Not the owner of this record")]
    NotOwner,

    #[error("Invalid value: {0}")]
    Invalid(String),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),
}

pub fn check_budget(min: Option<Decimal>, max: Option<Decimal>) -> Result<(), MarketError> {
    for value in [min, max].into_iter().flatten() {
        if value <= Decimal::ZERO {
            return Err(MarketError::Invalid("budget must be positive".to_string()));
        }
        if value > Decimal::from(MAX_AMOUNT) {
            return Err(MarketError::Invalid(format!(
                "budget must not exceed {}",
                MAX_AMOUNT
            )));
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(MarketError::Invalid(
                "budget_min must not exceed budget_max".to_string(),
            ));
        }
    }
    Ok(())
}

pub fn check_bid_price(price: Decimal) -> Result<(), MarketError> {
    if price < Decimal::from(MIN_BID_PRICE) || price > Decimal::from(MAX_BID_PRICE) {
        return Err(MarketError::Invalid(format!(
            "price must be between {} and {}",
            MIN_BID_PRICE, MAX_BID_PRICE
        )));
    }
    Ok(())
}

pub fn check_delivery_price(price: Decimal) -> Result<(), MarketError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(MarketError::Invalid(
            "delivery_price must not be negative".to_string(),
        ));
    }
    if price > Decimal::from(MAX_AMOUNT) {
        return Err(MarketError::Invalid(format!(
            "delivery_price must not exceed {}",
            MAX_AMOUNT
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_rules() {
        assert!(check_budget(None, None).is_ok());
        assert!(check_budget(Some(Decimal::from(10)), Some(Decimal::from(20))).is_ok());
        assert!(check_budget(Some(Decimal::from(-100)), None).is_err());
        assert!(check_budget(Some(Decimal::from(30)), Some(Decimal::from(20))).is_err());
        assert!(check_budget(None, Some(Decimal::from(MAX_AMOUNT))).is_ok());
        assert!(check_budget(None, Some(Decimal::new(99_999_999_999, 3))).is_err());
        assert!(check_budget(Some(Decimal::from(100_000_000)), None).is_err());
    }

    #[test]
    fn test_bid_price_bounds() {
        assert!(check_bid_price(Decimal::from(1)).is_err());
        assert!(check_bid_price(Decimal::from(5)).is_ok());
        assert!(check_bid_price(Decimal::from(50_000)).is_ok());
        assert!(check_bid_price(Decimal::from(100_000)).is_err());
    }

    #[test]
    fn test_delivery_price_non_negative() {
        assert!(check_delivery_price(Decimal::ZERO).is_ok());
        assert!(check_delivery_price(Decimal::from(-50)).is_err());
        assert!(check_delivery_price(Decimal::new(1_500, 2)).is_ok());
        assert!(check_delivery_price(Decimal::from(1_000_000_000)).is_err());
    }
}
