use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use localbid_market::{Bid, ProductRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::finance::FeeSplit;
use crate::fulfillment::{generate_order_number, generate_pickup_code};

/// Order lifecycle stage on the shop side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "pending",
            FulfillmentStatus::Preparing => "preparing",
            FulfillmentStatus::Ready => "ready",
            FulfillmentStatus::Completed => "completed",
            FulfillmentStatus::Cancelled => "cancelled",
        }
    }

    fn rank(&self) -> Option<u8> {
        match self {
            FulfillmentStatus::Pending => Some(0),
            FulfillmentStatus::Preparing => Some(1),
            FulfillmentStatus::Ready => Some(2),
            FulfillmentStatus::Completed => Some(3),
            FulfillmentStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FulfillmentStatus::Completed | FulfillmentStatus::Cancelled)
    }

    /// Forward-only along pending → preparing → ready → completed.
    /// Any non-terminal stage may be cancelled. Re-setting the current stage is a no-op.
    pub fn can_transition_to(&self, next: FulfillmentStatus) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FulfillmentStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FulfillmentStatus::Pending),
            "preparing" => Ok(FulfillmentStatus::Preparing),
            "ready" => Ok(FulfillmentStatus::Ready),
            "completed" => Ok(FulfillmentStatus::Completed),
            "cancelled" => Ok(FulfillmentStatus::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// Payment state; capture happens outside this service so new orders stay `pending`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Authorized,
    Captured,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "authorized" => Ok(PaymentStatus::Authorized),
            "captured" => Ok(PaymentStatus::Captured),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// The record created when a customer accepts a bid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub request_id: Uuid,
    pub bid_id: Uuid,
    pub customer_id: Uuid,
    pub shop_id: Uuid,
    pub total_amount: Decimal,
    pub platform_fee: Decimal,
    pub shop_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub pickup_code: String,
    pub pickup_code_verified_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build the order for an accepted bid. The total is the bid price.
    pub fn from_accepted_bid(
        request: &ProductRequest,
        bid: &Bid,
        fee_rate: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        let split = FeeSplit::from_total(bid.price, fee_rate);
        Self {
            id: Uuid::new_v4(),
            order_number: generate_order_number(),
            request_id: request.id,
            bid_id: bid.id,
            customer_id: request.customer_id,
            shop_id: bid.shop_id,
            total_amount: split.total,
            platform_fee: split.platform_fee,
            shop_amount: split.shop_amount,
            payment_status: PaymentStatus::Pending,
            fulfillment_status: FulfillmentStatus::Pending,
            pickup_code: generate_pickup_code(),
            pickup_code_verified_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn ensure_shop(&self, shop_id: Uuid) -> Result<(), OrderError> {
        if self.shop_id != shop_id {
            return Err(OrderError::NotOwner(self.id));
        }
        Ok(())
    }

    /// Apply a fulfillment transition, returning the previous stage
    pub fn transition_to(
        &mut self,
        next: FulfillmentStatus,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentStatus, OrderError> {
        let previous = self.fulfillment_status;
        if !previous.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: previous.to_string(),
                to: next.to_string(),
            });
        }
        self.fulfillment_status = next;
        self.updated_at = now;
        Ok(previous)
    }

    /// The customer shows the pickup code at the counter; a match completes the order
    pub fn verify_pickup_code(&mut self, code: &str, now: DateTime<Utc>) -> Result<FulfillmentStatus, OrderError> {
        if self.fulfillment_status != FulfillmentStatus::Ready {
            return Err(OrderError::InvalidTransition {
                from: self.fulfillment_status.to_string(),
                to: FulfillmentStatus::Completed.to_string(),
            });
        }
        if self.pickup_code != code.trim() {
            return Err(OrderError::PickupCodeMismatch);
        }
        let previous = self.transition_to(FulfillmentStatus::Completed, now)?;
        self.pickup_code_verified_at = Some(now);
        Ok(previous)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order {0} belongs to another shop")]
    NotOwner(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Pickup code does not match")]
    PickupCodeMismatch,

    #[error("Unknown status: {0}")]
    UnknownStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use localbid_market::{Availability, NewBid, NewRequest};

    fn accepted_order() -> Order {
        let now = Utc::now();
        let request = ProductRequest::new(
            Uuid::new_v4(),
            NewRequest {
                title: "Espresso grinder".to_string(),
                description: None,
                category: "Kitchen".to_string(),
                quantity: 1,
                search_radius_miles: 10,
                budget_min: None,
                budget_max: None,
                bid_duration_hours: 24,
                photos: vec![],
                latitude: None,
                longitude: None,
            },
            now,
        );
        let bid = Bid::new(
            Uuid::new_v4(),
            NewBid {
                request_id: request.id,
                price: Decimal::new(20000, 2),
                availability: Availability::InStock,
                delivery_available: false,
                delivery_price: Decimal::ZERO,
                notes: None,
                photos: vec![],
            },
            now,
        );
        Order::from_accepted_bid(&request, &bid, Decimal::new(5, 2), now)
    }

    #[test]
    fn test_order_from_bid_splits_fee() {
        let order = accepted_order();
        assert_eq!(order.total_amount, Decimal::new(20000, 2));
        assert_eq!(order.platform_fee, Decimal::new(1000, 2));
        assert_eq!(order.shop_amount, Decimal::new(19000, 2));
        assert_eq!(order.fulfillment_status, FulfillmentStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_order_lifecycle() {
        let mut order = accepted_order();
        let now = Utc::now();

        order.transition_to(FulfillmentStatus::Preparing, now).unwrap();
        order.transition_to(FulfillmentStatus::Ready, now).unwrap();
        let code = order.pickup_code.clone();
        let previous = order.verify_pickup_code(&code, now).unwrap();

        assert_eq!(previous, FulfillmentStatus::Ready);
        assert_eq!(order.fulfillment_status, FulfillmentStatus::Completed);
        assert_eq!(order.pickup_code_verified_at, Some(now));
    }

    #[test]
    fn test_invalid_transition() {
        let mut order = accepted_order();
        let now = Utc::now();

        order.transition_to(FulfillmentStatus::Ready, now).unwrap();
        // Cannot go backwards
        assert!(order.transition_to(FulfillmentStatus::Preparing, now).is_err());

        order.transition_to(FulfillmentStatus::Cancelled, now).unwrap();
        // Terminal
        assert!(order.transition_to(FulfillmentStatus::Ready, now).is_err());
    }

    #[test]
    fn test_pickup_requires_ready_and_matching_code() {
        let mut order = accepted_order();
        let now = Utc::now();
        let code = order.pickup_code.clone();

        assert!(matches!(
            order.verify_pickup_code(&code, now),
            Err(OrderError::InvalidTransition { .. })
        ));

        order.transition_to(FulfillmentStatus::Ready, now).unwrap();
        assert!(matches!(
            order.verify_pickup_code("not-it", now),
            Err(OrderError::PickupCodeMismatch)
        ));
        assert_eq!(order.fulfillment_status, FulfillmentStatus::Ready);
    }

    #[test]
    fn test_transition_table() {
        use FulfillmentStatus::*;
        assert!(Pending.can_transition_to(Preparing));
        assert!(Pending.can_transition_to(Ready));
        assert!(Preparing.can_transition_to(Cancelled));
        assert!(Ready.can_transition_to(Ready));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Ready.can_transition_to(Pending));
    }
}
