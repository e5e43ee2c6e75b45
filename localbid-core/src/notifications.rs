use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use localbid_market::{Bid, ProductRequest};
use localbid_order::Order;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BidReceived,
    BidAccepted,
    BidRejected,
    OrderReady,
    OrderCompleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BidReceived => "bid_received",
            NotificationKind::BidAccepted => "bid_accepted",
            NotificationKind::BidRejected => "bid_rejected",
            NotificationKind::OrderReady => "order_ready",
            NotificationKind::OrderCompleted => "order_completed",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bid_received" => Ok(NotificationKind::BidReceived),
            "bid_accepted" => Ok(NotificationKind::BidAccepted),
            "bid_rejected" => Ok(NotificationKind::BidRejected),
            "order_ready" => Ok(NotificationKind::OrderReady),
            "order_completed" => Ok(NotificationKind::OrderCompleted),
            other => Err(CoreError::InternalError(format!("unknown notification type {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    pub related_entity_id: Option<Uuid>,
    pub related_entity_type: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: String,
        message: Option<String>,
        related: (Uuid, &str),
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            title,
            message,
            related_entity_id: Some(related.0),
            related_entity_type: Some(related.1.to_string()),
            is_read: false,
            read_at: None,
            created_at: now,
        }
    }

    /// To the customer: a shop bid on their request
    pub fn bid_received(request: &ProductRequest, bid: &Bid, now: DateTime<Utc>) -> Self {
        Self::new(
            request.customer_id,
            NotificationKind::BidReceived,
            format!("New bid on \"{}\"", request.title),
            Some(format!("A shop offered {} for your request", bid.price)),
            (request.id, "request"),
            now,
        )
    }

    /// To the winning shop
    pub fn bid_accepted(request: &ProductRequest, order: &Order, now: DateTime<Utc>) -> Self {
        Self::new(
            order.shop_id,
            NotificationKind::BidAccepted,
            format!("Your bid on \"{}\" was accepted", request.title),
            Some(format!("Order {} is waiting to be prepared", order.order_number)),
            (order.id, "order"),
            now,
        )
    }

    /// To every other shop that bid on the request
    pub fn bid_rejected(request: &ProductRequest, bid: &Bid, now: DateTime<Utc>) -> Self {
        Self::new(
            bid.shop_id,
            NotificationKind::BidRejected,
            format!("\"{}\" went to another shop", request.title),
            None,
            (bid.id, "bid"),
            now,
        )
    }

    /// To the customer when the shop moves the order to `ready` or `completed`
    pub fn order_progress(order: &Order, now: DateTime<Utc>) -> Option<Self> {
        use localbid_order::FulfillmentStatus;

        let (kind, title) = match order.fulfillment_status {
            FulfillmentStatus::Ready => (
                NotificationKind::OrderReady,
                format!("Order {} is ready for pickup", order.order_number),
            ),
            FulfillmentStatus::Completed => (
                NotificationKind::OrderCompleted,
                format!("Order {} is complete", order.order_number),
            ),
            _ => return None,
        };
        Some(Self::new(order.customer_id, kind, title, None, (order.id, "order"), now))
    }

    pub fn mark_read(&mut self, now: DateTime<Utc>) {
        if !self.is_read {
            self.is_read = true;
            self.read_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localbid_market::{Availability, NewBid, NewRequest};
    use localbid_order::FulfillmentStatus;
    use rust_decimal::Decimal;

    fn request_and_bid() -> (ProductRequest, Bid) {
        let now = Utc::now();
        let request = ProductRequest::new(
            Uuid::new_v4(),
            NewRequest {
                title: "Garden hose".to_string(),
                description: None,
                category: "Garden".to_string(),
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
                price: Decimal::new(2599, 2),
                availability: Availability::Limited,
                delivery_available: true,
                delivery_price: Decimal::new(500, 2),
                notes: None,
                photos: vec![],
            },
            now,
        );
        (request, bid)
    }

    #[test]
    fn test_bid_received_goes_to_customer() {
        let (request, bid) = request_and_bid();
        let note = Notification::bid_received(&request, &bid, Utc::now());

        assert_eq!(note.user_id, request.customer_id);
        assert_eq!(note.kind, NotificationKind::BidReceived);
        assert_eq!(note.message.as_deref(), Some("A shop offered 25.99 for your request"));
    }

    #[test]
    fn test_only_ready_and_completed_notify() {
        let (request, bid) = request_and_bid();
        let now = Utc::now();
        let mut order = Order::from_accepted_bid(&request, &bid, Decimal::new(5, 2), now);

        assert!(Notification::order_progress(&order, now).is_none());

        order.transition_to(FulfillmentStatus::Ready, now).unwrap();
        let note = Notification::order_progress(&order, now).unwrap();
        assert_eq!(note.kind, NotificationKind::OrderReady);
        assert_eq!(note.user_id, order.customer_id);
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let (request, bid) = request_and_bid();
        let first = Utc::now();
        let mut note = Notification::bid_received(&request, &bid, first);

        note.mark_read(first);
        note.mark_read(first + chrono::Duration::minutes(5));
        assert_eq!(note.read_at, Some(first));
    }
}
