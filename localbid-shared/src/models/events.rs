use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TOPIC_BID_SUBMITTED: &str = "localbid.bid.submitted";
pub const TOPIC_BID_ACCEPTED: &str = "localbid.bid.accepted";
pub const TOPIC_ORDER_STATUS: &str = "localbid.order.status";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BidSubmittedEvent {
    pub bid_id: Uuid,
    pub request_id: Uuid,
    pub shop_id: Uuid,
    pub customer_id: Uuid,
    pub price: Decimal,
    pub bids_count: i32,
    pub lowest_bid_price: Option<Decimal>,
    pub average_bid_price: Option<Decimal>,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BidAcceptedEvent {
    pub bid_id: Uuid,
    pub request_id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub shop_id: Uuid,
    pub total_amount: Decimal,
    pub rejected_shop_ids: Vec<Uuid>,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OrderStatusChangedEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub shop_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub timestamp: i64,
}

/// Everything the marketplace announces after a committed write.
/// Published to Kafka and fanned out to SSE subscribers.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    BidSubmitted(BidSubmittedEvent),
    BidAccepted(BidAcceptedEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
}

impl MarketEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            MarketEvent::BidSubmitted(_) => TOPIC_BID_SUBMITTED,
            MarketEvent::BidAccepted(_) => TOPIC_BID_ACCEPTED,
            MarketEvent::OrderStatusChanged(_) => TOPIC_ORDER_STATUS,
        }
    }

    /// Same value as the serialized `type` tag; used as the SSE event name
    pub fn kind(&self) -> &'static str {
        match self {
            MarketEvent::BidSubmitted(_) => "bid_submitted",
            MarketEvent::BidAccepted(_) => "bid_accepted",
            MarketEvent::OrderStatusChanged(_) => "order_status_changed",
        }
    }

    /// Partition key: all events for one request (or order) land on one partition.
    pub fn key(&self) -> String {
        match self {
            MarketEvent::BidSubmitted(e) => e.request_id.to_string(),
            MarketEvent::BidAccepted(e) => e.request_id.to_string(),
            MarketEvent::OrderStatusChanged(e) => e.order_id.to_string(),
        }
    }

    /// Users who should see this event on their live stream.
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        match self {
            MarketEvent::BidSubmitted(e) => e.customer_id == user_id || e.shop_id == user_id,
            MarketEvent::BidAccepted(e) => {
                e.customer_id == user_id
                    || e.shop_id == user_id
                    || e.rejected_shop_ids.contains(&user_id)
            }
            MarketEvent::OrderStatusChanged(e) => e.customer_id == user_id || e.shop_id == user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged_by_type() {
        let event = MarketEvent::OrderStatusChanged(OrderStatusChangedEvent {
            order_id: Uuid::new_v4(),
            order_number: "ORD-ABCDEFGHIJ".to_string(),
            customer_id: Uuid::new_v4(),
            shop_id: Uuid::new_v4(),
            from_status: "pending".to_string(),
            to_status: "preparing".to_string(),
            timestamp: 0,
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "order_status_changed");
        assert_eq!(value["to_status"], "preparing");
        assert_eq!(event.topic(), TOPIC_ORDER_STATUS);
        assert_eq!(value["type"], event.kind());
    }

    #[test]
    fn test_rejected_shops_see_acceptance() {
        let loser = Uuid::new_v4();
        let bystander = Uuid::new_v4();
        let event = MarketEvent::BidAccepted(BidAcceptedEvent {
            bid_id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            order_number: "ORD-0123456789".to_string(),
            customer_id: Uuid::new_v4(),
            shop_id: Uuid::new_v4(),
            total_amount: Decimal::new(2500, 2),
            rejected_shop_ids: vec![loser],
            timestamp: 0,
        });

        assert!(event.is_visible_to(loser));
        assert!(!event.is_visible_to(bystander));
    }
}
