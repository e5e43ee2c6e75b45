use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rules::MarketError;
use crate::stats::BidStats;

/// Request status in the bidding lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Active,
    Closed,
    Expired,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Active => "active",
            RequestStatus::Closed => "closed",
            RequestStatus::Expired => "expired",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RequestStatus::Active),
            "closed" => Ok(RequestStatus::Closed),
            "expired" => Ok(RequestStatus::Expired),
            "cancelled" => Ok(RequestStatus::Cancelled),
            other => Err(MarketError::UnknownStatus(other.to_string())),
        }
    }
}

/// Bid status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Active,
    Accepted,
    Rejected,
    Withdrawn,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Active => "active",
            BidStatus::Accepted => "accepted",
            BidStatus::Rejected => "rejected",
            BidStatus::Withdrawn => "withdrawn",
        }
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BidStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BidStatus::Active),
            "accepted" => Ok(BidStatus::Accepted),
            "rejected" => Ok(BidStatus::Rejected),
            "withdrawn" => Ok(BidStatus::Withdrawn),
            other => Err(MarketError::UnknownStatus(other.to_string())),
        }
    }
}

/// How quickly the shop can hand the product over
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    InStock,
    CanOrder,
    Limited,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::InStock => "in_stock",
            Availability::CanOrder => "can_order",
            Availability::Limited => "limited",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Availability {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_stock" => Ok(Availability::InStock),
            "can_order" => Ok(Availability::CanOrder),
            "limited" => Ok(Availability::Limited),
            other => Err(MarketError::UnknownStatus(other.to_string())),
        }
    }
}

/// Validated input for posting a new request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub quantity: i32,
    pub search_radius_miles: i32,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub bid_duration_hours: i32,
    pub photos: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl NewRequest {
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::hours(i64::from(self.bid_duration_hours))
    }
}

/// A customer's posted product need
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRequest {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub quantity: i32,
    pub search_radius_miles: i32,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub bid_duration_hours: i32,
    pub photos: Vec<String>,
    pub status: RequestStatus,
    pub expires_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub bids_count: i32,
    pub lowest_bid_price: Option<Decimal>,
    pub average_bid_price: Option<Decimal>,
    pub accepted_bid_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRequest {
    pub fn new(customer_id: Uuid, input: NewRequest, now: DateTime<Utc>) -> Self {
        let expires_at = input.expires_at(now);
        Self {
            id: Uuid::new_v4(),
            customer_id,
            title: input.title,
            description: input.description,
            category: input.category,
            quantity: input.quantity,
            search_radius_miles: input.search_radius_miles,
            budget_min: input.budget_min,
            budget_max: input.budget_max,
            bid_duration_hours: input.bid_duration_hours,
            photos: input.photos,
            status: RequestStatus::Active,
            expires_at,
            latitude: input.latitude,
            longitude: input.longitude,
            bids_count: 0,
            lowest_bid_price: None,
            average_bid_price: None,
            accepted_bid_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Active and not yet past its bidding window
    pub fn is_open_for_bids(&self, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Active && self.expires_at > now
    }

    /// Active but past its window; the expiry sweep should close it
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Active && self.expires_at <= now
    }

    pub fn ensure_open(&self, now: DateTime<Utc>) -> Result<(), MarketError> {
        if self.is_open_for_bids(now) {
            Ok(())
        } else if self.status == RequestStatus::Active {
            Err(MarketError::RequestExpired(self.id))
        } else {
            Err(MarketError::RequestNotOpen {
                id: self.id,
                status: self.status,
            })
        }
    }

    /// A shop may bid on anything open that it did not post itself
    pub fn ensure_biddable_by(&self, shop_id: Uuid, now: DateTime<Utc>) -> Result<(), MarketError> {
        if self.customer_id == shop_id {
            return Err(MarketError::OwnRequest);
        }
        self.ensure_open(now)
    }

    /// Only the owner may accept, and only while bidding is open
    pub fn ensure_acceptable_by(&self, customer_id: Uuid, now: DateTime<Utc>) -> Result<(), MarketError> {
        if self.customer_id != customer_id {
            return Err(MarketError::NotOwner);
        }
        self.ensure_open(now)
    }

    pub fn ensure_cancellable_by(&self, customer_id: Uuid) -> Result<(), MarketError> {
        if self.customer_id != customer_id {
            return Err(MarketError::NotOwner);
        }
        if self.status != RequestStatus::Active {
            return Err(MarketError::RequestNotOpen {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn apply_stats(&mut self, stats: &BidStats) {
        self.bids_count = stats.count;
        self.lowest_bid_price = stats.lowest;
        self.average_bid_price = stats.average;
    }

    pub fn close_with(&mut self, bid_id: Uuid, now: DateTime<Utc>) {
        self.status = RequestStatus::Closed;
        self.accepted_bid_id = Some(bid_id);
        self.updated_at = now;
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = RequestStatus::Cancelled;
        self.updated_at = now;
    }

    pub fn expire(&mut self, now: DateTime<Utc>) {
        self.status = RequestStatus::Expired;
        self.updated_at = now;
    }
}

/// Validated input for a shop's offer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBid {
    pub request_id: Uuid,
    pub price: Decimal,
    pub availability: Availability,
    pub delivery_available: bool,
    pub delivery_price: Decimal,
    pub notes: Option<String>,
    pub photos: Vec<String>,
}

/// A shop's price/availability offer against a request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bid {
    pub id: Uuid,
    pub request_id: Uuid,
    pub shop_id: Uuid,
    pub price: Decimal,
    pub availability: Availability,
    pub delivery_available: bool,
    pub delivery_price: Decimal,
    pub notes: Option<String>,
    pub photos: Vec<String>,
    pub status: BidStatus,
    pub submitted_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    pub fn new(shop_id: Uuid, input: NewBid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id: input.request_id,
            shop_id,
            price: input.price,
            availability: input.availability,
            delivery_available: input.delivery_available,
            delivery_price: input.delivery_price,
            notes: input.notes,
            photos: input.photos,
            status: BidStatus::Active,
            submitted_at: now,
            accepted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Guards against accepting the same bid twice, or a withdrawn/rejected one
    pub fn ensure_acceptable(&self) -> Result<(), MarketError> {
        if self.status != BidStatus::Active {
            return Err(MarketError::BidNotActive {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn ensure_withdrawable_by(&self, shop_id: Uuid) -> Result<(), MarketError> {
        if self.shop_id != shop_id {
            return Err(MarketError::NotOwner);
        }
        self.ensure_acceptable()
    }

    pub fn accept(&mut self, now: DateTime<Utc>) {
        self.status = BidStatus::Accepted;
        self.accepted_at = Some(now);
        self.updated_at = now;
    }

    pub fn reject(&mut self, now: DateTime<Utc>) {
        self.status = BidStatus::Rejected;
        self.updated_at = now;
    }

    pub fn withdraw(&mut self, now: DateTime<Utc>) {
        self.status = BidStatus::Withdrawn;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request(customer_id: Uuid, now: DateTime<Utc>) -> ProductRequest {
        ProductRequest::new(
            customer_id,
            NewRequest {
                title: "Cordless drill".to_string(),
                description: None,
                category: "Tools".to_string(),
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
        )
    }

    #[test]
    fn test_request_expires_after_bid_window() {
        let now = Utc::now();
        let request = sample_request(Uuid::new_v4(), now);

        assert_eq!(request.expires_at, now + Duration::hours(24));
        assert!(request.is_open_for_bids(now));
        assert!(!request.is_open_for_bids(now + Duration::hours(25)));
        assert!(request.is_due_for_expiry(now + Duration::hours(24)));
    }

    #[test]
    fn test_only_owner_can_accept() {
        let now = Utc::now();
        let owner = Uuid::new_v4();
        let request = sample_request(owner, now);

        assert!(request.ensure_acceptable_by(owner, now).is_ok());
        assert!(matches!(
            request.ensure_acceptable_by(Uuid::new_v4(), now),
            Err(MarketError::NotOwner)
        ));
    }

    #[test]
    fn test_closed_request_rejects_bids() {
        let now = Utc::now();
        let mut request = sample_request(Uuid::new_v4(), now);
        request.close_with(Uuid::new_v4(), now);

        let result = request.ensure_biddable_by(Uuid::new_v4(), now);
        assert!(matches!(
            result,
            Err(MarketError::RequestNotOpen { status: RequestStatus::Closed, .. })
        ));
    }

    #[test]
    fn test_customer_cannot_bid_on_own_request() {
        let now = Utc::now();
        let owner = Uuid::new_v4();
        let request = sample_request(owner, now);

        assert!(matches!(request.ensure_biddable_by(owner, now), Err(MarketError::OwnRequest)));
    }

    #[test]
    fn test_accepted_bid_cannot_be_accepted_again() {
        let now = Utc::now();
        let mut bid = Bid::new(
            Uuid::new_v4(),
            NewBid {
                request_id: Uuid::new_v4(),
                price: Decimal::new(4999, 2),
                availability: Availability::InStock,
                delivery_available: false,
                delivery_price: Decimal::ZERO,
                notes: None,
                photos: vec![],
            },
            now,
        );

        assert!(bid.ensure_acceptable().is_ok());
        bid.accept(now);
        assert_eq!(bid.accepted_at, Some(now));
        assert!(matches!(
            bid.ensure_acceptable(),
            Err(MarketError::BidNotActive { status: BidStatus::Accepted, .. })
        ));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            RequestStatus::Active,
            RequestStatus::Closed,
            RequestStatus::Expired,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert!("open".parse::<BidStatus>().is_err());
    }
}
