use async_trait::async_trait;
use chrono::{DateTime, Utc};
use localbid_market::{Bid, NewBid, NewRequest, ProductRequest};
use localbid_order::{FulfillmentStatus, Order};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::accounts::{AccountType, CustomerProfile, NewUser, ShopProfile, ShopProfileInput, User};
use crate::notifications::Notification;
use crate::CoreResult;

/// Result of a bid write: the bid plus the request with refreshed aggregates
#[derive(Debug, Clone)]
pub struct SubmittedBid {
    pub bid: Bid,
    pub request: ProductRequest,
}

/// Everything the acceptance transaction touched
#[derive(Debug, Clone)]
pub struct AcceptedBid {
    pub order: Order,
    pub bid: Bid,
    pub request: ProductRequest,
    pub rejected_bids: Vec<Bid>,
}

#[derive(Debug, Clone)]
pub struct OrderTransition {
    pub order: Order,
    pub previous: FulfillmentStatus,
}

/// Repository trait for account data access
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Creates the user and the profile matching its account type.
    /// A taken email is a `Conflict`.
    async fn create_user(&self, user: NewUser) -> CoreResult<User>;

    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>>;

    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>>;

    async fn record_sign_in(&self, id: Uuid) -> CoreResult<()>;

    /// Switches the account type, creating the missing profile if needed
    async fn set_account_type(&self, id: Uuid, account_type: AccountType) -> CoreResult<User>;
}

/// Repository trait for customer/shop profiles and favorites
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_or_create_customer_profile(&self, user_id: Uuid) -> CoreResult<CustomerProfile>;

    async fn get_shop_profile(&self, user_id: Uuid) -> CoreResult<Option<ShopProfile>>;

    async fn upsert_shop_profile(
        &self,
        user_id: Uuid,
        input: ShopProfileInput,
    ) -> CoreResult<ShopProfile>;

    /// All shops, best rated first
    async fn list_shops(&self) -> CoreResult<Vec<ShopProfile>>;

    /// Idempotent; an unknown shop is `NotFound`
    async fn add_favorite_shop(&self, customer_id: Uuid, shop_id: Uuid) -> CoreResult<()>;

    async fn remove_favorite_shop(&self, customer_id: Uuid, shop_id: Uuid) -> CoreResult<()>;

    async fn list_favorite_shops(&self, customer_id: Uuid) -> CoreResult<Vec<ShopProfile>>;
}

/// Repository trait for product requests
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn create_request(&self, customer_id: Uuid, input: NewRequest) -> CoreResult<ProductRequest>;

    async fn get_request(&self, id: Uuid) -> CoreResult<Option<ProductRequest>>;

    /// Newest first
    async fn list_customer_requests(&self, customer_id: Uuid) -> CoreResult<Vec<ProductRequest>>;

    /// Active, unexpired requests, newest first
    async fn list_open_requests(&self, now: DateTime<Utc>) -> CoreResult<Vec<ProductRequest>>;

    /// Owner only; active bids on it are rejected
    async fn cancel_request(&self, customer_id: Uuid, id: Uuid) -> CoreResult<ProductRequest>;

    /// Marks elapsed active requests `expired`, returning their ids
    async fn expire_due_requests(&self, now: DateTime<Utc>) -> CoreResult<Vec<Uuid>>;
}

/// Repository trait for bids
#[async_trait]
pub trait BidRepository: Send + Sync {
    /// Inserts the bid and recomputes the request aggregates in one transaction
    async fn submit_bid(&self, shop_id: Uuid, input: NewBid) -> CoreResult<SubmittedBid>;

    async fn withdraw_bid(&self, shop_id: Uuid, bid_id: Uuid) -> CoreResult<SubmittedBid>;

    async fn get_bid(&self, id: Uuid) -> CoreResult<Option<Bid>>;

    /// Cheapest first
    async fn list_request_bids(&self, request_id: Uuid) -> CoreResult<Vec<Bid>>;

    /// Most recently submitted first
    async fn list_shop_bids(&self, shop_id: Uuid) -> CoreResult<Vec<Bid>>;
}

/// Repository trait for orders
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Accepts the bid, closes the request, rejects competing bids and
    /// creates the order, all or nothing.
    async fn accept_bid(
        &self,
        customer_id: Uuid,
        bid_id: Uuid,
        fee_rate: Decimal,
    ) -> CoreResult<AcceptedBid>;

    async fn list_customer_orders(&self, customer_id: Uuid) -> CoreResult<Vec<Order>>;

    async fn list_shop_orders(&self, shop_id: Uuid) -> CoreResult<Vec<Order>>;

    async fn update_fulfillment_status(
        &self,
        shop_id: Uuid,
        order_id: Uuid,
        status: FulfillmentStatus,
    ) -> CoreResult<OrderTransition>;

    async fn verify_pickup(&self, shop_id: Uuid, order_id: Uuid, code: &str) -> CoreResult<OrderTransition>;
}

/// Repository trait for in-app notifications
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Newest first
    async fn list_notifications(&self, user_id: Uuid) -> CoreResult<Vec<Notification>>;

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> CoreResult<()>;
}
