//! In-process implementations of the repository, publisher and rate-limiter
//! traits. Each operation holds one lock for its whole duration, which gives
//! the same all-or-nothing behaviour as the Postgres transactions.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use localbid_core::accounts::{
    AccountType, CustomerProfile, NewUser, ShopProfile, ShopProfileInput, User,
};
use localbid_core::events::{EventPublisher, RateLimiter};
use localbid_core::notifications::Notification;
use localbid_core::repository::{
    AcceptedBid, BidRepository, NotificationRepository, OrderRepository, OrderTransition,
    ProfileRepository, RequestRepository, SubmittedBid, UserRepository,
};
use localbid_core::{CoreError, CoreResult};
use localbid_market::expiry::expire_due;
use localbid_market::{Bid, BidStats, BidStatus, MarketError, NewBid, NewRequest, ProductRequest};
use localbid_order::{FulfillmentStatus, Order};
use localbid_shared::MarketEvent;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    customer_profiles: HashMap<Uuid, CustomerProfile>,
    shop_profiles: HashMap<Uuid, ShopProfile>,
    /// (customer, shop, added_at)
    favorites: Vec<(Uuid, Uuid, DateTime<Utc>)>,
    requests: HashMap<Uuid, ProductRequest>,
    bids: HashMap<Uuid, Bid>,
    orders: HashMap<Uuid, Order>,
    notifications: Vec<Notification>,
}

impl State {
    fn customer_profile(&mut self, user_id: Uuid, now: DateTime<Utc>) -> &mut CustomerProfile {
        self.customer_profiles
            .entry(user_id)
            .or_insert_with(|| CustomerProfile::new(user_id, now))
    }

    fn ensure_shop_profile(&mut self, user_id: Uuid, business_name: String, now: DateTime<Utc>) {
        self.shop_profiles
            .entry(user_id)
            .or_insert_with(|| ShopProfile::placeholder(user_id, business_name, now));
    }

    fn bid_stats(&self, request_id: Uuid) -> BidStats {
        BidStats::from_bids(self.bids.values().filter(|b| b.request_id == request_id))
    }

    fn reject_active_bids(&mut self, request_id: Uuid, except: Option<Uuid>, now: DateTime<Utc>) -> Vec<Bid> {
        let mut rejected = Vec::new();
        for bid in self.bids.values_mut() {
            if bid.request_id == request_id && Some(bid.id) != except && bid.status == BidStatus::Active {
                bid.reject(now);
                rejected.push(bid.clone());
            }
        }
        rejected
    }
}

fn newest_first<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items
}

/// Whole marketplace held in memory; used by the HTTP tests
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves a request's expiry into the past so sweep and feed behaviour can be exercised
    pub async fn backdate_request(&self, id: Uuid, by: Duration) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("request {}", id)))?;
        request.created_at -= by;
        request.expires_at -= by;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, input: NewUser) -> CoreResult<User> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == input.email) {
            return Err(CoreError::Conflict("Email already registered".to_string()));
        }

        let user = User::new(&input, now);
        match user.account_type {
            AccountType::Customer => {
                state.customer_profile(user.id, now);
            }
            AccountType::Shop => {
                let name = input.business_name.clone().unwrap_or_else(|| input.name.clone());
                state.ensure_shop_profile(user.id, name, now);
            }
            AccountType::Admin => {}
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn record_sign_in(&self, id: Uuid) -> CoreResult<()> {
        if let Some(user) = self.state.lock().await.users.get_mut(&id) {
            user.last_signed_in = Utc::now();
        }
        Ok(())
    }

    async fn set_account_type(&self, id: Uuid, account_type: AccountType) -> CoreResult<User> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("user {}", id)))?;
        user.account_type = account_type;
        user.updated_at = now;
        let user = user.clone();

        match account_type {
            AccountType::Customer => {
                state.customer_profile(id, now);
            }
            AccountType::Shop => {
                let name = user.name.clone().unwrap_or_else(|| user.email.clone());
                state.ensure_shop_profile(id, name, now);
            }
            AccountType::Admin => {}
        }
        Ok(user)
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn get_or_create_customer_profile(&self, user_id: Uuid) -> CoreResult<CustomerProfile> {
        let mut state = self.state.lock().await;
        Ok(state.customer_profile(user_id, Utc::now()).clone())
    }

    async fn get_shop_profile(&self, user_id: Uuid) -> CoreResult<Option<ShopProfile>> {
        Ok(self.state.lock().await.shop_profiles.get(&user_id).cloned())
    }

    async fn upsert_shop_profile(
        &self,
        user_id: Uuid,
        input: ShopProfileInput,
    ) -> CoreResult<ShopProfile> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let profile = match state.shop_profiles.get_mut(&user_id) {
            Some(existing) => {
                existing.apply(input, now);
                existing.clone()
            }
            None => {
                let profile = ShopProfile::new(user_id, input, now);
                state.shop_profiles.insert(user_id, profile.clone());
                profile
            }
        };
        Ok(profile)
    }

    async fn list_shops(&self) -> CoreResult<Vec<ShopProfile>> {
        let state = self.state.lock().await;
        let mut shops: Vec<ShopProfile> = state.shop_profiles.values().cloned().collect();
        shops.sort_by(|a, b| {
            b.average_rating
                .cmp(&a.average_rating)
                .then(b.total_reviews.cmp(&a.total_reviews))
        });
        Ok(shops)
    }

    async fn add_favorite_shop(&self, customer_id: Uuid, shop_id: Uuid) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if !state.shop_profiles.contains_key(&shop_id) {
            return Err(CoreError::NotFound(format!("shop {}", shop_id)));
        }
        if !state.favorites.iter().any(|(c, s, _)| *c == customer_id && *s == shop_id) {
            state.favorites.push((customer_id, shop_id, Utc::now()));
        }
        Ok(())
    }

    async fn remove_favorite_shop(&self, customer_id: Uuid, shop_id: Uuid) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        state.favorites.retain(|(c, s, _)| !(*c == customer_id && *s == shop_id));
        Ok(())
    }

    async fn list_favorite_shops(&self, customer_id: Uuid) -> CoreResult<Vec<ShopProfile>> {
        let state = self.state.lock().await;
        let mut favorites: Vec<&(Uuid, Uuid, DateTime<Utc>)> =
            state.favorites.iter().filter(|(c, _, _)| *c == customer_id).collect();
        favorites.sort_by(|a, b| b.2.cmp(&a.2));
        Ok(favorites
            .into_iter()
            .filter_map(|(_, shop_id, _)| state.shop_profiles.get(shop_id).cloned())
            .collect())
    }
}

#[async_trait]
impl RequestRepository for MemoryStore {
    async fn create_request(&self, customer_id: Uuid, input: NewRequest) -> CoreResult<ProductRequest> {
        let now = Utc::now();
        let request = ProductRequest::new(customer_id, input, now);
        let mut state = self.state.lock().await;
        state.customer_profile(customer_id, now).requests_created += 1;
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_request(&self, id: Uuid) -> CoreResult<Option<ProductRequest>> {
        Ok(self.state.lock().await.requests.get(&id).cloned())
    }

    async fn list_customer_requests(&self, customer_id: Uuid) -> CoreResult<Vec<ProductRequest>> {
        let state = self.state.lock().await;
        let requests = state
            .requests
            .values()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect();
        Ok(newest_first(requests, |r| r.created_at))
    }

    async fn list_open_requests(&self, now: DateTime<Utc>) -> CoreResult<Vec<ProductRequest>> {
        let state = self.state.lock().await;
        let requests = state
            .requests
            .values()
            .filter(|r| r.is_open_for_bids(now))
            .cloned()
            .collect();
        Ok(newest_first(requests, |r| r.created_at))
    }

    async fn cancel_request(&self, customer_id: Uuid, id: Uuid) -> CoreResult<ProductRequest> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("request {}", id)))?;
        request.ensure_cancellable_by(customer_id)?;
        request.cancel(now);
        let request = request.clone();
        state.reject_active_bids(id, None, now);
        Ok(request)
    }

    async fn expire_due_requests(&self, now: DateTime<Utc>) -> CoreResult<Vec<Uuid>> {
        let mut state = self.state.lock().await;
        let expired = expire_due(state.requests.values_mut(), now);
        for id in &expired {
            state.reject_active_bids(*id, None, now);
        }
        Ok(expired)
    }
}

#[async_trait]
impl BidRepository for MemoryStore {
    async fn submit_bid(&self, shop_id: Uuid, input: NewBid) -> CoreResult<SubmittedBid> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let request = state
            .requests
            .get(&input.request_id)
            .ok_or_else(|| CoreError::NotFound(format!("request {}", input.request_id)))?;
        request.ensure_biddable_by(shop_id, now)?;
        if state
            .bids
            .values()
            .any(|b| b.request_id == input.request_id && b.shop_id == shop_id)
        {
            return Err(MarketError::DuplicateBid.into());
        }

        let bid = Bid::new(shop_id, input, now);
        state.bids.insert(bid.id, bid.clone());

        let stats = state.bid_stats(bid.request_id);
        let request = match state.requests.get_mut(&bid.request_id) {
            Some(request) => {
                request.apply_stats(&stats);
                request.updated_at = now;
                request.clone()
            }
            None => return Err(CoreError::NotFound(format!("request {}", bid.request_id))),
        };

        if let Some(profile) = state.shop_profiles.get_mut(&shop_id) {
            profile.bids_submitted += 1;
        }
        state.notifications.push(Notification::bid_received(&request, &bid, now));

        Ok(SubmittedBid { bid, request })
    }

    async fn withdraw_bid(&self, shop_id: Uuid, bid_id: Uuid) -> CoreResult<SubmittedBid> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let bid = state
            .bids
            .get_mut(&bid_id)
            .ok_or_else(|| CoreError::NotFound(format!("bid {}", bid_id)))?;
        bid.ensure_withdrawable_by(shop_id)?;
        bid.withdraw(now);
        let bid = bid.clone();

        let stats = state.bid_stats(bid.request_id);
        let request = state
            .requests
            .get_mut(&bid.request_id)
            .ok_or_else(|| CoreError::NotFound(format!("request {}", bid.request_id)))?;
        request.apply_stats(&stats);
        request.updated_at = now;

        Ok(SubmittedBid {
            bid,
            request: request.clone(),
        })
    }

    async fn get_bid(&self, id: Uuid) -> CoreResult<Option<Bid>> {
        Ok(self.state.lock().await.bids.get(&id).cloned())
    }

    async fn list_request_bids(&self, request_id: Uuid) -> CoreResult<Vec<Bid>> {
        let state = self.state.lock().await;
        let mut bids: Vec<Bid> = state
            .bids
            .values()
            .filter(|b| b.request_id == request_id)
            .cloned()
            .collect();
        bids.sort_by(|a, b| a.price.cmp(&b.price).then(a.submitted_at.cmp(&b.submitted_at)));
        Ok(bids)
    }

    async fn list_shop_bids(&self, shop_id: Uuid) -> CoreResult<Vec<Bid>> {
        let state = self.state.lock().await;
        let bids = state
            .bids
            .values()
            .filter(|b| b.shop_id == shop_id)
            .cloned()
            .collect();
        Ok(newest_first(bids, |b| b.submitted_at))
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn accept_bid(
        &self,
        customer_id: Uuid,
        bid_id: Uuid,
        fee_rate: Decimal,
    ) -> CoreResult<AcceptedBid> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let mut bid = state
            .bids
            .get(&bid_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("bid {}", bid_id)))?;
        let mut request = state
            .requests
            .get(&bid.request_id)
            .cloned()
            .ok_or_else(|| CoreError::Forbidden("Request not found or not owned by you".to_string()))?;

        request.ensure_acceptable_by(customer_id, now)?;
        bid.ensure_acceptable()?;

        bid.accept(now);
        state.bids.insert(bid.id, bid.clone());
        let rejected_bids = state.reject_active_bids(request.id, Some(bid.id), now);

        request.close_with(bid.id, now);
        request.apply_stats(&state.bid_stats(request.id));
        state.requests.insert(request.id, request.clone());

        let order = Order::from_accepted_bid(&request, &bid, fee_rate, now);
        state.orders.insert(order.id, order.clone());

        if let Some(profile) = state.shop_profiles.get_mut(&order.shop_id) {
            profile.bids_won += 1;
            profile.total_revenue += order.shop_amount;
        }

        state.notifications.push(Notification::bid_accepted(&request, &order, now));
        for rejected in &rejected_bids {
            state.notifications.push(Notification::bid_rejected(&request, rejected, now));
        }

        Ok(AcceptedBid {
            order,
            bid,
            request,
            rejected_bids,
        })
    }

    async fn list_customer_orders(&self, customer_id: Uuid) -> CoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        let orders = state
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        Ok(newest_first(orders, |o| o.created_at))
    }

    async fn list_shop_orders(&self, shop_id: Uuid) -> CoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        let orders = state
            .orders
            .values()
            .filter(|o| o.shop_id == shop_id)
            .cloned()
            .collect();
        Ok(newest_first(orders, |o| o.created_at))
    }

    async fn update_fulfillment_status(
        &self,
        shop_id: Uuid,
        order_id: Uuid,
        status: FulfillmentStatus,
    ) -> CoreResult<OrderTransition> {
        self.apply_transition(shop_id, order_id, |order, now| {
            Ok(order.transition_to(status, now)?)
        })
        .await
    }

    async fn verify_pickup(&self, shop_id: Uuid, order_id: Uuid, code: &str) -> CoreResult<OrderTransition> {
        self.apply_transition(shop_id, order_id, |order, now| {
            Ok(order.verify_pickup_code(code, now)?)
        })
        .await
    }
}

impl MemoryStore {
    async fn apply_transition<F>(&self, shop_id: Uuid, order_id: Uuid, change: F) -> CoreResult<OrderTransition>
    where
        F: FnOnce(&mut Order, DateTime<Utc>) -> CoreResult<FulfillmentStatus>,
    {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let mut order = state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        order.ensure_shop(shop_id)?;
        let previous = change(&mut order, now)?;
        state.orders.insert(order.id, order.clone());

        if previous != order.fulfillment_status {
            if order.fulfillment_status == FulfillmentStatus::Completed {
                state.customer_profile(order.customer_id, now).orders_completed += 1;
            }
            if let Some(note) = Notification::order_progress(&order, now) {
                state.notifications.push(note);
            }
        }

        Ok(OrderTransition { order, previous })
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn list_notifications(&self, user_id: Uuid) -> CoreResult<Vec<Notification>> {
        let state = self.state.lock().await;
        let notes = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(notes, |n| n.created_at))
    }

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        let note = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .ok_or_else(|| CoreError::NotFound(format!("notification {}", id)))?;
        note.mark_read(Utc::now());
        Ok(())
    }
}

/// Keeps every published event for assertions
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<MarketEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<MarketEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &MarketEvent) -> CoreResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Fixed-window counter mirroring the Redis limiter
#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, (i64, DateTime<Utc>)>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> CoreResult<bool> {
        let now = Utc::now();
        let mut windows = self.windows.lock().await;
        let entry = windows.entry(key.to_string()).or_insert((0, now));
        if now - entry.1 >= Duration::seconds(window_seconds) {
            *entry = (0, now);
        }
        entry.0 += 1;
        Ok(entry.0 <= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localbid_market::{Availability, RequestStatus};

    async fn seed(store: &MemoryStore) -> (Uuid, Uuid, Uuid, ProductRequest) {
        let mut ids = Vec::new();
        for (email, kind) in [
            ("buyer@example.com", AccountType::Customer),
            ("a@example.com", AccountType::Shop),
            ("b@example.com", AccountType::Shop),
        ] {
            let user = store
                .create_user(NewUser {
                    email: email.to_string(),
                    name: email.to_string(),
                    password_hash: "hash".to_string(),
                    account_type: kind,
                    business_name: Some(email.to_string()),
                })
                .await
                .unwrap();
            ids.push(user.id);
        }
        let request = store
            .create_request(
                ids[0],
                NewRequest {
                    title: "Patio heater".to_string(),
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
            )
            .await
            .unwrap();
        (ids[0], ids[1], ids[2], request)
    }

    fn bid(request_id: Uuid, cents: i64) -> NewBid {
        NewBid {
            request_id,
            price: Decimal::new(cents, 2),
            availability: Availability::InStock,
            delivery_available: false,
            delivery_price: Decimal::ZERO,
            notes: None,
            photos: vec![],
        }
    }

    #[tokio::test]
    async fn test_withdrawn_bid_leaves_aggregates() {
        let store = MemoryStore::new();
        let (_, shop_a, shop_b, request) = seed(&store).await;

        let first = store.submit_bid(shop_a, bid(request.id, 12000)).await.unwrap();
        store.submit_bid(shop_b, bid(request.id, 8000)).await.unwrap();

        let withdrawn = store.withdraw_bid(shop_b, first.bid.id).await;
        assert!(matches!(withdrawn, Err(CoreError::Forbidden(_))));

        let second = store.list_request_bids(request.id).await.unwrap();
        assert_eq!(second[0].price, Decimal::new(8000, 2));

        let after = store.withdraw_bid(shop_b, second[0].id).await.unwrap();
        assert_eq!(after.request.bids_count, 1);
        assert_eq!(after.request.lowest_bid_price, Some(Decimal::new(12000, 2)));
    }

    #[tokio::test]
    async fn test_accept_updates_counters_and_notifies() {
        let store = MemoryStore::new();
        let (customer, shop_a, shop_b, request) = seed(&store).await;

        let winner = store.submit_bid(shop_a, bid(request.id, 10000)).await.unwrap();
        store.submit_bid(shop_b, bid(request.id, 11000)).await.unwrap();

        let accepted = store.accept_bid(customer, winner.bid.id, Decimal::new(5, 2)).await.unwrap();
        assert_eq!(accepted.request.status, RequestStatus::Closed);
        assert_eq!(accepted.request.accepted_bid_id, Some(winner.bid.id));

        let shop = store.get_shop_profile(shop_a).await.unwrap().unwrap();
        assert_eq!(shop.bids_submitted, 1);
        assert_eq!(shop.bids_won, 1);
        assert_eq!(shop.total_revenue, Decimal::new(9500, 2));

        let loser_notes = store.list_notifications(shop_b).await.unwrap();
        assert_eq!(loser_notes.len(), 1);
        assert_eq!(loser_notes[0].kind, localbid_core::notifications::NotificationKind::BidRejected);
    }

    #[tokio::test]
    async fn test_expired_request_rejects_open_bids() {
        let store = MemoryStore::new();
        let (_, shop_a, _, request) = seed(&store).await;
        let placed = store.submit_bid(shop_a, bid(request.id, 5000)).await.unwrap();

        store.backdate_request(request.id, Duration::hours(25)).await.unwrap();
        let expired = store.expire_due_requests(Utc::now()).await.unwrap();

        assert_eq!(expired, vec![request.id]);
        let stored = store.get_bid(placed.bid.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BidStatus::Rejected);
    }

    #[tokio::test]
    async fn test_rate_limiter_window() {
        let limiter = MemoryRateLimiter::new();
        assert!(limiter.check_rate_limit("ip", 2, 60).await.unwrap());
        assert!(limiter.check_rate_limit("ip", 2, 60).await.unwrap());
        assert!(!limiter.check_rate_limit("ip", 2, 60).await.unwrap());
        assert!(limiter.check_rate_limit("other", 2, 60).await.unwrap());
    }
}
