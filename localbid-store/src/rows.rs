//! Row mappings and the statements shared by the Postgres repositories.
//! Status columns are stored as text and parsed back into their enums.

use chrono::{DateTime, Utc};
use localbid_core::accounts::{CustomerProfile, ShopProfile, User};
use localbid_core::notifications::Notification;
use localbid_core::CoreResult;
use localbid_market::{Bid, BidStats, ProductRequest};
use localbid_order::Order;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::database::db_err;

pub(crate) const USER_COLUMNS: &str = "id, email, password_hash, name, phone, account_type, role, \
     is_verified, created_at, updated_at, last_signed_in";

pub(crate) const CUSTOMER_PROFILE_COLUMNS: &str = "user_id, bio, average_rating, total_reviews, \
     requests_created, orders_completed, is_premium, created_at, updated_at";

pub(crate) const SHOP_PROFILE_COLUMNS: &str = "user_id, business_name, business_license, tax_id, \
     description, categories, service_radius_miles, average_rating, total_reviews, bids_submitted, \
     bids_won, total_revenue, subscription, is_verified, is_active, created_at, updated_at";

pub(crate) const REQUEST_COLUMNS: &str = "id, customer_id, title, description, category, quantity, \
     search_radius_miles, budget_min, budget_max, bid_duration_hours, photos, status, expires_at, \
     latitude, longitude, bids_count, lowest_bid_price, average_bid_price, accepted_bid_id, \
     created_at, updated_at";

pub(crate) const BID_COLUMNS: &str = "id, request_id, shop_id, price, availability, \
     delivery_available, delivery_price, notes, photos, status, submitted_at, accepted_at, \
     created_at, updated_at";

pub(crate) const ORDER_COLUMNS: &str = "id, order_number, request_id, bid_id, customer_id, shop_id, \
     total_amount, platform_fee, shop_amount, payment_status, fulfillment_status, pickup_code, \
     pickup_code_verified_at, notes, created_at, updated_at";

pub(crate) const NOTIFICATION_COLUMNS: &str = "id, user_id, type, title, message, related_entity_id, \
     related_entity_type, is_read, read_at, created_at";

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    id: Uuid,
    email: String,
    password_hash: Option<String>,
    name: Option<String>,
    phone: Option<String>,
    account_type: String,
    role: String,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_signed_in: DateTime<Utc>,
}

impl UserRow {
    pub(crate) fn into_user(self) -> CoreResult<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            name: self.name,
            phone: self.phone,
            account_type: self.account_type.parse()?,
            role: self.role.parse()?,
            is_verified: self.is_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_signed_in: self.last_signed_in,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CustomerProfileRow {
    user_id: Uuid,
    bio: Option<String>,
    average_rating: Decimal,
    total_reviews: i32,
    requests_created: i32,
    orders_completed: i32,
    is_premium: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerProfileRow> for CustomerProfile {
    fn from(row: CustomerProfileRow) -> Self {
        Self {
            user_id: row.user_id,
            bio: row.bio,
            average_rating: row.average_rating,
            total_reviews: row.total_reviews,
            requests_created: row.requests_created,
            orders_completed: row.orders_completed,
            is_premium: row.is_premium,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ShopProfileRow {
    user_id: Uuid,
    business_name: String,
    business_license: Option<String>,
    tax_id: Option<String>,
    description: Option<String>,
    categories: Vec<String>,
    service_radius_miles: i32,
    average_rating: Decimal,
    total_reviews: i32,
    bids_submitted: i32,
    bids_won: i32,
    total_revenue: Decimal,
    subscription: String,
    is_verified: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShopProfileRow {
    pub(crate) fn into_profile(self) -> CoreResult<ShopProfile> {
        Ok(ShopProfile {
            user_id: self.user_id,
            business_name: self.business_name,
            business_license: self.business_license,
            tax_id: self.tax_id,
            description: self.description,
            categories: self.categories,
            service_radius_miles: self.service_radius_miles,
            average_rating: self.average_rating,
            total_reviews: self.total_reviews,
            bids_submitted: self.bids_submitted,
            bids_won: self.bids_won,
            total_revenue: self.total_revenue,
            subscription: self.subscription.parse()?,
            is_verified: self.is_verified,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RequestRow {
    id: Uuid,
    customer_id: Uuid,
    title: String,
    description: Option<String>,
    category: String,
    quantity: i32,
    search_radius_miles: i32,
    budget_min: Option<Decimal>,
    budget_max: Option<Decimal>,
    bid_duration_hours: i32,
    photos: Vec<String>,
    status: String,
    expires_at: DateTime<Utc>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    bids_count: i32,
    lowest_bid_price: Option<Decimal>,
    average_bid_price: Option<Decimal>,
    accepted_bid_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RequestRow {
    pub(crate) fn into_request(self) -> CoreResult<ProductRequest> {
        Ok(ProductRequest {
            id: self.id,
            customer_id: self.customer_id,
            title: self.title,
            description: self.description,
            category: self.category,
            quantity: self.quantity,
            search_radius_miles: self.search_radius_miles,
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            bid_duration_hours: self.bid_duration_hours,
            photos: self.photos,
            status: self.status.parse()?,
            expires_at: self.expires_at,
            latitude: self.latitude,
            longitude: self.longitude,
            bids_count: self.bids_count,
            lowest_bid_price: self.lowest_bid_price,
            average_bid_price: self.average_bid_price,
            accepted_bid_id: self.accepted_bid_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BidRow {
    id: Uuid,
    request_id: Uuid,
    shop_id: Uuid,
    price: Decimal,
    availability: String,
    delivery_available: bool,
    delivery_price: Decimal,
    notes: Option<String>,
    photos: Vec<String>,
    status: String,
    submitted_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BidRow {
    pub(crate) fn into_bid(self) -> CoreResult<Bid> {
        Ok(Bid {
            id: self.id,
            request_id: self.request_id,
            shop_id: self.shop_id,
            price: self.price,
            availability: self.availability.parse()?,
            delivery_available: self.delivery_available,
            delivery_price: self.delivery_price,
            notes: self.notes,
            photos: self.photos,
            status: self.status.parse()?,
            submitted_at: self.submitted_at,
            accepted_at: self.accepted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct OrderRow {
    id: Uuid,
    order_number: String,
    request_id: Uuid,
    bid_id: Uuid,
    customer_id: Uuid,
    shop_id: Uuid,
    total_amount: Decimal,
    platform_fee: Decimal,
    shop_amount: Decimal,
    payment_status: String,
    fulfillment_status: String,
    pickup_code: String,
    pickup_code_verified_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    pub(crate) fn into_order(self) -> CoreResult<Order> {
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            request_id: self.request_id,
            bid_id: self.bid_id,
            customer_id: self.customer_id,
            shop_id: self.shop_id,
            total_amount: self.total_amount,
            platform_fee: self.platform_fee,
            shop_amount: self.shop_amount,
            payment_status: self.payment_status.parse()?,
            fulfillment_status: self.fulfillment_status.parse()?,
            pickup_code: self.pickup_code,
            pickup_code_verified_at: self.pickup_code_verified_at,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    #[sqlx(rename = "type")]
    kind: String,
    title: String,
    message: Option<String>,
    related_entity_id: Option<Uuid>,
    related_entity_type: Option<String>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    pub(crate) fn into_notification(self) -> CoreResult<Notification> {
        Ok(Notification {
            id: self.id,
            user_id: self.user_id,
            kind: self.kind.parse()?,
            title: self.title,
            message: self.message,
            related_entity_id: self.related_entity_id,
            related_entity_type: self.related_entity_type,
            is_read: self.is_read,
            read_at: self.read_at,
            created_at: self.created_at,
        })
    }
}

pub(crate) fn collect<R, T>(rows: Vec<R>, convert: fn(R) -> CoreResult<T>) -> CoreResult<Vec<T>> {
    rows.into_iter().map(convert).collect()
}

// ============================================================================
// Statements shared inside transactions
// ============================================================================

pub(crate) async fn lock_request(conn: &mut PgConnection, id: Uuid) -> CoreResult<Option<ProductRequest>> {
    let sql = format!("SELECT {} FROM requests WHERE id = $1 FOR UPDATE", REQUEST_COLUMNS);
    sqlx::query_as::<_, RequestRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .map(RequestRow::into_request)
        .transpose()
}

pub(crate) async fn lock_bid(conn: &mut PgConnection, id: Uuid) -> CoreResult<Option<Bid>> {
    let sql = format!("SELECT {} FROM bids WHERE id = $1 FOR UPDATE", BID_COLUMNS);
    sqlx::query_as::<_, BidRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .map(BidRow::into_bid)
        .transpose()
}

/// Request id of a bid, read without locking so the request row can be
/// locked before the bid row.
pub(crate) async fn bid_request_id(conn: &mut PgConnection, bid_id: Uuid) -> CoreResult<Option<Uuid>> {
    sqlx::query_scalar::<_, Uuid>("SELECT request_id FROM bids WHERE id = $1")
        .bind(bid_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)
}

pub(crate) async fn save_bid_status(conn: &mut PgConnection, bid: &Bid) -> CoreResult<()> {
    sqlx::query("UPDATE bids SET status = $2, accepted_at = $3, updated_at = $4 WHERE id = $1")
        .bind(bid.id)
        .bind(bid.status.as_str())
        .bind(bid.accepted_at)
        .bind(bid.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

/// Recomputes count/lowest/average over the request's non-withdrawn bids
pub(crate) async fn compute_bid_stats(conn: &mut PgConnection, request_id: Uuid) -> CoreResult<BidStats> {
    let prices: Vec<Decimal> =
        sqlx::query_scalar::<_, Decimal>("SELECT price FROM bids WHERE request_id = $1 AND status <> 'withdrawn'")
            .bind(request_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err)?;
    Ok(BidStats::from_prices(prices))
}

/// Persists status, acceptance and aggregate columns of a request
pub(crate) async fn save_request_state(conn: &mut PgConnection, request: &ProductRequest) -> CoreResult<()> {
    sqlx::query(
        r#"
        UPDATE requests
        SET status = $2, accepted_bid_id = $3, bids_count = $4,
            lowest_bid_price = $5, average_bid_price = $6, updated_at = $7
        WHERE id = $1
        "#,
    )
    .bind(request.id)
    .bind(request.status.as_str())
    .bind(request.accepted_bid_id)
    .bind(request.bids_count)
    .bind(request.lowest_bid_price)
    .bind(request.average_bid_price)
    .bind(request.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

pub(crate) async fn insert_notification(conn: &mut PgConnection, note: &Notification) -> CoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, type, title, message, related_entity_id, related_entity_type, is_read, read_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(note.id)
    .bind(note.user_id)
    .bind(note.kind.as_str())
    .bind(&note.title)
    .bind(&note.message)
    .bind(note.related_entity_id)
    .bind(&note.related_entity_type)
    .bind(note.is_read)
    .bind(note.read_at)
    .bind(note.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}
