use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use localbid_core::accounts::{ShopProfile, ShopProfileInput};
use localbid_market::{rules, Availability, Bid, NewBid, ProductRequest};
use localbid_order::ShopAnalytics;
use localbid_shared::models::events::BidSubmittedEvent;
use localbid_shared::MarketEvent;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    error::AppError,
    extract::{rule_error, trimmed_length, ApiPath, ValidatedJson},
    middleware::{shop_auth_middleware, CurrentUser},
    orders,
    state::AppState,
};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct ShopProfileBody {
    #[validate(custom(function = "check_business_name"))]
    pub business_name: String,
    #[validate(length(max = 1000, message = "description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 5, message = "choose 1-5 categories"))]
    pub categories: Vec<String>,
    #[validate(range(min = 5, max = 25, message = "service_radius_miles must be 5-25"))]
    pub service_radius_miles: i32,
    #[validate(length(max = 255, message = "business_license must be at most 255 characters"))]
    pub business_license: Option<String>,
    #[validate(length(max = 255, message = "tax_id must be at most 255 characters"))]
    pub tax_id: Option<String>,
}

fn check_business_name(name: &str) -> Result<(), ValidationError> {
    trimmed_length(name, 3, 255, "business_name must be 3-255 characters")
}

impl From<ShopProfileBody> for ShopProfileInput {
    fn from(body: ShopProfileBody) -> Self {
        ShopProfileInput {
            business_name: body.business_name.trim().to_string(),
            description: body.description,
            categories: body.categories,
            service_radius_miles: body.service_radius_miles,
            business_license: body.business_license,
            tax_id: body.tax_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "check_bid_amounts"))]
pub struct SubmitBidBody {
    pub request_id: Uuid,
    pub price: Decimal,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub delivery_available: bool,
    #[serde(default)]
    pub delivery_price: Decimal,
    #[validate(length(max = 200, message = "notes must be at most 200 characters"))]
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(length(max = 3, message = "at most 3 photos"))]
    pub photos: Vec<String>,
}

fn check_bid_amounts(body: &SubmitBidBody) -> Result<(), ValidationError> {
    rules::check_bid_price(body.price).map_err(rule_error)?;
    rules::check_delivery_price(body.delivery_price).map_err(rule_error)
}

impl From<SubmitBidBody> for NewBid {
    fn from(body: SubmitBidBody) -> Self {
        NewBid {
            request_id: body.request_id,
            price: body.price.round_dp(2),
            availability: body.availability,
            delivery_available: body.delivery_available,
            delivery_price: body.delivery_price.round_dp(2),
            notes: body.notes,
            photos: body.photos,
        }
    }
}

/// GET /v1/shops is public; everything else needs a shop account
pub fn routes(state: AppState) -> Router<AppState> {
    let shop = Router::new()
        .route("/shop/profile", get(get_profile).put(put_profile))
        .route("/shop/feed", get(feed))
        .route("/shop/bids", post(submit_bid).get(list_bids))
        .route("/shop/bids/{id}/withdraw", post(withdraw_bid))
        .route("/shop/orders", get(orders::list_shop_orders))
        .route("/shop/orders/{id}/status", put(orders::update_order_status))
        .route("/shop/orders/{id}/pickup", post(orders::verify_pickup))
        .route("/shop/analytics", get(analytics))
        .route_layer(from_fn_with_state(state, shop_auth_middleware));

    Router::new().route("/shops", get(list_shops)).merge(shop)
}

async fn require_profile(state: &AppState, shop_id: Uuid) -> Result<ShopProfile, AppError> {
    state
        .profiles
        .get_shop_profile(shop_id)
        .await?
        .ok_or_else(|| AppError::AuthorizationError("Shop profile not set up".to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/shops
/// Best rated first
async fn list_shops(State(state): State<AppState>) -> Result<Json<Vec<ShopProfile>>, AppError> {
    Ok(Json(state.profiles.list_shops().await?))
}

/// GET /v1/shop/profile
async fn get_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ShopProfile>, AppError> {
    let profile = state
        .profiles
        .get_shop_profile(user.id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Shop profile not found".to_string()))?;
    Ok(Json(profile))
}

/// PUT /v1/shop/profile
async fn put_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(body): ValidatedJson<ShopProfileBody>,
) -> Result<Json<ShopProfile>, AppError> {
    let profile = state.profiles.upsert_shop_profile(user.id, body.into()).await?;
    info!(shop_id = %user.id, business_name = %profile.business_name, "Shop profile saved");
    Ok(Json(profile))
}

/// GET /v1/shop/feed
/// Open requests a shop can bid on, newest first
async fn feed(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<ProductRequest>>, AppError> {
    require_profile(&state, user.id).await?;
    Ok(Json(state.requests.list_open_requests(Utc::now()).await?))
}

/// POST /v1/shop/bids
async fn submit_bid(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(body): ValidatedJson<SubmitBidBody>,
) -> Result<(StatusCode, Json<Bid>), AppError> {
    let submitted = state.bids.submit_bid(user.id, body.into()).await?;
    let (bid, request) = (submitted.bid, submitted.request);

    state.metrics.bids_submitted.inc();
    info!(
        bid_id = %bid.id,
        request_id = %request.id,
        shop_id = %user.id,
        price = %bid.price,
        bids_count = request.bids_count,
        "Bid submitted"
    );

    state
        .announce(MarketEvent::BidSubmitted(BidSubmittedEvent {
            bid_id: bid.id,
            request_id: request.id,
            shop_id: bid.shop_id,
            customer_id: request.customer_id,
            price: bid.price,
            bids_count: request.bids_count,
            lowest_bid_price: request.lowest_bid_price,
            average_bid_price: request.average_bid_price,
            timestamp: Utc::now().timestamp(),
        }))
        .await;

    Ok((StatusCode::CREATED, Json(bid)))
}

/// GET /v1/shop/bids
async fn list_bids(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<Bid>>, AppError> {
    Ok(Json(state.bids.list_shop_bids(user.id).await?))
}

/// POST /v1/shop/bids/{id}/withdraw
async fn withdraw_bid(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(bid_id): ApiPath<Uuid>,
) -> Result<Json<Bid>, AppError> {
    let withdrawn = state.bids.withdraw_bid(user.id, bid_id).await?;
    info!(
        bid_id = %bid_id,
        request_id = %withdrawn.request.id,
        bids_count = withdrawn.request.bids_count,
        "Bid withdrawn"
    );
    Ok(Json(withdrawn.bid))
}

/// GET /v1/shop/analytics
async fn analytics(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ShopAnalytics>, AppError> {
    let profile = require_profile(&state, user.id).await?;
    Ok(Json(profile.analytics()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bid_price_bounds_are_enforced() {
        let body: SubmitBidBody = serde_json::from_value(json!({
            "request_id": Uuid::new_v4(),
            "price": "2.50"
        }))
        .unwrap();
        let err = AppError::from(body.validate().unwrap_err());
        assert_eq!(err.to_string(), "price must be between 5 and 50000");
    }

    #[test]
    fn test_bid_defaults() {
        let body: SubmitBidBody = serde_json::from_value(json!({
            "request_id": Uuid::new_v4(),
            "price": "19.99"
        }))
        .unwrap();
        assert!(body.validate().is_ok());

        let bid = NewBid::from(body);
        assert_eq!(bid.availability, Availability::InStock);
        assert_eq!(bid.delivery_price, Decimal::ZERO);
        assert!(!bid.delivery_available);
    }

    #[test]
    fn test_delivery_price_must_fit_money_column() {
        let body: SubmitBidBody = serde_json::from_value(json!({
            "request_id": Uuid::new_v4(),
            "price": "19.99",
            "delivery_available": true,
            "delivery_price": "1000000000"
        }))
        .unwrap();
        let err = AppError::from(body.validate().unwrap_err());
        assert_eq!(err.to_string(), "delivery_price must not exceed 99999999");
    }

    #[test]
    fn test_profile_needs_categories() {
        let body: ShopProfileBody = serde_json::from_value(json!({
            "business_name": "Corner Hardware",
            "categories": [],
            "service_radius_miles": 10
        }))
        .unwrap();
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_profile_name_is_measured_after_trimming() {
        let body: ShopProfileBody = serde_json::from_value(json!({
            "business_name": "   AB   ",
            "categories": ["Tools"],
            "service_radius_miles": 10
        }))
        .unwrap();
        let err = AppError::from(body.validate().unwrap_err());
        assert_eq!(err.to_string(), "business_name must be 3-255 characters");
    }
}
