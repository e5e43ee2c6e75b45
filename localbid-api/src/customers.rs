use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use localbid_core::accounts::{CustomerProfile, ShopProfile};
use localbid_market::{rules, Bid, NewRequest, ProductRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    error::AppError,
    extract::{rule_error, trimmed_length, ApiPath, ValidatedJson},
    middleware::{customer_auth_middleware, CurrentUser},
    orders,
    state::AppState,
};

// ============================================================================
// Request/Response Types
// ============================================================================

fn default_quantity() -> i32 {
    1
}

fn default_radius() -> i32 {
    10
}

fn default_duration() -> i32 {
    24
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "check_request_budget"))]
pub struct CreateRequestBody {
    #[validate(custom(function = "check_title"))]
    pub title: String,
    #[validate(length(max = 1000, message = "description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(custom(function = "check_category"))]
    pub category: String,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    #[serde(default = "default_radius")]
    #[validate(range(min = 5, max = 25, message = "search_radius_miles must be 5-25"))]
    pub search_radius_miles: i32,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    #[serde(default = "default_duration")]
    #[validate(range(min = 2, max = 24, message = "bid_duration_hours must be 2-24"))]
    pub bid_duration_hours: i32,
    #[serde(default)]
    #[validate(length(max = 5, message = "at most 5 photos"))]
    pub photos: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

fn check_title(title: &str) -> Result<(), ValidationError> {
    trimmed_length(title, 5, 255, "title must be 5-255 characters")
}

fn check_category(category: &str) -> Result<(), ValidationError> {
    trimmed_length(category, 1, 100, "category must be 1-100 characters")
}

fn check_request_budget(body: &CreateRequestBody) -> Result<(), ValidationError> {
    rules::check_budget(body.budget_min, body.budget_max).map_err(rule_error)
}

impl From<CreateRequestBody> for NewRequest {
    fn from(body: CreateRequestBody) -> Self {
        NewRequest {
            title: body.title.trim().to_string(),
            description: body.description,
            category: body.category.trim().to_string(),
            quantity: body.quantity,
            search_radius_miles: body.search_radius_miles,
            budget_min: body.budget_min.map(|v| v.round_dp(2)),
            budget_max: body.budget_max.map(|v| v.round_dp(2)),
            bid_duration_hours: body.bid_duration_hours,
            photos: body.photos,
            latitude: body.latitude,
            longitude: body.longitude,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedRequestResponse {
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RequestDetailResponse {
    pub request: ProductRequest,
    /// Cheapest first
    pub bids: Vec<Bid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FavoriteShopRequest {
    pub shop_id: Uuid,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/{id}", get(get_request))
        .route("/requests/{id}/cancel", post(cancel_request))
        .route("/bids/{id}/accept", post(orders::accept_bid))
        .route("/orders", get(orders::list_customer_orders))
        .route("/favorites", get(list_favorites).post(add_favorite))
        .route("/favorites/{shop_id}", delete(remove_favorite))
        .route_layer(from_fn_with_state(state, customer_auth_middleware))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/customer/profile
async fn get_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<CustomerProfile>, AppError> {
    Ok(Json(state.profiles.get_or_create_customer_profile(user.id).await?))
}

/// POST /v1/customer/requests
async fn create_request(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(body): ValidatedJson<CreateRequestBody>,
) -> Result<(StatusCode, Json<CreatedRequestResponse>), AppError> {
    let request = state.requests.create_request(user.id, body.into()).await?;

    state.metrics.requests_created.inc();
    info!(
        request_id = %request.id,
        customer_id = %user.id,
        category = %request.category,
        expires_at = %request.expires_at,
        "Request posted"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedRequestResponse {
            id: request.id,
            expires_at: request.expires_at,
        }),
    ))
}

/// GET /v1/customer/requests
async fn list_requests(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<ProductRequest>>, AppError> {
    Ok(Json(state.requests.list_customer_requests(user.id).await?))
}

/// GET /v1/customer/requests/{id}
async fn get_request(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(request_id): ApiPath<Uuid>,
) -> Result<Json<RequestDetailResponse>, AppError> {
    let request = state
        .requests
        .get_request(request_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Request not found".to_string()))?;
    if request.customer_id != user.id {
        return Err(AppError::AuthorizationError("Not your request".to_string()));
    }

    let bids = state.bids.list_request_bids(request_id).await?;
    Ok(Json(RequestDetailResponse { request, bids }))
}

/// POST /v1/customer/requests/{id}/cancel
async fn cancel_request(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(request_id): ApiPath<Uuid>,
) -> Result<Json<ProductRequest>, AppError> {
    let request = state.requests.cancel_request(user.id, request_id).await?;
    info!(request_id = %request.id, "Request cancelled");
    Ok(Json(request))
}

/// GET /v1/customer/favorites
async fn list_favorites(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<ShopProfile>>, AppError> {
    Ok(Json(state.profiles.list_favorite_shops(user.id).await?))
}

/// POST /v1/customer/favorites
async fn add_favorite(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<FavoriteShopRequest>,
) -> Result<Json<Value>, AppError> {
    state.profiles.add_favorite_shop(user.id, req.shop_id).await?;
    Ok(Json(json!({ "success": true })))
}

/// DELETE /v1/customer/favorites/{shop_id}
async fn remove_favorite(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(shop_id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.profiles.remove_favorite_shop(user.id, shop_id).await?;
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: Value) -> CreateRequestBody {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_defaults_apply() {
        let req = body(json!({ "title": "Cordless drill", "category": "Tools" }));
        assert_eq!(req.quantity, 1);
        assert_eq!(req.search_radius_miles, 10);
        assert_eq!(req.bid_duration_hours, 24);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_inverted_budget_is_rejected() {
        let req = body(json!({
            "title": "Cordless drill",
            "category": "Tools",
            "budget_min": "80.00",
            "budget_max": "40.00"
        }));
        let err = AppError::from(req.validate().unwrap_err());
        assert_eq!(err.to_string(), "budget_min must not exceed budget_max");
    }

    #[test]
    fn test_window_and_radius_bounds() {
        let req = body(json!({
            "title": "Cordless drill",
            "category": "Tools",
            "bid_duration_hours": 48,
            "search_radius_miles": 2
        }));
        let err = AppError::from(req.validate().unwrap_err());
        assert_eq!(
            err.to_string(),
            "bid_duration_hours must be 2-24; search_radius_miles must be 5-25"
        );
    }

    #[test]
    fn test_title_is_measured_after_trimming() {
        let req = body(json!({ "title": "   ab    ", "category": "Tools" }));
        let err = AppError::from(req.validate().unwrap_err());
        assert_eq!(err.to_string(), "title must be 5-255 characters");

        let req = body(json!({ "title": "  Cordless drill  ", "category": " Tools " }));
        assert!(req.validate().is_ok());
        let new_request = NewRequest::from(req);
        assert_eq!(new_request.title, "Cordless drill");
        assert_eq!(new_request.category, "Tools");
    }

    #[test]
    fn test_category_length_is_bounded() {
        let req = body(json!({ "title": "Cordless drill", "category": "c".repeat(100) }));
        assert!(req.validate().is_ok());

        let req = body(json!({ "title": "Cordless drill", "category": "c".repeat(101) }));
        let err = AppError::from(req.validate().unwrap_err());
        assert_eq!(err.to_string(), "category must be 1-100 characters");

        let req = body(json!({ "title": "Cordless drill", "category": "   " }));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_budget_must_fit_money_column() {
        let req = body(json!({
            "title": "Cordless drill",
            "category": "Tools",
            "budget_max": "100000000.00"
        }));
        let err = AppError::from(req.validate().unwrap_err());
        assert_eq!(err.to_string(), "budget must not exceed 99999999");

        let req = body(json!({
            "title": "Cordless drill",
            "category": "Tools",
            "budget_min": "10.005",
            "budget_max": "99999999"
        }));
        assert!(req.validate().is_ok());
        assert_eq!(NewRequest::from(req).budget_min, Some(Decimal::new(1000, 2)));
    }
}
