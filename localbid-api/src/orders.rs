use axum::{
    extract::State,
    Extension, Json,
};
use chrono::Utc;
use localbid_core::repository::OrderTransition;
use localbid_order::{FulfillmentStatus, Order};
use localbid_shared::models::events::{BidAcceptedEvent, OrderStatusChangedEvent};
use localbid_shared::MarketEvent;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    extract::{ApiPath, ValidatedJson},
    middleware::CurrentUser,
    state::AppState,
};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptBidResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub pickup_code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: FulfillmentStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PickupRequest {
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
}

// ============================================================================
// Customer Handlers
// ============================================================================

/// POST /v1/customer/bids/{id}/accept
/// Accept a bid: closes the request and creates the order
pub async fn accept_bid(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(bid_id): ApiPath<Uuid>,
) -> Result<Json<AcceptBidResponse>, AppError> {
    let accepted = state.orders.accept_bid(user.id, bid_id, state.fee_rate()).await?;
    let order = &accepted.order;

    state.metrics.bids_accepted.inc();
    info!(
        order_id = %order.id,
        order_number = %order.order_number,
        bid_id = %bid_id,
        request_id = %accepted.request.id,
        total = %order.total_amount,
        rejected = accepted.rejected_bids.len(),
        "Bid accepted"
    );

    state
        .announce(MarketEvent::BidAccepted(BidAcceptedEvent {
            bid_id,
            request_id: accepted.request.id,
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer_id: order.customer_id,
            shop_id: order.shop_id,
            total_amount: order.total_amount,
            rejected_shop_ids: accepted.rejected_bids.iter().map(|b| b.shop_id).collect(),
            timestamp: Utc::now().timestamp(),
        }))
        .await;

    Ok(Json(AcceptBidResponse {
        order_id: order.id,
        order_number: order.order_number.clone(),
        pickup_code: order.pickup_code.clone(),
    }))
}

/// GET /v1/customer/orders
pub async fn list_customer_orders(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.list_customer_orders(user.id).await?))
}

// ============================================================================
// Shop Handlers
// ============================================================================

/// GET /v1/shop/orders
pub async fn list_shop_orders(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.list_shop_orders(user.id).await?))
}

/// PUT /v1/shop/orders/{id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(order_id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let transition = state
        .orders
        .update_fulfillment_status(user.id, order_id, req.status)
        .await?;
    announce_transition(&state, &transition).await;
    Ok(Json(transition.order))
}

/// POST /v1/shop/orders/{id}/pickup
/// The shop enters the code the customer shows at the counter
pub async fn verify_pickup(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(order_id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<PickupRequest>,
) -> Result<Json<Order>, AppError> {
    let transition = state.orders.verify_pickup(user.id, order_id, &req.code).await?;
    announce_transition(&state, &transition).await;
    Ok(Json(transition.order))
}

async fn announce_transition(state: &AppState, transition: &OrderTransition) {
    let order = &transition.order;
    if transition.previous == order.fulfillment_status {
        return;
    }

    state
        .metrics
        .order_status_changes
        .with_label_values(&[order.fulfillment_status.as_str()])
        .inc();
    info!(
        order_id = %order.id,
        from = %transition.previous,
        to = %order.fulfillment_status,
        "Order status changed"
    );

    state
        .announce(MarketEvent::OrderStatusChanged(OrderStatusChangedEvent {
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer_id: order.customer_id,
            shop_id: order.shop_id,
            from_status: transition.previous.to_string(),
            to_status: order.fulfillment_status.to_string(),
            timestamp: Utc::now().timestamp(),
        }))
        .await;
}
