use std::convert::Infallible;

use axum::{
    extract::State,
    middleware::from_fn_with_state,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::stream::{Stream, StreamExt};
use localbid_core::notifications::Notification;
use serde_json::{json, Value};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::AppError,
    extract::ApiPath,
    middleware::{session_middleware, CurrentUser},
    state::AppState,
};

/// Routes for any signed-in account
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/events/stream", get(event_stream))
        .route_layer(from_fn_with_state(state, session_middleware))
}

/// GET /v1/notifications
/// Newest first
async fn list_notifications(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(state.notifications.list_notifications(user.id).await?))
}

/// POST /v1/notifications/{id}/read
async fn mark_read(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(notification_id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .notifications
        .mark_notification_read(user.id, notification_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /v1/events/stream
/// Live marketplace events that involve the caller
async fn event_stream(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let user_id = user.id;
    let rx = state.sse_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.is_visible_to(user_id) => {
                match Event::default().event(event.kind()).json_data(&event) {
                    Ok(sse_event) => Some(Ok::<_, Infallible>(sse_event)),
                    Err(e) => {
                        warn!(error = %e, "Failed to encode stream event");
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(user_id = %user_id, skipped, "Event stream lagged");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
