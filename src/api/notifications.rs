//! Notification API endpoints (authenticated)
//!
//! - GET /api/v1/notifications?unread_only=true
//! - GET /api/v1/notifications/unread-count
//! - POST /api/v1/notifications/{id}/read
//! - POST /api/v1/notifications/read-all

use axum::{
    extract::{Path, Query, State},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{require_auth, ApiError, AuthenticatedUser};
use crate::api::responses::MessageResponse;
use crate::api::state::AppState;
use crate::models::Notification;

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct ReadAllResponse {
    pub marked: u64,
}

/// Build the notifications router
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/{id}/read", post(mark_read))
        .route("/read-all", post(mark_all_read))
        .route_layer(axum_middleware::from_fn_with_state(state, require_auth))
}

async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = state
        .notification_service
        .list(auth.id, query.unread_only, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(notifications))
}

async fn unread_count(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let count = state.notification_service.unread_count(auth.id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// Only the owner may mark a notification read
async fn mark_read(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.notification_service.mark_as_read(id, auth.id).await?;
    Ok(Json(MessageResponse::new("Notification marked as read")))
}

async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<ReadAllResponse>, ApiError> {
    let marked = state.notification_service.mark_all_as_read(auth.id).await?;
    Ok(Json(ReadAllResponse { marked }))
}
