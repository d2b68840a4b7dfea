//! Comment API endpoints
//!
//! - GET/POST /api/v1/posts/{id}/comments
//! - PUT/DELETE /api/v1/comments/{id}, POST /api/v1/comments/{id}/like
//! - GET /api/v1/comments/recent, GET /api/v1/users/{id}/comments
//! - Admin moderation: approve, reject, spam, pending

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{LimitQuery, PaginationQuery};
use crate::api::middleware::{require_admin, require_auth, ApiError, AuthenticatedUser};
use crate::api::responses::{MessageResponse, Paginated};
use crate::api::state::AppState;
use crate::models::{Comment, CommentSort, CommentWithMeta, CreateCommentInput, LikeState, LikeTarget};

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    #[serde(default)]
    pub sort: CommentSort,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

/// Build the comments router. Paths are absolute under the API root.
pub fn router(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/comments/pending", get(pending_comments))
        .route("/comments/{id}/approve", post(approve_comment))
        .route("/comments/{id}/reject", post(reject_comment))
        .route("/comments/{id}/spam", post(spam_comment))
        .route_layer(axum_middleware::from_fn(require_admin))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let protected = Router::new()
        .route("/posts/{id}/comments", post(create_comment))
        .route("/comments/{id}", put(update_comment).delete(delete_comment))
        .route("/comments/{id}/like", post(like_comment))
        .route_layer(axum_middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/posts/{id}/comments", get(post_comments))
        .route("/comments/recent", get(recent_comments))
        .route("/users/{id}/comments", get(user_comments))
        .merge(protected)
        .merge(admin)
}

/// GET /api/v1/posts/{id}/comments - Approved thread with nested replies
async fn post_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Query(query): Query<ThreadQuery>,
) -> Result<Json<Vec<CommentWithMeta>>, ApiError> {
    Ok(Json(state.comment_service.thread(post_id, query.sort).await?))
}

/// POST /api/v1/posts/{id}/comments
async fn create_comment(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(post_id): Path<i64>,
    Json(body): Json<CreateCommentInput>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state.comment_service.create(post_id, &auth, body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// PUT /api/v1/comments/{id} - Author only
async fn update_comment(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.update(id, &auth, &body.content).await?))
}

/// DELETE /api/v1/comments/{id} - Author or admin
async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(id, &auth).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/comments/{id}/like
async fn like_comment(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<LikeState>, ApiError> {
    Ok(Json(state.like_service.toggle(&auth, LikeTarget::Comment, id).await?))
}

/// GET /api/v1/comments/recent
async fn recent_comments(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<CommentWithMeta>>, ApiError> {
    Ok(Json(state.comment_service.recent(query.limit_or(10, 50)).await?))
}

/// GET /api/v1/users/{id}/comments
async fn user_comments(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<Comment>>, ApiError> {
    let result = state.comment_service.by_user(user_id, &query.params()).await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/comments/pending (admin)
async fn pending_comments(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<CommentWithMeta>>, ApiError> {
    let result = state.comment_service.pending(&query.params()).await?;
    Ok(Json(result.into()))
}

/// POST /api/v1/comments/{id}/approve (admin)
async fn approve_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.approve(id).await?))
}

/// POST /api/v1/comments/{id}/reject (admin) - Deletes a pending comment
async fn reject_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.comment_service.reject(id).await?;
    Ok(Json(MessageResponse::new("Comment rejected")))
}

/// POST /api/v1/comments/{id}/spam (admin)
async fn spam_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.mark_spam(id).await?))
}
