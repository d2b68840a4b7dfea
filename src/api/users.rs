//! User API endpoints
//!
//! - GET /api/v1/users - Search users
//! - GET /api/v1/users/{id}, GET /api/v1/users/by-username/{username}
//! - GET /api/v1/users/{id}/posts, GET /api/v1/users/{id}/stats
//! - GET /api/v1/users/me/bookmarks, GET /api/v1/users/me/history
//! - Admin: POST /{id}/activate, /{id}/deactivate, /{id}/toggle-admin

use axum::{
    extract::{Path, Query, State},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page, LimitQuery, PaginationQuery};
use crate::api::middleware::{
    optional_auth, require_admin, require_auth, ApiError, AuthenticatedUser, MaybeUser,
};
use crate::api::responses::{Paginated, UserProfile};
use crate::api::state::AppState;
use crate::models::{ListParams, Post, User, UserStats};
use crate::services::HistoryEntry;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Build the users router
pub fn router(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/{id}/activate", post(activate_user))
        .route("/{id}/deactivate", post(deactivate_user))
        .route("/{id}/toggle-admin", post(toggle_admin))
        .route_layer(axum_middleware::from_fn(require_admin))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let protected = Router::new()
        .route("/me/bookmarks", get(my_bookmarks))
        .route("/me/history", get(my_history))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user))
        .route("/by-username/{username}", get(get_user_by_username))
        .route("/{id}/posts", get(user_posts))
        .route("/{id}/stats", get(user_stats))
        .route_layer(axum_middleware::from_fn_with_state(state, optional_auth))
        .merge(protected)
        .merge(admin)
}

/// GET /api/v1/users
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Paginated<UserProfile>>, ApiError> {
    let search = query.search.as_deref().filter(|s| !s.trim().is_empty());
    let params = ListParams::new(query.page, query.per_page);
    let result = state.user_service.list(search, &params).await?;

    let total_pages = result.total_pages();
    Ok(Json(Paginated {
        items: result.items.into_iter().map(UserProfile::from).collect(),
        total: result.total,
        page: result.page,
        per_page: result.per_page,
        total_pages,
    }))
}

/// GET /api/v1/users/{id}
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.user_service.get_by_id(id).await?.into()))
}

/// GET /api/v1/users/by-username/{username}
async fn get_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.user_service.get_by_username(&username).await?.into()))
}

/// GET /api/v1/users/{id}/posts - Drafts included for the author and editors
async fn user_posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<Post>>, ApiError> {
    state.user_service.get_by_id(id).await?;
    let result = state
        .post_service
        .list_by_author(id, viewer.user(), &query.params())
        .await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/users/{id}/stats
async fn user_stats(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserStats>, ApiError> {
    Ok(Json(state.user_service.statistics(id).await?))
}

/// GET /api/v1/users/me/bookmarks
async fn my_bookmarks(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<Post>>, ApiError> {
    let result = state
        .bookmark_service
        .posts_for_user(auth.id, &query.params())
        .await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/users/me/history - Recently viewed posts
async fn my_history(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let history = state
        .view_service
        .user_history(auth.id, query.limit_or(20, 100))
        .await?;
    Ok(Json(history))
}

/// POST /api/v1/users/{id}/activate (admin)
async fn activate_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.set_active(id, true).await?))
}

/// POST /api/v1/users/{id}/deactivate (admin) - Also ends the user's sessions
async fn deactivate_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    if id == auth.id {
        return Err(ApiError::forbidden("You cannot deactivate your own account"));
    }
    let user = state.user_service.set_active(id, false).await?;
    tracing::info!(user_id = id, admin_id = auth.id, "User deactivated");
    Ok(Json(user))
}

/// POST /api/v1/users/{id}/toggle-admin (admin)
async fn toggle_admin(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let user = state.user_service.toggle_admin(id, auth.id).await?;
    tracing::info!(user_id = id, role = ?user.role, admin_id = auth.id, "User role changed");
    Ok(Json(user))
}
