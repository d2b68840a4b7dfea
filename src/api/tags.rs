//! Tag API endpoints
//!
//! - GET /api/v1/tags - Search or popular tags
//! - GET /api/v1/tags/cloud, GET /api/v1/tags/autocomplete
//! - GET /api/v1/tags/{slug}, GET /api/v1/tags/{slug}/posts
//! - Authenticated: POST; admin: PUT/DELETE /{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{LimitQuery, PaginationQuery};
use crate::api::middleware::{require_admin, require_auth, ApiError};
use crate::api::responses::Paginated;
use crate::api::state::AppState;
use crate::models::{CreateTagInput, Post, Tag, TagCloudEntry, UpdateTagInput};

#[derive(Debug, Deserialize)]
pub struct ListTagsQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub popular: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TagPostsResponse {
    pub tag: Tag,
    pub posts: Paginated<Post>,
}

/// Build the tags router
pub fn router(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/{id}", put(update_tag).delete(delete_tag))
        .route_layer(axum_middleware::from_fn(require_admin))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let protected = Router::new()
        .route("/", post(create_tag))
        .route_layer(axum_middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/", get(list_tags))
        .route("/cloud", get(tag_cloud))
        .route("/autocomplete", get(autocomplete))
        .route("/{id}", get(get_tag))
        .route("/{id}/posts", get(tag_posts))
        .merge(protected)
        .merge(admin)
}

/// GET /api/v1/tags
async fn list_tags(
    State(state): State<AppState>,
    Query(query): Query<ListTagsQuery>,
) -> Result<Json<Vec<Tag>>, ApiError> {
    let search = query.search.as_deref().filter(|s| !s.trim().is_empty());
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    Ok(Json(state.tag_service.list(search, query.popular, limit).await?))
}

/// GET /api/v1/tags/cloud
async fn tag_cloud(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<TagCloudEntry>>, ApiError> {
    Ok(Json(state.tag_service.cloud(query.limit_or(50, 200)).await?))
}

/// GET /api/v1/tags/autocomplete?q=ru
async fn autocomplete(
    State(state): State<AppState>,
    Query(query): Query<AutocompleteQuery>,
) -> Result<Json<Vec<Tag>>, ApiError> {
    if query.q.trim().is_empty() {
        return Ok(Json(Vec::new()));
    }
    let limit = query.limit.unwrap_or(10).clamp(1, 50);
    Ok(Json(state.tag_service.autocomplete(&query.q, limit).await?))
}

/// GET /api/v1/tags/{slug}
async fn get_tag(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(state.tag_service.get_by_slug(&slug).await?))
}

/// GET /api/v1/tags/{slug}/posts
async fn tag_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<TagPostsResponse>, ApiError> {
    let (tag, posts) = state.tag_service.posts(&slug, &query.params()).await?;
    Ok(Json(TagPostsResponse {
        tag,
        posts: posts.into(),
    }))
}

/// POST /api/v1/tags
async fn create_tag(
    State(state): State<AppState>,
    Json(body): Json<CreateTagInput>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    let tag = state.tag_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// PUT /api/v1/tags/{id} (admin)
async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTagInput>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(state.tag_service.update(id, body).await?))
}

/// DELETE /api/v1/tags/{id} (admin)
async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.tag_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
