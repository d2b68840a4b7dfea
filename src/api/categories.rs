//! Category API endpoints
//!
//! - GET /api/v1/categories - Active categories in display order
//! - GET /api/v1/categories/popular
//! - GET /api/v1/categories/{slug}, GET /api/v1/categories/{slug}/posts
//! - Admin: POST, PUT/DELETE /{id}, POST /{id}/merge

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
use crate::models::{Category, CreateCategoryInput, Post, PostFilter, UpdateCategoryInput};

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub target_id: i64,
}

#[derive(Debug, Serialize)]
pub struct MergeResponse {
    pub target: Category,
    pub moved_posts: u64,
}

#[derive(Debug, Serialize)]
pub struct CategoryPostsResponse {
    pub category: Category,
    pub posts: Paginated<Post>,
}

/// Build the categories router
pub fn router(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/", post(create_category))
        .route("/{id}", put(update_category).delete(delete_category))
        .route("/{id}/merge", post(merge_category))
        .route_layer(axum_middleware::from_fn(require_admin))
        .route_layer(axum_middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/", get(list_categories))
        .route("/popular", get(popular_categories))
        .route("/{id}", get(get_category))
        .route("/{id}/posts", get(category_posts))
        .merge(admin)
}

/// GET /api/v1/categories
async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.category_service.list().await?))
}

/// GET /api/v1/categories/popular - Most posts first
async fn popular_categories(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.category_service.popular(query.limit_or(5, 50)).await?))
}

/// GET /api/v1/categories/{slug}
async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.get_by_slug(&slug).await?))
}

/// GET /api/v1/categories/{slug}/posts
async fn category_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<CategoryPostsResponse>, ApiError> {
    let category = state.category_service.get_by_slug(&slug).await?;
    let filter = PostFilter {
        category_id: Some(category.id),
        ..PostFilter::default()
    };
    let posts = state
        .post_service
        .list_published(filter, &query.params())
        .await?;

    Ok(Json(CategoryPostsResponse {
        category,
        posts: posts.into(),
    }))
}

/// POST /api/v1/categories (admin)
async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.category_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/v1/categories/{id} (admin)
async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.update(id, body).await?))
}

/// DELETE /api/v1/categories/{id} (admin) - Posts keep no category
async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.category_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/categories/{id}/merge (admin) - Move everything into the target
async fn merge_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<MergeRequest>,
) -> Result<Json<MergeResponse>, ApiError> {
    let moved_posts = state.category_service.merge(id, body.target_id).await?;
    let target = state.category_service.get_by_id(body.target_id).await?;
    Ok(Json(MergeResponse {
        target,
        moved_posts,
    }))
}
