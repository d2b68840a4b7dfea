//! Post API endpoints
//!
//! Public:
//! - GET /api/v1/posts - Published posts with filters, sort and paging
//! - GET /api/v1/posts/trending
//! - GET /api/v1/posts/related/{id}
//! - GET /api/v1/posts/{slug} - Post detail, records a view
//!
//! Authenticated:
//! - POST /api/v1/posts, PUT/DELETE /api/v1/posts/{id}
//! - POST /api/v1/posts/{id}/like, /bookmark, /publish, /unpublish

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_per_page, LimitQuery};
use crate::api::middleware::{
    client_info, optional_auth, require_auth, ApiError, AuthenticatedUser, MaybeUser,
};
use crate::api::responses::Paginated;
use crate::api::state::AppState;
use crate::models::{
    CreatePostInput, LikeState, LikeTarget, ListParams, Post, PostDetail, PostFilter, PostSort,
    SortOrder, UpdatePostInput, ViewContext,
};

const DEFAULT_TRENDING_DAYS: i64 = 7;

/// Query parameters for listing posts
#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub category_id: Option<i64>,
    pub tag_id: Option<i64>,
    pub author_id: Option<i64>,
    pub search: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub sort_by: PostSort,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub days: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BookmarkResponse {
    pub bookmarked: bool,
    pub bookmarks_count: i64,
}

/// Build the posts router
pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/", post(create_post))
        .route("/{id}", axum::routing::put(update_post).delete(delete_post))
        .route("/{id}/like", post(toggle_like))
        .route("/{id}/bookmark", post(toggle_bookmark))
        .route("/{id}/publish", post(publish_post))
        .route("/{id}/unpublish", post(unpublish_post))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/", get(list_posts))
        .route("/trending", get(trending_posts))
        .route("/related/{id}", get(related_posts))
        .route("/{id}", get(get_post))
        .route_layer(axum_middleware::from_fn_with_state(state, optional_auth))
        .merge(protected)
}

/// GET /api/v1/posts
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<Paginated<Post>>, ApiError> {
    let filter = PostFilter {
        category_id: query.category_id,
        tag_id: query.tag_id,
        author_id: query.author_id,
        search: query.search.filter(|s| !s.trim().is_empty()),
        featured_only: query.featured,
        sort_by: query.sort_by,
        order: query.order,
        ..PostFilter::default()
    };
    let params = ListParams::new(query.page, query.per_page);

    let result = state.post_service.list_published(filter, &params).await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/posts/trending - Most viewed in the last `days` days
async fn trending_posts(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let posts = state
        .post_service
        .trending(
            query.days.unwrap_or(DEFAULT_TRENDING_DAYS),
            query.limit.unwrap_or(10),
        )
        .await?;
    Ok(Json(posts))
}

/// GET /api/v1/posts/related/{id}
async fn related_posts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let posts = state.post_service.related(id, query.limit_or(5, 20)).await?;
    Ok(Json(posts))
}

/// GET /api/v1/posts/{slug}
///
/// Drafts are visible only to users who may edit them.
async fn get_post(
    State(state): State<AppState>,
    viewer: MaybeUser,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<PostDetail>, ApiError> {
    let detail = state.post_service.get_by_slug(&slug).await?;
    let can_edit = viewer
        .user()
        .is_some_and(|u| u.can_edit(detail.post.author_id));
    if !detail.post.is_published && !can_edit {
        return Err(ApiError::not_found(format!("Post not found: {}", slug)));
    }

    if detail.post.is_published {
        let client = client_info(&headers);
        let ctx = ViewContext {
            user_id: viewer.user().map(|u| u.id),
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            referrer: headers
                .get(header::REFERER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };
        if let Err(e) = state.view_service.record_view(detail.post.id, &ctx).await {
            tracing::warn!(post_id = detail.post.id, error = %e, "Failed to record view");
        }
    }

    Ok(Json(detail))
}

/// POST /api/v1/posts
async fn create_post(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(body): Json<CreatePostInput>,
) -> Result<(StatusCode, Json<PostDetail>), ApiError> {
    let detail = state.post_service.create(&auth, body).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// PUT /api/v1/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostInput>,
) -> Result<Json<PostDetail>, ApiError> {
    let detail = state.post_service.update(id, &auth, body).await?;
    Ok(Json(detail))
}

/// DELETE /api/v1/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(id, &auth).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/posts/{id}/like - Like or unlike
async fn toggle_like(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<LikeState>, ApiError> {
    let like = state.like_service.toggle(&auth, LikeTarget::Post, id).await?;
    Ok(Json(like))
}

/// POST /api/v1/posts/{id}/bookmark - Bookmark or remove the bookmark
async fn toggle_bookmark(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<BookmarkResponse>, ApiError> {
    let bookmarked = state.bookmark_service.toggle(auth.id, id).await?;
    let bookmarks_count = state.bookmark_service.count_for_post(id).await?;
    Ok(Json(BookmarkResponse {
        bookmarked,
        bookmarks_count,
    }))
}

/// POST /api/v1/posts/{id}/publish
async fn publish_post(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.publish(id, &auth).await?))
}

/// POST /api/v1/posts/{id}/unpublish
async fn unpublish_post(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.unpublish(id, &auth).await?))
}
