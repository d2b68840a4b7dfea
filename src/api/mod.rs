//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Auth endpoints (register, login, token refresh, sessions)
//! - Post, comment, category and tag endpoints
//! - User profiles, bookmarks and reading history
//! - Notifications
//! - Content pipeline endpoints (admin)
//!
//! Errors are always answered as `{"error": {"code", "message", "details"}}`.

pub mod ai;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod common;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod responses;
pub mod state;
pub mod tags;
pub mod users;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use middleware::{ApiError, AuthenticatedUser, MaybeUser};
pub use state::AppState;

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router(state.clone()))
        .nest("/posts", posts::router(state.clone()))
        .nest("/categories", categories::router(state.clone()))
        .nest("/tags", tags::router(state.clone()))
        .nest("/users", users::router(state.clone()))
        .nest("/notifications", notifications::router(state.clone()))
        .nest("/ai", ai::router(state.clone()))
        // Comment routes span posts, comments and users
        .merge(comments::router(state))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .fallback(not_found)
        .layer(CompressionLayer::new())
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origin == "*" {
        return cors.allow_origin(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => cors.allow_origin(value),
        Err(_) => {
            tracing::warn!(origin, "Invalid CORS origin, cross-origin requests are disabled");
            cors
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found("Resource not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::cache::Cache;
    use crate::config::Config;
    use crate::db::{create_test_pool, migrations};

    async fn test_app() -> Router {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let state = AppState::build(pool, Arc::new(Cache::new()), &Config::default());
        build_router(state, "*")
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    struct Registered {
        id: i64,
        access: String,
        refresh: String,
    }

    async fn register(app: &Router, username: &str) -> Registered {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": "password123",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        Registered {
            id: body["user"]["id"].as_i64().unwrap(),
            access: body["access_token"].as_str().unwrap().to_string(),
            refresh: body["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    async fn create_post(app: &Router, token: &str, title: &str, published: bool) -> Value {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/posts",
            Some(token),
            Some(json!({
                "title": title,
                "content": "Some **markdown** content for the post.",
                "is_published": published,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "create post failed: {}", body);
        body
    }

    #[tokio::test]
    async fn test_register_login_me() {
        let app = test_app().await;
        register(&app, "alice").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({"username": "alice", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["access_token"].as_str().unwrap().to_string();

        let (status, me) = send(&app, Method::GET, "/api/v1/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "alice");
        assert_eq!(me["role"], "admin");
        assert!(me.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflict() {
        let app = test_app().await;
        register(&app, "alice").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "username": "alice",
                "email": "other@example.com",
                "password": "password123",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_wrong_password_unauthorized() {
        let app = test_app().await;
        register(&app, "alice").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({"username": "alice", "password": "not-the-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let app = test_app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/posts",
            None,
            Some(json!({"title": "Hello", "content": "World"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let app = test_app().await;
        let alice = register(&app, "alice").await;

        let (status, _) = send(&app, Method::GET, "/api/v1/auth/me", Some(&alice.refresh), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, Method::POST, "/api/v1/auth/refresh", Some(&alice.refresh), None).await;
        assert_eq!(status, StatusCode::OK);
        let access = body["access_token"].as_str().unwrap().to_string();

        let (status, _) = send(&app, Method::GET, "/api/v1/auth/me", Some(&access), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let app = test_app().await;
        let alice = register(&app, "alice").await;

        let (status, _) = send(&app, Method::POST, "/api/v1/auth/logout", Some(&alice.access), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, Method::GET, "/api/v1/auth/me", Some(&alice.access), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_post_slugs_are_unique() {
        let app = test_app().await;
        let alice = register(&app, "alice").await;

        let first = create_post(&app, &alice.access, "Hello World", true).await;
        let second = create_post(&app, &alice.access, "Hello World", true).await;
        assert_eq!(first["slug"], "hello-world");
        assert_eq!(second["slug"], "hello-world-1");
        assert_eq!(first["author_username"], "alice");

        let (status, body) = send(&app, Method::GET, "/api/v1/posts/hello-world", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Hello World");

        let (status, body) = send(&app, Method::GET, "/api/v1/posts", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn test_draft_hidden_from_anonymous_readers() {
        let app = test_app().await;
        let alice = register(&app, "alice").await;
        create_post(&app, &alice.access, "Secret Draft", false).await;

        let (status, _) = send(&app, Method::GET, "/api/v1/posts/secret-draft", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/v1/posts/secret-draft",
            Some(&alice.access),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_like_toggles() {
        let app = test_app().await;
        let alice = register(&app, "alice").await;
        let bob = register(&app, "bob").await;
        let post = create_post(&app, &alice.access, "Likeable", true).await;
        let uri = format!("/api/v1/posts/{}/like", post["id"]);

        let (status, body) = send(&app, Method::POST, &uri, Some(&bob.access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["liked"], true);
        assert_eq!(body["likes_count"], 1);

        let (_, body) = send(&app, Method::POST, &uri, Some(&bob.access), None).await;
        assert_eq!(body["liked"], false);
        assert_eq!(body["likes_count"], 0);
    }

    #[tokio::test]
    async fn test_comment_on_post() {
        let app = test_app().await;
        let alice = register(&app, "alice").await;
        let bob = register(&app, "bob").await;
        let post = create_post(&app, &alice.access, "Discuss", true).await;
        let uri = format!("/api/v1/posts/{}/comments", post["id"]);

        let (status, comment) = send(
            &app,
            Method::POST,
            &uri,
            Some(&bob.access),
            Some(json!({"content": "Nice post"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comment["author_id"], bob.id);

        let (status, thread) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(thread.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin() {
        let app = test_app().await;
        let alice = register(&app, "alice").await;
        let bob = register(&app, "bob").await;

        let (status, body) = send(&app, Method::GET, "/api/v1/ai/status", Some(&bob.access), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let (status, _) = send(&app, Method::GET, "/api/v1/ai/status", Some(&alice.access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(alice.id, bob.id);
    }

    #[tokio::test]
    async fn test_validate_endpoint() {
        let app = test_app().await;
        let alice = register(&app, "alice").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/ai/validate",
            Some(&alice.access),
            Some(json!({
                "content": "Rust is a systems programming language. It focuses on safety and speed.",
                "title": "About Rust",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let confidence = body["confidence_score"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
        assert!(body["result"].is_string());
    }

    #[tokio::test]
    async fn test_batch_count_bounds() {
        let app = test_app().await;
        let alice = register(&app, "alice").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/ai/batch",
            Some(&alice.access),
            Some(json!({"count": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let app = test_app().await;
        let (status, body) = send(&app, Method::GET, "/nowhere", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
