//! API middleware
//!
//! Contains:
//! - the JSON error body and the mapping from service errors
//! - bearer token authentication (required and optional)
//! - the admin role check

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::ops::Deref;

use crate::ai::{PipelineError, PublishError};
use crate::api::state::AppState;
use crate::models::{ClientInfo, User};
use crate::services::{
    bearer_token, AuthError, BookmarkServiceError, CategoryServiceError, Claims,
    CommentServiceError, LikeServiceError, NotificationServiceError, PostServiceError,
    TagServiceError, UserServiceError, ViewServiceError,
};

// ============================================================================
// Authenticated user
// ============================================================================

/// User resolved from a valid access token, with the token's claims
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub claims: Claims,
}

impl Deref for AuthenticatedUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.user
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// The caller, when a valid token was sent to a public route
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthenticatedUser>);

impl MaybeUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref().map(|auth| &auth.user)
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<AuthenticatedUser>().cloned()))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Log the cause and hide it from the client
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "Request failed");
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Issue(_) => ApiError::internal_error(err),
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::SessionExpired => ApiError::unauthorized("Session expired"),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::Conflict(msg) => ApiError::conflict(msg),
            UserServiceError::NotFound(msg) => ApiError::not_found(msg),
            UserServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            UserServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(msg) => ApiError::not_found(msg),
            PostServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PostServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            PostServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::DuplicateName(name) => ApiError::with_details(
                "CONFLICT",
                format!("Category already exists: {}", name),
                serde_json::json!({ "field": "name", "value": name }),
            ),
            CategoryServiceError::NotFound(msg) => ApiError::not_found(msg),
            CategoryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CategoryServiceError::ParentNotFound(_) | CategoryServiceError::CircularReference => {
                ApiError::validation_error(err.to_string())
            }
            CategoryServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::DuplicateName(name) => ApiError::with_details(
                "CONFLICT",
                format!("Tag already exists: {}", name),
                serde_json::json!({ "field": "name", "value": name }),
            ),
            TagServiceError::NotFound(msg) => ApiError::not_found(msg),
            TagServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            TagServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(_) | CommentServiceError::PostNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            CommentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CommentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            CommentServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<LikeServiceError> for ApiError {
    fn from(err: LikeServiceError) -> Self {
        match err {
            LikeServiceError::NotFound(..) => ApiError::not_found(err.to_string()),
            LikeServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<BookmarkServiceError> for ApiError {
    fn from(err: BookmarkServiceError) -> Self {
        match err {
            BookmarkServiceError::PostNotFound(_) => ApiError::not_found(err.to_string()),
            BookmarkServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<ViewServiceError> for ApiError {
    fn from(err: ViewServiceError) -> Self {
        match err {
            ViewServiceError::PostNotFound(_) => ApiError::not_found(err.to_string()),
            ViewServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<NotificationServiceError> for ApiError {
    fn from(err: NotificationServiceError) -> Self {
        match err {
            NotificationServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            NotificationServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            NotificationServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::NoAuthor => ApiError::new("PUBLISH_FAILED", err.to_string()),
            PublishError::Category(e) => e.into(),
            PublishError::Post(e) => e.into(),
            PublishError::User(e) => e.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::CircuitOpen => ApiError::new("CIRCUIT_OPEN", err.to_string()),
            PipelineError::Generation(e) => ApiError::new("GENERATION_FAILED", e.to_string()),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// Resolve an access token to an active user with a live session
async fn authenticate(state: &AppState, token: &str) -> Result<AuthenticatedUser, ApiError> {
    let claims = state.jwt.verify_access(token)?;

    let session = state.user_service.validate_session(&claims.sid).await?;
    if session.user_id != claims.sub {
        return Err(ApiError::unauthorized("Token does not match its session"));
    }

    let user = match state.user_service.get_by_id(claims.sub).await {
        Ok(user) => user,
        Err(UserServiceError::NotFound(_)) => {
            return Err(ApiError::unauthorized("User no longer exists"))
        }
        Err(e) => return Err(e.into()),
    };
    if !user.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    Ok(AuthenticatedUser { user, claims })
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(authorization(request.headers()))?.to_string();
    let auth = authenticate(&state, &token).await?;

    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

/// Optional authentication middleware. Bad or missing tokens are ignored.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(authorization(request.headers()))
        .ok()
        .map(str::to_string);
    if let Some(token) = token {
        if let Ok(auth) = authenticate(&state, &token).await {
            request.extensions_mut().insert(auth);
        }
    }
    next.run(request).await
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let auth = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !auth.user.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Client address and agent, taking proxy headers into account
pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|ip| ip.trim().to_string())
        })
        .filter(|ip| !ip.is_empty());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    ClientInfo {
        ip_address,
        user_agent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::new("CIRCUIT_OPEN", "x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let error: ApiError = UserServiceError::InternalError(anyhow::anyhow!("disk on fire")).into();
        assert_eq!(error.error.code, "INTERNAL_ERROR");
        assert!(!error.error.message.contains("disk"));
    }

    #[test]
    fn test_service_error_mapping() {
        let error: ApiError = UserServiceError::Conflict("Username taken".into()).into();
        assert_eq!(error.status(), StatusCode::CONFLICT);

        let error: ApiError = CategoryServiceError::DuplicateName("Rust".into()).into();
        assert_eq!(error.error.code, "CONFLICT");
        assert_eq!(error.error.details.unwrap()["value"], "Rust");

        let error: ApiError = CommentServiceError::PostNotFound(7).into();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);

        let error: ApiError = AuthError::Expired.into();
        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_client_info_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8"));

        let info = client_info(&headers);
        assert_eq!(info.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8"));
    }

    #[test]
    fn test_client_info_empty() {
        let info = client_info(&HeaderMap::new());
        assert!(info.ip_address.is_none() && info.user_agent.is_none());
    }
}
