//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Register and log in
//! - POST /api/v1/auth/login - Log in with username or email
//! - POST /api/v1/auth/refresh - New access token from a refresh token
//! - POST /api/v1/auth/logout - End the current session
//! - GET/PUT /api/v1/auth/me - Current user and profile update
//! - POST /api/v1/auth/change-password
//! - GET /api/v1/auth/verify-token

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{client_info, require_auth, ApiError, AuthenticatedUser};
use crate::api::responses::{AuthResponse, MessageResponse};
use crate::api::state::AppState;
use crate::models::{CreateUserInput, UpdateProfileInput, User};
use crate::services::{bearer_token, TokenKind, UserServiceError};

/// Request body for registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub user: CreateUserInput,
    #[serde(default)]
    pub remember: bool,
}

/// Request body for login. `login` accepts a username or an email.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Response for a token refresh
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    pub user: User,
    pub expires_at: i64,
}

/// Build the auth router
pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(current_user).put(update_profile))
        .route("/change-password", post(change_password))
        .route("/verify-token", get(verify_token))
        .route_layer(axum_middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .merge(protected)
}

/// Open a session for `user` and issue its token pair
async fn start_session(
    state: &AppState,
    user: User,
    headers: &HeaderMap,
    remember: bool,
) -> Result<AuthResponse, ApiError> {
    let session = state
        .user_service
        .create_session(user.id, client_info(headers), remember)
        .await?;
    let tokens = state.jwt.issue_pair(user.id, &session.session_id)?;
    Ok(AuthResponse { user, tokens })
}

/// POST /api/v1/auth/register
///
/// The first account becomes an admin.
async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let user = state.user_service.register(body.user).await?;
    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    let response = start_session(&state, user, &headers, body.remember).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if body.login.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::validation_error("Login and password are required"));
    }

    let user = state
        .user_service
        .authenticate(&body.login, &body.password)
        .await?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(start_session(&state, user, &headers, body.remember).await?))
}

/// POST /api/v1/auth/refresh
///
/// Expects the refresh token in the Authorization header.
async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RefreshResponse>, ApiError> {
    let header = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    let claims = state.jwt.verify_refresh(bearer_token(header)?)?;

    state.user_service.validate_session(&claims.sid).await?;
    let user = match state.user_service.get_by_id(claims.sub).await {
        Ok(user) if user.is_active => user,
        Ok(_) => return Err(ApiError::forbidden("Account is deactivated")),
        Err(UserServiceError::NotFound(_)) => {
            return Err(ApiError::unauthorized("User no longer exists"))
        }
        Err(e) => return Err(e.into()),
    };

    let access_token = state.jwt.issue(user.id, &claims.sid, TokenKind::Access)?;
    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer",
    }))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.end_session(&auth.claims.sid).await?;
    tracing::info!(user_id = auth.id, "User logged out");
    Ok(Json(MessageResponse::new("Logged out")))
}

/// GET /api/v1/auth/me
async fn current_user(auth: AuthenticatedUser) -> Json<User> {
    Json(auth.user)
}

/// PUT /api/v1/auth/me
async fn update_profile(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<User>, ApiError> {
    let user = state.user_service.update_profile(auth.id, body).await?;
    Ok(Json(user))
}

/// POST /api/v1/auth/change-password
///
/// Every other session of the user is ended.
async fn change_password(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .change_password(auth.id, &body.current_password, &body.new_password)
        .await?;
    state
        .user_service
        .end_all_sessions(auth.id, Some(&auth.claims.sid))
        .await?;
    Ok(Json(MessageResponse::new("Password changed")))
}

/// GET /api/v1/auth/verify-token
async fn verify_token(auth: AuthenticatedUser) -> Json<VerifyTokenResponse> {
    Json(VerifyTokenResponse {
        valid: true,
        expires_at: auth.claims.exp,
        user: auth.user,
    })
}
