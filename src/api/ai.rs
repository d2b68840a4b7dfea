//! Content pipeline API endpoints (admin)
//!
//! - POST /api/v1/ai/validate - Validation report for submitted text
//! - POST /api/v1/ai/errors, POST /api/v1/ai/bias - Detection with optional auto-correction
//! - POST /api/v1/ai/generate - One generated and moderated article
//! - POST /api/v1/ai/batch - Background batch, answers 202 immediately
//! - GET /api/v1/ai/queue, POST /api/v1/ai/queue/{id}/approve|reject
//! - GET /api/v1/ai/status

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::ai::bias::{self, BiasCorrection};
use crate::ai::errors::{self, Correction};
use crate::ai::pipeline::QueuedItem;
use crate::ai::{BiasReport, ContentGenerationResult, ErrorReport, SystemStatus, ValidationReport};
use crate::api::middleware::{require_admin, require_auth, ApiError, AuthenticatedUser};
use crate::api::state::AppState;

/// Upper bound for one batch request
const MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub content: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub content: String,
    #[serde(default)]
    pub auto_correct: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorAnalysisResponse {
    pub report: ErrorReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<Correction>,
}

#[derive(Debug, Serialize)]
pub struct BiasAnalysisResponse {
    pub report: BiasReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<BiasCorrection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub category: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub count: Option<usize>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchAccepted {
    pub message: String,
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

/// Build the AI router. Every route needs an admin.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/validate", post(validate))
        .route("/errors", post(detect_errors))
        .route("/bias", post(detect_bias))
        .route("/generate", post(generate))
        .route("/batch", post(batch))
        .route("/queue", get(queue))
        .route("/queue/{id}/approve", post(approve))
        .route("/queue/{id}/reject", post(reject))
        .route("/status", get(status))
        .route_layer(axum_middleware::from_fn(require_admin))
        .route_layer(axum_middleware::from_fn_with_state(state, require_auth))
}

fn require_content(content: &str) -> Result<(), ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::validation_error("Content is required"));
    }
    Ok(())
}

/// POST /api/v1/ai/validate
async fn validate(
    State(state): State<AppState>,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<ValidationReport>, ApiError> {
    require_content(&body.content)?;
    let validator = state.ai.content_generator().generator().validator();
    let report = validator
        .validate_content(&body.content, &body.title, &body.category)
        .await;
    Ok(Json(report))
}

/// POST /api/v1/ai/errors
async fn detect_errors(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<ErrorAnalysisResponse>, ApiError> {
    require_content(&body.content)?;
    let detector = state.ai.content_generator().error_detector();
    let correction = body
        .auto_correct
        .then(|| detector.auto_correct(&body.content, errors::AUTO_CORRECT_CONFIDENCE));
    Ok(Json(ErrorAnalysisResponse {
        report: detector.report(&body.content),
        correction,
    }))
}

/// POST /api/v1/ai/bias
async fn detect_bias(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<BiasAnalysisResponse>, ApiError> {
    require_content(&body.content)?;
    let detector = state.ai.content_generator().bias_detector();
    let correction = body
        .auto_correct
        .then(|| detector.auto_correct(&body.content, bias::AUTO_CORRECT_CONFIDENCE));
    Ok(Json(BiasAnalysisResponse {
        report: detector.report(&body.content),
        correction,
    }))
}

/// POST /api/v1/ai/generate
async fn generate(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    body: Option<Json<GenerateRequest>>,
) -> Result<Json<ContentGenerationResult>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    tracing::info!(admin_id = auth.id, category = ?body.category, topic = ?body.topic, "Generation requested");

    let result = state
        .ai
        .generate_and_moderate(body.category.as_deref(), body.topic.as_deref())
        .await?;
    Ok(Json(result))
}

/// POST /api/v1/ai/batch
///
/// Runs detached from the request; results land in the moderation queue or
/// are published directly when auto-publish is on.
async fn batch(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(body): Json<BatchRequest>,
) -> Result<(StatusCode, Json<BatchAccepted>), ApiError> {
    let count = body.count.unwrap_or(state.ai.config().batch_size);
    if count == 0 || count > MAX_BATCH_SIZE {
        return Err(ApiError::validation_error(format!(
            "count must be between 1 and {}",
            MAX_BATCH_SIZE
        )));
    }

    let ai = state.ai.clone();
    let categories = body.categories;
    tokio::spawn(async move {
        let results = ai.batch_generate(count, &categories).await;
        tracing::info!(requested = count, generated = results.len(), "Background batch finished");
    });
    tracing::info!(admin_id = auth.id, count, "Background batch started");

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchAccepted {
            message: format!("Generating {} articles in the background", count),
            count,
        }),
    ))
}

/// GET /api/v1/ai/queue
async fn queue(State(state): State<AppState>) -> Json<Vec<QueuedItem>> {
    Json(state.ai.moderation().queue())
}

/// POST /api/v1/ai/queue/{id}/approve - Publishes the item
async fn approve(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ContentGenerationResult>, ApiError> {
    state
        .ai
        .approve_queued(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Queue item not found: {}", id)))
}

/// POST /api/v1/ai/queue/{id}/reject
async fn reject(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    body: Option<Json<RejectRequest>>,
) -> Result<Json<ContentGenerationResult>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    let reason = if body.reason.trim().is_empty() {
        "Rejected by moderator"
    } else {
        body.reason.trim()
    };
    state
        .ai
        .reject_queued(id, reason)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Queue item not found: {}", id)))
}

/// GET /api/v1/ai/status
async fn status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(state.ai.status().await)
}
