//! Safe content generation, moderation and the integrated AI system
//!
//! [`SafeContentGenerator`] runs a draft through validation, error
//! correction, bias mitigation and a final validation before deciding its
//! status. [`ModerationQueue`] auto-approves, auto-rejects or queues the
//! result, and [`IntegratedAiSystem`] ties both to the publisher.

use super::bias::{self, BiasDetector};
use super::errors::{self, ErrorDetector, ErrorType, TextError};
use super::generator::{ContentGenerator, GenerationError, GenerationStats};
use super::publisher::{PublishError, Publisher};
use super::resilience::{BreakerSnapshot, CircuitBreaker, CircuitError, RetryPolicy};
use super::validator::{ValidationReport, ValidationResult};
use crate::config::{AiConfig, SafetyThresholds};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const MAX_RECOMMENDATIONS: usize = 5;

/// Corrections above this count send content to review
const MAX_SILENT_CORRECTIONS: usize = 3;

const DEFAULT_BATCH_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Approved,
    Rejected,
    NeedsReview,
    NeedsCorrection,
    Published,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub generation_ms: f64,
    pub validation_ms: f64,
    pub correction_ms: f64,
    pub final_validation_ms: f64,
    pub total_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentGenerationResult {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: String,
    pub tags: Vec<String>,
    pub status: ContentStatus,
    /// Confidence of the final validation
    pub quality_score: f64,
    pub safety_score: f64,
    pub bias_score: f64,
    pub error_count: usize,
    pub corrections_applied: Vec<String>,
    pub recommendations: Vec<String>,
    pub validation: ValidationReport,
    pub timings: StageTimings,
    pub original_length: usize,
    pub final_length: usize,
    pub generated_at: DateTime<Utc>,
    pub rejection_reason: Option<String>,
    /// Set once the content is stored as a post
    pub post_id: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Content generation is temporarily disabled after repeated failures")]
    CircuitOpen,

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl From<CircuitError<GenerationError>> for PipelineError {
    fn from(err: CircuitError<GenerationError>) -> Self {
        match err {
            CircuitError::Open => PipelineError::CircuitOpen,
            CircuitError::Inner(e) => PipelineError::Generation(e),
        }
    }
}

/// Decide the status of checked content. The first matching rule wins.
pub fn decide_status(
    validation: &ValidationReport,
    error_count: usize,
    bias_score: f64,
    corrections: usize,
    thresholds: &SafetyThresholds,
) -> ContentStatus {
    let confidence = validation.confidence_score;
    if validation.quality_metrics.safety_score < thresholds.min_safety {
        return ContentStatus::Rejected;
    }
    if error_count > thresholds.max_error_count
        || bias_score > thresholds.max_bias
        || confidence < thresholds.min_quality
    {
        return ContentStatus::NeedsCorrection;
    }
    if confidence < thresholds.manual_review_threshold
        || corrections > MAX_SILENT_CORRECTIONS
        || validation.result == ValidationResult::NeedsReview
    {
        return ContentStatus::NeedsReview;
    }
    ContentStatus::Approved
}

fn recommendations(
    validation: &ValidationReport,
    found: &[TextError],
    bias_report: &bias::BiasReport,
    corrections: usize,
) -> Vec<String> {
    let mut out = Vec::new();
    if validation.confidence_score < 0.8 {
        out.push("Improve the overall quality of the content".to_string());
    }

    let types: BTreeSet<ErrorType> = found.iter().map(|e| e.error_type).collect();
    if types.contains(&ErrorType::Spelling) {
        out.push("Check spelling".to_string());
    }
    if types.contains(&ErrorType::Grammar) {
        out.push("Fix grammar mistakes".to_string());
    }
    if types.contains(&ErrorType::Logical) {
        out.push("Resolve logical contradictions".to_string());
    }

    if bias_report.bias_score > 0.2 {
        out.extend(bias_report.recommendations.iter().cloned());
    }
    if corrections > 2 {
        out.push("Many automatic corrections were applied; review manually".to_string());
    }
    out.extend(validation.suggestions.iter().take(3).cloned());

    out.truncate(MAX_RECOMMENDATIONS);
    out
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SafeGenerationStats {
    pub total_attempts: u64,
    pub successful: u64,
    pub auto_corrections: u64,
    pub manual_reviews: u64,
    pub rejections: u64,
    pub success_rate: f64,
    pub correction_rate: f64,
    pub review_rate: f64,
    pub rejection_rate: f64,
}

impl SafeGenerationStats {
    fn with_rates(mut self) -> Self {
        if self.total_attempts > 0 {
            let n = self.total_attempts as f64;
            self.success_rate = self.successful as f64 / n;
            self.correction_rate = self.auto_corrections as f64 / n;
            self.review_rate = self.manual_reviews as f64 / n;
            self.rejection_rate = self.rejections as f64 / n;
        }
        self
    }
}

fn millis(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

pub struct SafeContentGenerator {
    generator: Arc<ContentGenerator>,
    errors: ErrorDetector,
    bias: BiasDetector,
    thresholds: SafetyThresholds,
    max_attempts: u32,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    stats: Mutex<SafeGenerationStats>,
}

impl SafeContentGenerator {
    pub fn new(generator: Arc<ContentGenerator>, thresholds: SafetyThresholds, max_attempts: u32) -> Self {
        Self {
            generator,
            errors: ErrorDetector::new(),
            bias: BiasDetector::new(),
            thresholds,
            max_attempts,
            retry: RetryPolicy::default(),
            breaker: CircuitBreaker::default(),
            stats: Mutex::new(SafeGenerationStats::default()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn generator(&self) -> &Arc<ContentGenerator> {
        &self.generator
    }

    pub fn error_detector(&self) -> &ErrorDetector {
        &self.errors
    }

    pub fn bias_detector(&self) -> &BiasDetector {
        &self.bias
    }

    pub async fn breaker_state(&self) -> BreakerSnapshot {
        self.breaker.state().await
    }

    pub fn stats(&self) -> SafeGenerationStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
            .with_rates()
    }

    pub async fn generate_safe_content(
        &self,
        category: Option<&str>,
        topic: Option<&str>,
    ) -> Result<ContentGenerationResult, PipelineError> {
        if let Ok(mut stats) = self.stats.lock() {
            stats.total_attempts += 1;
        }
        tracing::info!(category, topic, "Generating content");
        let result = self.breaker.call(|| self.run(category, topic)).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Content generation failed");
        }
        Ok(result?)
    }

    async fn run(&self, category: Option<&str>, topic: Option<&str>) -> Result<ContentGenerationResult, GenerationError> {
        let started = Instant::now();
        let generator = &self.generator;
        let max_attempts = self.max_attempts;

        let draft = self
            .retry
            .run(move || generator.generate_validated_post(category, topic, max_attempts))
            .await?;
        let generation_ms = millis(started);

        let stage = Instant::now();
        let validator = self.generator.validator();
        let first = validator
            .validate_content(&draft.content, &draft.title, &draft.category)
            .await;
        let validation_ms = millis(stage);

        let stage = Instant::now();
        let found = self.errors.detect_all(&draft.content);
        let mut content = draft.content.clone();
        let mut applied = Vec::new();

        if self.thresholds.auto_correction && !found.is_empty() {
            let fixed = self.errors.auto_correct(&content, errors::AUTO_CORRECT_CONFIDENCE);
            applied.extend(
                fixed
                    .applied
                    .iter()
                    .map(|e| format!("Fixed {:?} error: {}", e.error_type, e.description)),
            );
            if let Ok(mut stats) = self.stats.lock() {
                stats.auto_corrections += fixed.applied.len() as u64;
            }
            content = fixed.text;
        }

        let bias_report = self.bias.report(&content);
        if self.thresholds.auto_correction && bias_report.bias_score > self.thresholds.max_bias {
            let fixed = self.bias.auto_correct(&content, bias::AUTO_CORRECT_CONFIDENCE);
            if !fixed.applied.is_empty() {
                applied.extend(
                    fixed
                        .applied
                        .iter()
                        .map(|d| format!("Reduced bias: {}", d.description)),
                );
                content = fixed.text;
            }
        }
        let correction_ms = millis(stage);

        let stage = Instant::now();
        let last = validator.validate_content(&content, &draft.title, &draft.category).await;
        let final_validation_ms = millis(stage);

        let status = decide_status(&last, found.len(), bias_report.bias_score, applied.len(), &self.thresholds);
        let recommendations = recommendations(&last, &found, &bias_report, applied.len());

        if let Ok(mut stats) = self.stats.lock() {
            match status {
                ContentStatus::Approved => stats.successful += 1,
                ContentStatus::NeedsReview | ContentStatus::NeedsCorrection => stats.manual_reviews += 1,
                _ => stats.rejections += 1,
            }
        }

        tracing::info!(
            title = %draft.title,
            status = ?status,
            quality = last.confidence_score,
            first_pass = %first.result,
            "Content generated"
        );

        Ok(ContentGenerationResult {
            excerpt: generator_excerpt(&content, &draft.excerpt),
            original_length: draft.content.len(),
            final_length: content.len(),
            title: draft.title,
            content,
            category: draft.category,
            tags: draft.tags,
            status,
            quality_score: last.confidence_score,
            safety_score: last.quality_metrics.safety_score,
            bias_score: bias_report.bias_score,
            error_count: found.len(),
            corrections_applied: applied,
            recommendations,
            validation: last,
            timings: StageTimings {
                generation_ms,
                validation_ms,
                correction_ms,
                final_validation_ms,
                total_ms: millis(started),
            },
            generated_at: draft.generated_at,
            rejection_reason: None,
            post_id: None,
        })
    }
}

/// Keep the draft's excerpt unless corrections changed its source sentence
fn generator_excerpt(content: &str, previous: &str) -> String {
    let fresh = super::generator::excerpt(content);
    if fresh == previous {
        previous.to_string()
    } else {
        fresh
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModerationRules {
    pub min_quality: f64,
    pub max_bias: f64,
    pub max_errors: usize,
    pub reject_below_safety: f64,
    pub reject_above_bias: f64,
    pub reject_above_errors: usize,
}

impl Default for ModerationRules {
    fn default() -> Self {
        Self {
            min_quality: 0.8,
            max_bias: 0.2,
            max_errors: 2,
            reject_below_safety: 0.6,
            reject_above_bias: 0.6,
            reject_above_errors: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueuedItem {
    pub id: u64,
    pub queued_at: DateTime<Utc>,
    pub content: ContentGenerationResult,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModerationStats {
    pub queue_size: usize,
    pub approved: u64,
    pub rejected: u64,
    pub total_moderated: u64,
    pub approval_rate: f64,
}

#[derive(Debug, Default)]
struct ModerationState {
    next_id: u64,
    queue: Vec<QueuedItem>,
    approved: u64,
    rejected: u64,
}

#[derive(Debug, Default)]
pub struct ModerationQueue {
    rules: ModerationRules,
    state: Mutex<ModerationState>,
}

impl ModerationQueue {
    pub fn new(rules: ModerationRules) -> Self {
        Self {
            rules,
            state: Mutex::new(ModerationState::default()),
        }
    }

    /// Auto-approve, auto-reject or queue `result`, updating its status.
    /// Returns the queue id when the content waits for a moderator.
    pub fn moderate(&self, result: &mut ContentGenerationResult) -> Option<u64> {
        let rules = &self.rules;
        let Ok(mut state) = self.state.lock() else {
            result.status = ContentStatus::NeedsReview;
            return None;
        };

        if result.quality_score >= rules.min_quality
            && result.bias_score <= rules.max_bias
            && result.error_count <= rules.max_errors
        {
            result.status = ContentStatus::Approved;
            state.approved += 1;
            tracing::info!(title = %result.title, "Content auto-approved");
            return None;
        }

        if result.safety_score < rules.reject_below_safety
            || result.bias_score > rules.reject_above_bias
            || result.error_count > rules.reject_above_errors
        {
            result.status = ContentStatus::Rejected;
            state.rejected += 1;
            tracing::info!(title = %result.title, "Content auto-rejected");
            return None;
        }

        result.status = ContentStatus::NeedsReview;
        state.next_id += 1;
        let id = state.next_id;
        state.queue.push(QueuedItem {
            id,
            queued_at: Utc::now(),
            content: result.clone(),
        });
        tracing::info!(queue_id = id, title = %result.title, "Content queued for moderation");
        Some(id)
    }

    pub fn queue(&self) -> Vec<QueuedItem> {
        self.state.lock().map(|s| s.queue.clone()).unwrap_or_default()
    }

    fn take(&self, id: u64) -> Option<(std::sync::MutexGuard<'_, ModerationState>, ContentGenerationResult)> {
        let mut state = self.state.lock().ok()?;
        let pos = state.queue.iter().position(|item| item.id == id)?;
        let item = state.queue.remove(pos);
        Some((state, item.content))
    }

    pub fn approve(&self, id: u64) -> Option<ContentGenerationResult> {
        let (mut state, mut content) = self.take(id)?;
        state.approved += 1;
        content.status = ContentStatus::Approved;
        tracing::info!(queue_id = id, title = %content.title, "Content approved by moderator");
        Some(content)
    }

    pub fn reject(&self, id: u64, reason: &str) -> Option<ContentGenerationResult> {
        let (mut state, mut content) = self.take(id)?;
        state.rejected += 1;
        content.status = ContentStatus::Rejected;
        content.rejection_reason = Some(reason.to_string());
        tracing::info!(queue_id = id, title = %content.title, reason, "Content rejected by moderator");
        Some(content)
    }

    pub fn stats(&self) -> ModerationStats {
        let Ok(state) = self.state.lock() else {
            return ModerationStats::default();
        };
        let total = state.approved + state.rejected;
        ModerationStats {
            queue_size: state.queue.len(),
            approved: state.approved,
            rejected: state.rejected,
            total_moderated: total,
            approval_rate: state.approved as f64 / total.max(1) as f64,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub timestamp: DateTime<Utc>,
    pub generator: SafeGenerationStats,
    pub drafts: GenerationStats,
    pub moderation: ModerationStats,
    pub breaker: BreakerSnapshot,
    pub config: AiConfig,
    pub recommendations: Vec<String>,
}

pub struct IntegratedAiSystem {
    generator: SafeContentGenerator,
    moderation: ModerationQueue,
    publisher: Option<Arc<Publisher>>,
    config: AiConfig,
    batch_pause: Duration,
}

impl IntegratedAiSystem {
    pub fn new(generator: SafeContentGenerator, config: AiConfig) -> Self {
        Self {
            generator,
            moderation: ModerationQueue::default(),
            publisher: None,
            config,
            batch_pause: DEFAULT_BATCH_PAUSE,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = pause;
        self
    }

    pub fn content_generator(&self) -> &SafeContentGenerator {
        &self.generator
    }

    pub fn moderation(&self) -> &ModerationQueue {
        &self.moderation
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub async fn generate_and_moderate(
        &self,
        category: Option<&str>,
        topic: Option<&str>,
    ) -> Result<ContentGenerationResult, PipelineError> {
        let mut result = self.generator.generate_safe_content(category, topic).await?;
        self.moderation.moderate(&mut result);

        if self.config.auto_publish && result.status == ContentStatus::Approved {
            if let Some(publisher) = &self.publisher {
                match publisher.publish(&result).await {
                    Ok(detail) => {
                        result.status = ContentStatus::Published;
                        result.post_id = Some(detail.post.id);
                    }
                    Err(e) => tracing::error!(title = %result.title, error = %e, "Auto-publish failed"),
                }
            }
        }
        Ok(result)
    }

    /// Approve a queued item and publish it when a publisher is attached
    pub async fn approve_queued(&self, id: u64) -> Result<Option<ContentGenerationResult>, PublishError> {
        let Some(mut content) = self.moderation.approve(id) else {
            return Ok(None);
        };
        if let Some(publisher) = &self.publisher {
            let detail = publisher.publish(&content).await?;
            content.status = ContentStatus::Published;
            content.post_id = Some(detail.post.id);
        }
        Ok(Some(content))
    }

    pub fn reject_queued(&self, id: u64, reason: &str) -> Option<ContentGenerationResult> {
        self.moderation.reject(id, reason)
    }

    /// Generate `count` items, cycling through `categories`. Failures are
    /// logged and skipped.
    pub async fn batch_generate(&self, count: usize, categories: &[String]) -> Vec<ContentGenerationResult> {
        tracing::info!(count, "Starting batch generation");
        let mut results = Vec::with_capacity(count);

        for i in 0..count {
            let category = if categories.is_empty() {
                None
            } else {
                Some(categories[i % categories.len()].as_str())
            };
            match self.generate_and_moderate(category, None).await {
                Ok(result) => {
                    tracing::info!(item = i + 1, count, title = %result.title, "Batch item generated");
                    results.push(result);
                }
                Err(e) => tracing::warn!(item = i + 1, count, error = %e, "Batch item failed"),
            }
            if i + 1 < count && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }
        }

        tracing::info!(succeeded = results.len(), count, "Batch generation finished");
        results
    }

    pub async fn status(&self) -> SystemStatus {
        let generator = self.generator.stats();
        let moderation = self.moderation.stats();

        let mut recommendations = Vec::new();
        if generator.total_attempts > 0 && generator.success_rate < 0.7 {
            recommendations.push("Low generation success rate; check the thresholds".to_string());
        }
        if generator.rejection_rate > 0.3 {
            recommendations.push("High rejection rate; review the quality criteria".to_string());
        }
        if moderation.queue_size > 10 {
            recommendations.push("Moderation queue is growing; consider more automation".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("System is operating normally".to_string());
        }

        SystemStatus {
            timestamp: Utc::now(),
            drafts: self.generator.generator().stats(),
            breaker: self.generator.breaker_state().await,
            generator,
            moderation,
            config: self.config.clone(),
            recommendations,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ai::fact_check::{FactCheckReport, FactChecker};
    use crate::ai::generator::{Draft, DraftSource, TemplateSource};
    use crate::ai::resilience::CircuitState;
    use crate::ai::validator::{ContentValidator, ValidationMetrics, ValidationThresholds};
    use crate::cache::Cache;
    use async_trait::async_trait;

    pub(crate) fn report(result: ValidationResult, confidence: f64, safety: f64) -> ValidationReport {
        ValidationReport {
            result,
            confidence_score: confidence,
            issues: Vec::new(),
            suggestions: vec!["Add more detail and depth".to_string()],
            quality_metrics: ValidationMetrics {
                safety_score: safety,
                ..Default::default()
            },
            safety_flags: Vec::new(),
            fact_check_results: FactCheckReport::default(),
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn sample_result(quality: f64, safety: f64, bias: f64, errors: usize) -> ContentGenerationResult {
        ContentGenerationResult {
            title: "Solar power at home".to_string(),
            content: "## Intro\n\nSolar panels turn sunlight into electricity.".to_string(),
            excerpt: "Solar panels turn sunlight into electricity.".to_string(),
            category: "science".to_string(),
            tags: vec!["renewable energy".to_string(), "science".to_string()],
            status: ContentStatus::Draft,
            quality_score: quality,
            safety_score: safety,
            bias_score: bias,
            error_count: errors,
            corrections_applied: Vec::new(),
            recommendations: Vec::new(),
            validation: report(ValidationResult::Approved, quality, safety),
            timings: StageTimings::default(),
            original_length: 0,
            final_length: 0,
            generated_at: Utc::now(),
            rejection_reason: None,
            post_id: None,
        }
    }

    struct FixedSource(&'static str);

    #[async_trait]
    impl DraftSource for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn catalogue(&self) -> Vec<(String, String)> {
            vec![("misc".to_string(), "testing".to_string())]
        }

        async fn compose(&self, category: &str, topic: &str, _variant: usize) -> anyhow::Result<Draft> {
            Ok(Draft {
                title: format!("About {topic}"),
                content: self.0.to_string(),
                excerpt: super::super::generator::excerpt(self.0),
                category: category.to_string(),
                tags: vec![topic.to_string()],
                reading_time: 1,
                generated_at: Utc::now(),
                source_topic: topic.to_string(),
                requires_manual_review: false,
                validation: None,
            })
        }
    }

    fn lenient_validator() -> Arc<ContentValidator> {
        Arc::new(
            ContentValidator::new(FactChecker::new(Arc::new(Cache::new()))).with_thresholds(ValidationThresholds {
                min_quality_score: 0.0,
                max_hallucination_risk: 1.0,
                min_safety_score: 0.0,
                min_credibility_score: 0.0,
            }),
        )
    }

    fn lenient_thresholds() -> SafetyThresholds {
        SafetyThresholds {
            min_quality: 0.0,
            max_bias: 1.0,
            min_safety: 0.0,
            max_error_count: 1000,
            manual_review_threshold: 0.0,
            auto_correction: true,
        }
    }

    fn safe_generator(body: &'static str, thresholds: SafetyThresholds) -> SafeContentGenerator {
        let generator = Arc::new(ContentGenerator::new(Arc::new(FixedSource(body)), lenient_validator()));
        SafeContentGenerator::new(generator, thresholds, 2).with_retry(RetryPolicy {
            max_retries: 0,
            base_delay: Duration::ZERO,
            backoff_factor: 1.0,
        })
    }

    #[test]
    fn test_status_rules_in_order() {
        let t = SafetyThresholds::default();
        let ok = report(ValidationResult::Approved, 0.9, 0.95);

        assert_eq!(decide_status(&report(ValidationResult::Approved, 0.9, 0.7), 0, 0.0, 0, &t), ContentStatus::Rejected);
        assert_eq!(decide_status(&ok, 6, 0.0, 0, &t), ContentStatus::NeedsCorrection);
        assert_eq!(decide_status(&ok, 0, 0.31, 0, &t), ContentStatus::NeedsCorrection);
        assert_eq!(
            decide_status(&report(ValidationResult::Approved, 0.65, 0.95), 0, 0.0, 0, &t),
            ContentStatus::NeedsCorrection
        );
        assert_eq!(decide_status(&ok, 0, 0.0, 4, &t), ContentStatus::NeedsReview);
        assert_eq!(
            decide_status(&report(ValidationResult::NeedsReview, 0.9, 0.95), 0, 0.0, 0, &t),
            ContentStatus::NeedsReview
        );
        assert_eq!(decide_status(&ok, 5, 0.3, 3, &t), ContentStatus::Approved);
    }

    #[test]
    fn test_recommendations_capped() {
        let mut validation = report(ValidationResult::Approved, 0.5, 1.0);
        validation.suggestions = (0..5).map(|i| format!("suggestion {i}")).collect();
        let bias_report = BiasDetector::new().report("All men are strong. The fireman is amazing.");
        let recs = recommendations(&validation, &[], &bias_report, 3);
        assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
        assert_eq!(recs[0], "Improve the overall quality of the content");
    }

    #[test]
    fn test_moderation_rules() {
        let queue = ModerationQueue::default();

        let mut good = sample_result(0.85, 0.95, 0.1, 1);
        assert_eq!(queue.moderate(&mut good), None);
        assert_eq!(good.status, ContentStatus::Approved);

        let mut unsafe_content = sample_result(0.5, 0.5, 0.1, 0);
        assert_eq!(queue.moderate(&mut unsafe_content), None);
        assert_eq!(unsafe_content.status, ContentStatus::Rejected);

        let mut noisy = sample_result(0.9, 0.9, 0.1, 11);
        queue.moderate(&mut noisy);
        assert_eq!(noisy.status, ContentStatus::Rejected);

        let mut middling = sample_result(0.7, 0.9, 0.3, 3);
        let id = queue.moderate(&mut middling).unwrap();
        assert_eq!(middling.status, ContentStatus::NeedsReview);

        let stats = queue.stats();
        assert_eq!(stats.queue_size, 1);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.rejected, 2);
        assert_eq!(queue.queue()[0].id, id);
    }

    #[test]
    fn test_queue_approve_and_reject() {
        let queue = ModerationQueue::default();
        let first = queue.moderate(&mut sample_result(0.7, 0.9, 0.3, 3)).unwrap();
        let second = queue.moderate(&mut sample_result(0.7, 0.9, 0.3, 3)).unwrap();
        assert_ne!(first, second);

        let approved = queue.approve(first).unwrap();
        assert_eq!(approved.status, ContentStatus::Approved);
        assert!(queue.approve(first).is_none());

        let rejected = queue.reject(second, "off topic").unwrap();
        assert_eq!(rejected.rejection_reason.as_deref(), Some("off topic"));

        let stats = queue.stats();
        assert_eq!(stats.queue_size, 0);
        assert_eq!(stats.total_moderated, 2);
        assert!((stats.approval_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_generate_safe_content_corrects_text() {
        let generator = safe_generator("Teh results were clear. We recieve many letters.", lenient_thresholds());
        let result = generator.generate_safe_content(Some("misc"), Some("testing")).await.unwrap();

        assert!(result.content.contains("The results"));
        assert!(result.content.contains("receive"));
        assert_eq!(result.corrections_applied.len(), 2);
        assert!(result.recommendations.len() <= MAX_RECOMMENDATIONS);
        assert!(result.recommendations.iter().any(|r| r == "Check spelling"));
        assert!((0.0..=1.0).contains(&result.quality_score));
        assert!(result.timings.total_ms >= result.timings.generation_ms);
        assert_eq!(generator.stats().total_attempts, 1);
    }

    #[tokio::test]
    async fn test_template_content_is_approved_with_default_thresholds() {
        let validator = Arc::new(ContentValidator::new(FactChecker::new(Arc::new(Cache::new()))));
        for (category, topic) in TemplateSource.catalogue() {
            let generator = Arc::new(ContentGenerator::new(Arc::new(TemplateSource), validator.clone()));
            let safe = SafeContentGenerator::new(generator, SafetyThresholds::default(), 3);
            let result = safe.generate_safe_content(Some(&category), Some(&topic)).await.unwrap();
            assert_eq!(result.status, ContentStatus::Approved, "{topic}: {:?}", result.recommendations);
            assert_eq!(result.error_count, 0);
            assert!(result.bias_score <= SafetyThresholds::default().max_bias);
        }
    }

    #[tokio::test]
    async fn test_breaker_opens_after_failures() {
        let generator = safe_generator("This explains how to make a small explosive at home.", lenient_thresholds())
            .with_breaker(CircuitBreaker::new(2, Duration::from_secs(60)));
        // The lenient validator still rejects unsafe text
        for _ in 0..2 {
            assert!(matches!(
                generator.generate_safe_content(None, None).await,
                Err(PipelineError::Generation(GenerationError::Exhausted(2)))
            ));
        }
        assert!(matches!(
            generator.generate_safe_content(None, None).await,
            Err(PipelineError::CircuitOpen)
        ));
        assert_eq!(generator.breaker_state().await.state, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_batch_cycles_categories() {
        let generator = safe_generator("Gardens need water and light to grow well.", lenient_thresholds());
        let system = IntegratedAiSystem::new(generator, AiConfig::default()).with_batch_pause(Duration::ZERO);
        let results = system
            .batch_generate(2, &["alpha".to_string(), "beta".to_string()])
            .await;
        let categories: Vec<&str> = results.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["alpha", "beta"]);

        let status = system.status().await;
        assert_eq!(status.generator.total_attempts, 2);
        assert_eq!(status.breaker.state, CircuitState::Closed);
        assert!(!status.recommendations.is_empty());
    }
}
