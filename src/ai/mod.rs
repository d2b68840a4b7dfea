//! Content analysis and generation
//!
//! Heuristic checks for generated or submitted text:
//! - quality, hallucination, safety and fact checks folded into a validation report
//! - error detection and auto-correction
//! - bias detection and mitigation
//!
//! On top of these sit the template generator, the safe generation pipeline
//! with moderation, and the publisher that stores approved content as posts.

pub mod bias;
pub mod errors;
pub mod fact_check;
pub mod filter;
pub mod generator;
pub mod hallucination;
pub mod pipeline;
pub mod publisher;
pub mod quality;
pub mod resilience;
pub(crate) mod text;
pub mod validator;

pub use bias::{BiasDetection, BiasDetector, BiasReport, BiasType};
pub use errors::{ErrorDetector, ErrorReport, ErrorType, Severity, TextError};
pub use fact_check::{ClaimLookup, FactCheckReport, FactChecker, WikipediaLookup};
pub use filter::{ContentFilter, SafetyReport, ToxicityClassifier};
pub use generator::{ContentGenerator, Draft, DraftSource, GenerationError, TemplateSource};
pub use pipeline::{
    ContentGenerationResult, ContentStatus, IntegratedAiSystem, ModerationQueue, PipelineError,
    SafeContentGenerator, SystemStatus,
};
pub use publisher::{PublishError, Publisher};
pub use resilience::{CircuitBreaker, CircuitState, RetryPolicy};
pub use validator::{ContentValidator, ValidationReport, ValidationResult, ValidationThresholds};
