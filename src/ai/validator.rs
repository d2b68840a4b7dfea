//! Content validator
//!
//! Runs quality, hallucination, safety and fact checks over a text and
//! folds them into a single [`ValidationReport`].

use super::fact_check::{FactCheckReport, FactChecker};
use super::filter::{ContentFilter, SafetyReport};
use super::hallucination::{HallucinationDetector, HallucinationReport};
use super::quality::{QualityAssessment, QualityReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

/// Combined issue count above which content goes to review
const MAX_MINOR_ISSUES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationResult {
    Approved,
    Rejected,
    NeedsReview,
    NeedsCorrection,
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationResult::Approved => "approved",
            ValidationResult::Rejected => "rejected",
            ValidationResult::NeedsReview => "needs_review",
            ValidationResult::NeedsCorrection => "needs_correction",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationThresholds {
    pub min_quality_score: f64,
    pub max_hallucination_risk: f64,
    pub min_safety_score: f64,
    pub min_credibility_score: f64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            min_quality_score: 0.6,
            max_hallucination_risk: 0.4,
            min_safety_score: 0.7,
            min_credibility_score: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub overall_quality: f64,
    pub safety_score: f64,
    pub hallucination_risk: f64,
    pub credibility_score: f64,
    pub processing_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub result: ValidationResult,
    pub confidence_score: f64,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub quality_metrics: ValidationMetrics,
    pub safety_flags: Vec<String>,
    pub fact_check_results: FactCheckReport,
    pub timestamp: DateTime<Utc>,
}

/// Running totals across validations
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationStats {
    pub total: u64,
    pub approved: u64,
    pub rejected: u64,
    pub needs_review: u64,
    pub needs_correction: u64,
    pub average_confidence: f64,
}

impl ValidationStats {
    fn record(&mut self, report: &ValidationReport) {
        self.total += 1;
        match report.result {
            ValidationResult::Approved => self.approved += 1,
            ValidationResult::Rejected => self.rejected += 1,
            ValidationResult::NeedsReview => self.needs_review += 1,
            ValidationResult::NeedsCorrection => self.needs_correction += 1,
        }
        let n = self.total as f64;
        self.average_confidence += (report.confidence_score - self.average_confidence) / n;
    }
}

/// The individual analyser results a decision is made from
pub struct Assessment<'a> {
    pub quality: &'a QualityReport,
    pub hallucination: &'a HallucinationReport,
    pub safety: &'a SafetyReport,
    pub facts: &'a FactCheckReport,
}

impl Assessment<'_> {
    /// First matching rule wins: unsafe content is rejected, risky or weak
    /// content needs correction, doubtful content needs review.
    pub fn decide(&self, thresholds: &ValidationThresholds) -> ValidationResult {
        if !self.safety.is_safe || self.safety.safety_score < thresholds.min_safety_score {
            return ValidationResult::Rejected;
        }
        if self.hallucination.hallucination_risk > thresholds.max_hallucination_risk {
            return ValidationResult::NeedsCorrection;
        }
        if self.quality.quality_score < thresholds.min_quality_score {
            return ValidationResult::NeedsCorrection;
        }
        if self.facts.credibility_score < thresholds.min_credibility_score {
            return ValidationResult::NeedsReview;
        }
        if self.quality.issues.len() + self.hallucination.issues.len() > MAX_MINOR_ISSUES {
            return ValidationResult::NeedsReview;
        }
        ValidationResult::Approved
    }

    pub fn confidence(&self) -> f64 {
        let score = self.quality.quality_score * 0.3
            + self.safety.safety_score * 0.25
            + (1.0 - self.hallucination.hallucination_risk) * 0.25
            + self.facts.credibility_score * 0.2;
        score.clamp(0.0, 1.0)
    }
}

pub struct ContentValidator {
    fact_checker: FactChecker,
    hallucination: HallucinationDetector,
    filter: ContentFilter,
    quality: QualityAssessment,
    thresholds: ValidationThresholds,
    stats: Mutex<ValidationStats>,
}

impl ContentValidator {
    pub fn new(fact_checker: FactChecker) -> Self {
        Self {
            fact_checker,
            hallucination: HallucinationDetector::new(),
            filter: ContentFilter::new(),
            quality: QualityAssessment::new(),
            thresholds: ValidationThresholds::default(),
            stats: Mutex::new(ValidationStats::default()),
        }
    }

    pub fn with_filter(mut self, filter: ContentFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ValidationThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> &ValidationThresholds {
        &self.thresholds
    }

    pub fn safety(&self, content: &str) -> SafetyReport {
        self.filter.filter(content)
    }

    pub async fn validate_content(&self, content: &str, title: &str, category: &str) -> ValidationReport {
        let started = Instant::now();

        let quality = self.quality.assess(content);
        let hallucination = self.hallucination.detect(content);
        let safety = self.filter.filter(content);
        let facts = self.fact_checker.check_facts(content).await;

        let assessment = Assessment {
            quality: &quality,
            hallucination: &hallucination,
            safety: &safety,
            facts: &facts,
        };
        let result = assessment.decide(&self.thresholds);
        let confidence_score = assessment.confidence();

        let mut issues = quality.issues.clone();
        issues.extend(hallucination.issues.iter().cloned());
        issues.extend(safety.issues.iter().cloned());

        let report = ValidationReport {
            result,
            confidence_score,
            issues,
            suggestions: quality.suggestions.clone(),
            quality_metrics: ValidationMetrics {
                overall_quality: quality.quality_score,
                safety_score: safety.safety_score,
                hallucination_risk: hallucination.hallucination_risk,
                credibility_score: facts.credibility_score,
                processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            },
            safety_flags: safety.flags.clone(),
            fact_check_results: facts,
            timestamp: Utc::now(),
        };

        tracing::debug!(
            title,
            category,
            result = %report.result,
            confidence = report.confidence_score,
            "Validated content"
        );

        if let Ok(mut stats) = self.stats.lock() {
            stats.record(&report);
        }
        report
    }

    pub fn validation_stats(&self) -> ValidationStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}
