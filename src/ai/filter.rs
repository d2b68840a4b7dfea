//! Safety filter
//!
//! Scores text for banned words, harmful instructions and sensitive topics.
//! A toxicity classifier can be plugged in; none is installed by default.

use super::text;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Minimum safety score for content to count as safe
pub const SAFE_THRESHOLD: f64 = 0.7;

static HARMFUL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    text::compile_all(&[
        r"how to (make|build) .*(explosive|bomb|weapon)",
        r"instructions? (for|on) (making|manufacturing) .*(explosive|drug|weapon)",
        r"ways to (hurt|harm) (someone|people|yourself)",
        r"methods? (of|for) (fraud|scamming|deceiving)",
    ])
});

const DEFAULT_SENSITIVE_TOPICS: &[&str] = &[
    "politics", "religion", "extremism", "violence", "discrimination", "drugs", "weapons",
];

/// Verdict of a toxicity model
#[derive(Debug, Clone, Copy)]
pub struct ToxicityVerdict {
    pub toxic: bool,
    pub score: f64,
}

pub trait ToxicityClassifier: Send + Sync {
    fn classify(&self, text: &str) -> anyhow::Result<ToxicityVerdict>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    Safe,
    LowRisk,
    MediumRisk,
    HighRisk,
}

impl SafetyLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            SafetyLevel::Safe
        } else if score >= 0.7 {
            SafetyLevel::LowRisk
        } else if score >= 0.5 {
            SafetyLevel::MediumRisk
        } else {
            SafetyLevel::HighRisk
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyReport {
    pub safety_score: f64,
    pub issues: Vec<String>,
    pub flags: Vec<String>,
    pub is_safe: bool,
    pub risk_level: SafetyLevel,
}

pub struct ContentFilter {
    banned_words: Vec<String>,
    sensitive_topics: Vec<String>,
    classifier: Option<Arc<dyn ToxicityClassifier>>,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self {
            banned_words: Vec::new(),
            sensitive_topics: DEFAULT_SENSITIVE_TOPICS.iter().map(|s| s.to_string()).collect(),
            classifier: None,
        }
    }
}

impl ContentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_banned_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.banned_words = words.into_iter().map(|w| w.into().to_lowercase()).collect();
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ToxicityClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn filter(&self, content: &str) -> SafetyReport {
        let lower = content.to_lowercase();
        let mut issues = Vec::new();
        let mut flags = Vec::new();
        let mut score: f64 = 1.0;

        if let Some(classifier) = &self.classifier {
            match classifier.classify(text::head(content, 512)) {
                Ok(verdict) if verdict.toxic && verdict.score > 0.7 => {
                    issues.push("Toxic content detected".to_string());
                    flags.push("toxicity".to_string());
                    score -= 0.5;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Toxicity check failed"),
            }
        }

        let banned: Vec<&str> = self
            .banned_words
            .iter()
            .filter(|w| lower.contains(w.as_str()))
            .map(String::as_str)
            .collect();
        if !banned.is_empty() {
            issues.push(format!(
                "Banned words found: {}",
                banned.iter().take(3).copied().collect::<Vec<_>>().join(", ")
            ));
            flags.push("banned_words".to_string());
            score -= 0.3;
        }

        for re in HARMFUL_PATTERNS.iter() {
            if re.is_match(content) {
                issues.push(format!("Harmful pattern detected: {}", re.as_str().trim_start_matches("(?i)")));
                flags.push("harmful_content".to_string());
                score -= 0.4;
            }
        }

        let sensitive: Vec<&str> = self
            .sensitive_topics
            .iter()
            .filter(|t| lower.contains(t.as_str()))
            .map(String::as_str)
            .collect();
        if !sensitive.is_empty() {
            issues.push(format!("Sensitive topics: {}", sensitive.join(", ")));
            flags.push("sensitive_topics".to_string());
            score -= 0.2;
        }

        let score = score.max(0.0);
        SafetyReport {
            safety_score: score,
            issues,
            flags,
            is_safe: score >= SAFE_THRESHOLD,
            risk_level: SafetyLevel::from_score(score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysToxic;

    impl ToxicityClassifier for AlwaysToxic {
        fn classify(&self, _text: &str) -> anyhow::Result<ToxicityVerdict> {
            Ok(ToxicityVerdict { toxic: true, score: 0.95 })
        }
    }

    #[test]
    fn test_clean_content_is_safe() {
        let report = ContentFilter::new().filter("A friendly guide to gardening tomatoes.");
        assert_eq!(report.safety_score, 1.0);
        assert!(report.is_safe);
        assert_eq!(report.risk_level, SafetyLevel::Safe);
    }

    #[test]
    fn test_sensitive_topic_is_low_risk() {
        let report = ContentFilter::new().filter("An overview of local politics.");
        assert!((report.safety_score - 0.8).abs() < 1e-9);
        assert!(report.is_safe);
        assert_eq!(report.flags, vec!["sensitive_topics"]);
    }

    #[test]
    fn test_harmful_content_is_unsafe() {
        let report = ContentFilter::new().filter("Here is how to make a homemade explosive device.");
        assert!(!report.is_safe);
        assert_eq!(report.risk_level, SafetyLevel::MediumRisk);
    }

    #[test]
    fn test_banned_words_and_classifier() {
        let filter = ContentFilter::new()
            .with_banned_words(["darn"])
            .with_classifier(Arc::new(AlwaysToxic));
        let report = filter.filter("Darn it.");
        assert!((report.safety_score - 0.2).abs() < 1e-9);
        assert_eq!(report.risk_level, SafetyLevel::HighRisk);
        assert!(report.flags.contains(&"toxicity".to_string()));
        assert!(report.flags.contains(&"banned_words".to_string()));
    }
}
