//! Hallucination heuristics
//!
//! Flags text that is suspiciously precise, self-contradictory or cites
//! sources too vague to exist.

use super::text;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const MAX_CONTRADICTIONS: usize = 3;

static SUSPICIOUS_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let patterns = [
        ("exact date", r"\b\d{1,2}\.\d{1,2}\.\d{4}\b"),
        ("precise grouped number", r"\d+,\d+,\d+"),
        ("unnamed study reference", r"according to a (study|survey|report) (from|in) \d{4}"),
        ("always/never contradiction", r"\balways\b.*\bnever\b"),
        ("everyone/nobody contradiction", r"\beveryone\b.*\bnobody\b"),
        ("impossible/possible contradiction", r"\bimpossible\b.*\bpossible\b"),
        ("absolute claim", r"\babsolutely (all|everyone|everything)\b"),
        ("absolute claim", r"\bnobody ever\b"),
        ("absolute claim", r"\balways and everywhere\b"),
        ("absolute claim", r"\b100% proven\b"),
    ];
    patterns
        .into_iter()
        .map(|(label, p)| (label, Regex::new(&format!("(?i){p}")).unwrap()))
        .collect()
});

static SPECIFIC_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    text::compile_all(&[
        r"\d+\.\d+%",
        r"\b\d{1,2}:\d{2}\b",
        r"\$\d+,\d+",
        r"\b\d+ (people|persons|users|participants)\b",
    ])
});

static FAKE_SOURCE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"[Uu]niversity of [A-Z][a-z]+ study",
        r"[Aa] [A-Z][a-z]+ [Uu]niversity study",
        r"data from [A-Z][a-z]+ [Ii]nc",
        r"[A-Z][a-z]+ report \d{4}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const NEGATIVE_CUES: &[&str] = &["not", "no", "never", "impossible", "absent", "cannot"];
const POSITIVE_CUES: &[&str] = &["yes", "is", "always", "possible", "present", "can", "does"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            RiskLevel::Low
        } else if confidence >= 0.6 {
            RiskLevel::Medium
        } else if confidence >= 0.4 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HallucinationReport {
    pub hallucination_risk: f64,
    pub confidence_score: f64,
    pub issues: Vec<String>,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HallucinationDetector;

impl HallucinationDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, content: &str) -> HallucinationReport {
        let mut issues = Vec::new();
        let mut confidence: f64 = 1.0;

        for (label, re) in SUSPICIOUS_PATTERNS.iter() {
            let found = re.find_iter(content).count();
            if found > 0 {
                issues.push(format!("Suspicious pattern: {label} (found {found})"));
                confidence -= 0.1;
            }
        }

        let contradictions = find_contradictions(content);
        confidence -= 0.2 * contradictions.len() as f64;
        issues.extend(contradictions.into_iter().map(|c| format!("Contradiction: {c}")));

        if specificity(content) > 0.7 {
            issues.push("Excessive specificity without sources".to_string());
            confidence -= 0.15;
        }

        let sources = fake_sources(content);
        if !sources.is_empty() {
            confidence -= 0.3;
        }
        issues.extend(sources.into_iter().map(|s| format!("Suspicious source: {s}")));

        let confidence = confidence.clamp(0.0, 1.0);
        HallucinationReport {
            hallucination_risk: 1.0 - confidence,
            confidence_score: confidence,
            issues,
            risk_level: RiskLevel::from_confidence(confidence),
        }
    }
}

/// Pairs of similar sentences where one carries a negative cue and the other a positive one
fn find_contradictions(content: &str) -> Vec<String> {
    let sentences = text::sentences(content);
    let mut found = Vec::new();

    for (i, first) in sentences.iter().enumerate() {
        for second in &sentences[i + 1..] {
            let ratio = text::similarity_ratio(&first.to_lowercase(), &second.to_lowercase());
            if (0.3..=0.8).contains(&ratio) && contradictory(first, second) {
                found.push(format!("{}... vs {}...", text::head(first, 50), text::head(second, 50)));
                if found.len() == MAX_CONTRADICTIONS {
                    return found;
                }
            }
        }
    }
    found
}

fn contradictory(a: &str, b: &str) -> bool {
    let cues = |s: &str, list: &[&str]| {
        let lower = s.to_lowercase();
        let found = text::word_tokens(&lower).any(|w| list.contains(&w));
        found
    };
    let (a_neg, a_pos) = (cues(a, NEGATIVE_CUES), cues(a, POSITIVE_CUES));
    let (b_neg, b_pos) = (cues(b, NEGATIVE_CUES), cues(b, POSITIVE_CUES));
    (a_neg && b_pos) || (a_pos && b_neg)
}

/// Specific details per hundred words, capped at 1
fn specificity(content: &str) -> f64 {
    let words = text::word_count(content);
    if words == 0 {
        return 0.0;
    }
    let matches: usize = SPECIFIC_PATTERNS.iter().map(|re| re.find_iter(content).count()).sum();
    (matches as f64 / (words as f64 / 100.0)).min(1.0)
}

/// Source references too short to identify anything
fn fake_sources(content: &str) -> Vec<String> {
    FAKE_SOURCE_PATTERNS
        .iter()
        .flat_map(|re| re.find_iter(content))
        .map(|m| m.as_str().to_string())
        .filter(|s| text::word_count(s) < 4)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_is_low_risk() {
        let report = HallucinationDetector::new()
            .detect("Rust has an ownership model. It helps avoid data races in many programs.");
        assert_eq!(report.hallucination_risk, 0.0);
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_suspicious_patterns_lower_confidence() {
        let report = HallucinationDetector::new()
            .detect("It launched on 12.03.2019 and reached 1,234,567 visits. This is 100% proven.");
        assert!((report.confidence_score - 0.7).abs() < 1e-9);
        assert_eq!(report.risk_level, RiskLevel::Medium);
        assert_eq!(report.issues.len(), 3);
    }

    #[test]
    fn test_contradiction_detected() {
        let report = HallucinationDetector::new()
            .detect("Caching is always enabled on the server. On a laptop, caching is not enabled at all.");
        assert!(report.issues.iter().any(|i| i.starts_with("Contradiction")));
    }

    #[test]
    fn test_negated_pair_still_contradicts() {
        let report = HallucinationDetector::new().detect(
            "The cache is never cleared on startup. The cache is not cleared on startup but it can be flushed by hand.",
        );
        assert!(report.issues.iter().any(|i| i.starts_with("Contradiction")));
    }

    #[test]
    fn test_fake_sources_penalised_once() {
        let report = HallucinationDetector::new().detect("The Acme report 2020 agrees. The Bolt report 2021 agrees too.");
        assert!((report.confidence_score - 0.7).abs() < 1e-9);
        assert_eq!(report.risk_level, RiskLevel::Medium);
        assert_eq!(report.issues.iter().filter(|i| i.starts_with("Suspicious source")).count(), 2);
    }

    #[test]
    fn test_fake_source() {
        let sources = fake_sources("A Stanford University study found the opposite. See Acme report 2021.");
        assert!(sources.contains(&"Acme report 2021".to_string()));
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskLevel::from_confidence(0.8), RiskLevel::Low);
        assert_eq!(RiskLevel::from_confidence(0.6), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_confidence(0.4), RiskLevel::High);
        assert_eq!(RiskLevel::from_confidence(0.39), RiskLevel::Critical);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let text = "Acme report 2020. Bolt report 2021. Cog report 2022. Dart report 2023. \
                    It is always here and never there. Absolutely everyone agrees.";
        let report = HallucinationDetector::new().detect(text);
        assert!(report.confidence_score >= 0.0);
        assert!(report.hallucination_risk <= 1.0);
        assert!((report.confidence_score - 0.5).abs() < 1e-9);
        assert_eq!(report.risk_level, RiskLevel::High);
    }
}
