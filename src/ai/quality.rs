//! Readability and structure scoring

use super::text;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MIN_WORD_COUNT: usize = 100;
pub const MAX_WORD_COUNT: usize = 5000;
pub const MAX_SENTENCE_WORDS: usize = 40;
/// Length at which the word-count term of the score saturates
pub const FULL_LENGTH_WORDS: usize = 500;

/// Readability used when there is nothing to measure
const NEUTRAL_READABILITY: f64 = 50.0;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static LIST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*([-*+]|\d+\.)\s+").unwrap());
static EMPHASIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*[^*]+\*\*|\*[^*\s][^*]*\*|_[^_\s][^_]*_").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    Excellent,
    Good,
    Satisfactory,
    NeedsImprovement,
    Poor,
}

impl QualityGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            QualityGrade::Excellent
        } else if score >= 0.8 {
            QualityGrade::Good
        } else if score >= 0.7 {
            QualityGrade::Satisfactory
        } else if score >= 0.6 {
            QualityGrade::NeedsImprovement
        } else {
            QualityGrade::Poor
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_sentence_length: f64,
    pub readability_score: f64,
    pub structure_score: f64,
    pub lexical_diversity: f64,
    pub grammar_score: f64,
    pub overall_quality: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub quality_score: f64,
    pub metrics: QualityMetrics,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub grade: QualityGrade,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QualityAssessment;

impl QualityAssessment {
    pub fn new() -> Self {
        Self
    }

    pub fn assess(&self, content: &str) -> QualityReport {
        let mut issues = Vec::new();
        let mut suggestions = Vec::new();

        let word_count = text::word_count(content);
        let sentence_count = text::sentence_spans(content).len();

        if word_count < MIN_WORD_COUNT {
            issues.push(format!("Text is too short ({word_count} words)"));
            suggestions.push(format!("Add more content (at least {MIN_WORD_COUNT} words)"));
        } else if word_count > MAX_WORD_COUNT {
            issues.push(format!("Text is too long ({word_count} words)"));
            suggestions.push(format!("Shorten the text (at most {MAX_WORD_COUNT} words)"));
        }

        let readability = text::flesch_reading_ease(content).unwrap_or(NEUTRAL_READABILITY);
        if readability < 30.0 {
            issues.push("Text is too complex to read".to_string());
            suggestions.push("Use shorter sentences and simpler words".to_string());
        } else if readability > 90.0 {
            issues.push("Text may be too simple".to_string());
            suggestions.push("Add more detail and depth".to_string());
        }

        let structure = structure_score(content);
        if structure < 0.6 {
            issues.push("Poor text structure".to_string());
            suggestions.push("Add headings, lists and logical sections".to_string());
        }

        let lexical = text::lexical_diversity(content);
        if lexical < 0.4 {
            issues.push("Low lexical diversity".to_string());
            suggestions.push("Use more varied vocabulary and synonyms".to_string());
        }

        let grammar = grammar_score(content);
        if grammar < 0.8 {
            issues.push("Possible grammar problems".to_string());
            suggestions.push("Check grammar and punctuation".to_string());
        }

        let overall = (word_count as f64 / FULL_LENGTH_WORDS as f64).min(1.0) * 0.2
            + (readability / 100.0).clamp(0.0, 1.0) * 0.3
            + structure * 0.2
            + lexical * 0.15
            + grammar * 0.15;

        QualityReport {
            quality_score: overall,
            metrics: QualityMetrics {
                word_count,
                sentence_count,
                avg_sentence_length: word_count as f64 / sentence_count.max(1) as f64,
                readability_score: readability,
                structure_score: structure,
                lexical_diversity: lexical,
                grammar_score: grammar,
                overall_quality: overall,
            },
            issues,
            suggestions,
            grade: QualityGrade::from_score(overall),
        }
    }
}

pub fn structure_score(content: &str) -> f64 {
    let mut score: f64 = 0.0;
    if HEADING_RE.is_match(content) {
        score += 0.3;
    }
    if LIST_RE.is_match(content) {
        score += 0.2;
    }
    if content.split("\n\n").filter(|p| !p.trim().is_empty()).count() >= 3 {
        score += 0.3;
    }
    if EMPHASIS_RE.is_match(content) {
        score += 0.2;
    }
    score.min(1.0)
}

/// 1 − issues / checks over adjacent repeated words and over-long sentences
pub fn grammar_score(content: &str) -> f64 {
    let words = text::words(content);
    let mut checks = 0usize;
    let mut issues = 0usize;

    for pair in words.windows(2) {
        checks += 1;
        if pair[0].to_lowercase() == pair[1].to_lowercase() {
            issues += 1;
        }
    }
    for sentence in text::sentences(content) {
        checks += 1;
        if text::word_count(sentence) > MAX_SENTENCE_WORDS {
            issues += 1;
        }
    }

    if checks == 0 {
        return 1.0;
    }
    (1.0 - issues as f64 / checks as f64).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn well_formed_article() -> String {
        let mut body = String::from("# Growing herbs at home\n\nFresh herbs make simple meals **taste** better.\n\n");
        body.push_str("## What you need\n\n- A sunny window\n- Good soil\n- Small pots\n\n");
        let sentences = [
            "Basil likes warm rooms and steady light.",
            "Mint spreads quickly, so give it a pot of its own.",
            "Parsley grows slowly at first but lasts for months.",
            "Water the soil when the top feels dry.",
            "Trim leaves often to keep each plant bushy.",
            "Chives return every spring with little effort.",
            "Thyme prefers dry roots and plenty of sun.",
            "Rosemary can live indoors through a mild winter.",
            "Label each pot so guests know what they are tasting.",
            "Rotate the pots weekly for even growth.",
            "Feed plants lightly during summer months.",
            "Harvest in the morning for the best flavour.",
        ];
        body.push_str(&sentences.join(" "));
        body.push_str("\n\n");
        body.push_str(&sentences[..6].join(" "));
        body
    }

    #[test]
    fn test_structure_score() {
        assert_eq!(structure_score("plain text"), 0.0);
        let full = "# Title\n\nIntro with *emphasis*.\n\n- item\n\nEnd.";
        assert!((structure_score(full) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_grammar_score() {
        assert_eq!(grammar_score(""), 1.0);
        assert!(grammar_score("the the cat sat") < 1.0);
        assert_eq!(grammar_score("A clean sentence."), 1.0);
    }

    #[test]
    fn test_short_text_flagged() {
        let report = QualityAssessment::new().assess("Too short.");
        assert!(report.issues.iter().any(|i| i.contains("too short")));
        assert_eq!(report.grade, QualityGrade::Poor);
    }

    #[test]
    fn test_well_formed_article_scores_well() {
        let report = QualityAssessment::new().assess(&well_formed_article());
        assert!(report.metrics.word_count >= MIN_WORD_COUNT);
        assert!(report.metrics.structure_score >= 0.99);
        assert!(report.quality_score >= 0.6, "score {}", report.quality_score);
        assert!(report.quality_score <= 1.0);
    }

    #[test]
    fn test_grades() {
        assert_eq!(QualityGrade::from_score(0.95), QualityGrade::Excellent);
        assert_eq!(QualityGrade::from_score(0.85), QualityGrade::Good);
        assert_eq!(QualityGrade::from_score(0.7), QualityGrade::Satisfactory);
        assert_eq!(QualityGrade::from_score(0.6), QualityGrade::NeedsImprovement);
        assert_eq!(QualityGrade::from_score(0.1), QualityGrade::Poor);
    }
}
