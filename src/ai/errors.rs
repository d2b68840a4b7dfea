//! Writing error detection and auto-correction
//!
//! Pattern-based checks for misspellings, punctuation, grammar slips,
//! logical contradictions, repeated sentences and wordy style. Each finding
//! records its byte span so high-confidence fixes can be applied in place.

use super::text::{self, Edit};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Mutex;

/// Default confidence needed before a fix is applied automatically
pub const AUTO_CORRECT_CONFIDENCE: f64 = 0.8;

const CONTEXT_RADIUS: usize = 50;
const MAX_STYLE_SENTENCE_WORDS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Spelling,
    Grammar,
    Punctuation,
    Logical,
    Factual,
    Style,
    Coherence,
    Repetition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn weight(self) -> f64 {
        match self {
            Severity::Low => 0.25,
            Severity::Medium => 0.5,
            Severity::High => 0.75,
            Severity::Critical => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextError {
    pub error_type: ErrorType,
    pub severity: Severity,
    pub span: Range<usize>,
    pub original_text: String,
    /// Replacement text, when the fix is mechanical
    pub correction: Option<String>,
    pub suggestion: String,
    pub description: String,
    pub confidence: f64,
    pub context: String,
}

static MISSPELLINGS: &[(&str, &str)] = &[
    ("accomodate", "accommodate"),
    ("acheive", "achieve"),
    ("adress", "address"),
    ("alot", "a lot"),
    ("arguement", "argument"),
    ("beleive", "believe"),
    ("calender", "calendar"),
    ("definately", "definitely"),
    ("enviroment", "environment"),
    ("existance", "existence"),
    ("goverment", "government"),
    ("independant", "independent"),
    ("neccessary", "necessary"),
    ("occured", "occurred"),
    ("occurence", "occurrence"),
    ("publically", "publicly"),
    ("recieve", "receive"),
    ("seperate", "separate"),
    ("teh", "the"),
    ("thier", "their"),
    ("tommorow", "tomorrow"),
    ("untill", "until"),
    ("wich", "which"),
];

static FILLER_WORDS: &[&str] = &[
    "basically", "actually", "literally", "kind of", "sort of", "you know", "needless to say",
];

static WORDY_PHRASES: &[(&str, &str)] = &[
    ("in order to", "to"),
    ("due to the fact that", "because"),
    ("at this point in time", "now"),
    ("in the event that", "if"),
    ("with regard to", "about"),
    ("for the purpose of", "for"),
    ("has the ability to", "can"),
];

static COMPLEX_WORDS: &[(&str, &str)] = &[
    ("utilize", "use"),
    ("utilization", "use"),
    ("facilitate", "help"),
    ("commence", "start"),
    ("endeavor", "try"),
    ("conceptualization", "idea"),
    ("modification", "change"),
    ("approximately", "about"),
    ("demonstrate", "show"),
    ("subsequently", "later"),
];

static CONTRADICTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\balways\b[^.!?]*\bnever\b", "\"always\" contradicts \"never\""),
        (r"\beveryone\b[^.!?]*\bnobody\b", "\"everyone\" contradicts \"nobody\""),
        (r"\bimpossible\b[^.!?]*\bpossible\b", "\"impossible\" contradicts \"possible\""),
        (r"\bincreases?\b[^.!?]*\bdecreases?\b", "\"increases\" contradicts \"decreases\""),
        (r"\brises?\b[^.!?]*\bfalls?\b", "\"rises\" contradicts \"falls\""),
    ]
    .into_iter()
    .map(|(p, d)| (Regex::new(&format!("(?i){p}")).unwrap(), d))
    .collect()
});

static ILLOGICAL: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\b100% guaranteed?\b[^.!?]*\b(may|might)\b", "a 100% guarantee cannot be uncertain"),
        (r"\babsolutely all\b[^.!?]*\bexcept", "\"absolutely all\" cannot have exceptions"),
        (r"\bnever\b[^.!?]*\bsometimes\b", "\"never\" contradicts \"sometimes\""),
    ]
    .into_iter()
    .map(|(p, d)| (Regex::new(&format!("(?i){p}")).unwrap(), d))
    .collect()
});

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Za-z]+\b").unwrap());
static REPEATED_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;:]{2,}|[!?]{3,}").unwrap());
static SPACE_BEFORE_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z] +[,;:!?]").unwrap());
static MISSING_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z][,;][A-Za-z]|[a-z]{2}[.!?][A-Z][a-z]").unwrap());
static COULD_OF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(could|would|should|must) of\b").unwrap());
static ARTICLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([Aa]) ([aeiouAEIOU][a-z]+)").unwrap());

/// Words starting with a vowel letter that take "a"
const CONSONANT_SOUND: &[&str] = &["one", "once", "unique", "user", "usual", "useful", "union", "unit", "universal", "university", "euro", "uniform"];

#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorSummary {
    pub total_errors: usize,
    pub by_type: BTreeMap<ErrorType, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub avg_confidence: f64,
    pub critical_errors: usize,
}

impl ErrorSummary {
    pub fn count(&self, error_type: ErrorType) -> usize {
        self.by_type.get(&error_type).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TextStats {
    pub word_count: usize,
    pub sentence_count: usize,
    pub readability_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub summary: ErrorSummary,
    pub errors_by_type: BTreeMap<ErrorType, Vec<TextError>>,
    pub text_stats: TextStats,
    pub recommendations: Vec<String>,
}

/// Result of an auto-correction pass
#[derive(Debug, Clone, Serialize)]
pub struct Correction {
    pub text: String,
    pub applied: Vec<TextError>,
}

#[derive(Debug, Default)]
pub struct ErrorDetector {
    stats: Mutex<BTreeMap<ErrorType, u64>>,
}

impl ErrorDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every finding, ordered by start position
    pub fn detect_all(&self, content: &str) -> Vec<TextError> {
        let mut errors = Vec::new();
        errors.extend(check_spelling(content));
        errors.extend(check_punctuation(content));
        errors.extend(check_grammar(content));
        errors.extend(check_logic(content));
        errors.extend(check_repetition(content));
        errors.extend(check_style(content));
        errors.sort_by_key(|e| (e.span.start, e.span.end));

        if let Ok(mut stats) = self.stats.lock() {
            for e in &errors {
                *stats.entry(e.error_type).or_default() += 1;
            }
        }
        errors
    }

    /// Apply fixes with at least `min_confidence`, last span first. A fix
    /// is skipped if an earlier fix already touched its span.
    pub fn auto_correct(&self, content: &str, min_confidence: f64) -> Correction {
        let candidates: Vec<TextError> = self
            .detect_all(content)
            .into_iter()
            .filter(|e| e.confidence >= min_confidence && e.correction.is_some())
            .collect();

        let mut applied = Vec::new();
        let mut out = content.to_string();
        let mut ordered = candidates;
        ordered.sort_by(|a, b| b.span.start.cmp(&a.span.start));

        for error in ordered {
            let Some(replacement) = error.correction.clone() else {
                continue;
            };
            let (next, n) = text::apply_edits(
                &out,
                vec![Edit {
                    span: error.span.clone(),
                    original: error.original_text.clone(),
                    replacement,
                }],
            );
            if n == 1 && applied.last().map_or(true, |prev: &TextError| error.span.end <= prev.span.start) {
                out = next;
                applied.push(error);
            }
        }

        Correction { text: out, applied }
    }

    pub fn summary(&self, errors: &[TextError]) -> ErrorSummary {
        let mut summary = ErrorSummary {
            total_errors: errors.len(),
            ..Default::default()
        };
        if errors.is_empty() {
            return summary;
        }
        for e in errors {
            *summary.by_type.entry(e.error_type).or_default() += 1;
            *summary.by_severity.entry(e.severity).or_default() += 1;
            if e.severity == Severity::Critical {
                summary.critical_errors += 1;
            }
        }
        summary.avg_confidence = errors.iter().map(|e| e.confidence).sum::<f64>() / errors.len() as f64;
        summary
    }

    pub fn report(&self, content: &str) -> ErrorReport {
        let errors = self.detect_all(content);
        let summary = self.summary(&errors);
        let recommendations = recommendations(&summary);

        let mut errors_by_type: BTreeMap<ErrorType, Vec<TextError>> = BTreeMap::new();
        for e in errors {
            errors_by_type.entry(e.error_type).or_default().push(e);
        }

        ErrorReport {
            summary,
            errors_by_type,
            text_stats: TextStats {
                word_count: text::word_count(content),
                sentence_count: text::sentence_spans(content).len(),
                readability_score: text::flesch_reading_ease(content).unwrap_or(0.0),
            },
            recommendations,
        }
    }

    /// Findings per type since startup
    pub fn detection_stats(&self) -> BTreeMap<ErrorType, u64> {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Replace wordy phrases and complex words with their plain forms
pub fn simplify(content: &str) -> String {
    let mut edits = Vec::new();
    for (phrase, plain) in WORDY_PHRASES.iter().chain(COMPLEX_WORDS.iter()) {
        for m in phrase_regex(phrase).find_iter(content) {
            edits.push(Edit {
                span: m.range(),
                original: m.as_str().to_string(),
                replacement: text::match_case(m.as_str(), plain),
            });
        }
    }
    text::apply_edits(content, edits).0
}

fn phrase_regex(phrase: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase))).unwrap()
}

fn finding(
    content: &str,
    error_type: ErrorType,
    severity: Severity,
    span: Range<usize>,
    correction: Option<String>,
    suggestion: impl Into<String>,
    description: impl Into<String>,
    confidence: f64,
) -> TextError {
    TextError {
        error_type,
        severity,
        original_text: content[span.clone()].to_string(),
        context: text::context(content, &span, CONTEXT_RADIUS),
        span,
        correction,
        suggestion: suggestion.into(),
        description: description.into(),
        confidence,
    }
}

fn check_spelling(content: &str) -> Vec<TextError> {
    WORD_RE
        .find_iter(content)
        .filter_map(|m| {
            let lower = m.as_str().to_lowercase();
            let (_, right) = MISSPELLINGS.iter().find(|(wrong, _)| *wrong == lower)?;
            let fixed = text::match_case(m.as_str(), right);
            Some(finding(
                content,
                ErrorType::Spelling,
                Severity::Medium,
                m.range(),
                Some(fixed.clone()),
                format!("Replace with \"{fixed}\""),
                format!("Misspelling: \"{}\"", m.as_str()),
                0.9,
            ))
        })
        .collect()
}

fn check_punctuation(content: &str) -> Vec<TextError> {
    let mut errors = Vec::new();

    for m in REPEATED_PUNCT_RE.find_iter(content) {
        let first = &m.as_str()[..1];
        errors.push(finding(
            content,
            ErrorType::Punctuation,
            Severity::Low,
            m.range(),
            Some(first.to_string()),
            format!("Use a single \"{first}\""),
            "Repeated punctuation",
            0.9,
        ));
    }

    for m in SPACE_BEFORE_PUNCT_RE.find_iter(content) {
        let s = m.as_str();
        let fixed = format!("{}{}", &s[..1], s.trim_start_matches(|c: char| c.is_ascii_alphabetic()).trim_start());
        errors.push(finding(
            content,
            ErrorType::Punctuation,
            Severity::Low,
            m.range(),
            Some(fixed),
            "Remove the space before punctuation",
            "Space before punctuation",
            0.85,
        ));
    }

    for m in MISSING_SPACE_RE.find_iter(content) {
        let s = m.as_str();
        let Some(punct) = s.find(|c: char| ".!?,;".contains(c)) else {
            continue;
        };
        let split = punct + 1;
        // URLs and file names are left alone
        if content[..m.start()].rsplit(char::is_whitespace).next().is_some_and(|w| w.contains("://") || w.contains('/')) {
            continue;
        }
        errors.push(finding(
            content,
            ErrorType::Punctuation,
            Severity::Low,
            m.range(),
            Some(format!("{} {}", &s[..split], &s[split..])),
            "Add a space after punctuation",
            "Missing space after punctuation",
            0.85,
        ));
    }
    errors
}

fn check_grammar(content: &str) -> Vec<TextError> {
    let mut errors = Vec::new();

    for caps in COULD_OF_RE.captures_iter(content) {
        let (Some(m), Some(verb)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        errors.push(finding(
            content,
            ErrorType::Grammar,
            Severity::Medium,
            m.range(),
            Some(format!("{} have", verb.as_str())),
            format!("Use \"{} have\"", verb.as_str()),
            "\"of\" used instead of \"have\"",
            0.85,
        ));
    }

    for caps in ARTICLE_RE.captures_iter(content) {
        let (Some(m), Some(article), Some(word)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let lower = word.as_str().to_lowercase();
        if CONSONANT_SOUND.iter().any(|w| lower.starts_with(w)) {
            continue;
        }
        let fixed = format!("{}n {}", article.as_str(), word.as_str());
        errors.push(finding(
            content,
            ErrorType::Grammar,
            Severity::Low,
            m.range(),
            Some(fixed.clone()),
            format!("Use \"{fixed}\""),
            "\"a\" before a vowel sound",
            0.6,
        ));
    }
    errors
}

fn check_logic(content: &str) -> Vec<TextError> {
    let mut errors = Vec::new();
    for (re, description) in CONTRADICTIONS.iter() {
        for m in re.find_iter(content) {
            errors.push(finding(
                content,
                ErrorType::Logical,
                Severity::High,
                m.range(),
                None,
                "Resolve the contradiction",
                format!("Contradiction: {description}"),
                0.8,
            ));
        }
    }
    for (re, description) in ILLOGICAL.iter() {
        for m in re.find_iter(content) {
            errors.push(finding(
                content,
                ErrorType::Logical,
                Severity::Medium,
                m.range(),
                None,
                "Reconsider the reasoning of this statement",
                format!("Illogical statement: {description}"),
                0.7,
            ));
        }
    }
    errors
}

fn check_repetition(content: &str) -> Vec<TextError> {
    let spans = text::sentence_spans(content);
    let mut errors = Vec::new();

    for (i, first) in spans.iter().enumerate() {
        let a = &content[first.clone()];
        if text::word_count(a) <= 5 {
            continue;
        }
        for second in &spans[i + 1..] {
            let b = &content[second.clone()];
            let ratio = text::similarity_ratio(&a.to_lowercase(), &b.to_lowercase());
            if ratio > 0.8 {
                errors.push(finding(
                    content,
                    ErrorType::Repetition,
                    Severity::Medium,
                    second.clone(),
                    None,
                    "Remove the repetition or rephrase",
                    format!("Repeated sentence ({:.0}% similar)", ratio * 100.0),
                    0.9,
                ));
            }
        }
    }
    errors
}

fn check_style(content: &str) -> Vec<TextError> {
    let mut errors = Vec::new();

    for filler in FILLER_WORDS {
        for m in phrase_regex(filler).find_iter(content) {
            errors.push(finding(
                content,
                ErrorType::Style,
                Severity::Low,
                m.range(),
                None,
                "Remove the filler word",
                format!("Filler word: \"{filler}\""),
                0.8,
            ));
        }
    }

    for (phrase, plain) in WORDY_PHRASES {
        for m in phrase_regex(phrase).find_iter(content) {
            errors.push(finding(
                content,
                ErrorType::Style,
                Severity::Medium,
                m.range(),
                Some(text::match_case(m.as_str(), plain)),
                format!("Replace with \"{plain}\""),
                format!("Wordy phrase: \"{phrase}\""),
                0.7,
            ));
        }
    }

    for (word, plain) in COMPLEX_WORDS {
        for m in phrase_regex(word).find_iter(content) {
            errors.push(finding(
                content,
                ErrorType::Style,
                Severity::Low,
                m.range(),
                Some(text::match_case(m.as_str(), plain)),
                format!("Replace with \"{plain}\""),
                format!("Complex word: \"{word}\" could be \"{plain}\""),
                0.6,
            ));
        }
    }

    for span in text::sentence_spans(content) {
        let words = text::word_count(&content[span.clone()]);
        if words > MAX_STYLE_SENTENCE_WORDS {
            errors.push(finding(
                content,
                ErrorType::Style,
                Severity::Medium,
                span,
                None,
                "Split into several sentences",
                format!("Sentence is too long ({words} words)"),
                0.8,
            ));
        }
    }
    errors
}

fn recommendations(summary: &ErrorSummary) -> Vec<String> {
    let mut out = Vec::new();
    if summary.critical_errors > 0 {
        out.push("Fix critical errors before publishing".to_string());
    }
    if summary.count(ErrorType::Spelling) > 3 {
        out.push("Proofread the spelling more carefully".to_string());
    }
    if summary.count(ErrorType::Grammar) > 2 {
        out.push("Review the grammatical constructions".to_string());
    }
    if summary.count(ErrorType::Style) > 5 {
        out.push("Simplify the writing style".to_string());
    }
    if summary.count(ErrorType::Logical) > 0 {
        out.push("Check the logical flow of the argument".to_string());
    }
    if summary.total_errors > 0 && summary.avg_confidence < 0.7 {
        out.push("Manual review recommended: automatic fixes have low confidence".to_string());
    }
    out
}
