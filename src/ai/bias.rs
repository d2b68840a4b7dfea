//! Bias detection and mitigation
//!
//! Looks for gendered language, stereotypes, one-sided argument and loaded
//! wording, scores the text, and rewrites the spans that have a neutral
//! alternative.

use super::errors::Severity;
use super::text::{self, Edit};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::Mutex;

/// Default confidence needed before a span is rewritten
pub const AUTO_CORRECT_CONFIDENCE: f64 = 0.7;

const CONTEXT_RADIUS: usize = 50;

/// Certainty balance is only judged on texts longer than this
const BALANCE_MIN_WORDS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasType {
    Gender,
    Racial,
    Cultural,
    Age,
    Religious,
    Political,
    Socioeconomic,
    Confirmation,
    Selection,
    Linguistic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasDetection {
    pub bias_type: BiasType,
    pub severity: Severity,
    pub span: Range<usize>,
    pub original_text: String,
    pub problematic_terms: Vec<String>,
    /// Neutral rewrites of the span, best first
    pub alternatives: Vec<String>,
    pub advice: String,
    pub description: String,
    pub confidence: f64,
    pub context: String,
}

static GENDERED_TERMS: &[(&str, &str)] = &[
    ("businessman", "businessperson"),
    ("businessmen", "businesspeople"),
    ("chairman", "chairperson"),
    ("chairmen", "chairpersons"),
    ("cleaning lady", "cleaner"),
    ("fireman", "firefighter"),
    ("firemen", "firefighters"),
    ("mailman", "mail carrier"),
    ("mankind", "humankind"),
    ("manpower", "workforce"),
    ("man-made", "synthetic"),
    ("policeman", "police officer"),
    ("policemen", "police officers"),
    ("salesman", "salesperson"),
    ("stewardess", "flight attendant"),
    ("waitress", "server"),
];

/// Direct rewrites, checked before a detection's own alternatives
static REPLACEMENTS: &[(&str, &str)] = &[
    ("all men", "many men"),
    ("all women", "many women"),
    ("all experts agree", "many experts agree"),
    ("the only way", "one way"),
    ("there is no alternative", "there are few alternatives"),
    ("it is obvious that", "it appears that"),
    ("absolutely certain", "very likely"),
    ("cannot be denied", "is hard to dispute"),
];

static GENDER_STEREOTYPES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\ball (men|women)\s+\w+", "Generalisation about a whole gender"),
        (r"\b(men|women) are better\s+(at\s+)?\w+", "Claim of one gender's superiority"),
        (r"\b(men|women) (always|never)\s+\w+", "Generalisation about a whole gender"),
        (r"\btypically (male|female|masculine|feminine)\s+\w+", "Gender typing"),
    ]
    .into_iter()
    .map(|(p, d)| (Regex::new(&format!("(?i){p}")).unwrap(), d))
    .collect()
});

static STEREOTYPE_TRAITS: &[(&str, &[&str])] = &[
    ("men", &["aggressive", "emotionless", "dominant", "insensitive"]),
    ("women", &["emotional", "weak", "irrational", "hysterical", "dependent"]),
];

static CULTURAL_GENERALISATIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    text::compile_all(&[
        r"\ball\s+(\w+(ans|ese|ish)|nations|peoples)\s+(are|have)\s+\w+",
        r"\b\w+(ans|ese|ish)\s+are\s+always\s+\w+",
        r"\ba\s+typical\s+\w+(an|ese|ish)\s+\w+",
        r"\b\w+\s+are\s+by\s+nature\s+\w+",
    ])
});

static CULTURAL_STEREOTYPES: &[(&str, &[&str])] = &[
    ("western culture", &["civilized", "civilised", "superior", "advanced"]),
    ("eastern culture", &["backward", "primitive"]),
    ("africans", &["primitive", "uncivilized", "savage"]),
    ("asians", &["robotic", "secretive"]),
];

static CONFIRMATION_INDICATORS: &[&str] = &[
    "obviously",
    "it is obvious that",
    "it is well known that",
    "there is no doubt",
    "undoubtedly",
    "without question",
    "it goes without saying",
    "needless to say",
];

static ONE_SIDED: Lazy<Vec<Regex>> = Lazy::new(|| {
    text::compile_all(&[
        r"\bonly\s+\w+\s+can\b",
        r"\bthe only way\b",
        r"\bthere is no alternative\b",
        r"\bno other way\b",
        r"\ball experts agree\b",
    ])
});

const POSITIVE_ASPECTS: &[&str] = &["advantages", "benefits", "pros", "strengths", "upsides"];
const NEGATIVE_ASPECTS: &[&str] = &["disadvantages", "drawbacks", "cons", "risks", "limitations", "downsides"];

const POSITIVE_EMOTIVE: &[&str] = &[
    "magnificent", "amazing", "incredible", "fantastic", "brilliant", "superb", "wonderful", "astonishing",
];
const NEGATIVE_EMOTIVE: &[&str] = &[
    "terrible", "disgusting", "horrible", "catastrophic", "monstrous", "hideous", "dreadful", "appalling",
];
const INTENSIFIERS: &[&str] = &[
    "absolutely", "completely", "totally", "extremely", "exceptionally", "utterly", "entirely", "excessively",
];
const HEDGES: &[&str] = &[
    "perhaps", "probably", "maybe", "possibly", "presumably", "apparently", "seemingly", "likely",
];

#[derive(Debug, Clone, Serialize)]
pub struct BiasReport {
    pub bias_score: f64,
    pub total_detections: usize,
    pub detections_by_type: BTreeMap<BiasType, Vec<BiasDetection>>,
    pub severity_distribution: BTreeMap<Severity, usize>,
    pub recommendations: Vec<String>,
    pub word_count: usize,
    pub sentence_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BiasCorrection {
    pub text: String,
    pub applied: Vec<BiasDetection>,
}

#[derive(Debug, Default)]
pub struct BiasDetector {
    stats: Mutex<BTreeMap<BiasType, u64>>,
}

impl BiasDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every detection, ordered by start position
    pub fn detect_all(&self, content: &str) -> Vec<BiasDetection> {
        let mut found = Vec::new();
        found.extend(detect_gender(content));
        found.extend(detect_cultural(content));
        found.extend(detect_confirmation(content));
        found.extend(detect_linguistic(content));
        found.sort_by_key(|d| (d.span.start, d.span.end));

        if let Ok(mut stats) = self.stats.lock() {
            for d in &found {
                *stats.entry(d.bias_type).or_default() += 1;
            }
        }
        found
    }

    pub fn report(&self, content: &str) -> BiasReport {
        let detections = self.detect_all(content);
        let word_count = text::word_count(content);
        let bias_score = bias_score(&detections, word_count);

        let mut severity_distribution = BTreeMap::new();
        for d in &detections {
            *severity_distribution.entry(d.severity).or_default() += 1;
        }
        let recommendations = recommendations(&detections, bias_score);

        let total_detections = detections.len();
        let mut detections_by_type: BTreeMap<BiasType, Vec<BiasDetection>> = BTreeMap::new();
        for d in detections {
            detections_by_type.entry(d.bias_type).or_default().push(d);
        }

        BiasReport {
            bias_score,
            total_detections,
            detections_by_type,
            severity_distribution,
            recommendations,
            word_count,
            sentence_count: text::sentence_spans(content).len(),
        }
    }

    /// Rewrite detections with at least `min_confidence` that have a
    /// neutral alternative
    pub fn auto_correct(&self, content: &str, min_confidence: f64) -> BiasCorrection {
        let detections: Vec<BiasDetection> = self
            .detect_all(content)
            .into_iter()
            .filter(|d| d.confidence >= min_confidence)
            .collect();

        let mut edits = Vec::new();
        let mut candidates = Vec::new();
        for d in detections {
            if let Some(replacement) = rewrite(&d) {
                edits.push(Edit {
                    span: d.span.clone(),
                    original: d.original_text.clone(),
                    replacement,
                });
                candidates.push(d);
            }
        }

        // Mirror the selection apply_edits makes: back to front, no overlap
        candidates.sort_by(|a, b| b.span.start.cmp(&a.span.start).then(b.span.end.cmp(&a.span.end)));
        let mut applied = Vec::new();
        let mut floor = content.len();
        for d in candidates {
            if d.span.end <= floor {
                floor = d.span.start;
                applied.push(d);
            }
        }

        let (text, _) = text::apply_edits(content, edits);
        BiasCorrection { text, applied }
    }

    pub fn detection_stats(&self) -> BTreeMap<BiasType, u64> {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// `min(1, Σ severity_weight · confidence / (words / 100))`
pub fn bias_score(detections: &[BiasDetection], word_count: usize) -> f64 {
    if detections.is_empty() || word_count == 0 {
        return 0.0;
    }
    let total: f64 = detections.iter().map(|d| d.severity.weight() * d.confidence).sum();
    (total / (word_count as f64 / 100.0)).min(1.0)
}

fn rewrite(detection: &BiasDetection) -> Option<String> {
    let original = &detection.original_text;

    for (biased, neutral) in REPLACEMENTS.iter().chain(GENDERED_TERMS.iter()) {
        if let Some(m) = word_regex(biased).find(original) {
            let replaced = text::match_case(m.as_str(), neutral);
            return Some(format!("{}{}{}", &original[..m.start()], replaced, &original[m.end()..]));
        }
    }

    detection
        .alternatives
        .first()
        .map(|alt| text::match_case(original, alt))
}

#[allow(clippy::too_many_arguments)]
fn detection(
    content: &str,
    bias_type: BiasType,
    severity: Severity,
    span: Range<usize>,
    alternatives: Vec<String>,
    advice: &str,
    description: String,
    confidence: f64,
) -> BiasDetection {
    let original_text = content[span.clone()].to_string();
    BiasDetection {
        bias_type,
        severity,
        problematic_terms: vec![original_text.to_lowercase()],
        original_text,
        context: text::context(content, &span, CONTEXT_RADIUS),
        span,
        alternatives,
        advice: advice.to_string(),
        description,
        confidence,
    }
}

/// Spans a finding about the text as a whole
fn whole_text(content: &str, bias_type: BiasType, severity: Severity, advice: &str, description: &str, confidence: f64) -> BiasDetection {
    BiasDetection {
        bias_type,
        severity,
        span: 0..content.len(),
        original_text: String::new(),
        problematic_terms: Vec::new(),
        alternatives: Vec::new(),
        advice: advice.to_string(),
        description: description.to_string(),
        confidence,
        context: "whole text".to_string(),
    }
}

fn word_regex(word: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).unwrap()
}

fn count_words(content: &str, words: &[&str]) -> usize {
    words.iter().map(|w| word_regex(w).find_iter(content).count()).sum()
}

fn detect_gender(content: &str) -> Vec<BiasDetection> {
    let mut found = Vec::new();

    for (term, neutral) in GENDERED_TERMS {
        for m in word_regex(term).find_iter(content) {
            found.push(detection(
                content,
                BiasType::Gender,
                Severity::Medium,
                m.range(),
                vec![neutral.to_string()],
                "Use gender-neutral wording",
                format!("Gendered term: \"{term}\""),
                0.7,
            ));
        }
    }

    for (re, description) in GENDER_STEREOTYPES.iter() {
        for m in re.find_iter(content) {
            found.push(detection(
                content,
                BiasType::Gender,
                Severity::High,
                m.range(),
                Vec::new(),
                "Avoid generalisations",
                description.to_string(),
                0.8,
            ));
        }
    }

    for span in text::sentence_spans(content) {
        let sentence = content[span.clone()].to_lowercase();
        for (group, traits) in STEREOTYPE_TRAITS {
            if !word_regex(group).is_match(&sentence) {
                continue;
            }
            if let Some(trait_word) = traits.iter().find(|t| word_regex(t).is_match(&sentence)) {
                found.push(detection(
                    content,
                    BiasType::Gender,
                    Severity::Medium,
                    span.clone(),
                    Vec::new(),
                    "Use more neutral wording",
                    format!("Stereotyped association: {group} / {trait_word}"),
                    0.6,
                ));
            }
        }
    }
    found
}

fn detect_cultural(content: &str) -> Vec<BiasDetection> {
    let mut found = Vec::new();

    for span in text::sentence_spans(content) {
        let sentence = content[span.clone()].to_lowercase();
        for (culture, stereotypes) in CULTURAL_STEREOTYPES {
            if !sentence.contains(culture) {
                continue;
            }
            for stereotype in stereotypes.iter().filter(|s| word_regex(s).is_match(&sentence)) {
                found.push(detection(
                    content,
                    BiasType::Cultural,
                    Severity::High,
                    span.clone(),
                    Vec::new(),
                    "Avoid cultural stereotypes",
                    format!("Cultural stereotype: {culture} / {stereotype}"),
                    0.7,
                ));
            }
        }
    }

    for re in CULTURAL_GENERALISATIONS.iter() {
        for m in re.find_iter(content) {
            found.push(detection(
                content,
                BiasType::Cultural,
                Severity::High,
                m.range(),
                Vec::new(),
                "Use more specific wording",
                "Generalisation about a nation or culture".to_string(),
                0.8,
            ));
        }
    }
    found
}

fn detect_confirmation(content: &str) -> Vec<BiasDetection> {
    let mut found = Vec::new();

    for indicator in CONFIRMATION_INDICATORS {
        for m in word_regex(indicator).find_iter(content) {
            found.push(detection(
                content,
                BiasType::Confirmation,
                Severity::Medium,
                m.range(),
                Vec::new(),
                "Present evidence and consider alternatives",
                format!("Certainty indicator: \"{indicator}\""),
                0.6,
            ));
        }
    }

    for re in ONE_SIDED.iter() {
        for m in re.find_iter(content) {
            found.push(detection(
                content,
                BiasType::Confirmation,
                Severity::High,
                m.range(),
                Vec::new(),
                "Consider other points of view",
                "One-sided statement with no alternatives considered".to_string(),
                0.7,
            ));
        }
    }

    let positive = count_words(content, POSITIVE_ASPECTS);
    let negative = count_words(content, NEGATIVE_ASPECTS);
    if positive > 0 && negative == 0 {
        found.push(whole_text(
            content,
            BiasType::Confirmation,
            Severity::Medium,
            "Cover drawbacks and limitations too",
            "Only positive aspects are presented",
            0.5,
        ));
    } else if negative > 0 && positive == 0 {
        found.push(whole_text(
            content,
            BiasType::Confirmation,
            Severity::Medium,
            "Cover benefits and opportunities too",
            "Only negative aspects are presented",
            0.5,
        ));
    }
    found
}

fn detect_linguistic(content: &str) -> Vec<BiasDetection> {
    let mut found = Vec::new();

    let emotive = POSITIVE_EMOTIVE
        .iter()
        .map(|w| (w, Severity::Medium, "positive", "notable"))
        .chain(NEGATIVE_EMOTIVE.iter().map(|w| (w, Severity::High, "negative", "problematic")));
    for (word, severity, tone, neutral) in emotive {
        for m in word_regex(word).find_iter(content) {
            found.push(detection(
                content,
                BiasType::Linguistic,
                severity,
                m.range(),
                vec![neutral.to_string()],
                "Use more neutral terms",
                format!("Emotionally loaded word ({tone}): \"{word}\""),
                0.7,
            ));
        }
    }

    let intensifiers: Vec<(&str, Range<usize>)> = INTENSIFIERS
        .iter()
        .flat_map(|w| word_regex(w).find_iter(content).map(move |m| (*w, m.range())).collect::<Vec<_>>())
        .collect();
    if intensifiers.len() > 3 {
        for (word, span) in &intensifiers {
            found.push(detection(
                content,
                BiasType::Linguistic,
                Severity::Medium,
                span.clone(),
                Vec::new(),
                "Use fewer intensifiers",
                format!("Overused intensifier: \"{word}\""),
                0.6,
            ));
        }
    }

    let words = text::word_count(content);
    if words > BALANCE_MIN_WORDS {
        let hedge_ratio = count_words(content, HEDGES) as f64 / words as f64;
        let intensifier_ratio = intensifiers.len() as f64 / words as f64;
        if intensifier_ratio > 0.02 && hedge_ratio < 0.005 {
            found.push(whole_text(
                content,
                BiasType::Linguistic,
                Severity::Medium,
                "Qualify claims where appropriate",
                "Text is too categorical",
                0.5,
            ));
        } else if hedge_ratio > 0.03 && intensifier_ratio < 0.005 {
            found.push(whole_text(
                content,
                BiasType::Linguistic,
                Severity::Low,
                "State well-supported claims with more confidence",
                "Text is too uncertain",
                0.4,
            ));
        }
    }
    found
}

fn recommendations(detections: &[BiasDetection], score: f64) -> Vec<String> {
    let mut out = vec![if score > 0.7 {
        "High level of bias: the text needs substantial rework"
    } else if score > 0.4 {
        "Moderate level of bias: corrections recommended"
    } else if score > 0.2 {
        "Low level of bias: minor improvements possible"
    } else {
        "Practically no bias detected"
    }
    .to_string()];

    let types: BTreeSet<BiasType> = detections.iter().map(|d| d.bias_type).collect();
    for t in types {
        let line = match t {
            BiasType::Gender => "Use gender-neutral wording",
            BiasType::Cultural | BiasType::Racial => "Avoid cultural stereotypes and generalisations",
            BiasType::Confirmation | BiasType::Selection => "Present alternative points of view",
            BiasType::Linguistic => "Balance the emotional tone of the text",
            BiasType::Age | BiasType::Religious | BiasType::Political | BiasType::Socioeconomic => {
                "Avoid generalisations about social groups"
            }
        };
        out.push(line.to_string());
    }
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gendered_terms() {
        let found = detect_gender("The chairman met a Stewardess.");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].alternatives, vec!["chairperson"]);
        assert_eq!(found[0].severity, Severity::Medium);
    }

    #[test]
    fn test_gender_generalisation() {
        let found = detect_gender("All women love shopping.");
        assert!(found.iter().any(|d| d.severity == Severity::High));
    }

    #[test]
    fn test_cultural_generalisation() {
        let found = detect_cultural("All Europeans are punctual.");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bias_type, BiasType::Cultural);
    }

    #[test]
    fn test_argument_balance() {
        let one_sided = detect_confirmation("The benefits are many. The advantages are clear.");
        assert!(one_sided.iter().any(|d| d.description.contains("positive")));
        let balanced = detect_confirmation("The benefits are many, but there are drawbacks.");
        assert!(balanced.is_empty());
    }

    #[test]
    fn test_intensifiers_need_more_than_three() {
        assert!(detect_linguistic("It is absolutely, completely, totally fine.").is_empty());
        let found = detect_linguistic("It is absolutely, completely, totally, utterly fine.");
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_too_categorical() {
        let mut text = "Absolutely entirely completely wrong. ".to_string();
        text.push_str(&"plain words here ".repeat(40));
        let found = detect_linguistic(&text);
        assert!(found.iter().any(|d| d.description == "Text is too categorical"));
    }

    #[test]
    fn test_bias_score() {
        let detector = BiasDetector::new();
        let detections = detector.detect_all("The chairman spoke.");
        // 0.5 * 0.7 over 3 words
        assert_eq!(bias_score(&detections, 3), 1.0);
        assert_eq!(bias_score(&[], 100), 0.0);
        let long = format!("The chairman spoke. {}", "filler ".repeat(97));
        let score = bias_score(&detector.detect_all(&long), text::word_count(&long));
        assert!((score - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_auto_correct() {
        let detector = BiasDetector::new();
        let fixed = detector.auto_correct(
            "Our Chairman says the only way forward is a terrible plan.",
            AUTO_CORRECT_CONFIDENCE,
        );
        assert_eq!(fixed.text, "Our Chairperson says one way forward is a problematic plan.");
        assert_eq!(fixed.applied.len(), 3);
    }

    #[test]
    fn test_rewrite_keeps_offsets_after_wide_lowercase() {
        let text = "İİ chairman";
        let d = detection(
            text,
            BiasType::Gender,
            Severity::Medium,
            0..text.len(),
            Vec::new(),
            "Use gender-neutral wording",
            String::new(),
            0.7,
        );
        assert_eq!(rewrite(&d).as_deref(), Some("İİ chairperson"));
    }

    #[test]
    fn test_report() {
        let report = BiasDetector::new().report("All men are strong. The fireman is amazing.");
        assert!(report.total_detections >= 3);
        assert!(report.detections_by_type.contains_key(&BiasType::Gender));
        assert!(report.detections_by_type.contains_key(&BiasType::Linguistic));
        assert!(report.recommendations[0].starts_with("High"));
        assert!(report.recommendations.iter().any(|r| r.contains("gender-neutral")));
    }
}
