//! Text helpers shared by the analysers
//!
//! Everything here works on byte offsets into the original `&str`, so spans
//! can be sliced straight back out of the source text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::ops::Range;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());
static SENTENCE_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+(\s+|$)|\n{2,}").unwrap());
static VOWEL_GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[aeiouy]+").unwrap());

/// Compile a fixed, case-insensitive pattern list
pub(crate) fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
        .collect()
}

/// Whitespace-separated words
pub fn words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Alphanumeric word tokens, without punctuation
pub fn word_tokens(text: &str) -> impl Iterator<Item = &str> {
    WORD_RE.find_iter(text).map(|m| m.as_str())
}

/// Sentence spans. A sentence ends at `.`, `!` or `?` followed by whitespace
/// (or end of text), or at a blank line.
pub fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END_RE.find_iter(text) {
        let end = m.start() + m.as_str().trim_end().len();
        push_trimmed(text, start, end, &mut spans);
        start = m.end();
    }
    push_trimmed(text, start, text.len(), &mut spans);
    spans
}

fn push_trimmed(text: &str, start: usize, end: usize, spans: &mut Vec<Range<usize>>) {
    if start >= end {
        return;
    }
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    if !trimmed.is_empty() {
        spans.push(start + lead..start + lead + trimmed.len());
    }
}

pub fn sentences(text: &str) -> Vec<&str> {
    sentence_spans(text).into_iter().map(|r| &text[r]).collect()
}

/// Similarity of two strings as `2·M / T`, where `M` is the number of
/// characters in matching blocks found by repeatedly taking the longest
/// common substring, and `T` the total number of characters.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(&a, &b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    2.0 * matched as f64 / total as f64
}

fn longest_match(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; bhi - blo + 1];

    for i in alo..ahi {
        let mut row = vec![0usize; bhi - blo + 1];
        for j in blo..bhi {
            if a[i] == b[j] {
                let len = prev[j - blo] + 1;
                row[j - blo + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = row;
    }
    best
}

/// Cosine similarity of lowercase bag-of-words vectors
pub fn cosine_similarity(a: &str, b: &str) -> f64 {
    let va = term_counts(a);
    let vb = term_counts(b);
    if va.is_empty() || vb.is_empty() {
        return 0.0;
    }

    let dot: f64 = va
        .iter()
        .filter_map(|(term, x)| vb.get(term).map(|y| x * y))
        .sum();
    let norm = |v: &HashMap<String, f64>| v.values().map(|x| x * x).sum::<f64>().sqrt();
    dot / (norm(&va) * norm(&vb))
}

fn term_counts(text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for token in word_tokens(text).filter(|t| t.chars().count() > 2) {
        *counts.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Share of distinct words among words longer than three characters
pub fn lexical_diversity(text: &str) -> f64 {
    let long: Vec<String> = word_tokens(text)
        .filter(|w| w.chars().count() > 3)
        .map(str::to_lowercase)
        .collect();
    if long.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&String> = long.iter().collect();
    unique.len() as f64 / long.len() as f64
}

/// English syllable estimate: vowel groups, minus a silent trailing `e`
pub fn syllables(word: &str) -> usize {
    let lower = word.to_lowercase();
    let mut count = VOWEL_GROUP_RE.find_iter(&lower).count();
    if count > 1 && lower.ends_with('e') && !lower.ends_with("le") {
        count -= 1;
    }
    count.max(1)
}

/// Flesch reading ease, or `None` when the text has no sentences or words
pub fn flesch_reading_ease(text: &str) -> Option<f64> {
    let sentence_count = sentence_spans(text).len();
    let tokens: Vec<&str> = word_tokens(text).collect();
    if sentence_count == 0 || tokens.is_empty() {
        return None;
    }
    let syllable_count: usize = tokens.iter().map(|w| syllables(w)).sum();
    let words = tokens.len() as f64;
    Some(206.835 - 1.015 * (words / sentence_count as f64) - 84.6 * (syllable_count as f64 / words))
}

/// Up to `radius` characters either side of `span`
pub fn context(text: &str, span: &Range<usize>, radius: usize) -> String {
    let start = text[..span.start]
        .char_indices()
        .rev()
        .nth(radius.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let end = text[span.end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| span.end + i)
        .unwrap_or(text.len());
    text[start..end].to_string()
}

/// Truncate to `max` characters
pub fn head(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// A replacement of `original` at `span`
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub span: Range<usize>,
    pub original: String,
    pub replacement: String,
}

/// Apply edits from the end of the text backwards.
///
/// An edit is skipped when its span no longer holds `original`, is not on
/// char boundaries, or overlaps an edit already applied. Returns the new
/// text and the number of edits applied.
pub fn apply_edits(text: &str, mut edits: Vec<Edit>) -> (String, usize) {
    edits.sort_by(|a, b| b.span.start.cmp(&a.span.start).then(b.span.end.cmp(&a.span.end)));

    let mut out = text.to_string();
    let mut applied = 0;
    let mut floor = text.len();

    for edit in edits {
        let Range { start, end } = edit.span.clone();
        if end > floor || start > end {
            continue;
        }
        if !out.is_char_boundary(start) || !out.is_char_boundary(end) {
            continue;
        }
        if out[start..end] != edit.original {
            continue;
        }
        out.replace_range(start..end, &edit.replacement);
        floor = start;
        applied += 1;
    }
    (out, applied)
}

/// Keep the case of the first letter of `original` on `replacement`
pub fn match_case(original: &str, replacement: &str) -> String {
    let upper = original.chars().next().is_some_and(char::is_uppercase);
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) if upper => first.to_uppercase().chain(chars).collect(),
        _ => replacement.to_string(),
    }
}
