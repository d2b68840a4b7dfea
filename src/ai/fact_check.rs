//! Claim extraction and verification
//!
//! Sentences that look like factual claims (percentages, years, "studies
//! show", large quantities) are checked against the configured lookups.
//! Results are memoised in the shared cache for an hour.

use super::text;
use crate::cache::{Cache, CacheLayer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// At most this many claims are checked per text
pub const MAX_CLAIMS: usize = 10;

/// Credibility when a text makes no checkable claims
pub const NEUTRAL_CREDIBILITY: f64 = 0.8;

const CLAIM_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Cosine similarity above which a summary supports a claim
const SUPPORT_THRESHOLD: f64 = 0.3;

static CLAIM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    text::compile_all(&[
        r"\d+(\.\d+)?\s*%",
        r"\b(1[5-9]|20)\d{2}\b",
        r"\bstud(y|ies)\s+(show|shows|found|suggests?)\b",
        r"\baccording\s+to\s+(the\s+)?(data|statistics|research)\b",
        r"\bstatistics\s+(show|shows|indicate)\b",
        r"\d+\s*(million|thousand|billion)\b",
    ])
});

static STOPWORDS: &[&str] = &[
    "about", "according", "after", "also", "because", "been", "between", "data", "from",
    "have", "into", "more", "most", "over", "show", "shows", "some", "statistics", "studies",
    "study", "than", "that", "their", "there", "these", "they", "this", "through", "were",
    "what", "when", "which", "while", "with", "would",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Verified,
    Unverified,
    Disputed,
}

/// Result of checking a single claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimCheck {
    pub claim: String,
    pub status: ClaimStatus,
    pub confidence: f64,
    pub sources: Vec<String>,
    pub evidence: Vec<String>,
}

impl ClaimCheck {
    fn unverified(claim: &str) -> Self {
        Self {
            claim: claim.to_string(),
            status: ClaimStatus::Unverified,
            confidence: 0.5,
            sources: Vec::new(),
            evidence: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactCheckReport {
    pub total_claims: usize,
    pub verified_claims: usize,
    pub disputed_claims: usize,
    pub unverified_claims: usize,
    pub claim_details: Vec<ClaimCheck>,
    pub credibility_score: f64,
}

/// What a lookup found for a claim
#[derive(Debug, Clone, Default)]
pub struct LookupOutcome {
    pub verified: bool,
    pub disputed: bool,
    pub evidence: Vec<String>,
}

/// An external source claims can be checked against
#[async_trait]
pub trait ClaimLookup: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the source has nothing to say about the claim
    async fn check(&self, claim: &str) -> Result<Option<LookupOutcome>>;
}

/// Checks claims against page summaries from a Wikipedia REST endpoint
pub struct WikipediaLookup {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PageSummary {
    extract: Option<String>,
}

impl WikipediaLookup {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("Inkwell-FactCheck")
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ClaimLookup for WikipediaLookup {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    async fn check(&self, claim: &str) -> Result<Option<LookupOutcome>> {
        for keyword in keywords(claim).into_iter().take(3) {
            let url = format!("{}/{}", self.base_url, keyword);
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("Failed to fetch {url}"))?;
            if !response.status().is_success() {
                continue;
            }

            let summary: PageSummary = response
                .json()
                .await
                .context("Failed to parse page summary")?;
            let Some(extract) = summary.extract else {
                continue;
            };

            if text::cosine_similarity(claim, &extract) > SUPPORT_THRESHOLD {
                return Ok(Some(LookupOutcome {
                    verified: true,
                    disputed: false,
                    evidence: vec![text::head(&extract, 200).to_string()],
                }));
            }
        }
        Ok(None)
    }
}

/// Candidate lookup keys: capitalised words first, then other long words
fn keywords(claim: &str) -> Vec<String> {
    let mut proper = Vec::new();
    let mut other = Vec::new();
    for token in text::word_tokens(claim) {
        if token.chars().count() <= 3 || token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if STOPWORDS.contains(&token.to_lowercase().as_str()) {
            continue;
        }
        let bucket = if token.chars().next().is_some_and(char::is_uppercase) {
            &mut proper
        } else {
            &mut other
        };
        if !bucket.iter().any(|k: &String| k.eq_ignore_ascii_case(token)) {
            bucket.push(token.to_string());
        }
    }
    proper.extend(other);
    proper.truncate(5);
    proper
}

pub struct FactChecker {
    cache: Arc<Cache>,
    lookups: Vec<Arc<dyn ClaimLookup>>,
}

impl FactChecker {
    /// A checker with no lookups marks every claim unverified
    pub fn new(cache: Arc<Cache>) -> Self {
        Self {
            cache,
            lookups: Vec::new(),
        }
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn ClaimLookup>) -> Self {
        self.lookups.push(lookup);
        self
    }

    /// Sentences that contain a checkable claim
    pub fn extract_claims(&self, content: &str) -> Vec<String> {
        text::sentences(content)
            .into_iter()
            .filter(|s| CLAIM_PATTERNS.iter().any(|re| re.is_match(s)))
            .take(MAX_CLAIMS)
            .map(str::to_string)
            .collect()
    }

    pub async fn check_facts(&self, content: &str) -> FactCheckReport {
        let claims = self.extract_claims(content);
        let mut report = FactCheckReport {
            total_claims: claims.len(),
            ..Default::default()
        };

        for claim in &claims {
            let check = self.verify_claim(claim).await;
            match check.status {
                ClaimStatus::Verified => report.verified_claims += 1,
                ClaimStatus::Disputed => report.disputed_claims += 1,
                ClaimStatus::Unverified => report.unverified_claims += 1,
            }
            report.claim_details.push(check);
        }

        report.credibility_score = if report.total_claims == 0 {
            NEUTRAL_CREDIBILITY
        } else {
            (report.verified_claims as f64 + report.unverified_claims as f64 * 0.5)
                / report.total_claims as f64
        };
        report
    }

    pub async fn verify_claim(&self, claim: &str) -> ClaimCheck {
        let key = format!("fact:{:x}", md5::compute(claim.as_bytes()));
        if let Ok(Some(cached)) = self.cache.get::<ClaimCheck>(&key).await {
            return cached;
        }

        let mut check = ClaimCheck::unverified(claim);
        for lookup in &self.lookups {
            match lookup.check(claim).await {
                Ok(Some(outcome)) => {
                    check.sources.push(lookup.name().to_string());
                    check.evidence.extend(outcome.evidence);
                    if outcome.verified {
                        check.status = ClaimStatus::Verified;
                        check.confidence = check.confidence.max(0.8);
                    } else if outcome.disputed {
                        check.status = ClaimStatus::Disputed;
                        check.confidence = check.confidence.min(0.3);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(source = lookup.name(), error = %e, "Claim lookup failed");
                }
            }
        }

        let _ = self.cache.set(&key, &check, CLAIM_CACHE_TTL).await;
        check
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedLookup {
        outcome: LookupOutcome,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ClaimLookup for FixedLookup {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn check(&self, _claim: &str) -> Result<Option<LookupOutcome>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(self.outcome.clone()))
        }
    }

    struct FailingLookup;

    #[async_trait]
    impl ClaimLookup for FailingLookup {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn check(&self, _claim: &str) -> Result<Option<LookupOutcome>> {
            anyhow::bail!("network unreachable")
        }
    }

    fn cache() -> Arc<Cache> {
        Arc::new(Cache::new())
    }

    #[test]
    fn test_extract_claims() {
        let checker = FactChecker::new(cache());
        let claims = checker.extract_claims(
            "Rust is a language. Adoption grew 40% last year. Studies show developers like it. \
             It was first released in 2015. Nothing here.",
        );
        assert_eq!(claims.len(), 3);
        assert!(claims[0].contains("40%"));
    }

    #[test]
    fn test_claims_are_capped() {
        let checker = FactChecker::new(cache());
        let text = "Growth was 5%. ".repeat(20);
        assert_eq!(checker.extract_claims(&text).len(), MAX_CLAIMS);
    }

    #[test]
    fn test_keywords_prefer_proper_nouns() {
        let keys = keywords("According to data, Mozilla started the project in 2006 with volunteers");
        assert_eq!(keys[0], "Mozilla");
        assert!(!keys.iter().any(|k| k == "2006"));
    }

    #[tokio::test]
    async fn test_no_claims_is_neutral() {
        let checker = FactChecker::new(cache());
        let report = checker.check_facts("A plain sentence without numbers.").await;
        assert_eq!(report.total_claims, 0);
        assert_eq!(report.credibility_score, NEUTRAL_CREDIBILITY);
    }

    #[tokio::test]
    async fn test_unverified_claims_score_half() {
        let checker = FactChecker::new(cache()).with_lookup(Arc::new(FailingLookup));
        let report = checker.check_facts("Usage rose 12% in 2020.").await;
        assert_eq!(report.unverified_claims, 1);
        assert!((report.credibility_score - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_verified_claim_is_memoised() {
        let lookup = Arc::new(FixedLookup {
            outcome: LookupOutcome {
                verified: true,
                disputed: false,
                evidence: vec!["summary".into()],
            },
            calls: AtomicUsize::new(0),
        });
        let checker = FactChecker::new(cache()).with_lookup(lookup.clone());

        let first = checker.check_facts("Usage rose 12% in 2020.").await;
        assert_eq!(first.verified_claims, 1);
        assert_eq!(first.credibility_score, 1.0);

        checker.check_facts("Usage rose 12% in 2020.").await;
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disputed_claim() {
        let lookup = Arc::new(FixedLookup {
            outcome: LookupOutcome {
                verified: false,
                disputed: true,
                evidence: Vec::new(),
            },
            calls: AtomicUsize::new(0),
        });
        let checker = FactChecker::new(cache()).with_lookup(lookup);
        let check = checker.verify_claim("Half of all users quit in 2019.").await;
        assert_eq!(check.status, ClaimStatus::Disputed);
        assert_eq!(check.confidence, 0.3);
    }
}
