//! Slug generation
//!
//! Slugs are derived from a title or name and made unique by appending
//! `-1`, `-2`, … until the candidate is free.

use anyhow::Result;
use std::future::Future;

/// Longest base slug kept before a numeric suffix is added
pub const MAX_SLUG_LENGTH: usize = 180;

/// Used when a title has no characters that survive slugging
const FALLBACK_SLUG: &str = "untitled";

/// Generate a URL-friendly slug.
///
/// Lowercases, keeps ASCII alphanumerics and non-ASCII letters, turns every
/// other character into a hyphen, then collapses and trims hyphens.
pub fn generate_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut prev_hyphen = true;

    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric()) {
            slug.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen {
            slug.push('-');
            prev_hyphen = true;
        }
    }

    let slug = slug.trim_end_matches('-');
    match slug.char_indices().nth(MAX_SLUG_LENGTH) {
        Some((idx, _)) => slug[..idx].trim_end_matches('-').to_string(),
        None => slug.to_string(),
    }
}

/// Find the first free slug for `base`: `base`, then `base-1`, `base-2`, …
///
/// `exists` reports whether a candidate is already taken.
pub async fn unique_slug<F, Fut>(base: &str, mut exists: F) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let base = if base.is_empty() { FALLBACK_SLUG } else { base };

    if !exists(base.to_string()).await? {
        return Ok(base.to_string());
    }

    let mut counter = 1u32;
    loop {
        let candidate = format!("{}-{}", base, counter);
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("  Rust & Go: a comparison!  "), "rust-go-a-comparison");
        assert_eq!(generate_slug("snake_case__title"), "snake-case-title");
        assert_eq!(generate_slug("Привет мир"), "привет-мир");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[test]
    fn test_generate_slug_truncates() {
        let long = "word ".repeat(100);
        let slug = generate_slug(&long);
        assert!(slug.chars().count() <= MAX_SLUG_LENGTH);
        assert!(!slug.ends_with('-'));
    }

    #[tokio::test]
    async fn test_unique_slug_appends_counter() {
        let taken: HashSet<String> = ["hello", "hello-1"].iter().map(|s| s.to_string()).collect();
        let slug = unique_slug("hello", |candidate| {
            let hit = taken.contains(&candidate);
            async move { Ok(hit) }
        })
        .await
        .unwrap();
        assert_eq!(slug, "hello-2");

        let free = unique_slug("fresh", |_| async { Ok(false) }).await.unwrap();
        assert_eq!(free, "fresh");

        let fallback = unique_slug("", |_| async { Ok(false) }).await.unwrap();
        assert_eq!(fallback, "untitled");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn slug_has_no_edge_or_double_hyphens(text in ".{0,80}") {
                let slug = generate_slug(&text);
                prop_assert!(!slug.starts_with('-'));
                prop_assert!(!slug.ends_with('-'));
                prop_assert!(!slug.contains("--"));
                prop_assert!(slug.chars().all(|c| c == '-' || c.is_alphanumeric()));
            }

            #[test]
            fn slug_is_idempotent(text in "[a-zA-Z0-9 _.-]{0,60}") {
                let once = generate_slug(&text);
                prop_assert_eq!(generate_slug(&once), once);
            }
        }
    }
}
