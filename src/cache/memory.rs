//! In-memory cache implementation using moka
//!
//! Entries are stored as JSON so any serializable value can be cached, and
//! each entry carries its own TTL through a moka `Expiry` policy.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_MAX_CAPACITY: u64 = 10_000;

const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
    ttl: Duration,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
            ttl,
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// Expire each entry after the TTL it was written with
struct PerEntryTtl;

impl Expiry<String, CacheEntry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache using moka
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    /// 10,000 entries, one hour default TTL
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache, default_ttl }
    }

    /// TTL services use when they have no specific one
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Glob match where `*` is any run of characters and `?` is exactly one
    fn pattern_matches(pattern: &str, key: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        let key: Vec<char> = key.chars().collect();

        // Iterative matcher with single-star backtracking
        let (mut p, mut k) = (0, 0);
        let mut star: Option<(usize, usize)> = None;
        while k < key.len() {
            if p < pattern.len() && (pattern[p] == '?' || pattern[p] == key[k]) {
                p += 1;
                k += 1;
            } else if p < pattern.len() && pattern[p] == '*' {
                star = Some((p, k));
                p += 1;
            } else if let Some((star_p, star_k)) = star {
                p = star_p + 1;
                k = star_k + 1;
                star = Some((star_p, star_k + 1));
            } else {
                return false;
            }
        }
        pattern[p..].iter().all(|c| *c == '*')
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, ttl)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| Self::pattern_matches(pattern, key.as_ref()))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys {
            self.cache.invalidate(&key).await;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();
        cache
            .set("post:slug:hello", &vec![1, 2, 3], Duration::from_secs(60))
            .await
            .unwrap();

        let hit: Option<Vec<i32>> = cache.get("post:slug:hello").await.unwrap();
        assert_eq!(hit, Some(vec![1, 2, 3]));
        let miss: Option<Vec<i32>> = cache.get("post:slug:other").await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_per_entry_ttl() {
        let cache = MemoryCache::with_capacity_and_ttl(100, Duration::from_secs(3600));
        cache.set("short", &"a", Duration::from_millis(20)).await.unwrap();
        cache.set("long", &"b", Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        cache.cache.run_pending_tasks().await;

        assert_eq!(cache.get::<String>("short").await.unwrap(), None);
        assert_eq!(cache.get::<String>("long").await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("post:slug:a", &1, ttl).await.unwrap();
        cache.set("post:slug:b", &2, ttl).await.unwrap();
        cache.set("tag:cloud", &3, ttl).await.unwrap();

        cache.delete_pattern("post:*").await.unwrap();

        assert_eq!(cache.get::<i32>("post:slug:a").await.unwrap(), None);
        assert_eq!(cache.get::<i32>("post:slug:b").await.unwrap(), None);
        assert_eq!(cache.get::<i32>("tag:cloud").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCache::new();
        cache.set("k", &"v", Duration::from_secs(60)).await.unwrap();
        cache.clear().await.unwrap();
        assert_eq!(cache.get::<String>("k").await.unwrap(), None);
    }

    #[test]
    fn test_pattern_matching() {
        assert!(MemoryCache::pattern_matches("post:*", "post:slug:x"));
        assert!(MemoryCache::pattern_matches("user:?:profile", "user:1:profile"));
        assert!(!MemoryCache::pattern_matches("user:?:profile", "user:12:profile"));
        assert!(MemoryCache::pattern_matches("*", ""));
        assert!(MemoryCache::pattern_matches("a*b*c", "axxbyyc"));
        assert!(!MemoryCache::pattern_matches("a*b", "ac"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(50))]

            #[test]
            fn prefix_pattern_matches_any_suffix(prefix in "[a-z:]{0,10}", suffix in "[a-z0-9:]{0,10}") {
                let key = format!("{}{}", prefix, suffix);
                let pattern = format!("{}*", prefix);
                prop_assert!(MemoryCache::pattern_matches(&pattern, &key));
            }

            #[test]
            fn literal_pattern_matches_only_itself(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
                prop_assert_eq!(MemoryCache::pattern_matches(&a, &b), a == b);
            }
        }
    }
}
