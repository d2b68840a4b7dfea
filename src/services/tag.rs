//! Tag service
//!
//! Tags are created on demand when posts are saved, so most lookups go
//! through `get_or_create`. The tag cloud is cached and cleared on any tag
//! or post write.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{PostRepository, TagRepository};
use crate::models::{
    CreateTagInput, ListParams, PagedResult, Post, PostFilter, Tag, TagCloudEntry, UpdateTagInput,
};
use crate::services::slug::{generate_slug, unique_slug};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

const TAG_CLOUD_CACHE_TTL_SECS: u64 = 600;

const MAX_TAG_NAME_LENGTH: usize = 50;

const MAX_LIST_LIMIT: i64 = 200;

pub(crate) const CACHE_KEY_TAG_CLOUD: &str = "tag:cloud:";

#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("Tag name already exists: {0}")]
    DuplicateName(String),

    #[error("Tag not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct TagService {
    repo: Arc<dyn TagRepository>,
    post_repo: Arc<dyn PostRepository>,
    cache: Arc<Cache>,
}

impl TagService {
    pub fn new(
        repo: Arc<dyn TagRepository>,
        post_repo: Arc<dyn PostRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            repo,
            post_repo,
            cache,
        }
    }

    pub async fn create(&self, input: CreateTagInput) -> Result<Tag, TagServiceError> {
        let name = validate_name(&input.name)?;
        if self
            .repo
            .get_by_name(&name)
            .await
            .context("Failed to check tag name")?
            .is_some()
        {
            return Err(TagServiceError::DuplicateName(name));
        }

        let mut tag = Tag::new(name.clone(), self.free_slug(&name, None).await?);
        tag.description = input.description.filter(|d| !d.trim().is_empty());
        if let Some(color) = input.color {
            tag.color = color;
        }

        let created = self.repo.create(&tag).await.context("Failed to create tag")?;
        self.invalidate_cache().await;
        Ok(created)
    }

    /// Find a tag by name, case-insensitively, or create it
    pub async fn get_or_create(&self, name: &str) -> Result<Tag, TagServiceError> {
        let name = validate_name(name)?;
        if let Some(tag) = self
            .repo
            .get_by_name(&name)
            .await
            .context("Failed to get tag by name")?
        {
            return Ok(tag);
        }

        let tag = Tag::new(name.clone(), self.free_slug(&name, None).await?);
        let created = self.repo.create(&tag).await.context("Failed to create tag")?;
        tracing::debug!(tag_id = created.id, name = %created.name, "Tag created on demand");
        Ok(created)
    }

    /// Resolve a list of names to tag IDs, deduplicated in input order.
    /// Blank names are skipped.
    pub async fn resolve_names(&self, names: &[String]) -> Result<Vec<i64>, TagServiceError> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names.iter().filter(|n| !n.trim().is_empty()) {
            let tag = self.get_or_create(name).await?;
            if !ids.contains(&tag.id) {
                ids.push(tag.id);
            }
        }
        Ok(ids)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get tag")?
            .ok_or_else(|| TagServiceError::NotFound(id.to_string()))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get tag by slug")?
            .ok_or_else(|| TagServiceError::NotFound(slug.to_string()))
    }

    /// Tags by name, or by usage when `popular` is set
    pub async fn list(&self, search: Option<&str>, popular: bool, limit: i64) -> Result<Vec<Tag>, TagServiceError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        Ok(self
            .repo
            .list(search, popular, limit.clamp(1, MAX_LIST_LIMIT))
            .await
            .context("Failed to list tags")?)
    }

    /// Weighted tag cloud over published posts
    pub async fn cloud(&self, limit: i64) -> Result<Vec<TagCloudEntry>, TagServiceError> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        let cache_key = format!("{}{}", CACHE_KEY_TAG_CLOUD, limit);
        if let Ok(Some(cached)) = self.cache.get::<Vec<TagCloudEntry>>(&cache_key).await {
            return Ok(cached);
        }

        let counts = self
            .repo
            .usage_counts(limit)
            .await
            .context("Failed to get tag usage")?;
        let cloud = build_cloud(counts);

        let _ = self
            .cache
            .set(&cache_key, &cloud, Duration::from_secs(TAG_CLOUD_CACHE_TTL_SECS))
            .await;
        Ok(cloud)
    }

    pub async fn autocomplete(&self, prefix: &str, limit: i64) -> Result<Vec<Tag>, TagServiceError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let escaped = prefix.replace('%', "").replace('_', "");
        Ok(self
            .repo
            .autocomplete(&escaped, limit.clamp(1, 50))
            .await
            .context("Failed to autocomplete tags")?)
    }

    pub async fn update(&self, id: i64, input: UpdateTagInput) -> Result<Tag, TagServiceError> {
        let mut tag = self.get_by_id(id).await?;

        if let Some(name) = input.name {
            let name = validate_name(&name)?;
            if !name.eq_ignore_ascii_case(&tag.name) {
                if let Some(other) = self.repo.get_by_name(&name).await.context("Failed to check tag name")? {
                    if other.id != id {
                        return Err(TagServiceError::DuplicateName(name));
                    }
                }
                tag.slug = self.free_slug(&name, Some(id)).await?;
            }
            tag.name = name;
        }
        if let Some(description) = input.description {
            tag.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(color) = input.color {
            tag.color = color;
        }

        let updated = self.repo.update(&tag).await.context("Failed to update tag")?;
        self.invalidate_cache().await;
        Ok(updated)
    }

    /// Delete a tag. Post links are removed by cascade.
    pub async fn delete(&self, id: i64) -> Result<(), TagServiceError> {
        self.get_by_id(id).await?;
        self.repo.delete(id).await.context("Failed to delete tag")?;
        self.invalidate_cache().await;
        Ok(())
    }

    /// Published posts carrying the tag
    pub async fn posts(&self, slug: &str, params: &ListParams) -> Result<(Tag, PagedResult<Post>), TagServiceError> {
        let tag = self.get_by_slug(slug).await?;
        let filter = PostFilter {
            tag_id: Some(tag.id),
            ..PostFilter::published()
        };
        let (posts, total) = self
            .post_repo
            .list(&filter, params)
            .await
            .context("Failed to list posts by tag")?;
        Ok((tag, PagedResult::new(posts, total, params)))
    }

    pub async fn for_post(&self, post_id: i64) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self
            .repo
            .get_by_post_id(post_id)
            .await
            .context("Failed to get post tags")?)
    }

    /// Replace a post's tag set and recount usage for every tag touched
    pub async fn set_post_tags(&self, post_id: i64, tag_ids: &[i64]) -> Result<(), TagServiceError> {
        let mut touched: Vec<i64> = self.for_post(post_id).await?.iter().map(|t| t.id).collect();
        self.repo
            .set_post_tags(post_id, tag_ids)
            .await
            .context("Failed to set post tags")?;

        touched.extend_from_slice(tag_ids);
        touched.sort_unstable();
        touched.dedup();
        self.refresh_usage(&touched).await
    }

    pub async fn refresh_usage(&self, tag_ids: &[i64]) -> Result<(), TagServiceError> {
        if tag_ids.is_empty() {
            return Ok(());
        }
        self.repo
            .refresh_usage(tag_ids)
            .await
            .context("Failed to refresh tag usage")?;
        self.invalidate_cache().await;
        Ok(())
    }

    async fn free_slug(&self, name: &str, exclude: Option<i64>) -> Result<String, TagServiceError> {
        Ok(unique_slug(&generate_slug(name), |candidate| async move {
            self.repo.exists_by_slug(&candidate, exclude).await
        })
        .await?)
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern("tag:*").await;
    }
}

/// Map usage counts linearly onto sizes 1..=5. When every count is equal
/// all entries get size 3.
pub fn build_cloud(counts: Vec<(Tag, i64)>) -> Vec<TagCloudEntry> {
    let min = counts.iter().map(|(_, c)| *c).min().unwrap_or(0);
    let max = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);

    counts
        .into_iter()
        .map(|(tag, count)| {
            let size = if max == min {
                3
            } else {
                (1 + (4 * (count - min)) / (max - min)) as u8
            };
            TagCloudEntry {
                name: tag.name,
                slug: tag.slug,
                count,
                size,
            }
        })
        .collect()
}

fn validate_name(name: &str) -> Result<String, TagServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TagServiceError::ValidationError("Tag name cannot be empty".into()));
    }
    if name.chars().count() > MAX_TAG_NAME_LENGTH {
        return Err(TagServiceError::ValidationError(format!(
            "Tag name must be at most {} characters",
            MAX_TAG_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{SqlxPostRepository, SqlxTagRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, TagService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = TagService::new(
            SqlxTagRepository::boxed(pool.clone()),
            SqlxPostRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
        );
        (pool, service)
    }

    async fn insert_post(pool: &DynDatabasePool, slug: &str) -> i64 {
        let sqlite = pool.as_sqlite().unwrap();
        sqlx::query("INSERT OR IGNORE INTO users (id, username, email, password_hash) VALUES (1, 'u', 'u@example.com', 'h')")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query("INSERT INTO posts (title, slug, content, author_id, is_published) VALUES (?, ?, 'x', 1, 1)")
            .bind(slug)
            .bind(slug)
            .execute(sqlite)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    fn tag(name: &str) -> Tag {
        Tag::new(name.into(), name.to_lowercase())
    }

    #[test]
    fn test_build_cloud_scaling() {
        let cloud = build_cloud(vec![(tag("a"), 10), (tag("b"), 5), (tag("c"), 1)]);
        assert_eq!(cloud[0].size, 5);
        assert_eq!(cloud[1].size, 2);
        assert_eq!(cloud[2].size, 1);

        let flat = build_cloud(vec![(tag("a"), 4), (tag("b"), 4)]);
        assert!(flat.iter().all(|e| e.size == 3));
        assert!(build_cloud(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_get_or_create_is_case_insensitive() {
        let (_pool, service) = setup_test_service().await;
        let first = service.get_or_create("Rust").await.unwrap();
        let again = service.get_or_create("  rust ").await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(first.slug, "rust");

        let ids = service
            .resolve_names(&["Rust".into(), "".into(), "Async".into(), "RUST".into()])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let (_pool, service) = setup_test_service().await;
        let input = |name: &str| CreateTagInput {
            name: name.into(),
            description: None,
            color: None,
        };
        service.create(input("Web")).await.unwrap();
        assert!(matches!(
            service.create(input("web")).await,
            Err(TagServiceError::DuplicateName(_))
        ));
        assert!(matches!(
            service.create(input("   ")).await,
            Err(TagServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_post_tags_usage_and_cloud() {
        let (pool, service) = setup_test_service().await;
        let p1 = insert_post(&pool, "one").await;
        let p2 = insert_post(&pool, "two").await;

        let ids = service.resolve_names(&["Rust".into(), "Go".into()]).await.unwrap();
        service.set_post_tags(p1, &ids).await.unwrap();
        service.set_post_tags(p2, &ids[..1]).await.unwrap();

        let rust = service.get_by_slug("rust").await.unwrap();
        assert_eq!(rust.usage_count, 2);

        let cloud = service.cloud(10).await.unwrap();
        assert_eq!(cloud[0].slug, "rust");
        assert_eq!(cloud[0].size, 5);
        assert_eq!(cloud[1].size, 1);

        service.set_post_tags(p1, &[]).await.unwrap();
        assert_eq!(service.get_by_slug("go").await.unwrap().usage_count, 0);

        let (_, posts) = service.posts("rust", &ListParams::default()).await.unwrap();
        assert_eq!(posts.total, 1);
    }

    #[tokio::test]
    async fn test_autocomplete() {
        let (_pool, service) = setup_test_service().await;
        for name in ["Rust", "Ruby", "Go"] {
            service.get_or_create(name).await.unwrap();
        }
        let hits = service.autocomplete("ru", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(service.autocomplete("  ", 10).await.unwrap().is_empty());
    }
}
