//! Post service
//!
//! Implements business logic for blog posts:
//! - create and update with validation, unique slugs and markdown rendering
//! - tag attachment by name
//! - published listings with filters, sort and pagination
//! - featured, popular, trending and related posts
//! - permission checks for edit, delete and publish
//!
//! Category post counts, author post counts and tag usage are recounted
//! after every write that can change them.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{CategoryRepository, PostRepository, UserRepository};
use crate::models::{
    truncate_chars, CreatePostInput, ListParams, PagedResult, Post, PostDetail, PostFilter,
    PostSort, UpdatePostInput, User,
};
use crate::services::markdown::{plain_text, MarkdownRenderer};
use crate::services::slug::{generate_slug, unique_slug};
use crate::services::tag::{TagService, TagServiceError};
use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

const POST_CACHE_TTL_SECS: u64 = 1800;

const MAX_TITLE_LENGTH: usize = 200;

/// Length of generated excerpts, in characters
const EXCERPT_LENGTH: usize = 200;

const CACHE_KEY_POST_BY_SLUG: &str = "post:slug:";

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TagServiceError> for PostServiceError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::ValidationError(msg) => PostServiceError::ValidationError(msg),
            TagServiceError::InternalError(e) => PostServiceError::InternalError(e),
            other => PostServiceError::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

pub struct PostService {
    repo: Arc<dyn PostRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    user_repo: Arc<dyn UserRepository>,
    tags: Arc<TagService>,
    cache: Arc<Cache>,
    renderer: MarkdownRenderer,
    cache_ttl: Duration,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        user_repo: Arc<dyn UserRepository>,
        tags: Arc<TagService>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            repo,
            category_repo,
            user_repo,
            tags,
            cache,
            renderer: MarkdownRenderer::new(),
            cache_ttl: Duration::from_secs(POST_CACHE_TTL_SECS),
        }
    }

    /// Create a post
    ///
    /// # Errors
    /// - `ValidationError` for an empty or oversized title, empty content,
    ///   an unknown category or a bad tag name
    pub async fn create(&self, author: &User, input: CreatePostInput) -> Result<PostDetail, PostServiceError> {
        let title = validate_title(&input.title)?;
        validate_content(&input.content)?;
        if let Some(category_id) = input.category_id {
            self.require_category(category_id).await?;
        }
        let tag_ids = self.tags.resolve_names(&input.tags).await?;

        let slug = self.free_slug(&title, None).await?;
        let mut post = Post::new(title, slug, input.content, author.id);
        post.content_html = self.renderer.render(&post.content);
        post.excerpt = excerpt_or_generated(input.excerpt, &post.content);
        post.category_id = input.category_id;
        post.is_featured = input.is_featured;
        post.allow_comments = input.allow_comments;
        post.meta_title = input.meta_title.filter(|m| !m.trim().is_empty());
        post.meta_description = input.meta_description.filter(|m| !m.trim().is_empty());
        post.ai_generated = input.ai_generated;
        post.validation_metadata = input.validation_metadata;
        if input.is_published {
            post.publish();
        }

        let created = self.repo.create(&post).await.context("Failed to create post")?;
        self.tags.set_post_tags(created.id, &tag_ids).await?;
        self.refresh_counters(&created, None).await?;
        self.invalidate_cache().await;

        tracing::info!(
            post_id = created.id,
            slug = %created.slug,
            published = created.is_published,
            "Post created"
        );
        self.detail(created).await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))
    }

    /// Post with author, category and tags. Cached per slug.
    pub async fn get_by_slug(&self, slug: &str) -> Result<PostDetail, PostServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_POST_BY_SLUG, slug);
        if let Ok(Some(detail)) = self.cache.get::<PostDetail>(&cache_key).await {
            return Ok(detail);
        }

        let post = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get post by slug")?
            .ok_or_else(|| PostServiceError::NotFound(slug.to_string()))?;
        let detail = self.detail(post).await?;

        let _ = self.cache.set(&cache_key, &detail, self.cache_ttl).await;
        Ok(detail)
    }

    /// Attach author name, category and tags
    pub async fn detail(&self, post: Post) -> Result<PostDetail, PostServiceError> {
        let author_username = self
            .user_repo
            .get_by_id(post.author_id)
            .await
            .context("Failed to get post author")?
            .map(|u| u.username)
            .unwrap_or_default();
        let category = match post.category_id {
            Some(id) => self
                .category_repo
                .get_by_id(id)
                .await
                .context("Failed to get post category")?,
            None => None,
        };
        let tags = self.tags.for_post(post.id).await?;

        Ok(PostDetail {
            post,
            author_username,
            category,
            tags,
        })
    }

    /// Any posts matching the filter, drafts included unless the filter says otherwise
    pub async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<PagedResult<Post>, PostServiceError> {
        let (posts, total) = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(posts, total, params))
    }

    pub async fn list_published(
        &self,
        filter: PostFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let filter = PostFilter {
            published_only: true,
            ..filter
        };
        self.list(&filter, params).await
    }

    /// An author's posts. Drafts are included only for the author themself or an editor.
    pub async fn list_by_author(
        &self,
        author_id: i64,
        viewer: Option<&User>,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let include_drafts = viewer.is_some_and(|u| u.can_edit(author_id));
        let filter = PostFilter {
            author_id: Some(author_id),
            published_only: !include_drafts,
            ..PostFilter::default()
        };
        self.list(&filter, params).await
    }

    pub async fn featured(&self, limit: u32) -> Result<Vec<Post>, PostServiceError> {
        let filter = PostFilter {
            featured_only: true,
            sort_by: PostSort::PublishedAt,
            ..PostFilter::published()
        };
        Ok(self.list(&filter, &ListParams::new(1, limit)).await?.items)
    }

    /// Published posts with the most views overall
    pub async fn popular(&self, limit: u32) -> Result<Vec<Post>, PostServiceError> {
        let filter = PostFilter {
            sort_by: PostSort::Views,
            ..PostFilter::published()
        };
        Ok(self.list(&filter, &ListParams::new(1, limit)).await?.items)
    }

    /// Published posts with the most views in the last `days` days
    pub async fn trending(&self, days: i64, limit: i64) -> Result<Vec<Post>, PostServiceError> {
        let since = Utc::now() - ChronoDuration::days(days.max(1));
        Ok(self
            .repo
            .trending(since, limit.clamp(1, 100))
            .await
            .context("Failed to get trending posts")?)
    }

    /// Posts sharing tags with `id`, then posts in the same category
    pub async fn related(&self, id: i64, limit: i64) -> Result<Vec<Post>, PostServiceError> {
        self.get_by_id(id).await?;
        Ok(self
            .repo
            .related(id, limit.clamp(1, 50))
            .await
            .context("Failed to get related posts")?)
    }

    pub async fn update(&self, id: i64, actor: &User, input: UpdatePostInput) -> Result<PostDetail, PostServiceError> {
        let mut post = self.get_by_id(id).await?;
        if !actor.can_edit(post.author_id) {
            return Err(PostServiceError::Forbidden("You cannot edit this post".into()));
        }
        let previous = post.clone();

        if let Some(title) = input.title {
            let title = validate_title(&title)?;
            if title != post.title {
                post.slug = self.free_slug(&title, Some(id)).await?;
                post.title = title;
            }
        }
        if let Some(content) = input.content {
            validate_content(&content)?;
            post.content_html = self.renderer.render(&content);
            post.reading_time = crate::models::reading_time(&content);
            post.content = content;
        }
        if let Some(excerpt) = input.excerpt {
            post.excerpt = excerpt_or_generated(Some(excerpt), &post.content);
        }
        if let Some(category_id) = input.category_id {
            self.require_category(category_id).await?;
            post.category_id = Some(category_id);
        }
        if let Some(is_featured) = input.is_featured {
            post.is_featured = is_featured;
        }
        if let Some(allow_comments) = input.allow_comments {
            post.allow_comments = allow_comments;
        }
        if let Some(meta_title) = input.meta_title {
            post.meta_title = Some(meta_title).filter(|m| !m.trim().is_empty());
        }
        if let Some(meta_description) = input.meta_description {
            post.meta_description = Some(meta_description).filter(|m| !m.trim().is_empty());
        }
        match input.is_published {
            Some(true) => post.publish(),
            Some(false) => post.unpublish(),
            None => {}
        }

        let updated = self.repo.update(&post).await.context("Failed to update post")?;
        if let Some(names) = input.tags {
            let tag_ids = self.tags.resolve_names(&names).await?;
            self.tags.set_post_tags(id, &tag_ids).await?;
        }
        self.refresh_counters(&updated, Some(&previous)).await?;
        self.invalidate_cache().await;

        self.detail(updated).await
    }

    /// Delete a post. Only its author or an admin may do this.
    pub async fn delete(&self, id: i64, actor: &User) -> Result<(), PostServiceError> {
        let post = self.get_by_id(id).await?;
        if !actor.can_delete(post.author_id) {
            return Err(PostServiceError::Forbidden("You cannot delete this post".into()));
        }
        let tag_ids: Vec<i64> = self.tags.for_post(id).await?.iter().map(|t| t.id).collect();

        self.repo.delete(id).await.context("Failed to delete post")?;

        self.tags.refresh_usage(&tag_ids).await?;
        if let Some(category_id) = post.category_id {
            self.category_repo
                .refresh_post_count(category_id)
                .await
                .context("Failed to refresh category count")?;
        }
        self.repo
            .refresh_author_count(post.author_id)
            .await
            .context("Failed to refresh author count")?;
        self.invalidate_cache().await;

        tracing::info!(post_id = id, actor_id = actor.id, "Post deleted");
        Ok(())
    }

    pub async fn publish(&self, id: i64, actor: &User) -> Result<Post, PostServiceError> {
        self.set_published(id, actor, true).await
    }

    pub async fn unpublish(&self, id: i64, actor: &User) -> Result<Post, PostServiceError> {
        self.set_published(id, actor, false).await
    }

    pub async fn count_published(&self) -> Result<i64, PostServiceError> {
        Ok(self
            .repo
            .count_published()
            .await
            .context("Failed to count posts")?)
    }

    async fn set_published(&self, id: i64, actor: &User, published: bool) -> Result<Post, PostServiceError> {
        let mut post = self.get_by_id(id).await?;
        if !actor.can_edit(post.author_id) {
            return Err(PostServiceError::Forbidden("You cannot publish this post".into()));
        }
        if post.is_published == published {
            return Ok(post);
        }
        let previous = post.clone();

        if published {
            post.publish();
        } else {
            post.unpublish();
        }
        let updated = self.repo.update(&post).await.context("Failed to update post")?;

        let tag_ids: Vec<i64> = self.tags.for_post(id).await?.iter().map(|t| t.id).collect();
        self.tags.refresh_usage(&tag_ids).await?;
        self.refresh_counters(&updated, Some(&previous)).await?;
        self.invalidate_cache().await;

        tracing::info!(post_id = id, published, "Post publication changed");
        Ok(updated)
    }

    /// Recount category and author totals touched by a write
    async fn refresh_counters(&self, post: &Post, previous: Option<&Post>) -> Result<(), PostServiceError> {
        let mut categories: Vec<i64> = post.category_id.into_iter().collect();
        if let Some(old) = previous.and_then(|p| p.category_id) {
            if !categories.contains(&old) {
                categories.push(old);
            }
        }
        for category_id in categories {
            self.category_repo
                .refresh_post_count(category_id)
                .await
                .context("Failed to refresh category count")?;
        }

        self.repo
            .refresh_author_count(post.author_id)
            .await
            .context("Failed to refresh author count")?;
        let _ = self.cache.delete_pattern("category:*").await;
        Ok(())
    }

    async fn require_category(&self, id: i64) -> Result<(), PostServiceError> {
        match self
            .category_repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
        {
            Some(_) => Ok(()),
            None => Err(PostServiceError::ValidationError(format!(
                "Category {} does not exist",
                id
            ))),
        }
    }

    async fn free_slug(&self, title: &str, exclude: Option<i64>) -> Result<String, PostServiceError> {
        Ok(unique_slug(&generate_slug(title), |candidate| async move {
            self.repo.exists_by_slug(&candidate, exclude).await
        })
        .await?)
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern("post:*").await;
    }
}

fn validate_title(title: &str) -> Result<String, PostServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PostServiceError::ValidationError("Post title cannot be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(PostServiceError::ValidationError(format!(
            "Post title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> Result<(), PostServiceError> {
    if content.trim().is_empty() {
        return Err(PostServiceError::ValidationError("Post content cannot be empty".into()));
    }
    Ok(())
}

fn excerpt_or_generated(excerpt: Option<String>, content: &str) -> Option<String> {
    match excerpt.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
        Some(excerpt) => Some(excerpt),
        None => {
            let text = plain_text(content).replace('\n', " ");
            Some(truncate_chars(&text, EXCERPT_LENGTH)).filter(|e| !e.is_empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxPostRepository, SqlxTagRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Category, UserRole};

    struct Fixture {
        pool: DynDatabasePool,
        service: PostService,
        author: User,
        other: User,
        editor: User,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let cache = Arc::new(MemoryCache::new());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let tags = Arc::new(TagService::new(
            SqlxTagRepository::boxed(pool.clone()),
            post_repo.clone(),
            cache.clone(),
        ));
        let service = PostService::new(
            post_repo,
            SqlxCategoryRepository::boxed(pool.clone()),
            user_repo.clone(),
            tags,
            cache,
        );

        let mut users = Vec::new();
        for (name, role) in [
            ("author", UserRole::Author),
            ("other", UserRole::Author),
            ("editor", UserRole::Editor),
        ] {
            let user = User::new(name.into(), format!("{}@example.com", name), "h".into(), role);
            users.push(user_repo.create(&user).await.unwrap());
        }
        let editor = users.pop().unwrap();
        let other = users.pop().unwrap();
        let author = users.pop().unwrap();

        Fixture {
            pool,
            service,
            author,
            other,
            editor,
        }
    }

    fn input(title: &str, published: bool) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            content: "# Heading\n\nSome **markdown** body text.".to_string(),
            is_published: published,
            allow_comments: true,
            tags: vec!["Rust".into(), "Web".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_renders_and_tags() {
        let f = setup().await;
        let detail = f.service.create(&f.author, input("Hello World", true)).await.unwrap();

        assert_eq!(detail.post.slug, "hello-world");
        assert!(detail.post.content_html.contains("<strong>markdown</strong>"));
        assert_eq!(detail.post.reading_time, 1);
        assert!(detail.post.published_at.is_some());
        assert_eq!(detail.author_username, "author");
        assert_eq!(detail.tags.len(), 2);
        assert_eq!(detail.post.excerpt.as_deref(), Some("Heading Some markdown body text."));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = setup().await;
        let mut empty_title = input("   ", false);
        assert!(matches!(
            f.service.create(&f.author, empty_title.clone()).await,
            Err(PostServiceError::ValidationError(_))
        ));

        empty_title.title = "T".into();
        empty_title.content = " ".into();
        assert!(matches!(
            f.service.create(&f.author, empty_title.clone()).await,
            Err(PostServiceError::ValidationError(_))
        ));

        empty_title.content = "body".into();
        empty_title.category_id = Some(42);
        assert!(matches!(
            f.service.create(&f.author, empty_title).await,
            Err(PostServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_titles_get_suffixed_slugs() {
        let f = setup().await;
        let a = f.service.create(&f.author, input("Same", false)).await.unwrap();
        let b = f.service.create(&f.author, input("Same", false)).await.unwrap();
        let c = f.service.create(&f.author, input("Same", false)).await.unwrap();
        assert_eq!(a.post.slug, "same");
        assert_eq!(b.post.slug, "same-1");
        assert_eq!(c.post.slug, "same-2");
    }

    #[tokio::test]
    async fn test_permissions() {
        let f = setup().await;
        let post = f.service.create(&f.author, input("Mine", false)).await.unwrap().post;

        let change = UpdatePostInput {
            title: Some("Changed".into()),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update(post.id, &f.other, change.clone()).await,
            Err(PostServiceError::Forbidden(_))
        ));
        let updated = f.service.update(post.id, &f.editor, change).await.unwrap();
        assert_eq!(updated.post.slug, "changed");

        assert!(matches!(
            f.service.delete(post.id, &f.editor).await,
            Err(PostServiceError::Forbidden(_))
        ));
        f.service.delete(post.id, &f.author).await.unwrap();
        assert!(matches!(
            f.service.get_by_id(post.id).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_updates_counters() {
        let f = setup().await;
        let category = SqlxCategoryRepository::new(f.pool.clone())
            .create(&Category::new("Tech".into(), "tech".into()))
            .await
            .unwrap();

        let mut draft = input("Draft", false);
        draft.category_id = Some(category.id);
        let post = f.service.create(&f.author, draft).await.unwrap().post;
        assert!(post.published_at.is_none());

        let published = f.service.publish(post.id, &f.author).await.unwrap();
        let first_published_at = published.published_at;
        assert!(first_published_at.is_some());

        let sqlite = f.pool.as_sqlite().unwrap();
        let (cat_count,): (i64,) = sqlx::query_as("SELECT posts_count FROM categories WHERE id = ?")
            .bind(category.id)
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(cat_count, 1);
        let (author_count,): (i64,) = sqlx::query_as("SELECT posts_count FROM users WHERE id = ?")
            .bind(f.author.id)
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(author_count, 1);

        f.service.unpublish(post.id, &f.author).await.unwrap();
        let again = f.service.publish(post.id, &f.author).await.unwrap();
        assert_eq!(again.published_at, first_published_at);
    }

    #[tokio::test]
    async fn test_listings() {
        let f = setup().await;
        f.service.create(&f.author, input("Public one", true)).await.unwrap();
        f.service.create(&f.author, input("Public two", true)).await.unwrap();
        f.service.create(&f.author, input("Hidden", false)).await.unwrap();

        let page = f
            .service
            .list_published(PostFilter::default(), &ListParams::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        let own = f
            .service
            .list_by_author(f.author.id, Some(&f.author), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(own.total, 3);
        let public = f
            .service
            .list_by_author(f.author.id, Some(&f.other), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(public.total, 2);

        let search = PostFilter {
            search: Some("two".into()),
            ..Default::default()
        };
        assert_eq!(
            f.service
                .list_published(search, &ListParams::default())
                .await
                .unwrap()
                .total,
            1
        );
        assert_eq!(f.service.trending(7, 10).await.unwrap().len(), 2);
        assert_eq!(f.service.count_published().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_by_slug_cache_invalidated_on_update() {
        let f = setup().await;
        let post = f.service.create(&f.author, input("Cached", true)).await.unwrap().post;
        let first = f.service.get_by_slug("cached").await.unwrap();
        assert_eq!(first.post.title, "Cached");

        let change = UpdatePostInput {
            content: Some("Fresh body".into()),
            ..Default::default()
        };
        f.service.update(post.id, &f.author, change).await.unwrap();
        let second = f.service.get_by_slug("cached").await.unwrap();
        assert_eq!(second.post.content, "Fresh body");
    }
}
