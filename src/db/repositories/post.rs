//! Post repository
//!
//! Database operations for blog posts.
//!
//! This module provides:
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite
//!
//! Listing supports filtering by category, tag, author and a free-text search
//! over title and content, with the ordering taken from `PostFilter`.

use crate::db::pool::sqlite;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Post, PostFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a new post
    async fn create(&self, post: &Post) -> Result<Post>;

    /// Get post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Get post by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// List posts matching `filter`, returning the page and the total count
    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)>;

    /// Update a post
    async fn update(&self, post: &Post) -> Result<Post>;

    /// Delete a post
    async fn delete(&self, id: i64) -> Result<()>;

    /// Check slug existence, ignoring `exclude_id`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Published posts with the most views recorded since `since`
    async fn trending(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Post>>;

    /// Published posts sharing tags with `post_id`, then posts from its category
    async fn related(&self, post_id: i64, limit: i64) -> Result<Vec<Post>>;

    /// Increment `views_count` by one
    async fn increment_views(&self, id: i64) -> Result<()>;

    /// Recount `comments_count` from approved, non-deleted comments
    async fn refresh_comments_count(&self, id: i64) -> Result<i64>;

    /// Recount `users.posts_count` for an author
    async fn refresh_author_count(&self, author_id: i64) -> Result<i64>;

    /// Count published posts
    async fn count_published(&self) -> Result<i64>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        create_post_sqlite(sqlite(&self.pool)?, post).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        get_post_by_id_sqlite(sqlite(&self.pool)?, id).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {} FROM posts p WHERE p.slug = ?", POST_COLUMNS))
            .bind(slug)
            .fetch_optional(sqlite(&self.pool)?)
            .await
            .context("Failed to get post by slug")?;

        Ok(row.as_ref().map(row_to_post_sqlite))
    }

    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        list_posts_sqlite(sqlite(&self.pool)?, filter, params).await
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        update_post_sqlite(sqlite(&self.pool)?, post).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(sqlite(&self.pool)?)
            .await
            .context("Failed to delete post")?;
        Ok(())
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM posts WHERE slug = ? AND (? IS NULL OR id != ?)",
        )
        .bind(slug)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(sqlite(&self.pool)?)
        .await
        .context("Failed to check post slug")?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn trending(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}, COUNT(v.id) AS recent_views
            FROM posts p
            LEFT JOIN views v ON v.post_id = p.id AND v.viewed_at >= ?
            WHERE p.is_published = 1
            GROUP BY p.id
            ORDER BY recent_views DESC, p.views_count DESC, p.id DESC
            LIMIT ?
            "#,
            POST_COLUMNS
        ))
        .bind(since)
        .bind(limit)
        .fetch_all(sqlite(&self.pool)?)
        .await
        .context("Failed to get trending posts")?;

        Ok(rows.iter().map(row_to_post_sqlite).collect())
    }

    async fn related(&self, post_id: i64, limit: i64) -> Result<Vec<Post>> {
        related_posts_sqlite(sqlite(&self.pool)?, post_id, limit).await
    }

    async fn increment_views(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE posts SET views_count = views_count + 1 WHERE id = ?")
            .bind(id)
            .execute(sqlite(&self.pool)?)
            .await
            .context("Failed to increment post views")?;
        Ok(())
    }

    async fn refresh_comments_count(&self, id: i64) -> Result<i64> {
        let pool = sqlite(&self.pool)?;
        sqlx::query(
            r#"
            UPDATE posts
            SET comments_count = (
                SELECT COUNT(*) FROM comments
                WHERE post_id = ?1 AND is_approved = 1 AND is_deleted = 0
            )
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to refresh comment count")?;

        let row = sqlx::query("SELECT comments_count FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to read comment count")?;
        Ok(row.map(|r| r.get("comments_count")).unwrap_or(0))
    }

    async fn refresh_author_count(&self, author_id: i64) -> Result<i64> {
        let pool = sqlite(&self.pool)?;
        sqlx::query(
            r#"
            UPDATE users
            SET posts_count = (SELECT COUNT(*) FROM posts WHERE author_id = ?1 AND is_published = 1)
            WHERE id = ?1
            "#,
        )
        .bind(author_id)
        .execute(pool)
        .await
        .context("Failed to refresh author post count")?;

        let row = sqlx::query("SELECT posts_count FROM users WHERE id = ?")
            .bind(author_id)
            .fetch_optional(pool)
            .await
            .context("Failed to read author post count")?;
        Ok(row.map(|r| r.get("posts_count")).unwrap_or(0))
    }

    async fn count_published(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM posts WHERE is_published = 1")
            .fetch_one(sqlite(&self.pool)?)
            .await
            .context("Failed to count posts")?;
        Ok(row.get("count"))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const POST_COLUMNS: &str = r#"
    p.id, p.title, p.slug, p.content, p.content_html, p.excerpt, p.author_id,
    p.category_id, p.is_published, p.is_featured, p.allow_comments, p.reading_time,
    p.views_count, p.likes_count, p.comments_count, p.meta_title, p.meta_description,
    p.ai_generated, p.validation_metadata, p.published_at, p.created_at, p.updated_at
"#;

const FILTER_CLAUSE: &str = r#"
    (?1 IS NULL OR p.category_id = ?1)
    AND (?2 IS NULL OR EXISTS (
        SELECT 1 FROM post_tags pt WHERE pt.post_id = p.id AND pt.tag_id = ?2
    ))
    AND (?3 IS NULL OR p.author_id = ?3)
    AND (?4 IS NULL OR p.title LIKE ?4 OR p.content LIKE ?4)
    AND (?5 = 0 OR p.is_published = 1)
    AND (?6 = 0 OR p.is_featured = 1)
"#;

fn metadata_to_text(value: &Option<serde_json::Value>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

async fn create_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, slug, content, content_html, excerpt, author_id, category_id,
                           is_published, is_featured, allow_comments, reading_time,
                           meta_title, meta_description, ai_generated, validation_metadata,
                           published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.slug)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.excerpt)
    .bind(post.author_id)
    .bind(post.category_id)
    .bind(post.is_published)
    .bind(post.is_featured)
    .bind(post.allow_comments)
    .bind(post.reading_time)
    .bind(&post.meta_title)
    .bind(&post.meta_description)
    .bind(post.ai_generated)
    .bind(metadata_to_text(&post.validation_metadata))
    .bind(post.published_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        views_count: 0,
        likes_count: 0,
        comments_count: 0,
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts p WHERE p.id = ?", POST_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    Ok(row.as_ref().map(row_to_post_sqlite))
}

async fn list_posts_sqlite(
    pool: &SqlitePool,
    filter: &PostFilter,
    params: &ListParams,
) -> Result<(Vec<Post>, i64)> {
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s));

    let count_row = sqlx::query(&format!(
        "SELECT COUNT(*) as count FROM posts p WHERE {}",
        FILTER_CLAUSE
    ))
    .bind(filter.category_id)
    .bind(filter.tag_id)
    .bind(filter.author_id)
    .bind(&search)
    .bind(filter.published_only)
    .bind(filter.featured_only)
    .fetch_one(pool)
    .await
    .context("Failed to count posts")?;
    let total: i64 = count_row.get("count");

    // Sort column and direction come from closed enums
    let rows = sqlx::query(&format!(
        "SELECT {} FROM posts p WHERE {} ORDER BY {} {}, p.id DESC LIMIT ?7 OFFSET ?8",
        POST_COLUMNS,
        FILTER_CLAUSE,
        filter.sort_by.column(),
        filter.order.sql()
    ))
    .bind(filter.category_id)
    .bind(filter.tag_id)
    .bind(filter.author_id)
    .bind(&search)
    .bind(filter.published_only)
    .bind(filter.featured_only)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list posts")?;

    Ok((rows.iter().map(row_to_post_sqlite).collect(), total))
}

async fn update_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, slug = ?, content = ?, content_html = ?, excerpt = ?, category_id = ?,
            is_published = ?, is_featured = ?, allow_comments = ?, reading_time = ?,
            meta_title = ?, meta_description = ?, ai_generated = ?, validation_metadata = ?,
            published_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.slug)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.excerpt)
    .bind(post.category_id)
    .bind(post.is_published)
    .bind(post.is_featured)
    .bind(post.allow_comments)
    .bind(post.reading_time)
    .bind(&post.meta_title)
    .bind(&post.meta_description)
    .bind(post.ai_generated)
    .bind(metadata_to_text(&post.validation_metadata))
    .bind(post.published_at)
    .bind(Utc::now())
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    get_post_by_id_sqlite(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

async fn related_posts_sqlite(pool: &SqlitePool, post_id: i64, limit: i64) -> Result<Vec<Post>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT * FROM (
            SELECT {},
                (SELECT COUNT(*) FROM post_tags a
                 INNER JOIN post_tags b ON a.tag_id = b.tag_id
                 WHERE a.post_id = p.id AND b.post_id = ?1) AS shared_tags,
                COALESCE(p.category_id = (SELECT category_id FROM posts WHERE id = ?1), 0)
                    AS same_category
            FROM posts p
            WHERE p.id != ?1 AND p.is_published = 1
        )
        WHERE shared_tags > 0 OR same_category = 1
        ORDER BY shared_tags DESC, same_category DESC, published_at DESC
        LIMIT ?2
        "#,
        POST_COLUMNS
    ))
    .bind(post_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to get related posts")?;

    Ok(rows.iter().map(row_to_post_sqlite).collect())
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Post {
    let metadata: Option<String> = row.get("validation_metadata");
    Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        excerpt: row.get("excerpt"),
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        is_published: row.get("is_published"),
        is_featured: row.get("is_featured"),
        allow_comments: row.get("allow_comments"),
        reading_time: row.get("reading_time"),
        views_count: row.get("views_count"),
        likes_count: row.get("likes_count"),
        comments_count: row.get("comments_count"),
        meta_title: row.get("meta_title"),
        meta_description: row.get("meta_description"),
        ai_generated: row.get("ai_generated"),
        validation_metadata: metadata.and_then(|text| serde_json::from_str(&text).ok()),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{PostSort, SortOrder};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxPostRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES ('writer', 'w@example.com', 'h')",
        )
        .execute(pool.as_sqlite().unwrap())
        .await
        .unwrap()
        .last_insert_rowid();
        let repo = SqlxPostRepository::new(pool.clone());
        (pool, repo, user_id)
    }

    async fn published(repo: &SqlxPostRepository, author: i64, slug: &str) -> Post {
        let mut post = Post::new(slug.to_string(), slug.to_string(), "body text".into(), author);
        post.publish();
        repo.create(&post).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, repo, author) = setup_test_repo().await;
        let mut post = Post::new("Hello".into(), "hello".into(), "content".into(), author);
        post.validation_metadata = Some(serde_json::json!({"result": "approved"}));
        let created = repo.create(&post).await.unwrap();

        let fetched = repo.get_by_slug("hello").await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.validation_metadata.unwrap()["result"], "approved");
        assert!(!fetched.is_published);
        assert!(repo.exists_by_slug("hello", None).await.unwrap());
        assert!(!repo.exists_by_slug("hello", Some(created.id)).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_and_sorting() {
        let (pool, repo, author) = setup_test_repo().await;
        let a = published(&repo, author, "alpha").await;
        let b = published(&repo, author, "beta").await;
        repo.create(&Post::new("draft".into(), "draft".into(), "x".into(), author))
            .await
            .unwrap();

        let sqlite_pool = pool.as_sqlite().unwrap();
        sqlx::query("UPDATE posts SET views_count = 10 WHERE id = ?")
            .bind(a.id)
            .execute(sqlite_pool)
            .await
            .unwrap();

        let (all, total) = repo
            .list(&PostFilter::default(), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 3);

        let filter = PostFilter {
            sort_by: PostSort::Views,
            order: SortOrder::Desc,
            ..PostFilter::published()
        };
        let (items, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].id, a.id);

        let filter = PostFilter {
            search: Some("bet".into()),
            ..PostFilter::published()
        };
        let (items, _) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, b.id);

        let (page, total) = repo
            .list(&PostFilter::published(), &ListParams::new(2, 1))
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn test_related_prefers_shared_tags() {
        let (pool, repo, author) = setup_test_repo().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        let base = published(&repo, author, "base").await;
        let tagged = published(&repo, author, "tagged").await;
        let unrelated = published(&repo, author, "unrelated").await;

        let tag_id = sqlx::query("INSERT INTO tags (name, slug) VALUES ('rust', 'rust')")
            .execute(sqlite_pool)
            .await
            .unwrap()
            .last_insert_rowid();
        for post_id in [base.id, tagged.id] {
            sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(tag_id)
                .execute(sqlite_pool)
                .await
                .unwrap();
        }

        let related = repo.related(base.id, 5).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, tagged.id);
        assert!(related.iter().all(|p| p.id != unrelated.id));

        let filter = PostFilter {
            tag_id: Some(tag_id),
            ..PostFilter::published()
        };
        let (items, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_trending_counts_recent_views() {
        let (pool, repo, author) = setup_test_repo().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        let quiet = published(&repo, author, "quiet").await;
        let busy = published(&repo, author, "busy").await;

        for _ in 0..3 {
            sqlx::query("INSERT INTO views (post_id, viewed_at) VALUES (?, ?)")
                .bind(busy.id)
                .bind(Utc::now())
                .execute(sqlite_pool)
                .await
                .unwrap();
        }

        let trending = repo
            .trending(Utc::now() - chrono::Duration::days(7), 10)
            .await
            .unwrap();
        assert_eq!(trending[0].id, busy.id);
        assert_eq!(trending[1].id, quiet.id);
    }

    #[tokio::test]
    async fn test_counters() {
        let (_pool, repo, author) = setup_test_repo().await;
        let post = published(&repo, author, "counted").await;

        repo.increment_views(post.id).await.unwrap();
        repo.increment_views(post.id).await.unwrap();
        assert_eq!(repo.get_by_id(post.id).await.unwrap().unwrap().views_count, 2);

        assert_eq!(repo.refresh_author_count(author).await.unwrap(), 1);
        assert_eq!(repo.refresh_comments_count(post.id).await.unwrap(), 0);
        assert_eq!(repo.count_published().await.unwrap(), 1);
    }
}
