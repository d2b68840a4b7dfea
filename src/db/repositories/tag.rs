//! Tag repository
//!
//! Database operations for tags.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite

use crate::db::pool::sqlite;
use crate::db::DynDatabasePool;
use crate::models::Tag;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a new tag
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Get tag by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>>;

    /// Get tag by name (case-insensitive)
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// List tags. `popular` orders by usage instead of name.
    async fn list(&self, search: Option<&str>, popular: bool, limit: i64) -> Result<Vec<Tag>>;

    /// Tags whose name starts with `prefix`
    async fn autocomplete(&self, prefix: &str, limit: i64) -> Result<Vec<Tag>>;

    /// Update a tag
    async fn update(&self, tag: &Tag) -> Result<Tag>;

    /// Delete a tag
    async fn delete(&self, id: i64) -> Result<()>;

    /// Check slug existence, ignoring `exclude_id`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Replace the tag set of a post
    async fn set_post_tags(&self, post_id: i64, tag_ids: &[i64]) -> Result<()>;

    /// Tags attached to a post
    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Tag>>;

    /// Recount `usage_count` for the given tags from published posts
    async fn refresh_usage(&self, tag_ids: &[i64]) -> Result<()>;

    /// (tag, published post count) for tags used at least once, most used first
    async fn usage_counts(&self, limit: i64) -> Result<Vec<(Tag, i64)>>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        create_tag_sqlite(sqlite(&self.pool)?, tag).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        get_tag_by_id_sqlite(sqlite(&self.pool)?, id).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        get_tag_where_sqlite(sqlite(&self.pool)?, "slug = ?", slug).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        get_tag_where_sqlite(sqlite(&self.pool)?, "LOWER(name) = LOWER(?)", name).await
    }

    async fn list(&self, search: Option<&str>, popular: bool, limit: i64) -> Result<Vec<Tag>> {
        list_tags_sqlite(sqlite(&self.pool)?, search, popular, limit).await
    }

    async fn autocomplete(&self, prefix: &str, limit: i64) -> Result<Vec<Tag>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM tags
            WHERE LOWER(name) LIKE LOWER(?) || '%'
            ORDER BY usage_count DESC, name ASC
            LIMIT ?
            "#,
            TAG_COLUMNS
        ))
        .bind(prefix)
        .bind(limit)
        .fetch_all(sqlite(&self.pool)?)
        .await
        .context("Failed to autocomplete tags")?;

        Ok(rows.iter().map(row_to_tag_sqlite).collect())
    }

    async fn update(&self, tag: &Tag) -> Result<Tag> {
        update_tag_sqlite(sqlite(&self.pool)?, tag).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        // post_tags rows go with the tag (ON DELETE CASCADE)
        sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(sqlite(&self.pool)?)
            .await
            .context("Failed to delete tag")?;
        Ok(())
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM tags WHERE slug = ? AND (? IS NULL OR id != ?)",
        )
        .bind(slug)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(sqlite(&self.pool)?)
        .await
        .context("Failed to check tag slug")?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn set_post_tags(&self, post_id: i64, tag_ids: &[i64]) -> Result<()> {
        set_post_tags_sqlite(sqlite(&self.pool)?, post_id, tag_ids).await
    }

    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.slug, t.description, t.color, t.usage_count, t.created_at
            FROM tags t
            INNER JOIN post_tags pt ON t.id = pt.tag_id
            WHERE pt.post_id = ?
            ORDER BY t.name
            "#,
        )
        .bind(post_id)
        .fetch_all(sqlite(&self.pool)?)
        .await
        .context("Failed to get tags for post")?;

        Ok(rows.iter().map(row_to_tag_sqlite).collect())
    }

    async fn refresh_usage(&self, tag_ids: &[i64]) -> Result<()> {
        let pool = sqlite(&self.pool)?;
        for tag_id in tag_ids {
            sqlx::query(
                r#"
                UPDATE tags
                SET usage_count = (
                    SELECT COUNT(*) FROM post_tags pt
                    INNER JOIN posts p ON p.id = pt.post_id
                    WHERE pt.tag_id = ?1 AND p.is_published = 1
                )
                WHERE id = ?1
                "#,
            )
            .bind(tag_id)
            .execute(pool)
            .await
            .context("Failed to refresh tag usage")?;
        }
        Ok(())
    }

    async fn usage_counts(&self, limit: i64) -> Result<Vec<(Tag, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.slug, t.description, t.color, t.usage_count, t.created_at,
                   COUNT(p.id) AS post_count
            FROM tags t
            INNER JOIN post_tags pt ON t.id = pt.tag_id
            INNER JOIN posts p ON p.id = pt.post_id AND p.is_published = 1
            GROUP BY t.id
            ORDER BY post_count DESC, t.name ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(sqlite(&self.pool)?)
        .await
        .context("Failed to get tag usage counts")?;

        Ok(rows
            .iter()
            .map(|row| (row_to_tag_sqlite(row), row.get::<i64, _>("post_count")))
            .collect())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const TAG_COLUMNS: &str = "id, name, slug, description, color, usage_count, created_at";

async fn create_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<Tag> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO tags (name, slug, description, color, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&tag.name)
    .bind(&tag.slug)
    .bind(&tag.description)
    .bind(&tag.color)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        usage_count: 0,
        created_at: now,
        ..tag.clone()
    })
}

async fn get_tag_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query(&format!("SELECT {} FROM tags WHERE id = ?", TAG_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    Ok(row.as_ref().map(row_to_tag_sqlite))
}

async fn get_tag_where_sqlite(pool: &SqlitePool, predicate: &str, value: &str) -> Result<Option<Tag>> {
    let row = sqlx::query(&format!("SELECT {} FROM tags WHERE {}", TAG_COLUMNS, predicate))
        .bind(value)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag")?;

    Ok(row.as_ref().map(row_to_tag_sqlite))
}

async fn list_tags_sqlite(
    pool: &SqlitePool,
    search: Option<&str>,
    popular: bool,
    limit: i64,
) -> Result<Vec<Tag>> {
    let order = if popular {
        "usage_count DESC, name ASC"
    } else {
        "name ASC"
    };
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s));

    let rows = sqlx::query(&format!(
        "SELECT {} FROM tags WHERE (? IS NULL OR name LIKE ?) ORDER BY {} LIMIT ?",
        TAG_COLUMNS, order
    ))
    .bind(&pattern)
    .bind(&pattern)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list tags")?;

    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

async fn update_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<Tag> {
    sqlx::query("UPDATE tags SET name = ?, slug = ?, description = ?, color = ? WHERE id = ?")
        .bind(&tag.name)
        .bind(&tag.slug)
        .bind(&tag.description)
        .bind(&tag.color)
        .bind(tag.id)
        .execute(pool)
        .await
        .context("Failed to update tag")?;

    get_tag_by_id_sqlite(pool, tag.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Tag not found after update"))
}

async fn set_post_tags_sqlite(pool: &SqlitePool, post_id: i64, tag_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin tag update")?;

    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear post tags")?;

    for tag_id in tag_ids {
        sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .context("Failed to attach tag to post")?;
    }

    tx.commit().await.context("Failed to commit tag update")?;
    Ok(())
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        color: row.get("color"),
        usage_count: row.get("usage_count"),
        created_at: row.get("created_at"),
    }
}
