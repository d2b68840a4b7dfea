//! Bookmark repository

use crate::db::pool::sqlite;
use crate::db::DynDatabasePool;
use crate::models::{Bookmark, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Bookmark repository trait
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Add a bookmark. Returns None when the post is already bookmarked.
    async fn add(&self, user_id: i64, post_id: i64, notes: Option<&str>) -> Result<Option<Bookmark>>;

    /// Remove a bookmark. Returns whether a row was deleted.
    async fn remove(&self, user_id: i64, post_id: i64) -> Result<bool>;

    async fn exists(&self, user_id: i64, post_id: i64) -> Result<bool>;

    /// IDs of the posts a user bookmarked, most recent first, with the total
    async fn post_ids_for_user(&self, user_id: i64, params: &ListParams) -> Result<(Vec<i64>, i64)>;

    /// Number of users who bookmarked a post
    async fn count_for_post(&self, post_id: i64) -> Result<i64>;
}

/// SQLx-based bookmark repository implementation
pub struct SqlxBookmarkRepository {
    pool: DynDatabasePool,
}

impl SqlxBookmarkRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookmarkRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BookmarkRepository for SqlxBookmarkRepository {
    async fn add(&self, user_id: i64, post_id: i64, notes: Option<&str>) -> Result<Option<Bookmark>> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO bookmarks (user_id, post_id, notes, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(post_id)
        .bind(notes)
        .bind(now)
        .execute(sqlite(&self.pool)?)
        .await
        .context("Failed to add bookmark")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Bookmark {
            id: result.last_insert_rowid(),
            user_id,
            post_id,
            notes: notes.map(str::to_string),
            created_at: now,
        }))
    }

    async fn remove(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(sqlite(&self.pool)?)
            .await
            .context("Failed to remove bookmark")?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks WHERE user_id = ? AND post_id = ?")
                .bind(user_id)
                .bind(post_id)
                .fetch_one(sqlite(&self.pool)?)
                .await
                .context("Failed to check bookmark")?;
        Ok(count > 0)
    }

    async fn post_ids_for_user(&self, user_id: i64, params: &ListParams) -> Result<(Vec<i64>, i64)> {
        let pool = sqlite(&self.pool)?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("Failed to count bookmarks")?;

        let rows = sqlx::query(
            r#"
            SELECT post_id FROM bookmarks
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list bookmarks")?;

        Ok((rows.iter().map(|row| row.get("post_id")).collect(), total))
    }

    async fn count_for_post(&self, post_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(sqlite(&self.pool)?)
            .await
            .context("Failed to count post bookmarks")?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_bookmark_lifecycle() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let sqlite_pool = pool.as_sqlite().unwrap();
        let user_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES ('b', 'b@example.com', 'h')",
        )
        .execute(sqlite_pool)
        .await
        .unwrap()
        .last_insert_rowid();
        let post_id = sqlx::query(
            "INSERT INTO posts (title, slug, content, author_id) VALUES ('t', 't', 'c', ?)",
        )
        .bind(user_id)
        .execute(sqlite_pool)
        .await
        .unwrap()
        .last_insert_rowid();

        let repo = SqlxBookmarkRepository::new(pool.clone());
        let bookmark = repo.add(user_id, post_id, Some("later")).await.unwrap();
        assert_eq!(bookmark.unwrap().notes.as_deref(), Some("later"));
        assert!(repo.add(user_id, post_id, None).await.unwrap().is_none());
        assert!(repo.exists(user_id, post_id).await.unwrap());
        assert_eq!(repo.count_for_post(post_id).await.unwrap(), 1);

        let (ids, total) = repo
            .post_ids_for_user(user_id, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(ids, vec![post_id]);

        assert!(repo.remove(user_id, post_id).await.unwrap());
        assert!(!repo.exists(user_id, post_id).await.unwrap());
    }
}
