//! Like repository
//!
//! Likes on posts and comments. Each target type has its own table with a
//! unique (user, target) pair, and adding or removing a like adjusts the
//! target's `likes_count` in the same transaction.

use crate::db::pool::sqlite;
use crate::db::DynDatabasePool;
use crate::models::LikeTarget;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Like repository trait
#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Add a like. Returns false when the user already liked the target.
    async fn add(&self, user_id: i64, target: LikeTarget, target_id: i64) -> Result<bool>;

    /// Remove a like. Returns false when there was nothing to remove.
    async fn remove(&self, user_id: i64, target: LikeTarget, target_id: i64) -> Result<bool>;

    /// Whether the user likes the target
    async fn exists(&self, user_id: i64, target: LikeTarget, target_id: i64) -> Result<bool>;

    /// Current `likes_count` of the target
    async fn count(&self, target: LikeTarget, target_id: i64) -> Result<i64>;
}

/// SQLx-based like repository implementation
pub struct SqlxLikeRepository {
    pool: DynDatabasePool,
}

impl SqlxLikeRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LikeRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LikeRepository for SqlxLikeRepository {
    async fn add(&self, user_id: i64, target: LikeTarget, target_id: i64) -> Result<bool> {
        add_like_sqlite(sqlite(&self.pool)?, user_id, target, target_id).await
    }

    async fn remove(&self, user_id: i64, target: LikeTarget, target_id: i64) -> Result<bool> {
        remove_like_sqlite(sqlite(&self.pool)?, user_id, target, target_id).await
    }

    async fn exists(&self, user_id: i64, target: LikeTarget, target_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE user_id = ? AND {} = ?",
            target.table(),
            target.column()
        ))
        .bind(user_id)
        .bind(target_id)
        .fetch_one(sqlite(&self.pool)?)
        .await
        .context("Failed to check like")?;
        Ok(count > 0)
    }

    async fn count(&self, target: LikeTarget, target_id: i64) -> Result<i64> {
        let count: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT likes_count FROM {} WHERE id = ?",
            target.target_table()
        ))
        .bind(target_id)
        .fetch_optional(sqlite(&self.pool)?)
        .await
        .context("Failed to read like count")?;
        Ok(count.unwrap_or(0))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn add_like_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    target: LikeTarget,
    target_id: i64,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin like")?;

    let result = sqlx::query(&format!(
        "INSERT OR IGNORE INTO {} (user_id, {}, created_at) VALUES (?, ?, ?)",
        target.table(),
        target.column()
    ))
    .bind(user_id)
    .bind(target_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .with_context(|| format!("Failed to like {}", target))?;

    let inserted = result.rows_affected() > 0;
    if inserted {
        sqlx::query(&format!(
            "UPDATE {} SET likes_count = likes_count + 1 WHERE id = ?",
            target.target_table()
        ))
        .bind(target_id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment like count")?;
    }

    tx.commit().await.context("Failed to commit like")?;
    Ok(inserted)
}

async fn remove_like_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    target: LikeTarget,
    target_id: i64,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin unlike")?;

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = ? AND {} = ?",
        target.table(),
        target.column()
    ))
    .bind(user_id)
    .bind(target_id)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("Failed to unlike {}", target))?;

    let removed = result.rows_affected() > 0;
    if removed {
        sqlx::query(&format!(
            "UPDATE {} SET likes_count = MAX(0, likes_count - 1) WHERE id = ?",
            target.target_table()
        ))
        .bind(target_id)
        .execute(&mut *tx)
        .await
        .context("Failed to decrement like count")?;
    }

    tx.commit().await.context("Failed to commit unlike")?;
    Ok(removed)
}
