//! View repository
//!
//! Records post views. A view is skipped when the same viewer (the user when
//! logged in, otherwise the IP address) already viewed the post since the
//! de-duplication cutoff.

use crate::db::pool::sqlite;
use crate::db::DynDatabasePool;
use crate::models::{View, ViewContext};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// View repository trait
#[async_trait]
pub trait ViewRepository: Send + Sync {
    /// Record a view unless the viewer already has one since `dedup_since`.
    /// A recorded view also increments `posts.views_count`.
    async fn record(
        &self,
        post_id: i64,
        ctx: &ViewContext,
        dedup_since: DateTime<Utc>,
    ) -> Result<Option<View>>;

    /// Total views of a post, or distinct viewers when `unique`
    async fn count_for_post(&self, post_id: i64, unique: bool) -> Result<i64>;

    /// (post_id, views) for published posts with the most views since `since`
    async fn popular_since(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<(i64, i64)>>;

    /// (post_id, last viewed) for a user, most recent first
    async fn history_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<(i64, DateTime<Utc>)>>;

    /// Delete views recorded before `cutoff`
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based view repository implementation
pub struct SqlxViewRepository {
    pool: DynDatabasePool,
}

impl SqlxViewRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ViewRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ViewRepository for SqlxViewRepository {
    async fn record(
        &self,
        post_id: i64,
        ctx: &ViewContext,
        dedup_since: DateTime<Utc>,
    ) -> Result<Option<View>> {
        record_view_sqlite(sqlite(&self.pool)?, post_id, ctx, dedup_since).await
    }

    async fn count_for_post(&self, post_id: i64, unique: bool) -> Result<i64> {
        let sql = if unique {
            r#"
            SELECT COUNT(DISTINCT COALESCE('u:' || user_id, 'ip:' || ip_address))
            FROM views WHERE post_id = ?
            "#
        } else {
            "SELECT COUNT(*) FROM views WHERE post_id = ?"
        };
        let count: i64 = sqlx::query_scalar(sql)
            .bind(post_id)
            .fetch_one(sqlite(&self.pool)?)
            .await
            .context("Failed to count views")?;
        Ok(count)
    }

    async fn popular_since(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<(i64, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT v.post_id, COUNT(*) AS views
            FROM views v
            INNER JOIN posts p ON p.id = v.post_id AND p.is_published = 1
            WHERE v.viewed_at >= ?
            GROUP BY v.post_id
            ORDER BY views DESC, v.post_id DESC
            LIMIT ?
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(sqlite(&self.pool)?)
        .await
        .context("Failed to get popular posts by views")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("post_id"), row.get("views")))
            .collect())
    }

    async fn history_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<(i64, DateTime<Utc>)>> {
        let rows = sqlx::query(
            r#"
            SELECT post_id, MAX(viewed_at) AS last_viewed
            FROM views
            WHERE user_id = ?
            GROUP BY post_id
            ORDER BY last_viewed DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(sqlite(&self.pool)?)
        .await
        .context("Failed to get view history")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("post_id"), row.get("last_viewed")))
            .collect())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM views WHERE viewed_at < ?")
            .bind(cutoff)
            .execute(sqlite(&self.pool)?)
            .await
            .context("Failed to prune views")?;
        Ok(result.rows_affected())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn record_view_sqlite(
    pool: &SqlitePool,
    post_id: i64,
    ctx: &ViewContext,
    dedup_since: DateTime<Utc>,
) -> Result<Option<View>> {
    let mut tx = pool.begin().await.context("Failed to begin view")?;

    let seen: i64 = match (ctx.user_id, ctx.ip_address.as_deref()) {
        (Some(user_id), _) => sqlx::query_scalar(
            "SELECT COUNT(*) FROM views WHERE post_id = ? AND user_id = ? AND viewed_at >= ?",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(dedup_since)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to check recent views")?,
        (None, Some(ip)) => sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM views
            WHERE post_id = ? AND user_id IS NULL AND ip_address = ? AND viewed_at >= ?
            "#,
        )
        .bind(post_id)
        .bind(ip)
        .bind(dedup_since)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to check recent views")?,
        (None, None) => 0,
    };

    if seen > 0 {
        return Ok(None);
    }

    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO views (post_id, user_id, ip_address, user_agent, referrer, viewed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(post_id)
    .bind(ctx.user_id)
    .bind(&ctx.ip_address)
    .bind(&ctx.user_agent)
    .bind(&ctx.referrer)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to record view")?;

    sqlx::query("UPDATE posts SET views_count = views_count + 1 WHERE id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment post views")?;

    tx.commit().await.context("Failed to commit view")?;

    Ok(Some(View {
        id: result.last_insert_rowid(),
        post_id,
        user_id: ctx.user_id,
        ip_address: ctx.ip_address.clone(),
        user_agent: ctx.user_agent.clone(),
        referrer: ctx.referrer.clone(),
        viewed_at: now,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup() -> (DynDatabasePool, SqlxViewRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let sqlite_pool = pool.as_sqlite().unwrap();
        let user_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES ('v', 'v@example.com', 'h')",
        )
        .execute(sqlite_pool)
        .await
        .unwrap()
        .last_insert_rowid();
        let post_id = sqlx::query(
            "INSERT INTO posts (title, slug, content, author_id, is_published) VALUES ('t', 't', 'c', ?, 1)",
        )
        .bind(user_id)
        .execute(sqlite_pool)
        .await
        .unwrap()
        .last_insert_rowid();
        (pool.clone(), SqlxViewRepository::new(pool), user_id, post_id)
    }

    fn anonymous(ip: &str) -> ViewContext {
        ViewContext {
            ip_address: Some(ip.to_string()),
            ..ViewContext::default()
        }
    }

    #[tokio::test]
    async fn test_repeat_view_is_deduplicated() {
        let (pool, repo, user_id, post_id) = setup().await;
        let window = Utc::now() - Duration::minutes(30);

        assert!(repo.record(post_id, &anonymous("1.1.1.1"), window).await.unwrap().is_some());
        assert!(repo.record(post_id, &anonymous("1.1.1.1"), window).await.unwrap().is_none());
        assert!(repo.record(post_id, &anonymous("2.2.2.2"), window).await.unwrap().is_some());

        let member = ViewContext {
            user_id: Some(user_id),
            ip_address: Some("1.1.1.1".into()),
            ..ViewContext::default()
        };
        assert!(repo.record(post_id, &member, window).await.unwrap().is_some());
        assert!(repo.record(post_id, &member, window).await.unwrap().is_none());

        assert_eq!(repo.count_for_post(post_id, false).await.unwrap(), 3);
        assert_eq!(repo.count_for_post(post_id, true).await.unwrap(), 3);

        let views: i64 = sqlx::query_scalar("SELECT views_count FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(views, 3);
    }

    #[tokio::test]
    async fn test_view_outside_window_counts_again() {
        let (_pool, repo, _user_id, post_id) = setup().await;
        repo.record(post_id, &anonymous("3.3.3.3"), Utc::now()).await.unwrap();
        // A cutoff in the future hides every earlier view
        let later = Utc::now() + Duration::seconds(1);
        assert!(repo.record(post_id, &anonymous("3.3.3.3"), later).await.unwrap().is_some());
        assert_eq!(repo.count_for_post(post_id, false).await.unwrap(), 2);
        assert_eq!(repo.count_for_post(post_id, true).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_history_popular_and_prune() {
        let (_pool, repo, user_id, post_id) = setup().await;
        let member = ViewContext {
            user_id: Some(user_id),
            ..ViewContext::default()
        };
        repo.record(post_id, &member, Utc::now()).await.unwrap();

        let history = repo.history_for_user(user_id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].0, post_id);

        let popular = repo
            .popular_since(Utc::now() - Duration::days(1), 5)
            .await
            .unwrap();
        assert_eq!(popular, vec![(post_id, 1)]);

        assert_eq!(repo.delete_older_than(Utc::now() + Duration::seconds(1)).await.unwrap(), 1);
        assert_eq!(repo.count_for_post(post_id, false).await.unwrap(), 0);
    }
}
