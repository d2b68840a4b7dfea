//! Notification repository

use crate::db::pool::sqlite;
use crate::db::DynDatabasePool;
use crate::models::{NewNotification, Notification};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Notification repository trait
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> Result<Notification>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>>;

    /// Notifications of a user, newest first
    async fn list_for_user(&self, user_id: i64, unread_only: bool, limit: i64) -> Result<Vec<Notification>>;

    /// Mark one notification read. Only matches when `user_id` owns it.
    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool>;

    /// Mark every unread notification of a user read
    async fn mark_all_read(&self, user_id: i64) -> Result<u64>;

    async fn unread_count(&self, user_id: i64) -> Result<i64>;

    /// Delete notifications created before `cutoff`
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based notification repository implementation
pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, title, message, kind, link, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.to_string())
        .bind(&notification.link)
        .bind(now)
        .execute(sqlite(&self.pool)?)
        .await
        .context("Failed to create notification")?;

        Ok(Notification {
            id: result.last_insert_rowid(),
            user_id: notification.user_id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            kind: notification.kind,
            link: notification.link.clone(),
            is_read: false,
            read_at: None,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>> {
        get_notification_sqlite(sqlite(&self.pool)?, id).await
    }

    async fn list_for_user(&self, user_id: i64, unread_only: bool, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE user_id = ? AND (? = 0 OR is_read = 0)
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(sqlite(&self.pool)?)
        .await
        .context("Failed to list notifications")?;

        Ok(rows.iter().map(row_to_notification_sqlite).collect())
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1, read_at = ? WHERE id = ? AND user_id = ? AND is_read = 0",
        )
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(sqlite(&self.pool)?)
        .await
        .context("Failed to mark notification read")?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1, read_at = ? WHERE user_id = ? AND is_read = 0",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(sqlite(&self.pool)?)
        .await
        .context("Failed to mark notifications read")?;
        Ok(result.rows_affected())
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(sqlite(&self.pool)?)
        .await
        .context("Failed to count unread notifications")?;
        Ok(count)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE created_at < ?")
            .bind(cutoff)
            .execute(sqlite(&self.pool)?)
            .await
            .context("Failed to delete old notifications")?;
        Ok(result.rows_affected())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, title, message, kind, link, is_read, read_at, created_at";

async fn get_notification_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Notification>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM notifications WHERE id = ?",
        NOTIFICATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get notification")?;

    Ok(row.as_ref().map(row_to_notification_sqlite))
}

fn row_to_notification_sqlite(row: &sqlx::sqlite::SqliteRow) -> Notification {
    let kind: String = row.get("kind");
    Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        message: row.get("message"),
        kind: kind.parse().unwrap_or_default(),
        link: row.get("link"),
        is_read: row.get("is_read"),
        read_at: row.get("read_at"),
        created_at: row.get("created_at"),
    }
}
