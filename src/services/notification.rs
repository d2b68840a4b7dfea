//! Notification service
//!
//! In-app notifications for comment, like and moderation events.

use crate::db::repositories::{NotificationRepository, UserRepository};
use crate::models::{NewNotification, Notification, NotificationKind};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Notifications older than this are removed by `delete_old`
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum NotificationServiceError {
    #[error("Notification not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self { repo, user_repo }
    }

    pub async fn create(&self, notification: NewNotification) -> Result<Notification, NotificationServiceError> {
        if notification.title.trim().is_empty() {
            return Err(NotificationServiceError::ValidationError(
                "Notification title cannot be empty".into(),
            ));
        }
        Ok(self
            .repo
            .create(&notification)
            .await
            .context("Failed to create notification")?)
    }

    /// Create a notification, logging instead of failing.
    ///
    /// Used for side effects of other writes, where a failed notification
    /// must not undo the write.
    pub async fn notify(&self, notification: NewNotification) {
        let user_id = notification.user_id;
        if let Err(e) = self.create(notification).await {
            tracing::warn!(user_id, error = %e, "Failed to create notification");
        }
    }

    /// Newest first
    pub async fn list(&self, user_id: i64, unread_only: bool, limit: i64) -> Result<Vec<Notification>, NotificationServiceError> {
        Ok(self
            .repo
            .list_for_user(user_id, unread_only, limit.clamp(1, MAX_LIST_LIMIT))
            .await
            .context("Failed to list notifications")?)
    }

    /// Mark one notification read. Only the owner may do this.
    pub async fn mark_as_read(&self, id: i64, user_id: i64) -> Result<(), NotificationServiceError> {
        let found = self
            .repo
            .mark_read(id, user_id)
            .await
            .context("Failed to mark notification read")?;
        if found {
            return Ok(());
        }

        // Already read is fine for the owner
        match self.repo.get_by_id(id).await.context("Failed to get notification")? {
            Some(n) if n.user_id == user_id => Ok(()),
            _ => Err(NotificationServiceError::NotFound(id)),
        }
    }

    pub async fn mark_all_as_read(&self, user_id: i64) -> Result<u64, NotificationServiceError> {
        Ok(self
            .repo
            .mark_all_read(user_id)
            .await
            .context("Failed to mark notifications read")?)
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, NotificationServiceError> {
        Ok(self
            .repo
            .unread_count(user_id)
            .await
            .context("Failed to count notifications")?)
    }

    /// Remove notifications older than `days`
    pub async fn delete_old(&self, days: i64) -> Result<u64, NotificationServiceError> {
        let cutoff = Utc::now() - Duration::days(days.max(1));
        let removed = self
            .repo
            .delete_older_than(cutoff)
            .await
            .context("Failed to delete old notifications")?;
        if removed > 0 {
            tracing::info!(removed, days, "Deleted old notifications");
        }
        Ok(removed)
    }

    /// Send the same notification to every active admin
    pub async fn notify_admins(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> Result<usize, NotificationServiceError> {
        let admins = self
            .user_repo
            .list_admins()
            .await
            .context("Failed to list admins")?;

        for admin in &admins {
            let mut notification = NewNotification::new(admin.id, kind, title, message);
            if let Some(link) = link {
                notification = notification.with_link(link);
            }
            self.create(notification).await?;
        }
        Ok(admins.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxNotificationRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup() -> (DynDatabasePool, NotificationService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let sqlite = pool.as_sqlite().unwrap();
        sqlx::query(
            "INSERT INTO users (username, email, password_hash, role) VALUES
             ('admin', 'admin@example.com', 'h', 'admin'),
             ('reader', 'reader@example.com', 'h', 'author')",
        )
        .execute(sqlite)
        .await
        .unwrap();

        let service = NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    #[tokio::test]
    async fn test_create_list_and_read() {
        let (_pool, service) = setup().await;
        let n = service
            .create(NewNotification::new(2, NotificationKind::Comment, "New comment", "Hi"))
            .await
            .unwrap();
        service
            .create(NewNotification::new(2, NotificationKind::Like, "New like", "+1"))
            .await
            .unwrap();

        assert_eq!(service.unread_count(2).await.unwrap(), 2);
        assert!(matches!(
            service.mark_as_read(n.id, 1).await,
            Err(NotificationServiceError::NotFound(_))
        ));
        service.mark_as_read(n.id, 2).await.unwrap();
        assert_eq!(service.list(2, true, 10).await.unwrap().len(), 1);

        assert_eq!(service.mark_all_as_read(2).await.unwrap(), 1);
        assert_eq!(service.unread_count(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_notify_admins() {
        let (_pool, service) = setup().await;
        let sent = service
            .notify_admins(NotificationKind::Moderation, "Review needed", "Queue has items", Some("/ai/queue"))
            .await
            .unwrap();
        assert_eq!(sent, 1);
        let inbox = service.list(1, false, 10).await.unwrap();
        assert_eq!(inbox[0].link.as_deref(), Some("/ai/queue"));
        assert!(service.list(2, false, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_title_rejected_and_delete_old() {
        let (pool, service) = setup().await;
        assert!(matches!(
            service.create(NewNotification::new(2, NotificationKind::Info, " ", "x")).await,
            Err(NotificationServiceError::ValidationError(_))
        ));

        sqlx::query(
            "INSERT INTO notifications (user_id, title, message, created_at) VALUES (2, 'old', 'x', ?)",
        )
        .bind(Utc::now() - Duration::days(45))
        .execute(pool.as_sqlite().unwrap())
        .await
        .unwrap();
        service.notify(NewNotification::new(2, NotificationKind::Info, "fresh", "x")).await;

        assert_eq!(service.delete_old(DEFAULT_RETENTION_DAYS).await.unwrap(), 1);
        assert_eq!(service.list(2, false, 10).await.unwrap().len(), 1);
    }
}
