//! View tracking service
//!
//! Records post views with a de-duplication window, so refreshing a page
//! does not inflate `views_count`.

use crate::db::repositories::{PostRepository, ViewRepository};
use crate::models::{Post, View, ViewContext, VIEW_DEDUP_MINUTES};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Views older than this are removed by `clean_old_views`
pub const DEFAULT_VIEW_RETENTION_DAYS: i64 = 90;

#[derive(Debug, thiserror::Error)]
pub enum ViewServiceError {
    #[error("Post not found: {0}")]
    PostNotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A post with the time the user last viewed it
#[derive(Debug, Clone, serde::Serialize)]
pub struct HistoryEntry {
    pub post: Post,
    pub viewed_at: DateTime<Utc>,
}

pub struct ViewService {
    repo: Arc<dyn ViewRepository>,
    post_repo: Arc<dyn PostRepository>,
    dedup_window: Duration,
}

impl ViewService {
    pub fn new(repo: Arc<dyn ViewRepository>, post_repo: Arc<dyn PostRepository>) -> Self {
        Self {
            repo,
            post_repo,
            dedup_window: Duration::minutes(VIEW_DEDUP_MINUTES),
        }
    }

    /// Record a view. Returns `None` when the same viewer already viewed the
    /// post within the de-duplication window.
    pub async fn record_view(&self, post_id: i64, ctx: &ViewContext) -> Result<Option<View>, ViewServiceError> {
        let since = Utc::now() - self.dedup_window;
        Ok(self
            .repo
            .record(post_id, ctx, since)
            .await
            .context("Failed to record view")?)
    }

    /// Total views, or distinct viewers when `unique`
    pub async fn post_views(&self, post_id: i64, unique: bool) -> Result<i64, ViewServiceError> {
        Ok(self
            .repo
            .count_for_post(post_id, unique)
            .await
            .context("Failed to count views")?)
    }

    /// Published posts with the most views in the last `days` days
    pub async fn popular_by_views(&self, days: i64, limit: i64) -> Result<Vec<(Post, i64)>, ViewServiceError> {
        let since = Utc::now() - Duration::days(days.max(1));
        let counts = self
            .repo
            .popular_since(since, limit.clamp(1, 100))
            .await
            .context("Failed to get popular posts")?;

        let mut posts = Vec::with_capacity(counts.len());
        for (post_id, views) in counts {
            if let Some(post) = self.post_repo.get_by_id(post_id).await.context("Failed to get post")? {
                posts.push((post, views));
            }
        }
        Ok(posts)
    }

    /// Posts a user viewed, most recent first
    pub async fn user_history(&self, user_id: i64, limit: i64) -> Result<Vec<HistoryEntry>, ViewServiceError> {
        let history = self
            .repo
            .history_for_user(user_id, limit.clamp(1, 100))
            .await
            .context("Failed to get view history")?;

        let mut entries = Vec::with_capacity(history.len());
        for (post_id, viewed_at) in history {
            if let Some(post) = self.post_repo.get_by_id(post_id).await.context("Failed to get post")? {
                entries.push(HistoryEntry { post, viewed_at });
            }
        }
        Ok(entries)
    }

    /// Delete views older than `days`
    pub async fn clean_old_views(&self, days: i64) -> Result<u64, ViewServiceError> {
        let cutoff = Utc::now() - Duration::days(days.max(1));
        let removed = self
            .repo
            .delete_older_than(cutoff)
            .await
            .context("Failed to clean old views")?;
        if removed > 0 {
            tracing::info!(removed, days, "Pruned old views");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxPostRepository, SqlxViewRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup() -> (DynDatabasePool, ViewService, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let sqlite = pool.as_sqlite().unwrap();
        sqlx::query("INSERT INTO users (username, email, password_hash) VALUES ('u', 'u@example.com', 'h')")
            .execute(sqlite)
            .await
            .unwrap();
        let post_id = sqlx::query(
            "INSERT INTO posts (title, slug, content, author_id, is_published) VALUES ('P', 'p', 'x', 1, 1)",
        )
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();

        let service = ViewService::new(
            SqlxViewRepository::boxed(pool.clone()),
            SqlxPostRepository::boxed(pool.clone()),
        );
        (pool, service, post_id)
    }

    fn anon(ip: &str) -> ViewContext {
        ViewContext {
            ip_address: Some(ip.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_dedup_window() {
        let (_pool, service, post_id) = setup().await;
        assert!(service.record_view(post_id, &anon("10.0.0.1")).await.unwrap().is_some());
        assert!(service.record_view(post_id, &anon("10.0.0.1")).await.unwrap().is_none());
        assert!(service.record_view(post_id, &anon("10.0.0.2")).await.unwrap().is_some());

        let user = ViewContext {
            user_id: Some(1),
            ip_address: Some("10.0.0.1".into()),
            ..Default::default()
        };
        assert!(service.record_view(post_id, &user).await.unwrap().is_some());
        assert!(service.record_view(post_id, &user).await.unwrap().is_none());

        assert_eq!(service.post_views(post_id, false).await.unwrap(), 3);
        assert_eq!(service.post_views(post_id, true).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_popular_history_and_cleanup() {
        let (pool, service, post_id) = setup().await;
        let user = ViewContext {
            user_id: Some(1),
            ..Default::default()
        };
        service.record_view(post_id, &user).await.unwrap();

        let popular = service.popular_by_views(7, 10).await.unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].0.views_count, 1);

        let history = service.user_history(1, 10).await.unwrap();
        assert_eq!(history[0].post.id, post_id);

        sqlx::query("INSERT INTO views (post_id, ip_address, viewed_at) VALUES (?, 'old', ?)")
            .bind(post_id)
            .bind(Utc::now() - Duration::days(120))
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(service.clean_old_views(DEFAULT_VIEW_RETENTION_DAYS).await.unwrap(), 1);
        assert_eq!(service.post_views(post_id, false).await.unwrap(), 1);
    }
}
