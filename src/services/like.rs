//! Like service
//!
//! Likes on posts and comments, one per user and target. The target's
//! `likes_count` is kept in step by the repository.

use crate::db::repositories::{CommentRepository, LikeRepository, PostRepository};
use crate::models::{LikeState, LikeTarget, NewNotification, NotificationKind, User};
use crate::services::notification::NotificationService;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum LikeServiceError {
    #[error("{0} not found: {1}")]
    NotFound(LikeTarget, i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Owner and display details of a likeable item
struct TargetInfo {
    owner_id: i64,
    label: String,
    link: String,
}

pub struct LikeService {
    repo: Arc<dyn LikeRepository>,
    post_repo: Arc<dyn PostRepository>,
    comment_repo: Arc<dyn CommentRepository>,
    notifications: Arc<NotificationService>,
}

impl LikeService {
    pub fn new(
        repo: Arc<dyn LikeRepository>,
        post_repo: Arc<dyn PostRepository>,
        comment_repo: Arc<dyn CommentRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            repo,
            post_repo,
            comment_repo,
            notifications,
        }
    }

    /// Like if not yet liked, otherwise unlike
    pub async fn toggle(&self, user: &User, target: LikeTarget, target_id: i64) -> Result<LikeState, LikeServiceError> {
        let liked = self
            .repo
            .exists(user.id, target, target_id)
            .await
            .context("Failed to check like")?;
        if liked {
            self.remove(user, target, target_id).await
        } else {
            self.add(user, target, target_id).await
        }
    }

    /// Like a post or comment. Liking twice is a no-op.
    pub async fn add(&self, user: &User, target: LikeTarget, target_id: i64) -> Result<LikeState, LikeServiceError> {
        let info = self.target_info(target, target_id).await?;
        let added = self
            .repo
            .add(user.id, target, target_id)
            .await
            .context("Failed to add like")?;

        if added && info.owner_id != user.id {
            self.notifications
                .notify(
                    NewNotification::new(
                        info.owner_id,
                        NotificationKind::Like,
                        "New like",
                        format!("{} liked your {}", user.username, info.label),
                    )
                    .with_link(info.link),
                )
                .await;
        }

        self.state(true, target, target_id).await
    }

    pub async fn remove(&self, user: &User, target: LikeTarget, target_id: i64) -> Result<LikeState, LikeServiceError> {
        self.target_info(target, target_id).await?;
        self.repo
            .remove(user.id, target, target_id)
            .await
            .context("Failed to remove like")?;
        self.state(false, target, target_id).await
    }

    pub async fn is_liked(&self, user_id: i64, target: LikeTarget, target_id: i64) -> Result<bool, LikeServiceError> {
        Ok(self
            .repo
            .exists(user_id, target, target_id)
            .await
            .context("Failed to check like")?)
    }

    pub async fn count(&self, target: LikeTarget, target_id: i64) -> Result<i64, LikeServiceError> {
        Ok(self
            .repo
            .count(target, target_id)
            .await
            .context("Failed to count likes")?)
    }

    async fn state(&self, liked: bool, target: LikeTarget, target_id: i64) -> Result<LikeState, LikeServiceError> {
        Ok(LikeState {
            liked,
            likes_count: self.count(target, target_id).await?,
        })
    }

    async fn target_info(&self, target: LikeTarget, target_id: i64) -> Result<TargetInfo, LikeServiceError> {
        match target {
            LikeTarget::Post => {
                let post = self
                    .post_repo
                    .get_by_id(target_id)
                    .await
                    .context("Failed to get post")?
                    .ok_or(LikeServiceError::NotFound(target, target_id))?;
                Ok(TargetInfo {
                    owner_id: post.author_id,
                    label: format!("post \"{}\"", post.title),
                    link: format!("/posts/{}", post.slug),
                })
            }
            LikeTarget::Comment => {
                let comment = self
                    .comment_repo
                    .get_by_id(target_id)
                    .await
                    .context("Failed to get comment")?
                    .filter(|c| !c.is_deleted)
                    .ok_or(LikeServiceError::NotFound(target, target_id))?;
                Ok(TargetInfo {
                    owner_id: comment.author_id,
                    label: "comment".to_string(),
                    link: format!("/comments/{}", comment.id),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCommentRepository, SqlxLikeRepository, SqlxNotificationRepository, SqlxPostRepository,
        SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::db::repositories::UserRepository;
    use crate::models::UserRole;

    async fn setup() -> (LikeService, Arc<NotificationService>, User, User, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let owner = user_repo
            .create(&User::new("owner".into(), "o@example.com".into(), "h".into(), UserRole::Author))
            .await
            .unwrap();
        let fan = user_repo
            .create(&User::new("fan".into(), "f@example.com".into(), "h".into(), UserRole::Author))
            .await
            .unwrap();

        let sqlite = pool.as_sqlite().unwrap();
        let post_id = sqlx::query(
            "INSERT INTO posts (title, slug, content, author_id, is_published) VALUES ('P', 'p', 'x', ?, 1)",
        )
        .bind(owner.id)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();
        let comment_id = sqlx::query(
            "INSERT INTO comments (post_id, author_id, content, is_approved) VALUES (?, ?, 'c', 1)",
        )
        .bind(post_id)
        .bind(fan.id)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();

        let notifications = Arc::new(NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            user_repo,
        ));
        let service = LikeService::new(
            SqlxLikeRepository::boxed(pool.clone()),
            SqlxPostRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool),
            notifications.clone(),
        );
        (service, notifications, owner, fan, post_id, comment_id)
    }

    #[tokio::test]
    async fn test_toggle_post_like() {
        let (service, notifications, owner, fan, post_id, _) = setup().await;

        let on = service.toggle(&fan, LikeTarget::Post, post_id).await.unwrap();
        assert_eq!(on, LikeState { liked: true, likes_count: 1 });
        assert!(service.is_liked(fan.id, LikeTarget::Post, post_id).await.unwrap());
        assert_eq!(notifications.unread_count(owner.id).await.unwrap(), 1);

        let again = service.add(&fan, LikeTarget::Post, post_id).await.unwrap();
        assert_eq!(again.likes_count, 1);
        assert_eq!(notifications.unread_count(owner.id).await.unwrap(), 1);

        let off = service.toggle(&fan, LikeTarget::Post, post_id).await.unwrap();
        assert_eq!(off, LikeState { liked: false, likes_count: 0 });
    }

    #[tokio::test]
    async fn test_self_like_does_not_notify() {
        let (service, notifications, _owner, fan, _, comment_id) = setup().await;
        let state = service.add(&fan, LikeTarget::Comment, comment_id).await.unwrap();
        assert_eq!(state.likes_count, 1);
        assert_eq!(notifications.unread_count(fan.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_target() {
        let (service, _, _, fan, _, _) = setup().await;
        assert!(matches!(
            service.toggle(&fan, LikeTarget::Post, 404).await,
            Err(LikeServiceError::NotFound(LikeTarget::Post, 404))
        ));
    }
}
