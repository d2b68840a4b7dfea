//! Comment service
//!
//! Threaded comments on published posts, plus the moderation actions
//! admins use on them. Post and author comment counters only count
//! approved, non-deleted comments and are recounted after every change.

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{
    Comment, CommentSort, CommentWithMeta, CreateCommentInput, ListParams, NewNotification,
    NotificationKind, PagedResult, User, DELETED_PLACEHOLDER, MAX_COMMENT_LENGTH,
};
use crate::services::notification::NotificationService;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Comment not found: {0}")]
    NotFound(i64),

    #[error("Post not found: {0}")]
    PostNotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    post_repo: Arc<dyn PostRepository>,
    notifications: Arc<NotificationService>,
}

impl CommentService {
    pub fn new(
        repo: Arc<dyn CommentRepository>,
        post_repo: Arc<dyn PostRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            repo,
            post_repo,
            notifications,
        }
    }

    /// Add a comment to a post
    ///
    /// # Errors
    /// - `PostNotFound` if the post does not exist or is unpublished
    /// - `ValidationError` if comments are closed, the content is empty or
    ///   too long, or the parent is on another post
    pub async fn create(
        &self,
        post_id: i64,
        author: &User,
        input: CreateCommentInput,
    ) -> Result<Comment, CommentServiceError> {
        let content = validate_content(&input.content)?;

        let post = self
            .post_repo
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .filter(|p| p.is_published)
            .ok_or(CommentServiceError::PostNotFound(post_id))?;
        if !post.allow_comments {
            return Err(CommentServiceError::ValidationError(
                "Comments are disabled for this post".into(),
            ));
        }

        let parent = match input.parent_id {
            Some(parent_id) => {
                let parent = self.get_by_id(parent_id).await?;
                if parent.post_id != post_id {
                    return Err(CommentServiceError::ValidationError(
                        "Parent comment belongs to another post".into(),
                    ));
                }
                Some(parent)
            }
            None => None,
        };

        let comment = Comment::new(post_id, author.id, input.parent_id, content);
        let created = self
            .repo
            .create(&comment)
            .await
            .context("Failed to create comment")?;
        self.refresh_counters(&created).await?;

        let link = format!("/posts/{}#comment-{}", post.slug, created.id);
        if post.author_id != author.id {
            self.notifications
                .notify(
                    NewNotification::new(
                        post.author_id,
                        NotificationKind::Comment,
                        "New comment",
                        format!("{} commented on \"{}\"", author.username, post.title),
                    )
                    .with_link(link.clone()),
                )
                .await;
        }
        if let Some(parent) = parent {
            if parent.author_id != author.id && parent.author_id != post.author_id {
                self.notifications
                    .notify(
                        NewNotification::new(
                            parent.author_id,
                            NotificationKind::Comment,
                            "New reply",
                            format!("{} replied to your comment", author.username),
                        )
                        .with_link(link),
                    )
                    .await;
            }
        }

        tracing::debug!(comment_id = created.id, post_id, "Comment created");
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Comment, CommentServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get comment")?
            .ok_or(CommentServiceError::NotFound(id))
    }

    /// Approved top-level comments with approved replies nested under them
    pub async fn thread(&self, post_id: i64, sort: CommentSort) -> Result<Vec<CommentWithMeta>, CommentServiceError> {
        self.post_repo
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .ok_or(CommentServiceError::PostNotFound(post_id))?;

        Ok(self
            .repo
            .thread_for_post(post_id, sort)
            .await
            .context("Failed to load comments")?)
    }

    /// Edit a comment's text. Only its author may do this.
    pub async fn update(&self, id: i64, actor: &User, content: &str) -> Result<Comment, CommentServiceError> {
        let mut comment = self.get_by_id(id).await?;
        if comment.author_id != actor.id {
            return Err(CommentServiceError::Forbidden("You can only edit your own comments".into()));
        }
        if comment.is_deleted {
            return Err(CommentServiceError::ValidationError("Comment was deleted".into()));
        }

        comment.content = validate_content(content)?;
        Ok(self.repo.update(&comment).await.context("Failed to update comment")?)
    }

    /// Delete a comment. A comment with replies keeps its place in the
    /// thread with placeholder content.
    pub async fn delete(&self, id: i64, actor: &User) -> Result<(), CommentServiceError> {
        let mut comment = self.get_by_id(id).await?;
        if !actor.can_delete(comment.author_id) {
            return Err(CommentServiceError::Forbidden("You cannot delete this comment".into()));
        }

        let has_replies = self
            .repo
            .has_replies(id)
            .await
            .context("Failed to check replies")?;
        if has_replies {
            comment.content = DELETED_PLACEHOLDER.to_string();
            comment.is_deleted = true;
            self.repo.update(&comment).await.context("Failed to soft-delete comment")?;
        } else {
            self.repo.delete(id).await.context("Failed to delete comment")?;
        }

        self.refresh_counters(&comment).await?;
        tracing::info!(comment_id = id, soft = has_replies, actor_id = actor.id, "Comment deleted");
        Ok(())
    }

    pub async fn approve(&self, id: i64) -> Result<Comment, CommentServiceError> {
        self.moderate(id, Comment::approve).await
    }

    pub async fn mark_spam(&self, id: i64) -> Result<Comment, CommentServiceError> {
        self.moderate(id, Comment::mark_as_spam).await
    }

    /// Remove a comment that is waiting for moderation
    pub async fn reject(&self, id: i64) -> Result<(), CommentServiceError> {
        let comment = self.get_by_id(id).await?;
        if comment.is_approved {
            return Err(CommentServiceError::ValidationError(
                "Only pending comments can be rejected".into(),
            ));
        }
        self.repo.delete(id).await.context("Failed to delete comment")?;
        self.refresh_counters(&comment).await?;
        Ok(())
    }

    /// Comments waiting for approval, oldest first
    pub async fn pending(&self, params: &ListParams) -> Result<PagedResult<CommentWithMeta>, CommentServiceError> {
        let (items, total) = self
            .repo
            .pending(params)
            .await
            .context("Failed to list pending comments")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<CommentWithMeta>, CommentServiceError> {
        Ok(self
            .repo
            .recent(limit.clamp(1, 100))
            .await
            .context("Failed to list recent comments")?)
    }

    pub async fn by_user(&self, user_id: i64, params: &ListParams) -> Result<PagedResult<Comment>, CommentServiceError> {
        let (items, total) = self
            .repo
            .by_user(user_id, params)
            .await
            .context("Failed to list user comments")?;
        Ok(PagedResult::new(items, total, params))
    }

    async fn moderate(&self, id: i64, action: fn(&mut Comment)) -> Result<Comment, CommentServiceError> {
        let mut comment = self.get_by_id(id).await?;
        action(&mut comment);
        let updated = self.repo.update(&comment).await.context("Failed to moderate comment")?;
        self.refresh_counters(&updated).await?;
        Ok(updated)
    }

    async fn refresh_counters(&self, comment: &Comment) -> Result<(), CommentServiceError> {
        self.post_repo
            .refresh_comments_count(comment.post_id)
            .await
            .context("Failed to refresh post comment count")?;
        self.repo
            .refresh_author_count(comment.author_id)
            .await
            .context("Failed to refresh author comment count")?;
        Ok(())
    }
}

fn validate_content(content: &str) -> Result<String, CommentServiceError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(CommentServiceError::ValidationError("Comment cannot be empty".into()));
    }
    if content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(CommentServiceError::ValidationError(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_LENGTH
        )));
    }
    Ok(content.to_string())
}
