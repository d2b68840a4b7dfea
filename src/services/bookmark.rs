//! Bookmark service

use crate::db::repositories::{BookmarkRepository, PostRepository};
use crate::models::{ListParams, PagedResult, Post};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum BookmarkServiceError {
    #[error("Post not found: {0}")]
    PostNotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct BookmarkService {
    repo: Arc<dyn BookmarkRepository>,
    post_repo: Arc<dyn PostRepository>,
}

impl BookmarkService {
    pub fn new(repo: Arc<dyn BookmarkRepository>, post_repo: Arc<dyn PostRepository>) -> Self {
        Self { repo, post_repo }
    }

    /// Bookmark or un-bookmark. Returns whether the post is now bookmarked.
    pub async fn toggle(&self, user_id: i64, post_id: i64) -> Result<bool, BookmarkServiceError> {
        if self.is_bookmarked(user_id, post_id).await? {
            self.remove(user_id, post_id).await?;
            Ok(false)
        } else {
            self.add(user_id, post_id, None).await?;
            Ok(true)
        }
    }

    /// Returns false if the bookmark already existed
    pub async fn add(&self, user_id: i64, post_id: i64, notes: Option<&str>) -> Result<bool, BookmarkServiceError> {
        self.require_post(post_id).await?;
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        let created = self
            .repo
            .add(user_id, post_id, notes)
            .await
            .context("Failed to add bookmark")?;
        Ok(created.is_some())
    }

    pub async fn remove(&self, user_id: i64, post_id: i64) -> Result<bool, BookmarkServiceError> {
        Ok(self
            .repo
            .remove(user_id, post_id)
            .await
            .context("Failed to remove bookmark")?)
    }

    pub async fn is_bookmarked(&self, user_id: i64, post_id: i64) -> Result<bool, BookmarkServiceError> {
        Ok(self
            .repo
            .exists(user_id, post_id)
            .await
            .context("Failed to check bookmark")?)
    }

    /// A user's bookmarked posts, most recently bookmarked first
    pub async fn posts_for_user(&self, user_id: i64, params: &ListParams) -> Result<PagedResult<Post>, BookmarkServiceError> {
        let (ids, total) = self
            .repo
            .post_ids_for_user(user_id, params)
            .await
            .context("Failed to list bookmarks")?;

        let mut posts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(post) = self.post_repo.get_by_id(id).await.context("Failed to get post")? {
                posts.push(post);
            }
        }
        Ok(PagedResult::new(posts, total, params))
    }

    pub async fn count_for_post(&self, post_id: i64) -> Result<i64, BookmarkServiceError> {
        Ok(self
            .repo
            .count_for_post(post_id)
            .await
            .context("Failed to count bookmarks")?)
    }

    async fn require_post(&self, post_id: i64) -> Result<(), BookmarkServiceError> {
        match self.post_repo.get_by_id(post_id).await.context("Failed to get post")? {
            Some(_) => Ok(()),
            None => Err(BookmarkServiceError::PostNotFound(post_id)),
        }
    }
}
