//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Replaces the content of a comment that was removed while it still had replies
pub const DELETED_PLACEHOLDER: &str = "[deleted]";

/// Maximum comment length in characters
pub const MAX_COMMENT_LENGTH: usize = 5000;

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    /// Parent comment on the same post
    pub parent_id: Option<i64>,
    pub content: String,
    pub is_approved: bool,
    pub is_spam: bool,
    /// Soft-deleted comments keep their place in a thread
    pub is_deleted: bool,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: i64, author_id: i64, parent_id: Option<i64>, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            post_id,
            author_id,
            parent_id,
            content,
            is_approved: true,
            is_spam: false,
            is_deleted: false,
            likes_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn approve(&mut self) {
        self.is_approved = true;
        self.is_spam = false;
    }

    pub fn disapprove(&mut self) {
        self.is_approved = false;
    }

    /// Spam is never shown, so it is unapproved as well
    pub fn mark_as_spam(&mut self) {
        self.is_spam = true;
        self.is_approved = false;
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Comment with author details and nested replies for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithMeta {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_username: String,
    pub avatar_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub replies: Vec<CommentWithMeta>,
}

impl CommentWithMeta {
    /// Generate Gravatar URL from email
    pub fn gravatar_url(email: Option<&str>) -> String {
        match email {
            Some(e) if !e.is_empty() => {
                let hash = format!("{:x}", md5::compute(e.trim().to_lowercase()));
                format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
            }
            _ => "https://www.gravatar.com/avatar/?d=mp&s=80".to_string(),
        }
    }
}

/// Input for creating a comment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// Ordering of top-level comments in a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    #[default]
    Newest,
    Oldest,
    Popular,
}

impl CommentSort {
    pub fn order_clause(&self) -> &'static str {
        match self {
            CommentSort::Newest => "c.created_at DESC",
            CommentSort::Oldest => "c.created_at ASC",
            CommentSort::Popular => "c.likes_count DESC, c.created_at DESC",
        }
    }
}
