//! Likes, bookmarks and views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minutes within which a repeated view of the same post is not counted again
pub const VIEW_DEDUP_MINUTES: i64 = 30;

/// Like target type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeTarget {
    Post,
    Comment,
}

impl LikeTarget {
    /// Like table for this target
    pub(crate) fn table(&self) -> &'static str {
        match self {
            LikeTarget::Post => "post_likes",
            LikeTarget::Comment => "comment_likes",
        }
    }

    /// Foreign key column in the like table
    pub(crate) fn column(&self) -> &'static str {
        match self {
            LikeTarget::Post => "post_id",
            LikeTarget::Comment => "comment_id",
        }
    }

    /// Table holding the liked entity and its `likes_count`
    pub(crate) fn target_table(&self) -> &'static str {
        match self {
            LikeTarget::Post => "posts",
            LikeTarget::Comment => "comments",
        }
    }
}

impl std::fmt::Display for LikeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Post => write!(f, "post"),
            Self::Comment => write!(f, "comment"),
        }
    }
}

/// Like entity, unique per user and target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: i64,
    pub user_id: i64,
    pub target: LikeTarget,
    pub target_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of a like toggle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: i64,
}

/// Bookmark entity, unique per user and post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A recorded post view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub id: i64,
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub viewed_at: DateTime<Utc>,
}

/// Request details attached to a view
#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    pub user_id: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}
