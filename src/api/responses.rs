//! Shared API response types

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{PagedResult, User, UserRole};
use crate::services::TokenPair;

/// One page of items with paging totals
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> From<PagedResult<T>> for Paginated<T> {
    fn from(result: PagedResult<T>) -> Self {
        let total_pages = result.total_pages();
        Self {
            items: result.items,
            total: result.total,
            page: result.page,
            per_page: result.per_page,
            total_pages,
        }
    }
}

/// Public view of a user, without email or login details
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub role: UserRole,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub posts_count: i64,
    pub comments_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name(),
            username: user.username,
            role: user.role,
            bio: user.bio,
            website: user.website,
            location: user.location,
            posts_count: user.posts_count,
            comments_count: user.comments_count,
            created_at: user.created_at,
        }
    }
}

/// Response for login and registration
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Plain acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
