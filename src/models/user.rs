//! User model
//!
//! This module defines the User entity and related types for the Inkwell blog platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User entity representing a registered user in the system.
///
/// Users can have different roles (Admin, Editor, Author) which determine
/// their permissions within the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// User role
    pub role: UserRole,
    /// Inactive accounts cannot log in
    pub is_active: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    /// Number of successful logins
    pub login_count: i64,
    pub last_login: Option<DateTime<Utc>>,
    pub posts_count: i64,
    pub comments_count: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// The password must already be hashed with `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            role,
            is_active: true,
            first_name: None,
            last_name: None,
            bio: None,
            website: None,
            location: None,
            login_count: 0,
            last_login: None,
            posts_count: 0,
            comments_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Check if the user is an editor (or higher)
    pub fn is_editor(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Editor)
    }

    /// Admins and editors can edit anything, authors only their own content.
    pub fn can_edit(&self, author_id: i64) -> bool {
        self.is_editor() || self.id == author_id
    }

    /// Only admins and the owner may delete.
    pub fn can_delete(&self, author_id: i64) -> bool {
        self.is_admin() || self.id == author_id
    }

    /// "First Last", falling back to the username
    pub fn full_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.username.clone(),
        }
    }
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Administrator - full access
    Admin,
    /// Editor - can edit all content
    Editor,
    /// Author - can only edit own content
    #[default]
    Author,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Editor => write!(f, "editor"),
            UserRole::Author => write!(f, "author"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "editor" => Ok(UserRole::Editor),
            "author" => Ok(UserRole::Author),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Input for registering a new user (before password hashing)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Profile fields a user may change on their own account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
}

impl UpdateProfileInput {
    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.email.is_some()
            || self.first_name.is_some()
            || self.last_name.is_some()
            || self.bio.is_some()
            || self.website.is_some()
            || self.location.is_some()
    }
}

/// Aggregated activity numbers for a user
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStats {
    pub posts: i64,
    pub published_posts: i64,
    pub comments: i64,
    pub likes_given: i64,
    pub likes_received: i64,
    pub bookmarks: i64,
    pub total_views: i64,
}
