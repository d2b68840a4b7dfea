//! Tag model
//!
//! This module defines the Tag entity and related types for the Inkwell blog platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TAG_COLOR: &str = "#6c757d";

/// Tag entity.
///
/// Tags cut across categories and drive related-post lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Tag name (unique)
    pub name: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub description: Option<String>,
    pub color: String,
    /// Number of posts carrying this tag
    pub usage_count: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Tag {
    /// Create a new Tag. The ID is assigned by the database.
    pub fn new(name: String, slug: String) -> Self {
        Self {
            id: 0,
            name,
            slug,
            description: None,
            color: DEFAULT_TAG_COLOR.to_string(),
            usage_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// Input for creating a tag
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTagInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Input for updating a tag
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTagInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

/// Tag cloud entry with a display weight from 1 to 5
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagCloudEntry {
    pub name: String,
    pub slug: String,
    pub count: i64,
    pub size: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_new() {
        let tag = Tag::new("Rust Programming".to_string(), "rust-programming".to_string());

        assert_eq!(tag.id, 0);
        assert_eq!(tag.slug, "rust-programming");
        assert_eq!(tag.color, DEFAULT_TAG_COLOR);
        assert_eq!(tag.usage_count, 0);
    }
}
