//! Post model
//!
//! This module provides:
//! - `Post` entity representing a blog post
//! - Input types for creating and updating posts
//! - Filter, sort and pagination types for list queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, Tag};

/// Average reading speed used for `reading_time`
pub const WORDS_PER_MINUTE: usize = 200;

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    pub title: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    /// Markdown content
    pub content: String,
    /// Rendered HTML content
    pub content_html: String,
    pub excerpt: Option<String>,
    /// Author user ID
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub is_published: bool,
    pub is_featured: bool,
    pub allow_comments: bool,
    /// Estimated minutes to read
    pub reading_time: i64,
    pub views_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    /// Produced by the content pipeline
    pub ai_generated: bool,
    /// Validation report recorded when the pipeline published the post
    pub validation_metadata: Option<serde_json::Value>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new unpublished post. The ID is assigned by the database.
    pub fn new(title: String, slug: String, content: String, author_id: i64) -> Self {
        let now = Utc::now();
        let reading_time = reading_time(&content);
        Self {
            id: 0,
            title,
            slug,
            content,
            content_html: String::new(),
            excerpt: None,
            author_id,
            category_id: None,
            is_published: false,
            is_featured: false,
            allow_comments: true,
            reading_time,
            views_count: 0,
            likes_count: 0,
            comments_count: 0,
            meta_title: None,
            meta_description: None,
            ai_generated: false,
            validation_metadata: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark as published. `published_at` is only set the first time.
    pub fn publish(&mut self) {
        self.is_published = true;
        if self.published_at.is_none() {
            self.published_at = Some(Utc::now());
        }
    }

    pub fn unpublish(&mut self) {
        self.is_published = false;
    }

    /// Stored excerpt, or the first `length` characters of the content
    pub fn get_excerpt(&self, length: usize) -> String {
        if let Some(excerpt) = self.excerpt.as_deref().filter(|e| !e.trim().is_empty()) {
            return excerpt.to_string();
        }
        truncate_chars(&self.content, length)
    }
}

/// max(1, words / 200)
pub fn reading_time(content: &str) -> i64 {
    let words = content.split_whitespace().count();
    (words / WORDS_PER_MINUTE).max(1) as i64
}

/// Truncate to `length` characters, appending "..." when shortened
pub fn truncate_chars(text: &str, length: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= length {
        return text.to_string();
    }
    let cut: String = text.chars().take(length).collect();
    format!("{}...", cut.trim_end())
}

/// Post with its category and tags, as returned by detail endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub author_username: String,
    pub category: Option<Category>,
    pub tags: Vec<Tag>,
}

/// Input for creating a new post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    /// Tag names; missing tags are created
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub allow_comments: bool,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(skip)]
    pub ai_generated: bool,
    #[serde(skip)]
    pub validation_metadata: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

/// Input for updating a post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category_id: Option<i64>,
    /// Replaces the full tag set when present
    pub tags: Option<Vec<String>>,
    pub is_published: Option<bool>,
    pub is_featured: Option<bool>,
    pub allow_comments: Option<bool>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
}

impl UpdatePostInput {
    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.content.is_some()
            || self.excerpt.is_some()
            || self.category_id.is_some()
            || self.tags.is_some()
            || self.is_published.is_some()
            || self.is_featured.is_some()
            || self.allow_comments.is_some()
            || self.meta_title.is_some()
            || self.meta_description.is_some()
    }
}

/// Column used to order post listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSort {
    #[default]
    CreatedAt,
    PublishedAt,
    Views,
    Likes,
    Title,
}

impl PostSort {
    pub fn column(&self) -> &'static str {
        match self {
            PostSort::CreatedAt => "p.created_at",
            PostSort::PublishedAt => "p.published_at",
            PostSort::Views => "p.views_count",
            PostSort::Likes => "p.likes_count",
            PostSort::Title => "p.title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filters for post listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostFilter {
    pub category_id: Option<i64>,
    pub tag_id: Option<i64>,
    pub author_id: Option<i64>,
    /// Matched against title and content
    pub search: Option<String>,
    /// Only published posts when true
    #[serde(default)]
    pub published_only: bool,
    #[serde(default)]
    pub featured_only: bool,
    #[serde(default)]
    pub sort_by: PostSort,
    #[serde(default)]
    pub order: SortOrder,
}

impl PostFilter {
    pub fn published() -> Self {
        Self {
            published_only: true,
            ..Self::default()
        }
    }
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        ((self.total as u64 + self.per_page as u64 - 1) / self.per_page as u64) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Transform the items while keeping the page bookkeeping
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}
