//! Category model
//!
//! This module defines the Category entity and related types for the Inkwell blog platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY_COLOR: &str = "#007bff";

/// Category entity.
///
/// Categories may nest through `parent_id`; `posts_count` is maintained by
/// the post service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// Category name (unique)
    pub name: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub description: Option<String>,
    /// Display colour as `#rrggbb`
    pub color: String,
    /// Parent category ID
    pub parent_id: Option<i64>,
    pub is_active: bool,
    /// Sort order within parent
    pub sort_order: i32,
    pub posts_count: i64,
    pub views_count: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Create a new Category. The ID is assigned by the database.
    pub fn new(name: String, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            slug,
            description: None,
            color: DEFAULT_CATEGORY_COLOR.to_string(),
            parent_id: None,
            is_active: true,
            sort_order: 0,
            posts_count: 0,
            views_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if this is a root category (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Category with its children for tree representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTree {
    /// The category itself
    #[serde(flatten)]
    pub category: Category,
    /// Child categories
    pub children: Vec<CategoryTree>,
}

impl CategoryTree {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            children: Vec::new(),
        }
    }

    /// Build a forest from a flat list. Categories whose parent is missing
    /// from the list become roots.
    pub fn build(categories: &[Category]) -> Vec<CategoryTree> {
        let ids: Vec<i64> = categories.iter().map(|c| c.id).collect();
        let mut roots: Vec<&Category> = categories
            .iter()
            .filter(|c| c.parent_id.map_or(true, |p| !ids.contains(&p)))
            .collect();
        roots.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        roots
            .into_iter()
            .map(|root| Self::build_node(root, categories, 0))
            .collect()
    }

    fn build_node(category: &Category, all: &[Category], depth: usize) -> CategoryTree {
        let mut children: Vec<&Category> = all
            .iter()
            .filter(|c| c.parent_id == Some(category.id) && c.id != category.id)
            .collect();
        children.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));

        // Guards against parent cycles written directly to the table.
        let children = if depth >= all.len() {
            Vec::new()
        } else {
            children
                .into_iter()
                .map(|child| Self::build_node(child, all, depth + 1))
                .collect()
        };

        CategoryTree {
            category: category.clone(),
            children,
        }
    }

    /// Get the total count of this category and all descendants
    pub fn total_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.total_count()).sum::<usize>()
    }

    /// Get all descendant IDs (not including self)
    pub fn descendant_ids(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        for child in &self.children {
            ids.push(child.category.id);
            ids.extend(child.descendant_ids());
        }
        ids
    }
}

/// Input for creating a new category
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// Input for updating a category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    /// `Some(None)` detaches the category from its parent
    #[serde(default, with = "double_option")]
    pub parent_id: Option<Option<i64>>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

/// Distinguishes an absent field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, name: &str, parent_id: Option<i64>) -> Category {
        let mut c = Category::new(name.to_string(), name.to_lowercase());
        c.id = id;
        c.parent_id = parent_id;
        c
    }

    #[test]
    fn test_category_new_defaults() {
        let c = Category::new("Tech".to_string(), "tech".to_string());
        assert_eq!(c.color, DEFAULT_CATEGORY_COLOR);
        assert!(c.is_active);
        assert!(c.is_root());
    }

    #[test]
    fn test_build_tree() {
        let categories = vec![
            category(1, "Tech", None),
            category(2, "Rust", Some(1)),
            category(3, "Go", Some(1)),
            category(4, "Life", None),
            category(5, "Async", Some(2)),
        ];

        let tree = CategoryTree::build(&categories);

        assert_eq!(tree.len(), 2);
        let tech = tree.iter().find(|t| t.category.id == 1).unwrap();
        assert_eq!(tech.total_count(), 4);
        assert_eq!(tech.children[0].category.name, "Go");
        let mut ids = tech.descendant_ids();
        ids.sort();
        assert_eq!(ids, vec![2, 3, 5]);
    }

    #[test]
    fn test_orphan_becomes_root() {
        let categories = vec![category(2, "Orphan", Some(99))];
        let tree = CategoryTree::build(&categories);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_update_input_distinguishes_null_parent() {
        let detach: UpdateCategoryInput = serde_json::from_str(r#"{"parent_id": null}"#).unwrap();
        assert_eq!(detach.parent_id, Some(None));

        let untouched: UpdateCategoryInput = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(untouched.parent_id, None);
    }
}
