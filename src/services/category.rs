//! Category service
//!
//! Business logic for categories:
//! - create with a unique name and a suffixed unique slug
//! - hierarchical tree and flat listings
//! - update with a parent cycle check
//! - merge one category into another
//!
//! Reads are cached; any write clears the `category:*` keys.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CategoryTree, CreateCategoryInput, UpdateCategoryInput};
use crate::services::slug::{generate_slug, unique_slug};
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const CATEGORY_CACHE_TTL_SECS: u64 = 3600;

const MIN_NAME_LENGTH: usize = 2;
const MAX_NAME_LENGTH: usize = 100;

const CACHE_KEY_CATEGORY_BY_SLUG: &str = "category:slug:";
const CACHE_KEY_CATEGORY_TREE: &str = "category:tree";
const CACHE_KEY_CATEGORY_LIST: &str = "category:list";

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Category name already exists: {0}")]
    DuplicateName(String),

    #[error("Category not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Parent category not found: {0}")]
    ParentNotFound(i64),

    #[error("Circular reference detected: category cannot be its own ancestor")]
    CircularReference,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<Cache>) -> Self {
        Self {
            repo,
            cache,
            cache_ttl: Duration::from_secs(CATEGORY_CACHE_TTL_SECS),
        }
    }

    /// Create a new category
    ///
    /// # Errors
    /// - `ValidationError` if the name is too short or too long
    /// - `DuplicateName` if another category has the same name
    /// - `ParentNotFound` if `parent_id` does not exist
    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let name = validate_name(&input.name)?;

        if self
            .repo
            .get_by_name(&name)
            .await
            .context("Failed to check category name")?
            .is_some()
        {
            return Err(CategoryServiceError::DuplicateName(name));
        }

        if let Some(parent_id) = input.parent_id {
            self.require_parent(parent_id).await?;
        }

        let slug = unique_slug(&generate_slug(&name), |candidate| async move {
            self.repo.exists_by_slug(&candidate, None).await
        })
        .await?;

        let mut category = Category::new(name, slug);
        category.description = input.description.filter(|d| !d.trim().is_empty());
        if let Some(color) = input.color {
            category.color = color;
        }
        category.parent_id = input.parent_id;
        category.sort_order = input.sort_order.unwrap_or(0);

        let created = self
            .repo
            .create(&category)
            .await
            .context("Failed to create category")?;

        self.invalidate_cache().await;
        tracing::info!(category_id = created.id, slug = %created.slug, "Category created");
        Ok(created)
    }

    /// Look a category up by exact name, creating it when missing
    pub async fn get_or_create(&self, name: &str) -> Result<Category, CategoryServiceError> {
        let name = validate_name(name)?;
        if let Some(existing) = self
            .repo
            .get_by_name(&name)
            .await
            .context("Failed to look up category")?
        {
            return Ok(existing);
        }
        self.create(CreateCategoryInput {
            description: Some(format!("Articles about {name}")),
            name,
            color: None,
            parent_id: None,
            sort_order: None,
        })
        .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| CategoryServiceError::NotFound(id.to_string()))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Category, CategoryServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_CATEGORY_BY_SLUG, slug);
        if let Ok(Some(category)) = self.cache.get::<Category>(&cache_key).await {
            return Ok(category);
        }

        let category = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get category by slug")?
            .ok_or_else(|| CategoryServiceError::NotFound(slug.to_string()))?;

        let _ = self.cache.set(&cache_key, &category, self.cache_ttl).await;
        Ok(category)
    }

    /// Active categories ordered by sort_order, then name
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<Category>>(CACHE_KEY_CATEGORY_LIST).await {
            return Ok(cached);
        }

        let categories = self.repo.list(true).await.context("Failed to list categories")?;
        let _ = self
            .cache
            .set(CACHE_KEY_CATEGORY_LIST, &categories, self.cache_ttl)
            .await;
        Ok(categories)
    }

    pub async fn tree(&self) -> Result<Vec<CategoryTree>, CategoryServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<CategoryTree>>(CACHE_KEY_CATEGORY_TREE).await {
            return Ok(cached);
        }

        let categories = self.repo.list(true).await.context("Failed to list categories")?;
        let tree = CategoryTree::build(&categories);
        let _ = self.cache.set(CACHE_KEY_CATEGORY_TREE, &tree, self.cache_ttl).await;
        Ok(tree)
    }

    /// All categories, inactive included, paired with their published post count
    pub async fn list_with_post_count(&self) -> Result<Vec<(Category, i64)>, CategoryServiceError> {
        let categories = self.repo.list(false).await.context("Failed to list categories")?;
        Ok(categories
            .into_iter()
            .map(|c| {
                let count = c.posts_count;
                (c, count)
            })
            .collect())
    }

    pub async fn popular(&self, limit: i64) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self
            .repo
            .popular(limit.clamp(1, 100))
            .await
            .context("Failed to get popular categories")?)
    }

    /// Update a category. A rename regenerates the slug.
    pub async fn update(
        &self,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let mut category = self.get_by_id(id).await?;
        let old_slug = category.slug.clone();

        if let Some(name) = input.name {
            let name = validate_name(&name)?;
            if !name.eq_ignore_ascii_case(&category.name) {
                if let Some(other) = self
                    .repo
                    .get_by_name(&name)
                    .await
                    .context("Failed to check category name")?
                {
                    if other.id != id {
                        return Err(CategoryServiceError::DuplicateName(name));
                    }
                }
                category.slug = unique_slug(&generate_slug(&name), |candidate| async move {
                    self.repo.exists_by_slug(&candidate, Some(id)).await
                })
                .await?;
            }
            category.name = name;
        }

        if let Some(parent) = input.parent_id {
            if let Some(parent_id) = parent {
                self.require_parent(parent_id).await?;
                if self.would_create_cycle(id, parent_id).await? {
                    return Err(CategoryServiceError::CircularReference);
                }
            }
            category.parent_id = parent;
        }

        if let Some(description) = input.description {
            category.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(color) = input.color {
            category.color = color;
        }
        if let Some(is_active) = input.is_active {
            category.is_active = is_active;
        }
        if let Some(sort_order) = input.sort_order {
            category.sort_order = sort_order;
        }

        let updated = self
            .repo
            .update(&category)
            .await
            .context("Failed to update category")?;

        let _ = self
            .cache
            .delete(&format!("{}{}", CACHE_KEY_CATEGORY_BY_SLUG, old_slug))
            .await;
        self.invalidate_cache().await;
        Ok(updated)
    }

    /// Delete a category. Its posts become uncategorised.
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        self.get_by_id(id).await?;
        self.repo.delete(id).await.context("Failed to delete category")?;
        self.invalidate_cache().await;
        tracing::info!(category_id = id, "Category deleted");
        Ok(())
    }

    /// Move all posts and child categories of `source_id` to `target_id`,
    /// then delete the source. Returns the number of posts moved.
    pub async fn merge(&self, source_id: i64, target_id: i64) -> Result<u64, CategoryServiceError> {
        if source_id == target_id {
            return Err(CategoryServiceError::ValidationError(
                "Cannot merge a category into itself".into(),
            ));
        }
        self.get_by_id(source_id).await?;
        self.get_by_id(target_id).await?;

        let moved = self
            .repo
            .reassign(source_id, target_id)
            .await
            .context("Failed to move posts")?;
        self.repo
            .delete(source_id)
            .await
            .context("Failed to delete merged category")?;
        self.repo
            .refresh_post_count(target_id)
            .await
            .context("Failed to refresh post count")?;

        self.invalidate_cache().await;
        tracing::info!(source_id, target_id, moved, "Categories merged");
        Ok(moved)
    }

    /// Recount published posts for a category after posts move in or out
    pub async fn refresh_post_count(&self, id: i64) -> Result<i64, CategoryServiceError> {
        let count = self
            .repo
            .refresh_post_count(id)
            .await
            .context("Failed to refresh post count")?;
        self.invalidate_cache().await;
        Ok(count)
    }

    async fn require_parent(&self, parent_id: i64) -> Result<(), CategoryServiceError> {
        match self
            .repo
            .get_by_id(parent_id)
            .await
            .context("Failed to get parent category")?
        {
            Some(_) => Ok(()),
            None => Err(CategoryServiceError::ParentNotFound(parent_id)),
        }
    }

    /// True if making `new_parent_id` the parent of `category_id` would loop
    async fn would_create_cycle(&self, category_id: i64, new_parent_id: i64) -> Result<bool, CategoryServiceError> {
        if category_id == new_parent_id {
            return Ok(true);
        }

        let parents: HashMap<i64, Option<i64>> = self
            .repo
            .list(false)
            .await
            .context("Failed to list categories")?
            .into_iter()
            .map(|c| (c.id, c.parent_id))
            .collect();

        let mut current = Some(new_parent_id);
        let mut steps = 0;
        while let Some(id) = current {
            if id == category_id {
                return Ok(true);
            }
            steps += 1;
            if steps > parents.len() {
                return Ok(true);
            }
            current = parents.get(&id).copied().flatten();
        }
        Ok(false)
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern("category:*").await;
    }
}

fn validate_name(name: &str) -> Result<String, CategoryServiceError> {
    let name = name.trim();
    let len = name.chars().count();
    if len < MIN_NAME_LENGTH {
        return Err(CategoryServiceError::ValidationError(format!(
            "Category name must be at least {} characters",
            MIN_NAME_LENGTH
        )));
    }
    if len > MAX_NAME_LENGTH {
        return Err(CategoryServiceError::ValidationError(format!(
            "Category name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}
