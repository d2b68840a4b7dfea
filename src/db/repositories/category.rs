//! Category repository
//!
//! Database operations for categories.
//!
//! This module provides:
//! - `CategoryRepository` trait defining the interface for category data access
//! - `SqlxCategoryRepository` implementing the trait for SQLite

use crate::db::pool::sqlite;
use crate::db::DynDatabasePool;
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, category: &Category) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// Get category by name (case-insensitive)
    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// List categories ordered by sort order and name
    async fn list(&self, active_only: bool) -> Result<Vec<Category>>;

    /// Categories with the most published posts
    async fn popular(&self, limit: i64) -> Result<Vec<Category>>;

    /// Update a category
    async fn update(&self, category: &Category) -> Result<Category>;

    /// Delete a category
    async fn delete(&self, id: i64) -> Result<()>;

    /// Check slug existence, ignoring `exclude_id`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Recount `posts_count` from published posts
    async fn refresh_post_count(&self, id: i64) -> Result<i64>;

    /// Move posts and child categories from `source_id` to `target_id`.
    /// Returns the number of posts moved.
    async fn reassign(&self, source_id: i64, target_id: i64) -> Result<u64>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        create_category_sqlite(sqlite(&self.pool)?, category).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        get_category_by_id_sqlite(sqlite(&self.pool)?, id).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        get_category_where_sqlite(sqlite(&self.pool)?, "slug = ?", slug).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        get_category_where_sqlite(sqlite(&self.pool)?, "LOWER(name) = LOWER(?)", name).await
    }

    async fn list(&self, active_only: bool) -> Result<Vec<Category>> {
        list_categories_sqlite(sqlite(&self.pool)?, active_only).await
    }

    async fn popular(&self, limit: i64) -> Result<Vec<Category>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM categories
            WHERE is_active = 1 AND posts_count > 0
            ORDER BY posts_count DESC, name ASC
            LIMIT ?
            "#,
            CATEGORY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(sqlite(&self.pool)?)
        .await
        .context("Failed to get popular categories")?;

        Ok(rows.iter().map(row_to_category_sqlite).collect())
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        update_category_sqlite(sqlite(&self.pool)?, category).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        // posts.category_id is cleared by ON DELETE SET NULL
        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(sqlite(&self.pool)?)
            .await
            .context("Failed to delete category")?;
        Ok(())
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM categories WHERE slug = ? AND (? IS NULL OR id != ?)",
        )
        .bind(slug)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(sqlite(&self.pool)?)
        .await
        .context("Failed to check category slug")?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    async fn refresh_post_count(&self, id: i64) -> Result<i64> {
        refresh_post_count_sqlite(sqlite(&self.pool)?, id).await
    }

    async fn reassign(&self, source_id: i64, target_id: i64) -> Result<u64> {
        reassign_sqlite(sqlite(&self.pool)?, source_id, target_id).await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const CATEGORY_COLUMNS: &str = r#"
    id, name, slug, description, color, parent_id, is_active, sort_order,
    posts_count, views_count, created_at, updated_at
"#;

async fn create_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO categories (name, slug, description, color, parent_id, is_active,
                                sort_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&category.name)
    .bind(&category.slug)
    .bind(&category.description)
    .bind(&category.color)
    .bind(category.parent_id)
    .bind(category.is_active)
    .bind(category.sort_order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_rowid(),
        posts_count: 0,
        views_count: 0,
        created_at: now,
        updated_at: now,
        ..category.clone()
    })
}

async fn get_category_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query(&format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by ID")?;

    Ok(row.as_ref().map(row_to_category_sqlite))
}

async fn get_category_where_sqlite(
    pool: &SqlitePool,
    predicate: &str,
    value: &str,
) -> Result<Option<Category>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM categories WHERE {}",
        CATEGORY_COLUMNS, predicate
    ))
    .bind(value)
    .fetch_optional(pool)
    .await
    .context("Failed to get category")?;

    Ok(row.as_ref().map(row_to_category_sqlite))
}

async fn list_categories_sqlite(pool: &SqlitePool, active_only: bool) -> Result<Vec<Category>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM categories
        WHERE (? = 0 OR is_active = 1)
        ORDER BY sort_order ASC, name ASC
        "#,
        CATEGORY_COLUMNS
    ))
    .bind(active_only)
    .fetch_all(pool)
    .await
    .context("Failed to list categories")?;

    Ok(rows.iter().map(row_to_category_sqlite).collect())
}

async fn update_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    sqlx::query(
        r#"
        UPDATE categories
        SET name = ?, slug = ?, description = ?, color = ?, parent_id = ?,
            is_active = ?, sort_order = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&category.name)
    .bind(&category.slug)
    .bind(&category.description)
    .bind(&category.color)
    .bind(category.parent_id)
    .bind(category.is_active)
    .bind(category.sort_order)
    .bind(Utc::now())
    .bind(category.id)
    .execute(pool)
    .await
    .context("Failed to update category")?;

    get_category_by_id_sqlite(pool, category.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
}

async fn refresh_post_count_sqlite(pool: &SqlitePool, id: i64) -> Result<i64> {
    sqlx::query(
        r#"
        UPDATE categories
        SET posts_count = (SELECT COUNT(*) FROM posts WHERE category_id = ?1 AND is_published = 1)
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to refresh category post count")?;

    let row = sqlx::query("SELECT posts_count FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to read category post count")?;

    Ok(row.map(|r| r.get("posts_count")).unwrap_or(0))
}

async fn reassign_sqlite(pool: &SqlitePool, source_id: i64, target_id: i64) -> Result<u64> {
    let mut tx = pool.begin().await.context("Failed to begin category merge")?;

    let moved = sqlx::query("UPDATE posts SET category_id = ? WHERE category_id = ?")
        .bind(target_id)
        .bind(source_id)
        .execute(&mut *tx)
        .await
        .context("Failed to move posts")?
        .rows_affected();

    sqlx::query("UPDATE categories SET parent_id = ? WHERE parent_id = ? AND id != ?")
        .bind(target_id)
        .bind(source_id)
        .bind(target_id)
        .execute(&mut *tx)
        .await
        .context("Failed to move child categories")?;

    tx.commit().await.context("Failed to commit category merge")?;
    Ok(moved)
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        color: row.get("color"),
        parent_id: row.get("parent_id"),
        is_active: row.get("is_active"),
        sort_order: row.get("sort_order"),
        posts_count: row.get("posts_count"),
        views_count: row.get("views_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxCategoryRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxCategoryRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo
            .create(&Category::new("Tech".into(), "tech".into()))
            .await
            .unwrap();

        assert!(created.id > 0);
        assert_eq!(repo.get_by_slug("tech").await.unwrap().unwrap().id, created.id);
        assert_eq!(repo.get_by_name("TECH").await.unwrap().unwrap().id, created.id);
        assert!(repo.exists_by_slug("tech", None).await.unwrap());
        assert!(!repo.exists_by_slug("tech", Some(created.id)).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_active_only() {
        let (_pool, repo) = setup_test_repo().await;
        let mut hidden = Category::new("Hidden".into(), "hidden".into());
        hidden.is_active = false;
        repo.create(&hidden).await.unwrap();
        repo.create(&Category::new("Shown".into(), "shown".into())).await.unwrap();

        assert_eq!(repo.list(true).await.unwrap().len(), 1);
        assert_eq!(repo.list(false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reassign_and_refresh_count() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        let source = repo.create(&Category::new("A".into(), "a".into())).await.unwrap();
        let target = repo.create(&Category::new("B".into(), "b".into())).await.unwrap();
        let mut child = Category::new("A1".into(), "a1".into());
        child.parent_id = Some(source.id);
        let child = repo.create(&child).await.unwrap();

        let user_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES ('u', 'u@e.com', 'h')",
        )
        .execute(sqlite_pool)
        .await
        .unwrap()
        .last_insert_rowid();
        for slug in ["p1", "p2"] {
            sqlx::query(
                "INSERT INTO posts (title, slug, content, author_id, category_id, is_published) VALUES (?, ?, 'c', ?, ?, 1)",
            )
            .bind(slug)
            .bind(slug)
            .bind(user_id)
            .bind(source.id)
            .execute(sqlite_pool)
            .await
            .unwrap();
        }

        assert_eq!(repo.refresh_post_count(source.id).await.unwrap(), 2);
        assert_eq!(repo.reassign(source.id, target.id).await.unwrap(), 2);
        assert_eq!(repo.refresh_post_count(target.id).await.unwrap(), 2);
        assert_eq!(repo.refresh_post_count(source.id).await.unwrap(), 0);

        let child = repo.get_by_id(child.id).await.unwrap().unwrap();
        assert_eq!(child.parent_id, Some(target.id));
    }
}
