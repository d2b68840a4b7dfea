//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite

use crate::db::pool::sqlite;
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole, UserStats};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update profile, role, status and password fields
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user
    async fn delete(&self, id: i64) -> Result<()>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// List users, newest first, optionally filtered by a search term
    async fn list(&self, search: Option<&str>, page: i64, per_page: i64) -> Result<(Vec<User>, i64)>;

    /// Bump login counters
    async fn record_login(&self, id: i64) -> Result<()>;

    /// All active administrators
    async fn list_admins(&self) -> Result<Vec<User>>;

    /// Aggregate activity numbers
    async fn stats(&self, id: i64) -> Result<UserStats>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        create_user_sqlite(sqlite(&self.pool)?, user).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        get_user_by_id_sqlite(sqlite(&self.pool)?, id).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        get_user_by_username_sqlite(sqlite(&self.pool)?, username).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        get_user_by_email_sqlite(sqlite(&self.pool)?, email).await
    }

    async fn update(&self, user: &User) -> Result<User> {
        update_user_sqlite(sqlite(&self.pool)?, user).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        delete_user_sqlite(sqlite(&self.pool)?, id).await
    }

    async fn count(&self) -> Result<i64> {
        count_users_sqlite(sqlite(&self.pool)?).await
    }

    async fn list(&self, search: Option<&str>, page: i64, per_page: i64) -> Result<(Vec<User>, i64)> {
        list_users_sqlite(sqlite(&self.pool)?, search, page, per_page).await
    }

    async fn record_login(&self, id: i64) -> Result<()> {
        record_login_sqlite(sqlite(&self.pool)?, id).await
    }

    async fn list_admins(&self) -> Result<Vec<User>> {
        list_admins_sqlite(sqlite(&self.pool)?).await
    }

    async fn stats(&self, id: i64) -> Result<UserStats> {
        user_stats_sqlite(sqlite(&self.pool)?, id).await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const USER_COLUMNS: &str = r#"
    id, username, email, password_hash, role, is_active, first_name, last_name,
    bio, website, location, login_count, last_login, posts_count, comments_count,
    created_at, updated_at
"#;

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role, is_active,
                           first_name, last_name, bio, website, location,
                           created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(user.is_active)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.bio)
    .bind(&user.website)
    .bind(&user.location)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    let id = result.last_insert_rowid();

    Ok(User {
        id,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn get_user_by_username_sqlite(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE LOWER(email) = LOWER(?)",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by email")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, password_hash = ?, role = ?, is_active = ?,
            first_name = ?, last_name = ?, bio = ?, website = ?, location = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(user.is_active)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.bio)
    .bind(&user.website)
    .bind(&user.location)
    .bind(now)
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    get_user_by_id_sqlite(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn delete_user_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete user")?;

    Ok(())
}

async fn count_users_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;

    Ok(row.get("count"))
}

async fn list_users_sqlite(
    pool: &SqlitePool,
    search: Option<&str>,
    page: i64,
    per_page: i64,
) -> Result<(Vec<User>, i64)> {
    let offset = (page.max(1) - 1) * per_page;
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s));

    let rows = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM users
        WHERE (? IS NULL OR username LIKE ? OR first_name LIKE ? OR last_name LIKE ?)
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
        USER_COLUMNS
    ))
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list users")?;

    let total: i64 = sqlx::query(
        r#"
        SELECT COUNT(*) as count FROM users
        WHERE (? IS NULL OR username LIKE ? OR first_name LIKE ? OR last_name LIKE ?)
        "#,
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .fetch_one(pool)
    .await
    .context("Failed to count users")?
    .get("count");

    let users = rows.iter().map(row_to_user_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((users, total))
}

async fn record_login_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET login_count = login_count + 1, last_login = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to record login")?;
    Ok(())
}

async fn list_admins_sqlite(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users WHERE role = 'admin' AND is_active = 1 ORDER BY id",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list admins")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

async fn user_stats_sqlite(pool: &SqlitePool, id: i64) -> Result<UserStats> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM posts WHERE author_id = ?1) AS posts,
            (SELECT COUNT(*) FROM posts WHERE author_id = ?1 AND is_published = 1) AS published_posts,
            (SELECT COUNT(*) FROM comments WHERE author_id = ?1 AND is_deleted = 0) AS comments,
            (SELECT COUNT(*) FROM post_likes WHERE user_id = ?1)
              + (SELECT COUNT(*) FROM comment_likes WHERE user_id = ?1) AS likes_given,
            (SELECT COALESCE(SUM(likes_count), 0) FROM posts WHERE author_id = ?1) AS likes_received,
            (SELECT COUNT(*) FROM bookmarks WHERE user_id = ?1) AS bookmarks,
            (SELECT COALESCE(SUM(views_count), 0) FROM posts WHERE author_id = ?1) AS total_views
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .context("Failed to compute user stats")?;

    Ok(UserStats {
        posts: row.get("posts"),
        published_posts: row.get("published_posts"),
        comments: row.get("comments"),
        likes_given: row.get("likes_given"),
        likes_received: row.get("likes_received"),
        bookmarks: row.get("bookmarks"),
        total_views: row.get("total_views"),
    })
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        is_active: row.get("is_active"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        bio: row.get("bio"),
        website: row.get("website"),
        location: row.get("location"),
        login_count: row.get("login_count"),
        last_login: row.get("last_login"),
        posts_count: row.get("posts_count"),
        comments_count: row.get("comments_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn user(name: &str) -> User {
        User::new(
            name.to_string(),
            format!("{}@example.com", name),
            "hash".to_string(),
            UserRole::Author,
        )
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = setup_test_repo().await;
        let created = repo.create(&user("alice")).await.unwrap();
        assert!(created.id > 0);

        let by_name = repo.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);

        let by_email = repo.get_by_email("ALICE@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let repo = setup_test_repo().await;
        repo.create(&user("bob")).await.unwrap();

        let mut dup = user("bob");
        dup.email = "other@example.com".to_string();
        assert!(repo.create(&dup).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_record_login() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&user("carol")).await.unwrap();

        created.bio = Some("Writer".to_string());
        created.role = UserRole::Editor;
        let updated = repo.update(&created).await.unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Writer"));
        assert_eq!(updated.role, UserRole::Editor);

        repo.record_login(created.id).await.unwrap();
        repo.record_login(created.id).await.unwrap();
        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.login_count, 2);
        assert!(fetched.last_login.is_some());
    }

    #[tokio::test]
    async fn test_list_with_search() {
        let repo = setup_test_repo().await;
        for name in ["dave", "daisy", "erin"] {
            repo.create(&user(name)).await.unwrap();
        }

        let (all, total) = repo.list(None, 1, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(total, 3);

        let (found, total) = repo.list(Some("da"), 1, 10).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(total, 2);

        let (page, _) = repo.list(None, 2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn test_list_admins_and_stats() {
        let repo = setup_test_repo().await;
        let mut admin = user("root");
        admin.role = UserRole::Admin;
        let admin = repo.create(&admin).await.unwrap();
        repo.create(&user("plain")).await.unwrap();

        let admins = repo.list_admins().await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].id, admin.id);

        let stats = repo.stats(admin.id).await.unwrap();
        assert_eq!(stats, UserStats::default());
    }
}
