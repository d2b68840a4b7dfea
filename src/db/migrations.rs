//! Database migrations module
//!
//! Code-based migrations for the Inkwell blog platform. All migrations are
//! embedded directly in the binary as SQL strings.
//!
//! # Usage
//!
//! ```ignore
//! use inkwell::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```
//!
//! Foreign keys carry the cascade rules: removing a user removes everything
//! they authored, removing a post removes its comments, likes, bookmarks,
//! views and tag links, and removing a category detaches its posts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use super::pool::sqlite;
use super::DynDatabasePool;

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(80) NOT NULL UNIQUE,
                email VARCHAR(120) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'author',
                is_active BOOLEAN NOT NULL DEFAULT 1,
                first_name VARCHAR(50),
                last_name VARCHAR(50),
                bio TEXT,
                website VARCHAR(200),
                location VARCHAR(100),
                login_count INTEGER NOT NULL DEFAULT 0,
                last_login TIMESTAMP,
                posts_count INTEGER NOT NULL DEFAULT 0,
                comments_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id VARCHAR(128) NOT NULL UNIQUE,
                user_id INTEGER NOT NULL,
                ip_address VARCHAR(45),
                user_agent TEXT,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                last_activity TIMESTAMP NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_categories",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE,
                slug VARCHAR(100) NOT NULL UNIQUE,
                description TEXT,
                color VARCHAR(7) NOT NULL DEFAULT '#007bff',
                parent_id INTEGER,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                sort_order INTEGER NOT NULL DEFAULT 0,
                posts_count INTEGER NOT NULL DEFAULT 0,
                views_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (parent_id) REFERENCES categories(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_categories_slug ON categories(slug);
            CREATE INDEX IF NOT EXISTS idx_categories_parent_id ON categories(parent_id);
        "#,
    },
    Migration {
        version: 4,
        name: "create_tags",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(50) NOT NULL UNIQUE,
                slug VARCHAR(50) NOT NULL UNIQUE,
                description TEXT,
                color VARCHAR(7) NOT NULL DEFAULT '#6c757d',
                usage_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_tags_slug ON tags(slug);
        "#,
    },
    Migration {
        version: 5,
        name: "create_posts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(200) NOT NULL UNIQUE,
                content TEXT NOT NULL,
                content_html TEXT NOT NULL DEFAULT '',
                excerpt TEXT,
                author_id INTEGER NOT NULL,
                category_id INTEGER,
                is_published BOOLEAN NOT NULL DEFAULT 0,
                is_featured BOOLEAN NOT NULL DEFAULT 0,
                allow_comments BOOLEAN NOT NULL DEFAULT 1,
                reading_time INTEGER NOT NULL DEFAULT 1,
                views_count INTEGER NOT NULL DEFAULT 0,
                likes_count INTEGER NOT NULL DEFAULT 0,
                comments_count INTEGER NOT NULL DEFAULT 0,
                meta_title VARCHAR(200),
                meta_description VARCHAR(300),
                ai_generated BOOLEAN NOT NULL DEFAULT 0,
                validation_metadata TEXT,
                published_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_posts_slug ON posts(slug);
            CREATE INDEX IF NOT EXISTS idx_posts_author_id ON posts(author_id);
            CREATE INDEX IF NOT EXISTS idx_posts_category_id ON posts(category_id);
            CREATE INDEX IF NOT EXISTS idx_posts_published ON posts(is_published, published_at);
        "#,
    },
    Migration {
        version: 6,
        name: "create_post_tags",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS post_tags (
                post_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                PRIMARY KEY (post_id, tag_id),
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_post_tags_tag_id ON post_tags(tag_id);
        "#,
    },
    Migration {
        version: 7,
        name: "create_comments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL,
                author_id INTEGER NOT NULL,
                parent_id INTEGER,
                content TEXT NOT NULL,
                is_approved BOOLEAN NOT NULL DEFAULT 0,
                is_spam BOOLEAN NOT NULL DEFAULT 0,
                is_deleted BOOLEAN NOT NULL DEFAULT 0,
                likes_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (parent_id) REFERENCES comments(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id);
            CREATE INDEX IF NOT EXISTS idx_comments_parent_id ON comments(parent_id);
            CREATE INDEX IF NOT EXISTS idx_comments_approved ON comments(is_approved);
        "#,
    },
    Migration {
        version: 8,
        name: "create_likes",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS post_likes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                post_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, post_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS comment_likes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                comment_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, comment_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (comment_id) REFERENCES comments(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 9,
        name: "create_bookmarks",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS bookmarks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                post_id INTEGER NOT NULL,
                notes TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, post_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 10,
        name: "create_views",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS views (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL,
                user_id INTEGER,
                ip_address VARCHAR(45),
                user_agent TEXT,
                referrer TEXT,
                viewed_at TIMESTAMP NOT NULL,
                FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_views_post_id ON views(post_id, viewed_at);
        "#,
    },
    Migration {
        version: 11,
        name: "create_notifications",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title VARCHAR(200) NOT NULL,
                message TEXT NOT NULL,
                kind VARCHAR(20) NOT NULL DEFAULT 'info',
                link VARCHAR(500),
                is_read BOOLEAN NOT NULL DEFAULT 0,
                read_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read);
        "#,
    },
];

/// Run all pending migrations
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(sqlite(pool)?).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(sqlite(pool)?, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;
    Ok(())
}

async fn get_applied_migrations(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin migration")?;

    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

    tx.commit().await.context("Failed to commit migration")?;
    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Get pending migrations count
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(sqlite(pool)?).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

/// Get the total number of migrations defined
pub fn total_migrations() -> usize {
    MIGRATIONS.len()
}

/// Get migration by version
pub fn get_migration(version: i32) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert_user(pool: &SqlitePool, username: &str) -> i64 {
        sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)")
            .bind(username)
            .bind(format!("{}@example.com", username))
            .bind("hash")
            .execute(pool)
            .await
            .expect("Failed to create user")
            .last_insert_rowid()
    }

    async fn insert_post(pool: &SqlitePool, author_id: i64, slug: &str) -> i64 {
        sqlx::query("INSERT INTO posts (title, slug, content, author_id) VALUES (?, ?, ?, ?)")
            .bind(slug)
            .bind(slug)
            .bind("body")
            .bind(author_id)
            .execute(pool)
            .await
            .expect("Failed to create post")
            .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_is_up_to_date_and_pending() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        assert!(!is_up_to_date(&pool).await.unwrap());
        assert_eq!(pending_count(&pool).await.unwrap(), total_migrations());

        run_migrations(&pool).await.unwrap();
        assert!(is_up_to_date(&pool).await.unwrap());
        assert_eq!(pending_count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unique_username_enforced() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.as_sqlite().unwrap();

        insert_user(sqlite_pool, "alice").await;
        let dup = sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)")
            .bind("alice")
            .bind("other@example.com")
            .bind("hash")
            .execute(sqlite_pool)
            .await;

        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_post_like_unique_per_user() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        let user_id = insert_user(sqlite_pool, "bob").await;
        let post_id = insert_post(sqlite_pool, user_id, "hello").await;

        let insert = || {
            sqlx::query("INSERT INTO post_likes (user_id, post_id) VALUES (?, ?)")
                .bind(user_id)
                .bind(post_id)
                .execute(sqlite_pool)
        };

        assert!(insert().await.is_ok());
        assert!(insert().await.is_err());
    }

    #[tokio::test]
    async fn test_deleting_post_cascades() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        let user_id = insert_user(sqlite_pool, "carol").await;
        let post_id = insert_post(sqlite_pool, user_id, "cascade").await;

        sqlx::query("INSERT INTO comments (post_id, author_id, content) VALUES (?, ?, 'hi')")
            .bind(post_id)
            .bind(user_id)
            .execute(sqlite_pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO bookmarks (user_id, post_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(post_id)
            .execute(sqlite_pool)
            .await
            .unwrap();

        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(sqlite_pool)
            .await
            .unwrap();

        let comments: i64 = sqlx::query("SELECT COUNT(*) AS c FROM comments")
            .fetch_one(sqlite_pool)
            .await
            .unwrap()
            .get("c");
        let bookmarks: i64 = sqlx::query("SELECT COUNT(*) AS c FROM bookmarks")
            .fetch_one(sqlite_pool)
            .await
            .unwrap()
            .get("c");
        assert_eq!(comments, 0);
        assert_eq!(bookmarks, 0);
    }

    #[tokio::test]
    async fn test_deleting_category_detaches_posts() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        let user_id = insert_user(sqlite_pool, "dave").await;
        let category_id = sqlx::query("INSERT INTO categories (name, slug) VALUES ('Tech', 'tech')")
            .execute(sqlite_pool)
            .await
            .unwrap()
            .last_insert_rowid();
        let post_id = insert_post(sqlite_pool, user_id, "tech-post").await;
        sqlx::query("UPDATE posts SET category_id = ? WHERE id = ?")
            .bind(category_id)
            .bind(post_id)
            .execute(sqlite_pool)
            .await
            .unwrap();

        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(category_id)
            .execute(sqlite_pool)
            .await
            .unwrap();

        let row = sqlx::query("SELECT category_id FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_one(sqlite_pool)
            .await
            .unwrap();
        let category: Option<i64> = row.get("category_id");
        assert!(category.is_none());
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT);\n-- comment only\n;\nCREATE INDEX i ON a(id);";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[1].starts_with("CREATE INDEX"));
    }

    #[test]
    fn test_migration_versions_are_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, i as i32 + 1);
        }
        assert_eq!(get_migration(5).map(|m| m.name), Some("create_posts"));
        assert!(get_migration(99).is_none());
    }
}
