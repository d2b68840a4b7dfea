//! Session repository
//!
//! Database operations for login sessions.

use crate::db::pool::sqlite;
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Look up a session by its token
    async fn get_by_session_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Update `last_activity`
    async fn touch(&self, session_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Move the expiry of a session
    async fn set_expiry(&self, session_id: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// Mark a session inactive. Returns whether a row changed.
    async fn deactivate(&self, session_id: &str) -> Result<bool>;

    /// Deactivate every session of a user except `keep`
    async fn deactivate_all_for_user(&self, user_id: i64, keep: Option<&str>) -> Result<u64>;

    /// Active, unexpired sessions of a user, most recent activity first
    async fn list_active_for_user(&self, user_id: i64) -> Result<Vec<Session>>;

    /// Delete a session row
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Delete expired or inactive sessions
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        create_session_sqlite(sqlite(&self.pool)?, session).await
    }

    async fn get_by_session_id(&self, session_id: &str) -> Result<Option<Session>> {
        get_session_sqlite(sqlite(&self.pool)?, session_id).await
    }

    async fn touch(&self, session_id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE sessions SET last_activity = ? WHERE session_id = ?")
            .bind(at)
            .bind(session_id)
            .execute(sqlite(&self.pool)?)
            .await
            .context("Failed to touch session")?;
        Ok(())
    }

    async fn set_expiry(&self, session_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE sessions SET expires_at = ? WHERE session_id = ?")
            .bind(expires_at)
            .bind(session_id)
            .execute(sqlite(&self.pool)?)
            .await
            .context("Failed to extend session")?;
        Ok(())
    }

    async fn deactivate(&self, session_id: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE sessions SET is_active = 0 WHERE session_id = ? AND is_active = 1")
                .bind(session_id)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to end session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_all_for_user(&self, user_id: i64, keep: Option<&str>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET is_active = 0
            WHERE user_id = ? AND is_active = 1 AND (? IS NULL OR session_id != ?)
            "#,
        )
        .bind(user_id)
        .bind(keep)
        .bind(keep)
        .execute(sqlite(&self.pool)?)
        .await
        .context("Failed to end user sessions")?;
        Ok(result.rows_affected())
    }

    async fn list_active_for_user(&self, user_id: i64) -> Result<Vec<Session>> {
        list_active_sqlite(sqlite(&self.pool)?, user_id).await
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(sqlite(&self.pool)?)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ? OR is_active = 0")
            .bind(Utc::now())
            .execute(sqlite(&self.pool)?)
            .await
            .context("Failed to delete expired sessions")?;
        Ok(result.rows_affected())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    let result = sqlx::query(
        r#"
        INSERT INTO sessions (session_id, user_id, ip_address, user_agent, is_active,
                              last_activity, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.session_id)
    .bind(session.user_id)
    .bind(&session.ip_address)
    .bind(&session.user_agent)
    .bind(session.is_active)
    .bind(session.last_activity)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(Session {
        id: result.last_insert_rowid(),
        ..session.clone()
    })
}

async fn get_session_sqlite(pool: &SqlitePool, session_id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, session_id, user_id, ip_address, user_agent, is_active,
               last_activity, expires_at, created_at
        FROM sessions
        WHERE session_id = ?
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session")?;

    Ok(row.as_ref().map(row_to_session_sqlite))
}

async fn list_active_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<Session>> {
    let rows = sqlx::query(
        r#"
        SELECT id, session_id, user_id, ip_address, user_agent, is_active,
               last_activity, expires_at, created_at
        FROM sessions
        WHERE user_id = ? AND is_active = 1 AND expires_at > ?
        ORDER BY last_activity DESC, id DESC
        "#,
    )
    .bind(user_id)
    .bind(Utc::now())
    .fetch_all(pool)
    .await
    .context("Failed to list sessions")?;

    Ok(rows.iter().map(row_to_session_sqlite).collect())
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Session {
    Session {
        id: row.get("id"),
        session_id: row.get("session_id"),
        user_id: row.get("user_id"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        is_active: row.get("is_active"),
        last_activity: row.get("last_activity"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup() -> (SqlxSessionRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES ('u', 'u@example.com', 'h')",
        )
        .execute(pool.as_sqlite().unwrap())
        .await
        .unwrap()
        .last_insert_rowid();
        (SqlxSessionRepository::new(pool), user_id)
    }

    fn session(user_id: i64, token: &str, expires_in: Duration) -> Session {
        let now = Utc::now();
        Session {
            id: 0,
            session_id: token.to_string(),
            user_id,
            ip_address: Some("127.0.0.1".to_string()),
            user_agent: None,
            is_active: true,
            last_activity: now,
            expires_at: now + expires_in,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (repo, user_id) = setup().await;
        let created = repo.create(&session(user_id, "abc", Duration::hours(1))).await.unwrap();
        assert!(created.id > 0);

        let fetched = repo.get_by_session_id("abc").await.unwrap().unwrap();
        assert_eq!(fetched.user_id, user_id);
        assert!(fetched.is_valid());
    }

    #[tokio::test]
    async fn test_deactivate_all_keeps_current() {
        let (repo, user_id) = setup().await;
        for token in ["a", "b", "c"] {
            repo.create(&session(user_id, token, Duration::hours(1))).await.unwrap();
        }

        let ended = repo.deactivate_all_for_user(user_id, Some("b")).await.unwrap();
        assert_eq!(ended, 2);

        let active = repo.list_active_for_user(user_id).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].session_id, "b");
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (repo, user_id) = setup().await;
        repo.create(&session(user_id, "old", Duration::hours(-1))).await.unwrap();
        repo.create(&session(user_id, "new", Duration::hours(1))).await.unwrap();

        assert!(repo.list_active_for_user(user_id).await.unwrap().len() == 1);
        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.get_by_session_id("old").await.unwrap().is_none());
    }
}
