//! User service
//!
//! Business rules for accounts and login sessions:
//! - registration (first user becomes admin, unique username and email)
//! - authentication by username or email
//! - profile and password changes
//! - activation and admin toggling
//! - session lifecycle with a per-user limit on active sessions

use crate::config::AuthConfig;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{
    ClientInfo, CreateUserInput, ListParams, PagedResult, Session, UpdateProfileInput, User,
    UserRole, UserStats,
};
use crate::services::password::{self, hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 80;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username or email already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Session expired or ended
    #[error("Session expired")]
    SessionExpired,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Lifetimes and limits applied to new sessions
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub lifetime: Duration,
    pub remember_lifetime: Duration,
    pub max_active: usize,
}

impl From<&AuthConfig> for SessionPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            lifetime: Duration::hours(config.session_hours),
            remember_lifetime: Duration::days(config.remember_days),
            max_active: config.max_sessions_per_user.max(1) as usize,
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    policy: SessionPolicy,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            policy,
        }
    }

    /// Register a new user
    ///
    /// The first account in an empty database is made an admin.
    ///
    /// # Errors
    /// - `ValidationError` for a bad username, email or password
    /// - `Conflict` if the username or email is taken
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();
        validate_username(&username)?;
        validate_email(&email)?;
        if !password::is_acceptable(&input.password) {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                password::MIN_PASSWORD_LENGTH
            )));
        }

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::Conflict(format!(
                "Username '{}' is already taken",
                username
            )));
        }
        self.ensure_email_free(&email, None).await?;

        let role = if self.user_repo.count().await.context("Failed to count users")? == 0 {
            UserRole::Admin
        } else {
            UserRole::Author
        };

        let password_hash = hash_password(&input.password)?;
        let mut user = User::new(username, email, password_hash, role);
        user.first_name = non_empty(input.first_name);
        user.last_name = non_empty(input.last_name);

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, role = %created.role, "User registered");
        Ok(created)
    }

    /// Check credentials. `login` may be a username or an email address.
    ///
    /// A successful login bumps `login_count` and `last_login`.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<User, UserServiceError> {
        let login = login.trim();
        let found = match self
            .user_repo
            .get_by_username(login)
            .await
            .context("Failed to look up user")?
        {
            Some(user) => Some(user),
            None => self
                .user_repo
                .get_by_email(login)
                .await
                .context("Failed to look up user")?,
        };

        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".into());
        let user = found.ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = user.id, "Failed login attempt");
            return Err(invalid());
        }
        if !user.is_active {
            return Err(UserServiceError::Forbidden("Account is deactivated".into()));
        }

        self.user_repo
            .record_login(user.id)
            .await
            .context("Failed to record login")?;

        self.get_by_id(user.id).await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| UserServiceError::NotFound(format!("User {} not found", id)))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| UserServiceError::NotFound(format!("User '{}' not found", username)))
    }

    /// Paginated user list, optionally filtered by name
    pub async fn list(
        &self,
        search: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<User>, UserServiceError> {
        let (users, total) = self
            .user_repo
            .list(search, params.page as i64, params.limit())
            .await
            .context("Failed to list users")?;
        Ok(PagedResult::new(users, total, params))
    }

    /// Active admins, used for system notifications
    pub async fn admins(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.user_repo.list_admins().await.context("Failed to list admins")?)
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self.get_by_id(user_id).await?;
        if !input.has_changes() {
            return Ok(user);
        }

        if let Some(email) = input.email {
            let email = email.trim().to_lowercase();
            if email != user.email {
                validate_email(&email)?;
                self.ensure_email_free(&email, Some(user_id)).await?;
                user.email = email;
            }
        }
        if input.first_name.is_some() {
            user.first_name = non_empty(input.first_name);
        }
        if input.last_name.is_some() {
            user.last_name = non_empty(input.last_name);
        }
        if input.bio.is_some() {
            user.bio = non_empty(input.bio);
        }
        if input.website.is_some() {
            user.website = non_empty(input.website);
        }
        if input.location.is_some() {
            user.location = non_empty(input.location);
        }

        Ok(self.user_repo.update(&user).await.context("Failed to update user")?)
    }

    /// Replace the password after checking the current one
    pub async fn change_password(
        &self,
        user_id: i64,
        current: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let mut user = self.get_by_id(user_id).await?;
        if !verify_password(current, &user.password_hash)? {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".into(),
            ));
        }
        if !password::is_acceptable(new_password) {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                password::MIN_PASSWORD_LENGTH
            )));
        }

        user.password_hash = hash_password(new_password)?;
        self.user_repo
            .update(&user)
            .await
            .context("Failed to update password")?;
        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Activate or deactivate an account. Deactivation ends all its sessions.
    pub async fn set_active(&self, user_id: i64, active: bool) -> Result<User, UserServiceError> {
        let mut user = self.get_by_id(user_id).await?;
        user.is_active = active;
        let updated = self.user_repo.update(&user).await.context("Failed to update user")?;

        if !active {
            self.end_all_sessions(user_id, None).await?;
        }
        Ok(updated)
    }

    /// Flip a user between admin and author. Admins cannot demote themselves.
    pub async fn toggle_admin(&self, user_id: i64, acting_user_id: i64) -> Result<User, UserServiceError> {
        if user_id == acting_user_id {
            return Err(UserServiceError::Forbidden(
                "You cannot change your own admin status".into(),
            ));
        }
        let mut user = self.get_by_id(user_id).await?;
        user.role = if user.is_admin() {
            UserRole::Author
        } else {
            UserRole::Admin
        };
        Ok(self.user_repo.update(&user).await.context("Failed to update user")?)
    }

    pub async fn statistics(&self, user_id: i64) -> Result<UserStats, UserServiceError> {
        self.get_by_id(user_id).await?;
        Ok(self.user_repo.stats(user_id).await.context("Failed to load user stats")?)
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Open a session for a user.
    ///
    /// When the user is over the active-session limit, the sessions with the
    /// oldest activity are ended.
    pub async fn create_session(
        &self,
        user_id: i64,
        client: ClientInfo,
        remember: bool,
    ) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let lifetime = if remember {
            self.policy.remember_lifetime
        } else {
            self.policy.lifetime
        };

        let session = Session {
            id: 0,
            session_id: Uuid::new_v4().simple().to_string(),
            user_id,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            is_active: true,
            last_activity: now,
            expires_at: now + lifetime,
            created_at: now,
        };
        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        let active = self
            .session_repo
            .list_active_for_user(user_id)
            .await
            .context("Failed to list sessions")?;
        for stale in active.iter().skip(self.policy.max_active) {
            if stale.session_id != created.session_id {
                self.session_repo
                    .deactivate(&stale.session_id)
                    .await
                    .context("Failed to end old session")?;
            }
        }

        Ok(created)
    }

    /// Check that a session is active and unexpired, and record activity.
    pub async fn validate_session(&self, session_id: &str) -> Result<Session, UserServiceError> {
        let mut session = self
            .session_repo
            .get_by_session_id(session_id)
            .await
            .context("Failed to get session")?
            .ok_or(UserServiceError::SessionExpired)?;

        if !session.is_valid() {
            return Err(UserServiceError::SessionExpired);
        }

        let now = Utc::now();
        self.session_repo
            .touch(session_id, now)
            .await
            .context("Failed to touch session")?;
        session.last_activity = now;
        Ok(session)
    }

    /// End one session. Returns whether it was active.
    pub async fn end_session(&self, session_id: &str) -> Result<bool, UserServiceError> {
        Ok(self
            .session_repo
            .deactivate(session_id)
            .await
            .context("Failed to end session")?)
    }

    /// End every session of a user, optionally keeping one
    pub async fn end_all_sessions(&self, user_id: i64, keep: Option<&str>) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .deactivate_all_for_user(user_id, keep)
            .await
            .context("Failed to end sessions")?)
    }

    pub async fn active_sessions(&self, user_id: i64) -> Result<Vec<Session>, UserServiceError> {
        Ok(self
            .session_repo
            .list_active_for_user(user_id)
            .await
            .context("Failed to list sessions")?)
    }

    /// Remove expired and ended sessions
    pub async fn clean_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let removed = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to clean sessions")?;
        if removed > 0 {
            tracing::info!(removed, "Cleaned expired sessions");
        }
        Ok(removed)
    }

    async fn ensure_email_free(&self, email: &str, owner: Option<i64>) -> Result<(), UserServiceError> {
        let existing = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?;
        match existing {
            Some(user) if Some(user.id) != owner => Err(UserServiceError::Conflict(format!(
                "Email '{}' is already registered",
                email
            ))),
            _ => Ok(()),
        }
    }
}

fn validate_username(username: &str) -> Result<(), UserServiceError> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&len) {
        return Err(UserServiceError::ValidationError(format!(
            "Username must be between {} and {} characters",
            MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(UserServiceError::ValidationError(
            "Username may only contain letters, digits, '_', '-' and '.'".into(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), UserServiceError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(UserServiceError::ValidationError("Invalid email address".into()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            SessionPolicy {
                lifetime: Duration::hours(24),
                remember_lifetime: Duration::days(30),
                max_active: 2,
            },
        )
    }

    fn input(username: &str, email: &str) -> CreateUserInput {
        CreateUserInput {
            username: username.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn test_first_user_is_admin() {
        let service = setup_service().await;
        let first = service.register(input("alice", "alice@example.com")).await.unwrap();
        let second = service.register(input("bob", "bob@example.com")).await.unwrap();
        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(second.role, UserRole::Author);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let service = setup_service().await;
        service.register(input("alice", "alice@example.com")).await.unwrap();

        assert!(matches!(
            service.register(input("alice", "other@example.com")).await,
            Err(UserServiceError::Conflict(_))
        ));
        assert!(matches!(
            service.register(input("alice2", "ALICE@example.com")).await,
            Err(UserServiceError::Conflict(_))
        ));
        assert!(matches!(
            service.register(input("al", "al@example.com")).await,
            Err(UserServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.register(input("carol", "not-an-email")).await,
            Err(UserServiceError::ValidationError(_))
        ));

        let mut short = input("dave", "dave@example.com");
        short.password = "short".into();
        assert!(matches!(
            service.register(short).await,
            Err(UserServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_by_username_or_email() {
        let service = setup_service().await;
        service.register(input("alice", "alice@example.com")).await.unwrap();

        let by_name = service.authenticate("alice", "password123").await.unwrap();
        assert_eq!(by_name.login_count, 1);
        let by_email = service.authenticate("alice@example.com", "password123").await.unwrap();
        assert_eq!(by_email.login_count, 2);
        assert!(by_email.last_login.is_some());

        assert!(matches!(
            service.authenticate("alice", "wrong-password").await,
            Err(UserServiceError::AuthenticationError(_))
        ));
        assert!(matches!(
            service.authenticate("nobody", "password123").await,
            Err(UserServiceError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_log_in() {
        let service = setup_service().await;
        let user = service.register(input("alice", "alice@example.com")).await.unwrap();
        service.set_active(user.id, false).await.unwrap();

        assert!(matches!(
            service.authenticate("alice", "password123").await,
            Err(UserServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_change_password() {
        let service = setup_service().await;
        let user = service.register(input("alice", "alice@example.com")).await.unwrap();

        assert!(service.change_password(user.id, "bad", "newpassword1").await.is_err());
        service
            .change_password(user.id, "password123", "newpassword1")
            .await
            .unwrap();
        assert!(service.authenticate("alice", "newpassword1").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_profile_email_recheck() {
        let service = setup_service().await;
        let alice = service.register(input("alice", "alice@example.com")).await.unwrap();
        service.register(input("bob", "bob@example.com")).await.unwrap();

        let taken = UpdateProfileInput {
            email: Some("bob@example.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_profile(alice.id, taken).await,
            Err(UserServiceError::Conflict(_))
        ));

        let update = UpdateProfileInput {
            email: Some("alice@example.com".into()),
            bio: Some("  Writer  ".into()),
            ..Default::default()
        };
        let updated = service.update_profile(alice.id, update).await.unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Writer"));
    }

    #[tokio::test]
    async fn test_toggle_admin() {
        let service = setup_service().await;
        let admin = service.register(input("alice", "alice@example.com")).await.unwrap();
        let bob = service.register(input("bob", "bob@example.com")).await.unwrap();

        assert!(service.toggle_admin(bob.id, admin.id).await.unwrap().is_admin());
        assert!(!service.toggle_admin(bob.id, admin.id).await.unwrap().is_admin());
        assert!(matches!(
            service.toggle_admin(admin.id, admin.id).await,
            Err(UserServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_session_limit_and_validation() {
        let service = setup_service().await;
        let user = service.register(input("alice", "alice@example.com")).await.unwrap();

        let first = service
            .create_session(user.id, ClientInfo::default(), false)
            .await
            .unwrap();
        let _second = service
            .create_session(user.id, ClientInfo::default(), true)
            .await
            .unwrap();
        let third = service
            .create_session(user.id, ClientInfo::default(), false)
            .await
            .unwrap();

        let active = service.active_sessions(user.id).await.unwrap();
        assert_eq!(active.len(), 2);
        assert!(service.validate_session(&third.session_id).await.is_ok());
        assert!(matches!(
            service.validate_session(&first.session_id).await,
            Err(UserServiceError::SessionExpired)
        ));

        assert!(service.end_session(&third.session_id).await.unwrap());
        assert!(service.validate_session(&third.session_id).await.is_err());
        assert!(service.clean_expired_sessions().await.unwrap() >= 2);
    }

    #[tokio::test]
    async fn test_remember_extends_expiry() {
        let service = setup_service().await;
        let user = service.register(input("alice", "alice@example.com")).await.unwrap();

        let short = service
            .create_session(user.id, ClientInfo::default(), false)
            .await
            .unwrap();
        let long = service
            .create_session(user.id, ClientInfo::default(), true)
            .await
            .unwrap();
        assert!(long.expires_at - short.expires_at > Duration::days(28));
    }
}
