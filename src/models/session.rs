//! Session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login session backing an issued token pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    /// Random session token, embedded in issued JWTs
    pub session_id: String,
    /// Associated user ID
    pub user_id: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Ended sessions stay in the table with `is_active = false`
    pub is_active: bool,
    pub last_activity: DateTime<Utc>,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Active and not yet expired
    pub fn is_valid(&self) -> bool {
        self.is_active && !self.is_expired()
    }
}

/// Client details recorded with a new session
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: Duration, active: bool) -> Session {
        let now = Utc::now();
        Session {
            id: 1,
            session_id: "token".to_string(),
            user_id: 1,
            ip_address: None,
            user_agent: None,
            is_active: active,
            last_activity: now,
            expires_at: now + expires_in,
            created_at: now,
        }
    }

    #[test]
    fn test_session_validity() {
        assert!(session(Duration::hours(1), true).is_valid());
        assert!(!session(Duration::hours(1), false).is_valid());

        let expired = session(Duration::seconds(-5), true);
        assert!(expired.is_expired());
        assert!(!expired.is_valid());
    }
}
