//! Notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Comment,
    Like,
    System,
    Moderation,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationKind::Info => "info",
            NotificationKind::Comment => "comment",
            NotificationKind::Like => "like",
            NotificationKind::System => "system",
            NotificationKind::Moderation => "moderation",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for NotificationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(NotificationKind::Info),
            "comment" => Ok(NotificationKind::Comment),
            "like" => Ok(NotificationKind::Like),
            "system" => Ok(NotificationKind::System),
            "moderation" => Ok(NotificationKind::Moderation),
            _ => Err(anyhow::anyhow!("Invalid notification kind: {}", s)),
        }
    }
}

/// Notification entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    /// Optional link to the related resource
    pub link: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub link: Option<String>,
}

impl NewNotification {
    pub fn new(user_id: i64, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            kind,
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            NotificationKind::Info,
            NotificationKind::Comment,
            NotificationKind::Like,
            NotificationKind::System,
            NotificationKind::Moderation,
        ] {
            assert_eq!(NotificationKind::from_str(&kind.to_string()).unwrap(), kind);
        }
        assert!(NotificationKind::from_str("bogus").is_err());
    }

    #[test]
    fn test_new_notification_builder() {
        let n = NewNotification::new(3, NotificationKind::Comment, "New comment", "Someone replied")
            .with_link("/posts/hello");
        assert_eq!(n.user_id, 3);
        assert_eq!(n.link.as_deref(), Some("/posts/hello"));
    }
}
