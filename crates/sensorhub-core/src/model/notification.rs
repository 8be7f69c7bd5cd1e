// ── Notification domain types ──

use std::fmt;

use serde::{Deserialize, Serialize};

/// Notification category. Unknown server categories are kept verbatim so
/// preferences for them round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationCategory {
    ThresholdAlert,
    UserManagement,
    ConfigChange,
    Other(String),
}

impl NotificationCategory {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ThresholdAlert => "threshold_alert",
            Self::UserManagement => "user_management",
            Self::ConfigChange => "config_change",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for NotificationCategory {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "threshold_alert" => Self::ThresholdAlert,
            "user_management" => Self::UserManagement,
            "config_change" => Self::ConfigChange,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for NotificationCategory {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_owned())
    }
}

impl From<NotificationCategory> for String {
    fn from(c: NotificationCategory) -> Self {
        c.as_str().to_owned()
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

/// The server-side notification a record points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub category: NotificationCategory,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub created_at: String,
}

/// A user's view of one notification. `is_read` and `is_dismissed` are
/// independent: a dismissed notification need not have been read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Per-user row id; `0` for records that arrived over the push channel.
    pub id: i64,
    pub notification_id: i64,
    pub is_read: bool,
    pub is_dismissed: bool,
    pub payload: NotificationPayload,
}

/// Per-category delivery preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPreference {
    pub category: NotificationCategory,
    pub email_enabled: bool,
    pub inapp_enabled: bool,
}

/// Everything the notification cache publishes, as one value so the
/// record set and the unread counter can never drift apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationState {
    /// Visible feed, newest first. Dismissed records are not kept.
    pub records: Vec<NotificationRecord>,
    pub unread: u64,
    pub preferences: Vec<ChannelPreference>,
}

impl NotificationState {
    pub fn find(&self, notification_id: i64) -> Option<&NotificationRecord> {
        self.records
            .iter()
            .find(|r| r.notification_id == notification_id)
    }

    pub fn preference(&self, category: &NotificationCategory) -> Option<&ChannelPreference> {
        self.preferences.iter().find(|p| &p.category == category)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_unknown_values() {
        let c = NotificationCategory::from("firmware_update");
        assert_eq!(c, NotificationCategory::Other("firmware_update".into()));
        assert_eq!(serde_json::to_value(&c).unwrap(), "firmware_update");

        let known: NotificationCategory = serde_json::from_str("\"config_change\"").unwrap();
        assert_eq!(known, NotificationCategory::ConfigChange);
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("WARNING".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!(Severity::Error.to_string(), "error");
    }
}
