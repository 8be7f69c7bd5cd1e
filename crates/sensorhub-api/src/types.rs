// Wire types for the SensorHub REST API and push channels.
//
// These mirror the server's JSON exactly (snake_case, optional fields
// tolerated). Validation into strict domain types happens in
// `sensorhub-core::convert`, never here.

use serde::{Deserialize, Serialize};

// ── Sensors ──────────────────────────────────────────────────────────

/// Sensor record as returned by `GET /sensors/` and the roster push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorJson {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub health_status: Option<String>,
    #[serde(default)]
    pub health_reason: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// One row of `GET /sensors/health/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorHealthHistoryJson {
    pub id: i64,
    pub sensor_id: i64,
    pub health_status: String,
    pub recorded_at: String,
}

// ── Temperature ──────────────────────────────────────────────────────

/// A single temperature reading. Shared by the between-dates endpoints and
/// the current-temperatures push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReadingJson {
    #[serde(default)]
    pub id: Option<i64>,
    pub sensor_name: String,
    pub temperature: f64,
    pub time: String,
}

// ── Notifications ────────────────────────────────────────────────────

/// A notification as pushed on `/notifications/ws`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationJson {
    pub id: i64,
    pub category: String,
    pub severity: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

/// The per-user view of a notification (`GET /notifications/`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserNotificationJson {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub notification_id: i64,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_dismissed: bool,
    #[serde(default)]
    pub read_at: Option<String>,
    #[serde(default)]
    pub dismissed_at: Option<String>,
    #[serde(default)]
    pub notification: Option<NotificationJson>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCountJson {
    pub count: i64,
}

/// Per-category delivery preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPreferenceJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub category: String,
    pub email_enabled: bool,
    pub inapp_enabled: bool,
}

// ── Auth ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserJson {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Response of `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeResponse {
    #[serde(default)]
    pub user: Option<UserJson>,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

// ── Generic ──────────────────────────────────────────────────────────

/// `{ "message": "..." }` acknowledgement returned by mutation endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: String,
}

/// Error body shape: `{ "message": "...", "error": "..." }`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
