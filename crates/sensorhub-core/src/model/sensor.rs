// ── Sensor domain types ──

use serde::{Deserialize, Serialize};

/// Sensor health as last reported by the server.
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
pub enum HealthStatus {
    Good,
    Bad,
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Lenient parse: anything unrecognised is `Unknown`.
    pub fn from_wire(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse().ok()).unwrap_or_default()
    }
}

/// One sensor in the roster. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub id: i64,
    /// Unique within a roster snapshot, case-sensitive.
    pub name: String,
    pub sensor_type: String,
    pub url: String,
    pub health_status: HealthStatus,
    pub health_reason: Option<String>,
    pub enabled: bool,
}

/// One entry of a sensor's health history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorHealthRecord {
    pub id: i64,
    pub sensor_id: i64,
    pub health_status: HealthStatus,
    pub recorded_at: String,
}
