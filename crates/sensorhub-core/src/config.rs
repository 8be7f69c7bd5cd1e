// ── Runtime sync configuration ──
//
// Describes *where* to sync from and *how often*. Carries the session
// token and tuning knobs but never touches disk: the CLI (or any other
// consumer) builds a `SyncConfig` and hands it to `Dashboard::new`.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use sensorhub_api::{ReconnectPolicy, TlsMode, TransportConfig};
use url::Url;

/// Default sensor type shown on the dashboard.
pub const DEFAULT_SENSOR_TYPE: &str = "Temperature";

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed lab servers).
    DangerAcceptInvalid,
}

/// What happens to an optimistic notification change when the server
/// rejects the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RollbackPolicy {
    /// Leave the local change applied; the next refresh reconciles.
    #[default]
    Keep,
    /// Put back the pre-action state, unless another update has been
    /// published since the action was applied.
    Restore,
}

/// Configuration for syncing against a single SensorHub server.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server base URL (e.g., `http://sensorhub.local:8080`).
    pub url: Url,
    /// Session token, sent as the `sensor_hub_session` cookie.
    pub session: Option<SecretString>,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Sensor types whose rosters are merged into one roster.
    pub sensor_types: Vec<String>,
    /// Roster poll period. Zero disables polling (push only).
    pub roster_poll_interval: Duration,
    /// Temperature-series poll period. Zero disables polling.
    pub readings_poll_interval: Duration,
    /// Notification refresh period. `None` loads once on activation and
    /// afterwards only on explicit refresh.
    pub notification_poll_interval: Option<Duration>,
    /// Page size for the notification feed.
    pub notification_page_limit: u32,
    /// Open push channels at all.
    pub push_enabled: bool,
    pub reconnect: ReconnectPolicy,
    pub rollback: RollbackPolicy,
}

impl SyncConfig {
    /// Config for `url` with the stock intervals.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            session: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            sensor_types: vec![DEFAULT_SENSOR_TYPE.to_owned()],
            roster_poll_interval: Duration::from_secs(10),
            readings_poll_interval: Duration::from_secs(10),
            notification_poll_interval: None,
            notification_page_limit: 50,
            push_enabled: true,
            reconnect: ReconnectPolicy::default(),
            rollback: RollbackPolicy::default(),
        }
    }

    /// Transport settings shared by REST and push requests.
    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
            session: self.session.clone(),
        }
    }
}
