//! Shared configuration for SensorHub tools.
//!
//! TOML profiles, session-token resolution (env + plaintext), and
//! translation to `sensorhub_core::SyncConfig`. The CLI layers its
//! `GlobalOpts` overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sensorhub_core::{ReconnectPolicy, RollbackPolicy, SyncConfig, TlsVerification};

/// Env var consulted for the session token when a profile names none.
pub const SESSION_ENV: &str = "SENSORHUB_SESSION";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Profile name to use: explicit choice, else the configured default.
    pub fn profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(String::from)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.into()))
    }
}

/// Settings every profile inherits unless it overrides them. Durations
/// are written in humantime form (`"10s"`, `"1m 30s"`).
#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: String,

    #[serde(default = "default_interval")]
    pub roster_interval: String,

    #[serde(default = "default_interval")]
    pub readings_interval: String,

    /// Unset: notifications load once when the feed opens.
    pub notification_interval: Option<String>,

    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    #[serde(default = "default_true")]
    pub push: bool,

    /// Push reconnect attempts after a drop: a count (`0` never
    /// reconnects) or `"forever"`.
    #[serde(default = "default_retries")]
    pub reconnect_retries: Retries,

    /// `keep` or `restore`.
    #[serde(default = "default_rollback")]
    pub rollback: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            roster_interval: default_interval(),
            readings_interval: default_interval(),
            notification_interval: None,
            page_limit: default_page_limit(),
            push: true,
            reconnect_retries: default_retries(),
            rollback: default_rollback(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> String {
    "30s".into()
}
fn default_interval() -> String {
    "10s".into()
}
fn default_page_limit() -> u32 {
    50
}
fn default_true() -> bool {
    true
}
fn default_rollback() -> String {
    "keep".into()
}
fn default_retries() -> Retries {
    Retries::Count(0)
}

/// Reconnect budget as written in the file: `3` or `"forever"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Retries {
    Count(u32),
    Keyword(String),
}

impl Retries {
    /// `None` means unlimited.
    fn max_retries(&self) -> Result<Option<u32>, ConfigError> {
        match self {
            Self::Count(n) => Ok(Some(*n)),
            Self::Keyword(word) if word.eq_ignore_ascii_case("forever") => Ok(None),
            Self::Keyword(word) => Err(ConfigError::Validation {
                field: "reconnect_retries".into(),
                reason: format!("expected a count or 'forever', got '{word}'"),
            }),
        }
    }
}

/// A named server profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL (e.g., "http://sensorhub.local:8080").
    pub server: String,

    /// Session token (plaintext; prefer `session_token_env`).
    pub session_token: Option<String>,

    /// Environment variable name containing the session token.
    pub session_token_env: Option<String>,

    /// Sensor types merged into the roster.
    pub sensor_types: Option<Vec<String>>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    pub insecure: Option<bool>,
    pub timeout: Option<String>,
    pub roster_interval: Option<String>,
    pub readings_interval: Option<String>,
    pub notification_interval: Option<String>,
    pub push: Option<bool>,
    pub reconnect_retries: Option<Retries>,
    pub rollback: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "sensorhub", "sensorhub").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("sensorhub");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) merged with `SENSORHUB_*` env
/// vars. Nested keys use `__`: `SENSORHUB_DEFAULTS__OUTPUT=json`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SENSORHUB_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Resolution ──────────────────────────────────────────────────────

/// Parse a humantime duration, naming `field` on failure.
pub fn parse_duration(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("'{raw}' is not a duration ({e})"),
    })
}

/// Resolve the session token: the profile's named env var, then
/// `SENSORHUB_SESSION`, then plaintext. `None` means anonymous.
pub fn resolve_session(profile: &Profile) -> Option<SecretString> {
    if let Some(ref env_name) = profile.session_token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    if let Ok(val) = std::env::var(SESSION_ENV) {
        if !val.is_empty() {
            return Some(SecretString::from(val));
        }
    }

    profile
        .session_token
        .as_ref()
        .map(|token| SecretString::from(token.clone()))
}

/// Build a `SyncConfig` from a profile plus global defaults, without any
/// command-line overrides.
pub fn profile_to_sync_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<SyncConfig, ConfigError> {
    let url: url::Url = profile
        .server
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "server".into(),
            reason: format!("invalid URL: {}", profile.server),
        })?;

    let mut cfg = SyncConfig::new(url);
    cfg.session = resolve_session(profile);

    cfg.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    cfg.timeout = parse_duration(
        "timeout",
        profile.timeout.as_deref().unwrap_or(&defaults.timeout),
    )?;
    cfg.roster_poll_interval = parse_duration(
        "roster_interval",
        profile
            .roster_interval
            .as_deref()
            .unwrap_or(&defaults.roster_interval),
    )?;
    cfg.readings_poll_interval = parse_duration(
        "readings_interval",
        profile
            .readings_interval
            .as_deref()
            .unwrap_or(&defaults.readings_interval),
    )?;
    cfg.notification_poll_interval = profile
        .notification_interval
        .as_deref()
        .or(defaults.notification_interval.as_deref())
        .map(|raw| parse_duration("notification_interval", raw))
        .transpose()?;

    if let Some(ref types) = profile.sensor_types {
        if types.is_empty() {
            return Err(ConfigError::Validation {
                field: "sensor_types".into(),
                reason: "at least one sensor type is required".into(),
            });
        }
        cfg.sensor_types.clone_from(types);
    }

    cfg.notification_page_limit = defaults.page_limit;
    cfg.push_enabled = profile.push.unwrap_or(defaults.push);
    cfg.reconnect = ReconnectPolicy {
        max_retries: profile
            .reconnect_retries
            .as_ref()
            .unwrap_or(&defaults.reconnect_retries)
            .max_retries()?,
        ..ReconnectPolicy::default()
    };

    let rollback = profile.rollback.as_deref().unwrap_or(&defaults.rollback);
    cfg.rollback = rollback
        .parse::<RollbackPolicy>()
        .map_err(|_| ConfigError::Validation {
            field: "rollback".into(),
            reason: format!("expected 'keep' or 'restore', got '{rollback}'"),
        })?;

    Ok(cfg)
}
