//! Clap derive structures for the `sensorhub` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sensorhub -- live sensor dashboard from the command line
#[derive(Debug, Parser)]
#[command(
    name = "sensorhub",
    version,
    about = "Query and watch a SensorHub server from the command line",
    long_about = "Lists sensors, aligns temperature series, manages notifications\n\
        and follows live roster, reading and notification changes.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "SENSORHUB_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', env = "SENSORHUB_SERVER", global = true)]
    pub server: Option<String>,

    /// Session token, sent as the session cookie
    #[arg(long, env = "SENSORHUB_SESSION", global = true, hide_env_values = true)]
    pub session_token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SENSORHUB_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "SENSORHUB_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout (e.g. "30s", "2m")
    #[arg(
        long,
        env = "SENSORHUB_TIMEOUT",
        global = true,
        value_parser = humantime::parse_duration
    )]
    pub timeout: Option<Duration>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sensor roster, health history and reading totals
    #[command(alias = "s")]
    Sensors(SensorsArgs),

    /// Temperature readings aligned into one row per timestamp
    #[command(alias = "r")]
    Readings(RangeArgs),

    /// Print every change of a live cache until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Notification feed, actions and channel preferences
    #[command(alias = "n")]
    Notifications(NotificationsArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Sensors ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SensorsArgs {
    #[command(subcommand)]
    pub command: SensorsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SensorsCommand {
    /// Merged roster of the configured sensor types
    #[command(alias = "ls")]
    List {
        /// Sensor type to include (repeatable; overrides the profile)
        #[arg(long = "type", short = 't')]
        types: Vec<String>,
    },

    /// Health history of one sensor
    Health {
        /// Sensor name
        name: String,

        /// Max entries
        #[arg(long, short = 'l', default_value = "20")]
        limit: u32,
    },

    /// Total number of stored readings per sensor
    Totals,
}

// ── Readings ─────────────────────────────────────────────────────────

/// Date range and sensor selection for aligned series.
#[derive(Debug, Args)]
pub struct RangeArgs {
    /// First day (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Last day (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// Use hourly aggregates instead of raw readings
    #[arg(long)]
    pub hourly: bool,

    /// Sensor column (repeatable; default: every sensor in the roster)
    #[arg(long = "sensor", short = 'S')]
    pub sensors: Vec<String>,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(subcommand)]
    pub command: WatchCommand,
}

#[derive(Debug, Subcommand)]
pub enum WatchCommand {
    /// Sensor roster (push + poll)
    Roster {
        /// Sensor type to include (repeatable; overrides the profile)
        #[arg(long = "type", short = 't')]
        types: Vec<String>,
    },

    /// Latest reading per sensor (push)
    Current,

    /// Notification feed for the signed-in user
    Notifications,

    /// Aligned temperature series (poll)
    Series(RangeArgs),
}

// ── Notifications ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NotificationsArgs {
    #[command(subcommand)]
    pub command: NotificationsCommand,
}

#[derive(Debug, Subcommand)]
pub enum NotificationsCommand {
    /// First page of the feed
    #[command(alias = "ls")]
    List,

    /// Mark one notification read
    Read {
        /// Notification id
        id: i64,
    },

    /// Dismiss one notification
    Dismiss {
        /// Notification id
        id: i64,
    },

    /// Mark every notification read
    ReadAll,

    /// Dismiss every notification
    DismissAll,

    /// Channel preferences per category
    Prefs,

    /// Create or update the preference for one category
    SetPref {
        /// Category (e.g. threshold_alert)
        category: String,

        /// Deliver by email
        #[arg(long, action = clap::ArgAction::Set)]
        email: Option<bool>,

        /// Show in the in-app feed
        #[arg(long, action = clap::ArgAction::Set)]
        inapp: Option<bool>,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a profile and make it the default
    Init {
        /// Server URL
        #[arg(long)]
        server: String,

        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Environment variable holding the session token
        #[arg(long)]
        session_token_env: Option<String>,

        /// Sensor type to include (repeatable)
        #[arg(long = "sensor-type")]
        sensor_types: Vec<String>,

        /// Replace an existing profile of the same name
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
