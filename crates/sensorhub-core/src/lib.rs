//! Live sync engine between `sensorhub-api` and dashboard consumers.
//!
//! - **[`Dashboard`]**: facade owning the HTTP client, the push registry
//!   and the session [`Identity`]. Vends live subscriptions and one-shot
//!   queries; [`Dashboard::oneshot()`] suits single CLI invocations.
//!
//! - **Subscriptions** ([`RosterSubscription`],
//!   [`CurrentReadingsSubscription`], [`NotificationSubscription`],
//!   [`TemperatureSeries`]): each owns one cache plus the push bridges and
//!   poll schedule that keep it fresh. Started and stopped through the
//!   [`Subscription`] trait; dropping one stops it.
//!
//! - **Caches** ([`store`]): canonicalize incoming snapshots and publish
//!   through [`Published`], which only emits when content changed.
//!   Consumers watch them through [`Snapshots`].
//!
//! - **Polling** ([`PollController`]): latest-wins fetch/apply cycles.
//!   A response is applied only if no newer attempt started and the
//!   controller was not stopped.
//!
//! - **Alignment** ([`aligner`]): flat readings to one row per timestamp
//!   with a column for every requested sensor.

pub mod aligner;
pub mod config;
pub mod convert;
pub mod dashboard;
pub mod equality;
pub mod error;
pub mod model;
pub mod mutation;
pub mod poll;
pub mod push;
pub mod series;
pub mod store;
pub mod stream;
pub mod subscription;
pub mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_SENSOR_TYPE, RollbackPolicy, SyncConfig, TlsVerification};
pub use dashboard::Dashboard;
pub use equality::Published;
pub use error::CoreError;
pub use mutation::NotificationActions;
pub use poll::{PollController, PollOutcome};
pub use push::{MountId, PushRegistry, Topic};
pub use series::{DateRange, ReadingsQuery, TemperatureSeries};
pub use store::{CurrentReadingCache, CurrentReadings, NotificationCache, RosterCache};
pub use stream::{SnapshotStream, Snapshots};
pub use subscription::{
    CurrentReadingsSubscription, NotificationSubscription, RosterSubscription, Subscription,
};
pub use supervisor::{Attempt, LatestWins};

pub use sensorhub_api::ReconnectPolicy;

pub use model::{
    AlignedEntry, ChannelPreference, HealthStatus, Identity, NotificationAccess,
    NotificationCategory, NotificationPayload, NotificationRecord, NotificationState,
    ReadingPoint, SensorHealthRecord, SensorSnapshot, Severity, User, VIEW_NOTIFICATIONS,
};
