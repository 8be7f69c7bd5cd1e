// ── Domain model ──
//
// Strict internal types. Wire records are validated into these in
// `crate::convert` before anything touches a cache.

pub mod identity;
pub mod notification;
pub mod reading;
pub mod sensor;

pub use identity::{Identity, NotificationAccess, User, VIEW_NOTIFICATIONS};
pub use notification::{
    ChannelPreference, NotificationCategory, NotificationPayload, NotificationRecord,
    NotificationState, Severity,
};
pub use reading::{AlignedEntry, ReadingPoint};
pub use sensor::{HealthStatus, SensorHealthRecord, SensorSnapshot};
