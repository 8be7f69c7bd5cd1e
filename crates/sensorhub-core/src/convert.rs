// ── Wire-to-domain conversions ──
//
// The one chokepoint where loose wire records become strict domain types.
// Anything that fails here is a decode error: the whole payload is dropped
// and no cache is touched.

use std::collections::HashSet;

use sensorhub_api::types::{
    ChannelPreferenceJson, MeResponse, NotificationJson, SensorHealthHistoryJson, SensorJson,
    TemperatureReadingJson, UserJson, UserNotificationJson,
};

use crate::error::CoreError;
use crate::model::{
    ChannelPreference, HealthStatus, Identity, NotificationCategory, NotificationPayload,
    NotificationRecord, ReadingPoint, SensorHealthRecord, SensorSnapshot, Severity, User,
};

// ── Helpers ────────────────────────────────────────────────────────

fn require_non_empty(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::decode(format!("{field} is empty")));
    }
    Ok(())
}

fn collect<W, T>(items: Vec<W>) -> Result<Vec<T>, CoreError>
where
    T: TryFrom<W, Error = CoreError>,
{
    items.into_iter().map(T::try_from).collect()
}

// ── Sensors ────────────────────────────────────────────────────────

impl TryFrom<SensorJson> for SensorSnapshot {
    type Error = CoreError;

    fn try_from(s: SensorJson) -> Result<Self, Self::Error> {
        require_non_empty("sensor name", &s.name)?;
        Ok(Self {
            id: s.id,
            name: s.name,
            sensor_type: s.sensor_type,
            url: s.url,
            health_status: HealthStatus::from_wire(s.health_status.as_deref()),
            health_reason: s.health_reason.filter(|r| !r.is_empty()),
            enabled: s.enabled.unwrap_or(true),
        })
    }
}

/// Convert one roster slice. Names must be unique within it.
pub fn sensors_from_wire(items: Vec<SensorJson>) -> Result<Vec<SensorSnapshot>, CoreError> {
    let sensors: Vec<SensorSnapshot> = collect(items)?;
    ensure_unique_names(&sensors)?;
    Ok(sensors)
}

/// Roster snapshots must not contain two sensors with the same name.
pub fn ensure_unique_names(sensors: &[SensorSnapshot]) -> Result<(), CoreError> {
    let mut seen = HashSet::with_capacity(sensors.len());
    for s in sensors {
        if !seen.insert(s.name.as_str()) {
            return Err(CoreError::decode(format!(
                "duplicate sensor name {:?} in roster",
                s.name
            )));
        }
    }
    Ok(())
}

impl From<SensorHealthHistoryJson> for SensorHealthRecord {
    fn from(h: SensorHealthHistoryJson) -> Self {
        Self {
            id: h.id,
            sensor_id: h.sensor_id,
            health_status: HealthStatus::from_wire(Some(&h.health_status)),
            recorded_at: h.recorded_at,
        }
    }
}

// ── Readings ───────────────────────────────────────────────────────

impl TryFrom<TemperatureReadingJson> for ReadingPoint {
    type Error = CoreError;

    fn try_from(r: TemperatureReadingJson) -> Result<Self, Self::Error> {
        require_non_empty("sensor_name", &r.sensor_name)?;
        require_non_empty("time", &r.time)?;
        if !r.temperature.is_finite() {
            return Err(CoreError::decode(format!(
                "non-finite reading for {}",
                r.sensor_name
            )));
        }
        Ok(Self {
            sensor_name: r.sensor_name,
            timestamp: r.time,
            value: r.temperature,
        })
    }
}

pub fn readings_from_wire(
    items: Vec<TemperatureReadingJson>,
) -> Result<Vec<ReadingPoint>, CoreError> {
    collect(items)
}

// ── Notifications ──────────────────────────────────────────────────

impl From<NotificationJson> for NotificationPayload {
    fn from(n: NotificationJson) -> Self {
        Self {
            category: NotificationCategory::from(n.category),
            severity: n.severity.parse().unwrap_or(Severity::Info),
            title: n.title,
            message: n.message,
            created_at: n.created_at,
        }
    }
}

impl TryFrom<UserNotificationJson> for NotificationRecord {
    type Error = CoreError;

    fn try_from(n: UserNotificationJson) -> Result<Self, Self::Error> {
        let Some(payload) = n.notification else {
            return Err(CoreError::decode(format!(
                "notification {} has no payload",
                n.notification_id
            )));
        };
        Ok(Self {
            id: n.id,
            notification_id: n.notification_id,
            is_read: n.is_read,
            is_dismissed: n.is_dismissed,
            payload: payload.into(),
        })
    }
}

pub fn notifications_from_wire(
    items: Vec<UserNotificationJson>,
) -> Result<Vec<NotificationRecord>, CoreError> {
    collect(items)
}

/// A freshly pushed notification becomes a new unread record.
pub fn pushed_notification(n: NotificationJson) -> NotificationRecord {
    NotificationRecord {
        id: 0,
        notification_id: n.id,
        is_read: false,
        is_dismissed: false,
        payload: n.into(),
    }
}

impl From<ChannelPreferenceJson> for ChannelPreference {
    fn from(p: ChannelPreferenceJson) -> Self {
        Self {
            category: NotificationCategory::from(p.category),
            email_enabled: p.email_enabled,
            inapp_enabled: p.inapp_enabled,
        }
    }
}

impl From<&ChannelPreference> for ChannelPreferenceJson {
    fn from(p: &ChannelPreference) -> Self {
        Self {
            user_id: None,
            category: p.category.as_str().to_owned(),
            email_enabled: p.email_enabled,
            inapp_enabled: p.inapp_enabled,
        }
    }
}

/// Server counts are signed on the wire; negative is clamped to zero.
pub fn unread_from_wire(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

// ── Identity ───────────────────────────────────────────────────────

impl From<UserJson> for User {
    fn from(u: UserJson) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            roles: u.roles,
            permissions: u.permissions,
        }
    }
}

impl From<MeResponse> for Identity {
    fn from(me: MeResponse) -> Self {
        match me.user {
            Some(u) => Identity::Authenticated(u.into()),
            None => Identity::Unauthenticated,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sensor(id: i64, name: &str) -> SensorJson {
        SensorJson {
            id,
            name: name.into(),
            sensor_type: "Temperature".into(),
            url: String::new(),
            health_status: Some("BAD".into()),
            health_reason: Some(String::new()),
            enabled: None,
        }
    }

    #[test]
    fn sensor_defaults_and_health_parse() {
        let s = SensorSnapshot::try_from(sensor(1, "Attic")).unwrap();
        assert_eq!(s.health_status, HealthStatus::Bad);
        assert!(s.health_reason.is_none());
        assert!(s.enabled);
    }

    #[test]
    fn unknown_health_is_unknown() {
        let mut raw = sensor(1, "Attic");
        raw.health_status = Some("degraded".into());
        let s = SensorSnapshot::try_from(raw).unwrap();
        assert_eq!(s.health_status, HealthStatus::Unknown);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = sensors_from_wire(vec![sensor(1, "A"), sensor(2, "A")]).unwrap_err();
        assert!(matches!(err, CoreError::Decode { .. }));
    }

    #[test]
    fn empty_sensor_name_is_rejected() {
        assert!(SensorSnapshot::try_from(sensor(1, "  ")).is_err());
    }

    #[test]
    fn non_finite_reading_is_rejected() {
        let raw = TemperatureReadingJson {
            id: None,
            sensor_name: "Up".into(),
            temperature: f64::INFINITY,
            time: "2025-01-01 10:00:00".into(),
        };
        assert!(ReadingPoint::try_from(raw).is_err());
    }

    #[test]
    fn notification_without_payload_fails_whole_page() {
        let page = vec![UserNotificationJson {
            id: 1,
            user_id: None,
            notification_id: 2,
            is_read: false,
            is_dismissed: false,
            read_at: None,
            dismissed_at: None,
            notification: None,
        }];
        assert!(notifications_from_wire(page).is_err());
    }

    #[test]
    fn pushed_notification_is_unread() {
        let rec = pushed_notification(NotificationJson {
            id: 77,
            category: "threshold_alert".into(),
            severity: "critical".into(),
            title: "Hot".into(),
            message: "Attic 40C".into(),
            metadata: None,
            created_at: "2025-01-01T10:00:00Z".into(),
        });
        assert_eq!(rec.id, 0);
        assert_eq!(rec.notification_id, 77);
        assert!(!rec.is_read);
        assert_eq!(rec.payload.severity, Severity::Info);
        assert_eq!(rec.payload.category, NotificationCategory::ThresholdAlert);
    }

    #[test]
    fn negative_unread_clamps() {
        assert_eq!(unread_from_wire(-3), 0);
        assert_eq!(unread_from_wire(5), 5);
    }

    #[test]
    fn me_without_user_is_unauthenticated() {
        let me = MeResponse {
            user: None,
            csrf_token: None,
        };
        assert_eq!(Identity::from(me), Identity::Unauthenticated);
    }
}
