// ── Sensor roster cache ──
//
// Rosters arrive per sensor type (one push channel per type, one request
// per type when polling). The published roster is every slice merged and
// sorted by name.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::convert::ensure_unique_names;
use crate::equality::Published;
use crate::error::CoreError;
use crate::model::SensorSnapshot;
use crate::stream::Snapshots;

/// Sort into canonical order: by name, case-insensitively first so
/// "attic" sits next to "Attic", then exactly.
pub fn canonical_order(sensors: &mut [SensorSnapshot]) {
    sensors.sort_by_cached_key(|s| (s.name.to_lowercase(), s.name.clone()));
}

pub struct RosterCache {
    slices: Mutex<BTreeMap<String, Vec<SensorSnapshot>>>,
    published: Published<Vec<SensorSnapshot>>,
}

impl RosterCache {
    pub fn new() -> Self {
        Self {
            slices: Mutex::new(BTreeMap::new()),
            published: Published::new(Vec::new()),
        }
    }

    /// Replace one type's slice (a push message). Returns whether the
    /// published roster changed.
    pub fn apply_type(
        &self,
        sensor_type: &str,
        sensors: Vec<SensorSnapshot>,
    ) -> Result<bool, CoreError> {
        let mut slices = self.slices.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = slices.clone();
        next.insert(sensor_type.to_owned(), sensors);
        self.commit(&mut slices, next)
    }

    /// Replace every slice at once (a poll). Types absent from `all` are
    /// dropped.
    pub fn apply_all(&self, all: BTreeMap<String, Vec<SensorSnapshot>>) -> Result<bool, CoreError> {
        let mut slices = self.slices.lock().unwrap_or_else(PoisonError::into_inner);
        self.commit(&mut slices, all)
    }

    /// Validate the merged roster, then swap the slices in and offer it.
    /// A duplicate name rejects the whole update.
    fn commit(
        &self,
        slices: &mut BTreeMap<String, Vec<SensorSnapshot>>,
        next: BTreeMap<String, Vec<SensorSnapshot>>,
    ) -> Result<bool, CoreError> {
        let mut merged: Vec<SensorSnapshot> = next.values().flatten().cloned().collect();
        ensure_unique_names(&merged)?;
        canonical_order(&mut merged);
        *slices = next;

        let changed = self.published.offer(merged);
        debug!(changed, "roster offered");
        Ok(changed)
    }

    pub fn snapshot(&self) -> Arc<Vec<SensorSnapshot>> {
        self.published.current()
    }

    pub fn version(&self) -> u64 {
        self.published.version()
    }

    pub fn snapshots(&self) -> Snapshots<Vec<SensorSnapshot>> {
        self.published.snapshots()
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|s| s.name.clone()).collect()
    }
}

impl Default for RosterCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::HealthStatus;

    fn sensor(id: i64, name: &str, kind: &str) -> SensorSnapshot {
        SensorSnapshot {
            id,
            name: name.into(),
            sensor_type: kind.into(),
            url: format!("http://10.0.0.{id}"),
            health_status: HealthStatus::Good,
            health_reason: None,
            enabled: true,
        }
    }

    #[test]
    fn slices_merge_sorted_by_name() {
        let cache = RosterCache::new();
        cache
            .apply_type("Temperature", vec![sensor(2, "Upstairs", "Temperature")])
            .unwrap();
        cache
            .apply_type("Humidity", vec![sensor(3, "attic", "Humidity")])
            .unwrap();
        cache
            .apply_type("Temperature", vec![
                sensor(2, "Upstairs", "Temperature"),
                sensor(1, "Downstairs", "Temperature"),
            ])
            .unwrap();

        assert_eq!(cache.names(), vec!["attic", "Downstairs", "Upstairs"]);
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let cache = RosterCache::new();
        cache
            .apply_type("Temperature", vec![sensor(1, "A", "Temperature"), sensor(2, "B", "Temperature")])
            .unwrap();
        let before = cache.snapshot();

        let changed = cache
            .apply_type("Temperature", vec![sensor(2, "B", "Temperature"), sensor(1, "A", "Temperature")])
            .unwrap();
        assert!(!changed);
        assert!(Arc::ptr_eq(&before, &cache.snapshot()));
    }

    #[test]
    fn duplicate_names_across_types_are_rejected() {
        let cache = RosterCache::new();
        cache
            .apply_type("Temperature", vec![sensor(1, "Attic", "Temperature")])
            .unwrap();
        let err = cache
            .apply_type("Humidity", vec![sensor(9, "Attic", "Humidity")])
            .unwrap_err();
        assert!(matches!(err, CoreError::Decode { .. }));
        assert_eq!(cache.snapshot().len(), 1);

        // The rejected slice was not kept either.
        cache.apply_type("Humidity", Vec::new()).unwrap();
        assert_eq!(cache.names(), vec!["Attic"]);
    }

    #[test]
    fn apply_all_drops_missing_types() {
        let cache = RosterCache::new();
        cache
            .apply_type("Humidity", vec![sensor(3, "Cellar", "Humidity")])
            .unwrap();
        let mut all = BTreeMap::new();
        all.insert("Temperature".to_owned(), vec![sensor(1, "Attic", "Temperature")]);
        assert!(cache.apply_all(all).unwrap());
        assert_eq!(cache.names(), vec!["Attic"]);
    }
}
