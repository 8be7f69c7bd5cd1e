// ── Current readings cache ──
//
// Push-fed. Every message is a complete snapshot of the latest reading per
// sensor; it replaces the cache outright.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::equality::Published;
use crate::model::ReadingPoint;
use crate::stream::Snapshots;

/// Latest reading per sensor name, in name order.
pub type CurrentReadings = BTreeMap<String, ReadingPoint>;

pub struct CurrentReadingCache {
    published: Published<CurrentReadings>,
}

impl CurrentReadingCache {
    pub fn new() -> Self {
        Self {
            published: Published::new(BTreeMap::new()),
        }
    }

    /// Replace the cache with `batch`. Within one batch a later entry for a
    /// sensor supersedes an earlier one.
    pub fn apply(&self, batch: Vec<ReadingPoint>) -> bool {
        let map: CurrentReadings = batch
            .into_iter()
            .map(|r| (r.sensor_name.clone(), r))
            .collect();
        self.published.offer(map)
    }

    pub fn snapshot(&self) -> Arc<CurrentReadings> {
        self.published.current()
    }

    pub fn get(&self, sensor: &str) -> Option<ReadingPoint> {
        self.snapshot().get(sensor).cloned()
    }

    pub fn version(&self) -> u64 {
        self.published.version()
    }

    pub fn snapshots(&self) -> Snapshots<CurrentReadings> {
        self.published.snapshots()
    }
}

impl Default for CurrentReadingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(sensor: &str, ts: &str, value: f64) -> ReadingPoint {
        ReadingPoint {
            sensor_name: sensor.into(),
            timestamp: ts.into(),
            value,
        }
    }

    #[test]
    fn message_replaces_whole_map() {
        let cache = CurrentReadingCache::new();
        assert!(cache.apply(vec![point("Up", "t1", 20.0), point("Down", "t1", 18.0)]));
        assert!(cache.apply(vec![point("Up", "t2", 21.0)]));

        let snap = cache.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("Up").map(|r| r.timestamp.as_str()), Some("t2"));
    }

    #[test]
    fn later_entry_in_batch_wins() {
        let cache = CurrentReadingCache::new();
        cache.apply(vec![point("Up", "t1", 20.0), point("Up", "t2", 22.5)]);
        assert_eq!(cache.get("Up").map(|r| r.timestamp), Some("t2".to_owned()));
    }

    #[test]
    fn identical_batch_in_other_order_is_gated() {
        let cache = CurrentReadingCache::new();
        cache.apply(vec![point("Up", "t1", 20.0), point("Down", "t1", 18.0)]);
        let before = cache.snapshot();
        assert!(!cache.apply(vec![point("Down", "t1", 18.0), point("Up", "t1", 20.0)]));
        assert!(Arc::ptr_eq(&before, &cache.snapshot()));
        assert_eq!(cache.version(), 1);
    }
}
