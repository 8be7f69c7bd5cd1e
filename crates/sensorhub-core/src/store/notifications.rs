// ── Notification cache ──
//
// Records, the unread counter and channel preferences live in one
// `NotificationState` so they are always published together.

use std::sync::Arc;

use tracing::trace;

use crate::equality::{Applied, Published};
use crate::model::{ChannelPreference, NotificationRecord, NotificationState};
use crate::stream::Snapshots;

pub struct NotificationCache {
    published: Published<NotificationState>,
}

impl NotificationCache {
    pub fn new() -> Self {
        Self {
            published: Published::new(NotificationState::default()),
        }
    }

    /// Replace everything with a freshly fetched page, counter and
    /// preference list. Dismissed records never enter the visible feed.
    pub fn apply_refresh(
        &self,
        records: Vec<NotificationRecord>,
        unread: u64,
        preferences: Vec<ChannelPreference>,
    ) -> bool {
        let records = records.into_iter().filter(|r| !r.is_dismissed).collect();
        self.published.offer(NotificationState {
            records,
            unread,
            preferences,
        })
    }

    /// Prepend a pushed record and bump the counter. A record whose
    /// `notification_id` is already in the feed is ignored.
    pub fn apply_pushed(&self, record: NotificationRecord) -> bool {
        self.published
            .update(|state| {
                if state.find(record.notification_id).is_some() {
                    trace!(notification_id = record.notification_id, "duplicate push ignored");
                    return None;
                }
                let mut next = state.clone();
                if !record.is_read {
                    next.unread += 1;
                }
                next.records.insert(0, record);
                Some(next)
            })
            .is_some()
    }

    /// Forget everything (signed out or permission lost).
    pub fn clear(&self) -> bool {
        self.published.offer(NotificationState::default())
    }

    pub(crate) fn update<F>(&self, f: F) -> Option<Applied<NotificationState>>
    where
        F: FnOnce(&NotificationState) -> Option<NotificationState>,
    {
        self.published.update(f)
    }

    pub(crate) fn restore_if_unchanged(
        &self,
        version: u64,
        previous: Arc<NotificationState>,
    ) -> bool {
        self.published.restore_if_unchanged(version, previous)
    }

    pub fn snapshot(&self) -> Arc<NotificationState> {
        self.published.current()
    }

    pub fn unread(&self) -> u64 {
        self.snapshot().unread
    }

    pub fn version(&self) -> u64 {
        self.published.version()
    }

    pub fn snapshots(&self) -> Snapshots<NotificationState> {
        self.published.snapshots()
    }
}

impl Default for NotificationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{NotificationCategory, NotificationPayload, Severity};

    pub(crate) fn record(notification_id: i64, is_read: bool) -> NotificationRecord {
        NotificationRecord {
            id: notification_id * 10,
            notification_id,
            is_read,
            is_dismissed: false,
            payload: NotificationPayload {
                category: NotificationCategory::ThresholdAlert,
                severity: Severity::Warning,
                title: format!("Alert {notification_id}"),
                message: "Attic above 30C".into(),
                created_at: "2024-01-01T10:00:00Z".into(),
            },
        }
    }

    #[test]
    fn refresh_drops_dismissed_records() {
        let cache = NotificationCache::new();
        let mut gone = record(3, true);
        gone.is_dismissed = true;
        cache.apply_refresh(vec![record(1, false), gone], 1, Vec::new());

        let snap = cache.snapshot();
        assert_eq!(snap.records.len(), 1);
        assert_eq!(snap.unread, 1);
    }

    #[test]
    fn push_prepends_and_counts() {
        let cache = NotificationCache::new();
        cache.apply_refresh(vec![record(1, true)], 0, Vec::new());
        assert!(cache.apply_pushed(record(2, false)));

        let snap = cache.snapshot();
        assert_eq!(snap.records[0].notification_id, 2);
        assert_eq!(snap.unread, 1);
    }

    #[test]
    fn duplicate_push_is_ignored() {
        let cache = NotificationCache::new();
        cache.apply_pushed(record(7, false));
        let version = cache.version();
        assert!(!cache.apply_pushed(record(7, false)));
        assert_eq!(cache.version(), version);
        assert_eq!(cache.unread(), 1);
    }

    #[test]
    fn identical_refresh_is_gated() {
        let cache = NotificationCache::new();
        cache.apply_refresh(vec![record(1, false)], 1, Vec::new());
        let before = cache.snapshot();
        assert!(!cache.apply_refresh(vec![record(1, false)], 1, Vec::new()));
        assert!(Arc::ptr_eq(&before, &cache.snapshot()));
    }

    #[test]
    fn clear_empties_state() {
        let cache = NotificationCache::new();
        cache.apply_pushed(record(1, false));
        assert!(cache.clear());
        assert_eq!(*cache.snapshot(), NotificationState::default());
    }
}
