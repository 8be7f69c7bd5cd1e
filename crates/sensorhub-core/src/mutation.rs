// ── Optimistic notification actions ──
//
// Each action changes the local notification state first, then calls the
// server. On failure the error is returned to the caller; the local change
// is kept or restored depending on the configured `RollbackPolicy`.

use std::future::Future;
use std::sync::Arc;

use sensorhub_api::HubClient;
use sensorhub_api::types::{ApiMessage, ChannelPreferenceJson};
use tracing::{debug, warn};

use crate::config::RollbackPolicy;
use crate::error::CoreError;
use crate::model::{ChannelPreference, NotificationState};
use crate::store::NotificationCache;

// ── State transitions ────────────────────────────────────────────────
//
// Each returns `None` when the action does not change local state.

impl NotificationState {
    /// Mark one record read. The counter only moves if the record was
    /// present and unread.
    pub fn with_read(&self, notification_id: i64) -> Option<Self> {
        let index = self
            .records
            .iter()
            .position(|r| r.notification_id == notification_id && !r.is_read)?;
        let mut next = self.clone();
        next.records[index].is_read = true;
        next.unread = next.unread.saturating_sub(1);
        Some(next)
    }

    /// Remove one record from the visible feed.
    pub fn with_dismissed(&self, notification_id: i64) -> Option<Self> {
        let index = self
            .records
            .iter()
            .position(|r| r.notification_id == notification_id)?;
        let mut next = self.clone();
        let removed = next.records.remove(index);
        if !removed.is_read {
            next.unread = next.unread.saturating_sub(1);
        }
        Some(next)
    }

    pub fn all_read(&self) -> Option<Self> {
        if self.unread == 0 && self.records.iter().all(|r| r.is_read) {
            return None;
        }
        let mut next = self.clone();
        for r in &mut next.records {
            r.is_read = true;
        }
        next.unread = 0;
        Some(next)
    }

    /// Empty the feed. Preferences are untouched.
    pub fn cleared(&self) -> Option<Self> {
        if self.records.is_empty() && self.unread == 0 {
            return None;
        }
        Some(Self {
            records: Vec::new(),
            unread: 0,
            preferences: self.preferences.clone(),
        })
    }

    /// Insert or replace the preference for `pref.category`.
    pub fn with_preference(&self, pref: &ChannelPreference) -> Option<Self> {
        if self.preference(&pref.category) == Some(pref) {
            return None;
        }
        let mut next = self.clone();
        match next
            .preferences
            .iter_mut()
            .find(|p| p.category == pref.category)
        {
            Some(existing) => *existing = pref.clone(),
            None => next.preferences.push(pref.clone()),
        }
        Some(next)
    }
}

// ── Runner ───────────────────────────────────────────────────────────

/// Notification actions bound to a cache.
#[derive(Clone)]
pub struct NotificationActions {
    client: Arc<HubClient>,
    cache: Arc<NotificationCache>,
    rollback: RollbackPolicy,
}

impl NotificationActions {
    pub fn new(
        client: Arc<HubClient>,
        cache: Arc<NotificationCache>,
        rollback: RollbackPolicy,
    ) -> Self {
        Self {
            client,
            cache,
            rollback,
        }
    }

    pub async fn mark_read(&self, notification_id: i64) -> Result<(), CoreError> {
        self.run(
            "mark_read",
            |s| s.with_read(notification_id),
            self.client.mark_read(notification_id),
        )
        .await
    }

    pub async fn dismiss(&self, notification_id: i64) -> Result<(), CoreError> {
        self.run(
            "dismiss",
            |s| s.with_dismissed(notification_id),
            self.client.dismiss(notification_id),
        )
        .await
    }

    pub async fn mark_all_read(&self) -> Result<(), CoreError> {
        self.run(
            "mark_all_read",
            NotificationState::all_read,
            self.client.bulk_mark_read(),
        )
        .await
    }

    pub async fn dismiss_all(&self) -> Result<(), CoreError> {
        self.run(
            "dismiss_all",
            NotificationState::cleared,
            self.client.bulk_dismiss(),
        )
        .await
    }

    /// Create a preference (`POST`).
    pub async fn set_preference(&self, pref: ChannelPreference) -> Result<(), CoreError> {
        let body = ChannelPreferenceJson::from(&pref);
        self.run(
            "set_preference",
            |s| s.with_preference(&pref),
            self.client.set_channel_preference(&body),
        )
        .await
    }

    /// Update an existing preference (`PUT`).
    pub async fn update_preference(&self, pref: ChannelPreference) -> Result<(), CoreError> {
        let body = ChannelPreferenceJson::from(&pref);
        self.run(
            "update_preference",
            |s| s.with_preference(&pref),
            self.client.update_channel_preference(&body),
        )
        .await
    }

    /// Apply `transition` locally, then await `call`. The call future is
    /// lazy, so nothing reaches the server before the local change lands.
    async fn run<F, Fut>(
        &self,
        action: &'static str,
        transition: F,
        call: Fut,
    ) -> Result<(), CoreError>
    where
        F: FnOnce(&NotificationState) -> Option<NotificationState>,
        Fut: Future<Output = Result<ApiMessage, sensorhub_api::Error>>,
    {
        let applied = self.cache.update(transition);
        debug!(action, local_change = applied.is_some(), "optimistic action");

        match call.await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(action, error = %e, "notification action failed");
                if let (RollbackPolicy::Restore, Some(applied)) = (self.rollback, applied) {
                    let restored = self
                        .cache
                        .restore_if_unchanged(applied.version, applied.previous);
                    debug!(action, restored, "rollback");
                }
                Err(e.into())
            }
        }
    }
}
