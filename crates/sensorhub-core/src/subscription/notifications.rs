// ── Notification subscription ──
//
// Gated on identity: nothing opens while the identity is pending, the
// feed closes (and the cache empties) when the user signs out or lacks
// `view_notifications`, and it reopens for a newly authenticated user.

use std::sync::{Arc, Mutex, PoisonError};

use sensorhub_api::HubClient;
use sensorhub_api::types::NotificationJson;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{Lifecycle, Running, Subscription, SyncContext, bridge};
use crate::convert::{notifications_from_wire, pushed_notification, unread_from_wire};
use crate::error::CoreError;
use crate::model::{
    ChannelPreference, Identity, NotificationAccess, NotificationRecord, NotificationState,
};
use crate::mutation::NotificationActions;
use crate::poll::{PollController, PollOutcome};
use crate::push::{MountId, Topic};
use crate::store::NotificationCache;
use crate::stream::Snapshots;

pub struct NotificationSubscription {
    feed: Arc<NotificationFeed>,
    lifecycle: Lifecycle,
}

struct NotificationFeed {
    ctx: SyncContext,
    cache: Arc<NotificationCache>,
    actions: NotificationActions,
    identity: watch::Receiver<Identity>,
    mount: MountId,
    session: Mutex<Option<Session>>,
}

/// Live feed for one granted user.
struct Session {
    user_id: i64,
    running: Running,
}

pub(crate) type Fetched = (Vec<NotificationRecord>, u64, Vec<ChannelPreference>);

impl NotificationSubscription {
    pub(crate) fn new(ctx: SyncContext, identity: watch::Receiver<Identity>) -> Self {
        let cache = Arc::new(NotificationCache::new());
        let actions = NotificationActions::new(
            Arc::clone(&ctx.client),
            Arc::clone(&cache),
            ctx.config.rollback,
        );
        Self {
            feed: Arc::new(NotificationFeed {
                ctx,
                cache,
                actions,
                identity,
                mount: MountId::new(),
                session: Mutex::new(None),
            }),
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn cache(&self) -> &NotificationCache {
        &self.feed.cache
    }

    pub fn snapshot(&self) -> Arc<NotificationState> {
        self.feed.cache.snapshot()
    }

    pub fn snapshots(&self) -> Snapshots<NotificationState> {
        self.feed.cache.snapshots()
    }

    /// Access granted by the latest identity.
    pub fn access(&self) -> NotificationAccess {
        self.feed.identity.borrow().notification_access()
    }

    /// Whether a feed is open for a granted user right now.
    pub fn is_live(&self) -> bool {
        self.feed.session_poll().is_some()
    }

    /// Reload page, counter and preferences. `Skipped` unless a feed is
    /// open for a granted user.
    pub async fn refresh(&self) -> PollOutcome {
        match self.feed.session_poll() {
            Some(poll) => self.feed.poll_once(&poll).await,
            None => PollOutcome::Skipped,
        }
    }

    // ── Optimistic actions ──

    pub async fn mark_read(&self, notification_id: i64) -> Result<(), CoreError> {
        self.feed.actions.mark_read(notification_id).await
    }

    pub async fn dismiss(&self, notification_id: i64) -> Result<(), CoreError> {
        self.feed.actions.dismiss(notification_id).await
    }

    pub async fn mark_all_read(&self) -> Result<(), CoreError> {
        self.feed.actions.mark_all_read().await
    }

    pub async fn dismiss_all(&self) -> Result<(), CoreError> {
        self.feed.actions.dismiss_all().await
    }

    pub async fn set_preference(&self, pref: ChannelPreference) -> Result<(), CoreError> {
        self.feed.actions.set_preference(pref).await
    }

    pub async fn update_preference(&self, pref: ChannelPreference) -> Result<(), CoreError> {
        self.feed.actions.update_preference(pref).await
    }
}

impl Subscription for NotificationSubscription {
    fn start(&self) {
        self.lifecycle.clear();
        self.feed.end_session();
        let mut running = Running::new("notifications-gate", &self.feed.ctx.cancel);
        let feed = Arc::clone(&self.feed);
        let identity = self.feed.identity.clone();
        let cancel = running.token().clone();
        running.track(tokio::spawn(async move {
            feed.gate(identity, cancel).await;
        }));
        self.lifecycle.replace(running);
    }

    fn stop(&self) {
        self.lifecycle.clear();
        self.feed.end_session();
        self.feed.ctx.registry.close_mount(self.feed.mount);
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl NotificationFeed {
    /// Follow identity changes until `cancel` fires.
    async fn gate(self: Arc<Self>, mut identity: watch::Receiver<Identity>, cancel: CancellationToken) {
        loop {
            let access = identity.borrow_and_update().notification_access();
            self.on_access(access, &cancel);
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = identity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        trace!("notification gate stopped");
    }

    fn on_access(self: &Arc<Self>, access: NotificationAccess, parent: &CancellationToken) {
        match access {
            NotificationAccess::Pending => trace!("identity pending, notifications wait"),
            NotificationAccess::Denied => {
                if self.end_session() {
                    debug!("notification access revoked");
                }
                self.cache.clear();
            }
            NotificationAccess::Granted(user_id) => {
                let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(current) = session.take() {
                    if current.user_id == user_id {
                        *session = Some(current);
                        return;
                    }
                    debug!(from = current.user_id, to = user_id, "notification user changed");
                    // The old feed stops before the cache empties, so no
                    // frame for the previous user lands afterwards.
                    drop(current);
                    self.ctx.registry.close(&Topic::Notifications, self.mount);
                    self.cache.clear();
                }
                *session = Some(self.open_session(user_id, parent));
            }
        }
    }

    fn open_session(self: &Arc<Self>, user_id: i64, parent: &CancellationToken) -> Session {
        let mut running = Running::new("notifications", parent);
        let config = &self.ctx.config;

        if config.push_enabled {
            let topic = Topic::Notifications;
            match self.ctx.registry.open::<NotificationJson>(
                &self.ctx.client,
                topic.clone(),
                self.mount,
                config.reconnect.clone(),
            ) {
                Ok(conn) => {
                    let feed = Arc::downgrade(self);
                    let task = bridge(conn, topic, running.token().clone(), move |wire| {
                        if let Some(feed) = feed.upgrade() {
                            feed.apply_pushed(user_id, wire);
                        }
                    });
                    running.track(task);
                }
                Err(e) => warn!(topic = %topic, error = %e, "cannot open notification channel"),
            }
        }

        let feed = Arc::clone(self);
        let poll = Arc::clone(running.poll());
        running.track(tokio::spawn(async move {
            feed.poll_once(&poll).await;
        }));

        if let Some(period) = config.notification_poll_interval {
            let feed = Arc::clone(self);
            let weak = Arc::downgrade(running.poll());
            running.poll().every(period, move || {
                let feed = Arc::clone(&feed);
                let weak = weak.clone();
                async move {
                    if let Some(poll) = weak.upgrade() {
                        feed.poll_once(&poll).await;
                    }
                }
            });
        }

        debug!(user_id, "notification feed opened");
        Session { user_id, running }
    }

    /// Apply a pushed record, unless the session it was received for has
    /// ended. Holds the session lock so a user switch cannot interleave.
    fn apply_pushed(&self, user_id: i64, wire: NotificationJson) {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.as_ref().map(|s| s.user_id) != Some(user_id) {
            trace!(user_id, "push for an ended notification session dropped");
            return;
        }
        let changed = self.cache.apply_pushed(pushed_notification(wire));
        debug!(changed, "pushed notification applied");
    }

    /// Close the live feed, if any. Returns whether one was open.
    fn end_session(&self) -> bool {
        let previous = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.ctx.registry.close(&Topic::Notifications, self.mount);
        previous.is_some()
    }

    fn session_poll(&self) -> Option<Arc<PollController>> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|s| !s.running.token().is_cancelled())
            .map(|s| Arc::clone(s.running.poll()))
    }

    async fn poll_once(&self, poll: &PollController) -> PollOutcome {
        let client = Arc::clone(&self.ctx.client);
        let limit = self.ctx.config.notification_page_limit;
        poll.attempt(
            |_| async move { fetch_state(&client, limit).await },
            |(records, unread, preferences)| {
                let changed = self.cache.apply_refresh(records, unread, preferences);
                debug!(changed, unread, "notifications refreshed");
            },
        )
        .await
    }
}

/// Page, counter and preferences, fetched concurrently.
pub(crate) async fn fetch_state(client: &HubClient, limit: u32) -> Result<Fetched, CoreError> {
    let (page, count, preferences) = tokio::try_join!(
        client.list_notifications(limit, 0, false),
        client.unread_count(),
        client.channel_preferences(),
    )?;
    Ok((
        notifications_from_wire(page)?,
        unread_from_wire(count.count),
        preferences.into_iter().map(Into::into).collect(),
    ))
}
