// ── Roster subscription ──
//
// Push channel per sensor type plus a periodic poll of every type. Both
// feed `RosterCache`, whose gate keeps the published roster stable when
// the two sources agree.

use std::collections::BTreeMap;
use std::sync::Arc;

use sensorhub_api::HubClient;
use sensorhub_api::types::SensorJson;
use tracing::{debug, warn};

use super::{Lifecycle, Running, Subscription, SyncContext, bridge};
use crate::convert::sensors_from_wire;
use crate::error::CoreError;
use crate::model::SensorSnapshot;
use crate::poll::{PollController, PollOutcome};
use crate::push::{MountId, Topic};
use crate::store::RosterCache;
use crate::stream::Snapshots;

pub struct RosterSubscription {
    feed: Arc<RosterFeed>,
    lifecycle: Lifecycle,
}

struct RosterFeed {
    ctx: SyncContext,
    cache: RosterCache,
    mount: MountId,
}

impl RosterSubscription {
    pub(crate) fn new(ctx: SyncContext) -> Self {
        Self {
            feed: Arc::new(RosterFeed {
                ctx,
                cache: RosterCache::new(),
                mount: MountId::new(),
            }),
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn cache(&self) -> &RosterCache {
        &self.feed.cache
    }

    pub fn snapshot(&self) -> Arc<Vec<SensorSnapshot>> {
        self.feed.cache.snapshot()
    }

    pub fn snapshots(&self) -> Snapshots<Vec<SensorSnapshot>> {
        self.feed.cache.snapshots()
    }

    /// Poll every configured type now. Works whether or not the
    /// subscription is started.
    pub async fn refresh(&self) -> PollOutcome {
        let poll = self.lifecycle.controller("roster", &self.feed.ctx.cancel);
        self.feed.poll_once(&poll).await
    }
}

impl Subscription for RosterSubscription {
    fn start(&self) {
        // The previous period stops before any channel reopens.
        self.lifecycle.clear();
        let ctx = &self.feed.ctx;
        let mut running = Running::new("roster", &ctx.cancel);

        if ctx.config.push_enabled {
            for kind in &ctx.config.sensor_types {
                let topic = Topic::SensorRoster(kind.clone());
                match ctx.registry.open::<Vec<SensorJson>>(
                    &ctx.client,
                    topic.clone(),
                    self.feed.mount,
                    ctx.config.reconnect.clone(),
                ) {
                    Ok(conn) => {
                        let feed = Arc::clone(&self.feed);
                        let kind = kind.clone();
                        let task = bridge(conn, topic, running.token().clone(), move |wire| {
                            feed.apply_push(&kind, wire);
                        });
                        running.track(task);
                    }
                    Err(e) => warn!(topic = %topic, error = %e, "cannot open roster push channel"),
                }
            }
        }

        let feed = Arc::clone(&self.feed);
        let poll = Arc::clone(running.poll());
        running.track(tokio::spawn(async move {
            feed.poll_once(&poll).await;
        }));

        let feed = Arc::clone(&self.feed);
        let weak = Arc::downgrade(running.poll());
        running
            .poll()
            .every(ctx.config.roster_poll_interval, move || {
                let feed = Arc::clone(&feed);
                let weak = weak.clone();
                async move {
                    if let Some(poll) = weak.upgrade() {
                        feed.poll_once(&poll).await;
                    }
                }
            });

        self.lifecycle.replace(running);
        debug!(types = ?ctx.config.sensor_types, "roster subscription started");
    }

    fn stop(&self) {
        if self.lifecycle.clear() {
            debug!("roster subscription stopped");
        }
        self.feed.ctx.registry.close_mount(self.feed.mount);
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

impl Drop for RosterSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl RosterFeed {
    fn apply_push(&self, kind: &str, wire: Vec<SensorJson>) {
        let result = sensors_from_wire(wire).and_then(|sensors| self.cache.apply_type(kind, sensors));
        match result {
            Ok(changed) => debug!(sensor_type = kind, changed, "roster push applied"),
            Err(e) => warn!(sensor_type = kind, error = %e, "roster push dropped"),
        }
    }

    async fn poll_once(&self, poll: &PollController) -> PollOutcome {
        let client = Arc::clone(&self.ctx.client);
        let types = self.ctx.config.sensor_types.clone();
        poll.attempt(
            |_| async move { fetch_all(&client, types).await },
            |all| {
                if let Err(e) = self.cache.apply_all(all) {
                    warn!(error = %e, "polled roster dropped");
                }
            },
        )
        .await
    }
}

/// Fetch every type concurrently. One failing type fails the attempt.
pub(crate) async fn fetch_all(
    client: &HubClient,
    types: Vec<String>,
) -> Result<BTreeMap<String, Vec<SensorSnapshot>>, CoreError> {
    let fetches = types.into_iter().map(|kind| async move {
        let wire = client.list_sensors(Some(&kind)).await?;
        let sensors = sensors_from_wire(wire)?;
        Ok::<_, CoreError>((kind, sensors))
    });
    let slices = futures_util::future::try_join_all(fetches).await?;
    Ok(slices.into_iter().collect())
}
