// ── Current readings subscription ──
//
// Push only: the server sends the latest reading per sensor whenever it
// has something new. There is no polling endpoint for this view.

use std::sync::Arc;

use sensorhub_api::types::TemperatureReadingJson;
use tracing::{debug, warn};

use super::{Lifecycle, Running, Subscription, SyncContext, bridge};
use crate::convert::readings_from_wire;
use crate::push::{MountId, Topic};
use crate::store::{CurrentReadingCache, CurrentReadings};
use crate::stream::Snapshots;

pub struct CurrentReadingsSubscription {
    ctx: SyncContext,
    cache: Arc<CurrentReadingCache>,
    mount: MountId,
    lifecycle: Lifecycle,
}

impl CurrentReadingsSubscription {
    pub(crate) fn new(ctx: SyncContext) -> Self {
        Self {
            ctx,
            cache: Arc::new(CurrentReadingCache::new()),
            mount: MountId::new(),
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn cache(&self) -> &CurrentReadingCache {
        &self.cache
    }

    pub fn snapshot(&self) -> Arc<CurrentReadings> {
        self.cache.snapshot()
    }

    pub fn snapshots(&self) -> Snapshots<CurrentReadings> {
        self.cache.snapshots()
    }
}

impl Subscription for CurrentReadingsSubscription {
    fn start(&self) {
        self.lifecycle.clear();
        let mut running = Running::new("current-readings", &self.ctx.cancel);
        if !self.ctx.config.push_enabled {
            debug!("push disabled, current readings stay empty");
            self.lifecycle.replace(running);
            return;
        }

        let topic = Topic::CurrentReadings;
        match self.ctx.registry.open::<Vec<TemperatureReadingJson>>(
            &self.ctx.client,
            topic.clone(),
            self.mount,
            self.ctx.config.reconnect.clone(),
        ) {
            Ok(conn) => {
                let cache = Arc::clone(&self.cache);
                let task = bridge(conn, topic, running.token().clone(), move |wire| {
                    match readings_from_wire(wire) {
                        Ok(batch) => {
                            let changed = cache.apply(batch);
                            debug!(changed, "current readings applied");
                        }
                        Err(e) => warn!(error = %e, "current readings dropped"),
                    }
                });
                running.track(task);
            }
            Err(e) => warn!(topic = %topic, error = %e, "cannot open current readings channel"),
        }
        self.lifecycle.replace(running);
    }

    fn stop(&self) {
        self.lifecycle.clear();
        self.ctx.registry.close_mount(self.mount);
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

impl Drop for CurrentReadingsSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
