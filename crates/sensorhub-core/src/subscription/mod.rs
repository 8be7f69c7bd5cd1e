// ── Subscriptions ──
//
// A subscription owns one cache plus whatever keeps it fresh: push
// bridges and a poll controller. `start()` wires them up, `stop()` tears
// them down, and dropping the subscription stops it.

mod current;
mod notifications;
mod roster;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sensorhub_api::{HubClient, PushConnection};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use current::CurrentReadingsSubscription;
pub use notifications::NotificationSubscription;
pub use roster::RosterSubscription;

pub(crate) use notifications::fetch_state;
pub(crate) use roster::fetch_all;

use crate::config::SyncConfig;
use crate::poll::PollController;
use crate::push::{PushRegistry, Topic};

/// Start/stop lifecycle shared by every live feed.
pub trait Subscription {
    /// Begin syncing. Calling `start` on a running subscription restarts it.
    fn start(&self);
    /// Stop syncing. In-flight results are dropped; the cache keeps its
    /// last value.
    fn stop(&self);
    fn is_running(&self) -> bool;
}

/// Everything a subscription needs from the dashboard.
#[derive(Clone)]
pub(crate) struct SyncContext {
    pub client: Arc<HubClient>,
    pub registry: Arc<PushRegistry>,
    pub config: Arc<SyncConfig>,
    pub cancel: CancellationToken,
}

// ── Running state ────────────────────────────────────────────────────

/// Resources of one started period. Dropping it cancels them all.
pub(crate) struct Running {
    cancel: CancellationToken,
    poll: Arc<PollController>,
    tasks: Vec<JoinHandle<()>>,
}

impl Running {
    pub(crate) fn new(name: &'static str, parent: &CancellationToken) -> Self {
        let cancel = parent.child_token();
        let poll = Arc::new(PollController::with_parent(name, &cancel));
        Self {
            cancel,
            poll,
            tasks: Vec::new(),
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn poll(&self) -> &Arc<PollController> {
        &self.poll
    }

    pub(crate) fn track(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.poll.stop();
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Running state behind every subscription, plus the controller used for
/// manual refreshes while the subscription is not started.
#[derive(Default)]
pub(crate) struct Lifecycle {
    slot: Mutex<Slot>,
}

#[derive(Default)]
struct Slot {
    running: Option<Running>,
    idle: Option<Arc<PollController>>,
}

impl Lifecycle {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `running`, dropping (and so stopping) any previous one.
    pub(crate) fn replace(&self, running: Running) {
        let (previous, idle) = {
            let mut slot = self.lock();
            (slot.running.replace(running), slot.idle.take())
        };
        if let Some(idle) = idle {
            idle.stop();
        }
        drop(previous);
    }

    /// Stop everything. Returns whether the subscription was running.
    pub(crate) fn clear(&self) -> bool {
        let (previous, idle) = {
            let mut slot = self.lock();
            (slot.running.take(), slot.idle.take())
        };
        if let Some(idle) = idle {
            idle.stop();
        }
        previous.is_some()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.lock()
            .running
            .as_ref()
            .is_some_and(|r| !r.cancel.is_cancelled())
    }

    /// Controller for the next attempt: the running one, or a shared idle
    /// one so that manual refreshes still supersede each other.
    pub(crate) fn controller(
        &self,
        name: &'static str,
        parent: &CancellationToken,
    ) -> Arc<PollController> {
        let mut slot = self.lock();
        if let Some(running) = slot.running.as_ref() {
            return Arc::clone(&running.poll);
        }
        match slot.idle.as_ref() {
            Some(idle) if !idle.is_stopped() => Arc::clone(idle),
            _ => {
                let idle = Arc::new(PollController::with_parent(name, parent));
                slot.idle = Some(Arc::clone(&idle));
                idle
            }
        }
    }

    /// Poll controller of the current running period, if started.
    pub(crate) fn poll(&self) -> Option<Arc<PollController>> {
        self.lock().running.as_ref().map(|r| Arc::clone(&r.poll))
    }
}

// ── Push bridge ──────────────────────────────────────────────────────

/// Forward payloads from `conn` into `apply` until `cancel` fires or the
/// connection ends. The task owns the connection, so it closes when the
/// task stops. Nothing is applied once `cancel` has fired or the
/// connection has been closed, even if the payload was already buffered.
pub(crate) fn bridge<T, F>(
    conn: PushConnection<T>,
    topic: Topic,
    cancel: CancellationToken,
    mut apply: F,
) -> JoinHandle<()>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    F: FnMut(T) + Send + 'static,
{
    let mut rx = conn.subscribe();
    tokio::spawn(async move {
        let conn = conn;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(payload) => {
                        if cancel.is_cancelled() || conn.is_closed() {
                            break;
                        }
                        apply(Arc::unwrap_or_clone(payload));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(topic = %topic, skipped, "push consumer lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
        conn.close();
        debug!(topic = %topic, "push bridge stopped");
    })
}
