// ── Poll cycle controller ──
//
// Fetch-and-apply cycles on top of `LatestWins`. A cycle runs once on
// demand or on a fixed schedule; a stale or post-teardown response is never
// applied.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::CoreError;
use crate::supervisor::LatestWins;

/// What happened to one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The result was current and handed to the apply step.
    Applied,
    /// A newer attempt started first; the result was discarded.
    Superseded,
    /// The attempt's token was cancelled while in flight.
    Cancelled,
    /// The fetch failed; the cache was left alone.
    Failed(String),
    /// The controller was stopped; nothing was applied.
    TornDown,
    /// Required inputs were missing, so no attempt was started.
    Skipped,
}

impl PollOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Runs latest-wins fetch/apply cycles for one cache.
pub struct PollController {
    name: &'static str,
    supervisor: LatestWins,
    schedule: Mutex<Option<JoinHandle<()>>>,
}

impl PollController {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            supervisor: LatestWins::new(),
            schedule: Mutex::new(None),
        }
    }

    /// Controller torn down automatically when `parent` is cancelled.
    pub fn with_parent(name: &'static str, parent: &CancellationToken) -> Self {
        Self {
            name,
            supervisor: LatestWins::with_parent(parent),
            schedule: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn generation(&self) -> u64 {
        self.supervisor.generation()
    }

    pub fn is_stopped(&self) -> bool {
        self.supervisor.is_torn_down()
    }

    /// Run one attempt.
    ///
    /// `fetch` receives the attempt's token and should pass it to anything
    /// cancellable. `apply` runs only if the attempt is still the newest
    /// when the fetch resolves, under the supervisor lock.
    pub async fn attempt<T, F, Fut, A>(&self, fetch: F, apply: A) -> PollOutcome
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
        A: FnOnce(T),
    {
        let Some(attempt) = self.supervisor.begin() else {
            return PollOutcome::TornDown;
        };
        let generation = attempt.generation();
        let token = attempt.token().clone();
        trace!(poll = self.name, generation, "attempt started");

        let result = tokio::select! {
            biased;
            () = token.cancelled() => None,
            res = fetch(token.clone()) => Some(res),
        };

        let value = match result {
            None | Some(Err(CoreError::Cancelled)) => {
                return if attempt.is_torn_down() {
                    PollOutcome::TornDown
                } else {
                    PollOutcome::Cancelled
                };
            }
            Some(Err(e)) => {
                if attempt.is_torn_down() {
                    return PollOutcome::TornDown;
                }
                warn!(poll = self.name, generation, error = %e, "poll attempt failed");
                return PollOutcome::Failed(e.to_string());
            }
            Some(Ok(value)) => value,
        };

        match attempt.apply_if_current(|| apply(value)) {
            Some(()) => {
                trace!(poll = self.name, generation, "attempt applied");
                PollOutcome::Applied
            }
            None if attempt.is_torn_down() => PollOutcome::TornDown,
            None if attempt.is_cancelled() => PollOutcome::Cancelled,
            None => {
                trace!(poll = self.name, generation, "attempt superseded");
                PollOutcome::Superseded
            }
        }
    }

    /// Fire `tick` every `period`, each tick in its own task so a slow
    /// tick never delays the next one. The first tick fires one period from
    /// now. Replaces any previous schedule.
    pub fn every<F, Fut>(&self, period: Duration, tick: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period.is_zero() {
            debug!(poll = self.name, "zero period, schedule disabled");
            return;
        }
        let cancel = self.supervisor.token().clone();
        let name = self.name;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        trace!(poll = name, "schedule tick");
                        tokio::spawn(tick());
                    }
                }
            }
            debug!(poll = name, "schedule stopped");
        });

        let previous = self
            .schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop the schedule and tear down: in-flight attempts are cancelled and
    /// late results are dropped.
    pub fn stop(&self) {
        self.supervisor.teardown();
        if let Some(handle) = self
            .schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl Drop for PollController {
    fn drop(&mut self) {
        self.stop();
    }
}
