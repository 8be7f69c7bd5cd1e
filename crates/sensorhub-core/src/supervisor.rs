// ── Latest-wins supervisor ──
//
// A generation counter plus cancellation tokens. Every attempt captures
// the generation it started at; its result may only be applied while that
// generation is still the newest and the supervisor has not been torn down.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct State {
    generation: u64,
    done: bool,
}

struct Shared {
    state: Mutex<State>,
    cancel: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cancellable latest-wins primitive.
///
/// Cheaply cloneable; clones share the counter and the teardown flag.
#[derive(Clone)]
pub struct LatestWins {
    shared: Arc<Shared>,
}

/// Bookkeeping for one in-flight attempt.
pub struct Attempt {
    generation: u64,
    token: CancellationToken,
    shared: Arc<Shared>,
}

impl LatestWins {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Supervisor whose attempts are also cancelled when `parent` is.
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self::with_token(parent.child_token())
    }

    fn with_token(cancel: CancellationToken) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                cancel,
            }),
        }
    }

    /// Start an attempt: bump the generation and hand out a fresh token.
    /// Returns `None` once torn down.
    pub fn begin(&self) -> Option<Attempt> {
        let mut state = self.shared.lock();
        if state.done || self.shared.cancel.is_cancelled() {
            return None;
        }
        state.generation += 1;
        Some(Attempt {
            generation: state.generation,
            token: self.shared.cancel.child_token(),
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    /// Irrecoverable: later results are dropped even if their generation
    /// still matches, and every outstanding token is cancelled.
    pub fn teardown(&self) {
        self.shared.lock().done = true;
        self.shared.cancel.cancel();
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.lock().done || self.shared.cancel.is_cancelled()
    }

    /// Token cancelled on teardown; schedules select on it.
    pub fn token(&self) -> &CancellationToken {
        &self.shared.cancel
    }
}

impl Default for LatestWins {
    fn default() -> Self {
        Self::new()
    }
}

impl Attempt {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A newer attempt has started, or the supervisor is gone.
    pub fn is_stale(&self) -> bool {
        let state = self.shared.lock();
        state.done || state.generation != self.generation
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.lock().done || self.shared.cancel.is_cancelled()
    }

    /// Run `apply` only if this attempt is still current. The check and the
    /// apply happen under one lock, so no newer attempt can begin between
    /// them.
    pub fn apply_if_current<R>(&self, apply: impl FnOnce() -> R) -> Option<R> {
        let state = self.shared.lock();
        if state.done || state.generation != self.generation || self.token.is_cancelled() {
            return None;
        }
        Some(apply())
    }
}
