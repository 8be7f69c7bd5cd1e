// ── Equality gate ──
//
// Structural comparison plus a gated publisher. A cache publishes a new
// `Arc` only when content actually changed, so subscribers can treat a
// pointer change as "something is different".

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::stream::Snapshots;

/// Same length and pairwise equal. Order matters: callers sort into
/// canonical form first.
pub fn equal<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

/// Record of a publish that went through, used to undo it later.
#[derive(Debug)]
pub struct Applied<T> {
    pub previous: Arc<T>,
    /// Version right after this publish.
    pub version: u64,
}

/// A `watch`-backed value that only publishes on content change.
///
/// Every accepted publish bumps a version counter; offers equal to the
/// current value keep the existing `Arc` and the version untouched.
pub struct Published<T> {
    tx: watch::Sender<Arc<T>>,
    version: AtomicU64,
}

impl<T> Published<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self {
            tx,
            version: AtomicU64::new(0),
        }
    }

    /// Publish `value` unless it equals the current one. Returns whether
    /// subscribers were notified.
    pub fn offer(&self, value: T) -> bool {
        self.update(|_| Some(value)).is_some()
    }

    /// Read-modify-write under the channel lock. `f` returns `None` to
    /// leave the value alone; an equal result is also a no-op.
    pub fn update<F>(&self, f: F) -> Option<Applied<T>>
    where
        F: FnOnce(&T) -> Option<T>,
    {
        let mut applied = None;
        self.tx.send_if_modified(|current| {
            let Some(next) = f(current) else {
                return false;
            };
            if **current == next {
                return false;
            }
            let previous = std::mem::replace(current, Arc::new(next));
            let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
            applied = Some(Applied { previous, version });
            true
        });
        applied
    }

    /// Put `previous` back, but only if nothing was published after the
    /// publish that produced `version`.
    pub fn restore_if_unchanged(&self, version: u64, previous: Arc<T>) -> bool {
        self.tx.send_if_modified(|current| {
            if self.version.load(Ordering::Acquire) != version {
                return false;
            }
            *current = previous;
            self.version.fetch_add(1, Ordering::AcqRel);
            true
        })
    }

    /// Current value (cheap `Arc` clone).
    pub fn current(&self) -> Arc<T> {
        self.tx.borrow().clone()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<T>> {
        self.tx.subscribe()
    }

    pub fn snapshots(&self) -> Snapshots<T> {
        Snapshots::new(self.tx.subscribe())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn equal_respects_order_and_length() {
        assert!(equal(&[1, 2, 3], &[1, 2, 3]));
        assert!(!equal(&[1, 2, 3], &[3, 2, 1]));
        assert!(!equal(&[1, 2], &[1, 2, 3]));
        assert!(equal::<i32>(&[], &[]));
    }

    #[test]
    fn equal_is_option_aware() {
        assert!(equal(&[Some(1.5), None], &[Some(1.5), None]));
        assert!(!equal(&[Some(0.0)], &[None]));
    }

    #[test]
    fn identical_offer_keeps_reference() {
        let p = Published::new(vec![1, 2]);
        let before = p.current();
        assert!(!p.offer(vec![1, 2]));
        assert!(Arc::ptr_eq(&before, &p.current()));
        assert_eq!(p.version(), 0);

        assert!(p.offer(vec![1, 3]));
        assert!(!Arc::ptr_eq(&before, &p.current()));
        assert_eq!(p.version(), 1);
    }

    #[test]
    fn update_returning_none_is_noop() {
        let p = Published::new(5_u32);
        assert!(p.update(|_| None).is_none());
        assert_eq!(*p.current(), 5);
    }

    #[test]
    fn restore_only_when_nothing_landed() {
        let p = Published::new(1_u32);
        let applied = p.update(|v| Some(v + 1)).unwrap();
        assert!(p.restore_if_unchanged(applied.version, applied.previous));
        assert_eq!(*p.current(), 1);

        let applied = p.update(|v| Some(v + 10)).unwrap();
        assert!(p.offer(99));
        assert!(!p.restore_if_unchanged(applied.version, applied.previous));
        assert_eq!(*p.current(), 99);
    }

    #[tokio::test]
    async fn subscribers_see_only_real_changes() {
        let p = Published::new(String::from("a"));
        let rx = p.subscribe();

        p.offer("a".into());
        assert!(!rx.has_changed().unwrap());

        p.offer("b".into());
        assert!(rx.has_changed().unwrap());
    }
}
