// ── Reactive snapshot streams ──
//
// Subscription handle for consuming published cache values.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A subscription to one published cache value.
///
/// Provides point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct Snapshots<T> {
    current: Arc<T>,
    receiver: watch::Receiver<Arc<T>>,
}

impl<T> Snapshots<T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn new(receiver: watch::Receiver<Arc<T>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation (or at the last `changed()`).
    pub fn current(&self) -> &Arc<T> {
        &self.current
    }

    /// The latest published snapshot.
    pub fn latest(&self) -> Arc<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publish. Returns `None` once the owning cache is
    /// gone.
    pub async fn changed(&mut self) -> Option<Arc<T>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream`. The first item is the current value.
    pub fn into_stream(self) -> SnapshotStream<T> {
        SnapshotStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct SnapshotStream<T> {
    inner: WatchStream<Arc<T>>,
}

impl<T> Stream for SnapshotStream<T>
where
    T: Send + Sync + 'static,
{
    type Item = Arc<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // WatchStream<Arc<T>> is Unpin.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;

    use crate::equality::Published;

    #[tokio::test]
    async fn changed_tracks_publishes() {
        let p = Published::new(1_u32);
        let mut snaps = p.snapshots();
        assert_eq!(**snaps.current(), 1);

        p.offer(2);
        assert_eq!(*snaps.changed().await.unwrap(), 2);
        assert_eq!(**snaps.current(), 2);
        assert_eq!(*snaps.latest(), 2);
    }

    #[tokio::test]
    async fn stream_yields_current_then_changes() {
        let p = Published::new(vec!["a"]);
        let mut stream = p.snapshots().into_stream();
        assert_eq!(*stream.next().await.unwrap(), vec!["a"]);

        p.offer(vec!["a", "b"]);
        assert_eq!(stream.next().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn changed_ends_when_cache_dropped() {
        let p = Published::new(0_u8);
        let mut snaps = p.snapshots();
        drop(p);
        assert!(snaps.changed().await.is_none());
    }
}
