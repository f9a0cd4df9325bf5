// ── Reactive snapshot streams ──
//
// Subscription type for consuming store changes.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A subscription to one store snapshot.
///
/// Provides point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct SnapshotStream<T: Send + Sync + 'static> {
    current: Arc<T>,
    receiver: watch::Receiver<Arc<T>>,
}

impl<T: Send + Sync + 'static> SnapshotStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Arc<T>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot seen at creation or at the last `changed()`.
    pub fn current(&self) -> &Arc<T> {
        &self.current
    }

    /// The latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Arc<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the owning store has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<T>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` yielding the current snapshot and every
    /// later one.
    pub fn into_stream(self) -> SnapshotWatchStream<T> {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct SnapshotWatchStream<T: Send + Sync + 'static> {
    inner: WatchStream<Arc<T>>,
}

impl<T: Send + Sync + 'static> Stream for SnapshotWatchStream<T> {
    type Item = Arc<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Arc<T> is always Unpin, so WatchStream is too.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
