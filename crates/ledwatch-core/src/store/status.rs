use std::sync::Arc;

use ledwatch_api::DashboardStatus;
use tokio::sync::watch;

use crate::stream::SnapshotStream;

/// Relay-reported dashboard counters, replaced on every push.
pub struct StatusStore {
    status: watch::Sender<Arc<DashboardStatus>>,
}

impl StatusStore {
    pub fn new() -> Self {
        let (status, _) = watch::channel(Arc::new(DashboardStatus::default()));
        Self { status }
    }

    pub fn replace(&self, status: DashboardStatus) {
        self.status.send_replace(Arc::new(status));
    }

    pub fn current(&self) -> Arc<DashboardStatus> {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotStream<DashboardStatus> {
        SnapshotStream::new(self.status.subscribe())
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}
