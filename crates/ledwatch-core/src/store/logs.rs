use std::sync::Arc;

use ledwatch_api::LogEntry;
use tokio::sync::watch;

use crate::stream::SnapshotStream;

const CHUNK_LEN: usize = 256;

/// Append-only log snapshot.
///
/// Full chunks are sealed behind an `Arc` and shared between snapshots, so
/// appending to a snapshot someone still holds copies at most one open
/// chunk plus the chunk pointers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogHistory {
    sealed: Vec<Arc<[LogEntry]>>,
    open: Vec<LogEntry>,
    len: usize,
}

impl LogHistory {
    pub fn from_entries(entries: Vec<LogEntry>) -> Self {
        let mut history = Self::default();
        for entry in entries {
            history.push(entry);
        }
        history
    }

    fn push(&mut self, entry: LogEntry) {
        self.open.push(entry);
        self.len += 1;
        if self.open.len() == CHUNK_LEN {
            self.sealed.push(Arc::from(std::mem::take(&mut self.open)));
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Arrival order.
    pub fn oldest_first(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        self.sealed
            .iter()
            .flat_map(|chunk| &chunk[..])
            .chain(self.open.iter())
    }

    /// Display order.
    pub fn newest_first(&self) -> impl Iterator<Item = &LogEntry> {
        self.oldest_first().rev()
    }
}

/// Session activity log.
///
/// Stored oldest-first in arrival order. Presentation reverses it; see
/// [`newest_first`](Self::newest_first).
pub struct LogStore {
    entries: watch::Sender<Arc<LogHistory>>,
}

impl LogStore {
    pub fn new() -> Self {
        let (entries, _) = watch::channel(Arc::new(LogHistory::default()));
        Self { entries }
    }

    /// Hydrate from a full history push.
    pub fn replace(&self, entries: Vec<LogEntry>) {
        self.entries
            .send_replace(Arc::new(LogHistory::from_entries(entries)));
    }

    pub fn append(&self, entry: LogEntry) {
        self.entries
            .send_modify(|snap| Arc::make_mut(snap).push(entry));
    }

    pub fn clear(&self) {
        self.entries.send_replace(Arc::new(LogHistory::default()));
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Oldest-first snapshot.
    pub fn entries(&self) -> Arc<LogHistory> {
        self.entries.borrow().clone()
    }

    /// Up to `limit` entries, most recent first.
    pub fn newest_first(&self, limit: usize) -> Vec<LogEntry> {
        self.entries.borrow().newest_first().take(limit).cloned().collect()
    }

    pub fn subscribe(&self) -> SnapshotStream<LogHistory> {
        SnapshotStream::new(self.entries.subscribe())
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}
