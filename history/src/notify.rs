//! Reload notifications between stores that share one database.
//!
//! A [`ReloadNotifier`] is created once by whatever hosts several
//! [`crate::store::GameRecordStore`]s and cloned into each of them. Every
//! structural mutation publishes a [`HistoryEvent`]; siblings drain their
//! receiver and reload from storage.

use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 100;

/// What changed in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryChange {
    Recorded { id: u32 },
    Updated { id: u32 },
    Undone { removed_id: u32 },
    Reset,
    Imported { record_count: usize },
    Restored { record_count: usize },
}

/// A mutation published by the store identified by `origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEvent {
    pub origin: Uuid,
    pub change: HistoryChange,
}

#[derive(Debug, Clone)]
pub struct ReloadNotifier {
    tx: broadcast::Sender<HistoryEvent>,
}

impl Default for ReloadNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, origin: Uuid, change: HistoryChange) {
        let event = HistoryEvent { origin, change };
        match self.tx.send(event) {
            Ok(receivers) => tracing::trace!(receivers, "Published history event"),
            Err(_) => tracing::trace!("History event dropped, no subscribers"),
        }
    }
}
