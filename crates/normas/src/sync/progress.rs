use std::path::PathBuf;
use std::sync::Arc;

use crate::repository::ContentAction;

/// Progress events emitted during a sync run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Discovery is starting for a search.
    DiscoveryStarted {
        label: String,
        /// Total matches reported by the source, once known.
        total: Option<u64>,
    },
    /// A discovery worker finished one page.
    DiscoveredPage {
        worker: usize,
        skip: u64,
        /// Hits on the page before filtering.
        matched: usize,
        /// Backlog size after this page.
        enqueued: usize,
        total: Option<u64>,
    },
    /// Discovery finished; the backlog is complete.
    DiscoveryComplete { total: usize },
    /// The backlog was written to a checkpoint file.
    CheckpointSaved { path: PathBuf, count: usize },
    /// A previous backlog was loaded instead of discovering.
    CheckpointLoaded { path: PathBuf, count: usize },
    /// Persistence workers are starting.
    SyncingDocuments { total: usize, concurrency: usize },
    /// One document finished (written or skipped).
    DocumentSynced {
        id: String,
        action: ContentAction,
        processed: usize,
        total: usize,
    },
    /// A document failed and was re-queued.
    DocumentRetried {
        id: String,
        attempts: u32,
        error: String,
    },
    /// A document exhausted its attempt budget.
    DocumentPoisoned {
        id: String,
        attempts: u32,
        error: String,
    },
    /// The run finished.
    SyncComplete {
        created: usize,
        updated: usize,
        skipped: usize,
        failed: usize,
    },
    /// A non-fatal problem worth surfacing.
    Warning { message: String },
}

/// Callback invoked with progress events during sync.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Invoke the callback with an event, if one is registered.
#[inline]
pub fn emit(callback: Option<&Arc<ProgressCallback>>, event: SyncProgress) {
    if let Some(callback) = callback {
        callback(event);
    }
}
