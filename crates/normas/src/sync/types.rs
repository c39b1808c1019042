use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::repository::{ContentAction, Location};
use crate::source::{ContentType, Document, Search};

/// Page size used for discovery searches.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Attempts a document gets before it is poisoned. Transient failures do
/// not count against this budget.
pub const MAX_SYNC_ATTEMPTS: u32 = 5;

/// How long a persistence worker sleeps when the backlog is momentarily
/// empty but other workers still hold items in flight.
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Options controlling a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Search that scopes discovery.
    pub query: Search,
    /// Content type to mirror; other hits are dropped during discovery.
    pub content_type: ContentType,
    /// Hits requested per search page.
    pub page_size: u64,
    /// Worker count for both phases. Zero means one per available core.
    pub concurrency: usize,
    /// Skip this many backlog items from the front.
    pub skip: Option<u64>,
    /// Process at most this many backlog items.
    pub top: Option<usize>,
    /// Rewrite documents even when the stored timestamp is current.
    pub force: bool,
    /// Start from the saved checkpoint instead of discovering.
    pub resume: bool,
    /// Where to save the backlog after discovery. `None` disables
    /// checkpointing for this run.
    pub checkpoint: Option<PathBuf>,
    /// Directory for poison records. `None` keeps them in memory only.
    pub error_dir: Option<PathBuf>,
    /// Attempt budget before a document is poisoned.
    pub max_attempts: u32,
    /// Base delay doubled per attempt when re-executing a failed item.
    pub backoff_base: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            query: Search::default(),
            content_type: ContentType::Legislacion,
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: 0,
            skip: None,
            top: None,
            force: false,
            resume: false,
            checkpoint: None,
            error_dir: None,
            max_attempts: MAX_SYNC_ATTEMPTS,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl SyncOptions {
    /// Resolve the configured concurrency to a concrete worker count.
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency > 0 {
            self.concurrency
        } else {
            thread::available_parallelism().map_or(1, usize::from)
        }
    }
}

/// A document that exhausted its attempt budget.
#[derive(Debug, Clone, Serialize)]
pub struct PoisonRecord {
    /// Document identifier.
    pub id: String,
    /// Attempts consumed before giving up.
    pub attempts: u32,
    /// Message of the last counted failure.
    pub last_error: Option<String>,
    /// When the document was poisoned.
    pub at: DateTime<Utc>,
}

/// The result of syncing one document.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub action: ContentAction,
    pub id: String,
    pub alias: String,
    pub name: String,
    pub title: String,
    pub web_url: String,
    pub location: Location,
}

impl SyncOutcome {
    pub fn new(action: ContentAction, document: &Document, location: Location) -> Self {
        Self {
            action,
            id: document.id.clone(),
            alias: document.alias.clone(),
            name: if document.name.is_empty() {
                document.alias.clone()
            } else {
                document.name.clone()
            },
            title: document.title.clone(),
            web_url: document.web_url(),
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_concurrency_explicit() {
        let options = SyncOptions {
            concurrency: 3,
            ..SyncOptions::default()
        };
        assert_eq!(options.effective_concurrency(), 3);
    }

    #[test]
    fn test_effective_concurrency_auto_is_nonzero() {
        assert!(SyncOptions::default().effective_concurrency() >= 1);
    }
}
