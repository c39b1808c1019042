//! Incremental sync engine.
//!
//! A sync run has two phases: partitioned parallel discovery, which walks
//! the paginated search results and builds a backlog of per-document
//! actions, and persistence, where a pool of workers drains the backlog
//! with bounded retries. The backlog can be checkpointed between phases
//! so an interrupted run resumes without re-discovering.

mod action;
mod checkpoint;
mod engine;
mod progress;
mod summary;
mod types;

pub use action::{ExecuteOutcome, SyncActionState};
pub use checkpoint::{default_checkpoint_path, load_checkpoint, save_checkpoint};
pub use engine::{SyncEngine, SyncResult};
pub use progress::{ProgressCallback, SyncProgress, emit};
pub use summary::SyncSummary;
pub use types::{
    DEFAULT_PAGE_SIZE, MAX_SYNC_ATTEMPTS, PoisonRecord, QUEUE_POLL_INTERVAL, SyncOptions,
    SyncOutcome,
};
