use std::collections::{HashSet, VecDeque};
use std::fs;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::time::sleep;

use crate::repository::FileDocumentRepository;
use crate::source::SourceClient;

use super::action::{ExecuteOutcome, SyncActionState};
use super::checkpoint::{default_checkpoint_path, load_checkpoint, save_checkpoint};
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::summary::SyncSummary;
use super::types::{PoisonRecord, QUEUE_POLL_INTERVAL, SyncOptions};

/// What a sync run produced.
pub struct SyncResult {
    /// Tally and changelog for the run.
    pub summary: Arc<SyncSummary>,
    /// Documents that exhausted their attempt budget.
    pub poisoned: Vec<PoisonRecord>,
    /// Backlog size the run started from.
    pub total: usize,
}

/// Orchestrates discovery and persistence for one search.
pub struct SyncEngine<C: SourceClient + 'static> {
    client: Arc<C>,
    repository: Arc<FileDocumentRepository>,
    options: SyncOptions,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Reserve one backlog slot. The reservation is atomic, so concurrent
/// discovery workers can never push past the cap.
fn reserve_slot(enqueued: &AtomicUsize, top: Option<usize>) -> bool {
    match top {
        Some(top) => enqueued
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                (count < top).then_some(count + 1)
            })
            .is_ok(),
        None => {
            enqueued.fetch_add(1, Ordering::Relaxed);
            true
        }
    }
}

impl<C: SourceClient + 'static> SyncEngine<C> {
    pub fn new(
        client: Arc<C>,
        repository: Arc<FileDocumentRepository>,
        options: SyncOptions,
    ) -> Self {
        Self {
            client,
            repository,
            options,
        }
    }

    /// Run the sync to completion (or cancellation).
    ///
    /// The run itself is infallible: per-document failures end up in the
    /// poison list and infrastructure problems (checkpoint writes, poison
    /// records) degrade to warnings.
    pub async fn run(
        &self,
        cancel: Arc<AtomicBool>,
        on_progress: Option<Arc<ProgressCallback>>,
    ) -> SyncResult {
        let backlog = match self.load_resumed_backlog(on_progress.as_ref()) {
            Some(backlog) => backlog,
            None => self.discover(&cancel, on_progress.as_ref()).await,
        };

        self.persist(backlog, &cancel, on_progress).await
    }

    /// Try to resume from a checkpoint, applying the skip/top window to
    /// the loaded backlog.
    fn load_resumed_backlog(
        &self,
        on_progress: Option<&Arc<ProgressCallback>>,
    ) -> Option<VecDeque<SyncActionState>> {
        if !self.options.resume {
            return None;
        }

        let path = self
            .options
            .checkpoint
            .clone()
            .unwrap_or_else(default_checkpoint_path);
        let mut backlog = match load_checkpoint(&path) {
            Some(backlog) => backlog,
            None => {
                emit(
                    on_progress,
                    SyncProgress::Warning {
                        message: format!(
                            "No usable checkpoint at {}; discovering from scratch",
                            path.display()
                        ),
                    },
                );
                return None;
            }
        };

        if let Some(skip) = self.options.skip {
            backlog.drain(..(skip as usize).min(backlog.len()));
        }
        if let Some(top) = self.options.top {
            backlog.truncate(top);
        }

        emit(
            on_progress,
            SyncProgress::CheckpointLoaded {
                path,
                count: backlog.len(),
            },
        );
        Some(backlog)
    }

    /// Walk the paginated search results with partitioned workers and
    /// build the backlog.
    ///
    /// Worker `i` starts at page offset `skip + i * page_size` and strides
    /// by `page_size * workers`, so the partitions cover every page with
    /// no overlap. A worker stops when the source returns an empty page
    /// for its partition.
    async fn discover(
        &self,
        cancel: &Arc<AtomicBool>,
        on_progress: Option<&Arc<ProgressCallback>>,
    ) -> VecDeque<SyncActionState> {
        let workers = self.options.effective_concurrency();
        let page_size = self.options.page_size.max(1);
        let base_skip = self.options.skip.unwrap_or(0);

        emit(
            on_progress,
            SyncProgress::DiscoveryStarted {
                label: self.options.query.label(),
                total: None,
            },
        );

        let queue = Arc::new(Mutex::new(VecDeque::new()));
        // Collapsed search results can repeat a document across pages.
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let enqueued = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let client = Arc::clone(&self.client);
            let repository = Arc::clone(&self.repository);
            let queue = Arc::clone(&queue);
            let seen = Arc::clone(&seen);
            let enqueued = Arc::clone(&enqueued);
            let cancel = Arc::clone(cancel);
            let on_progress = on_progress.cloned();
            let query = self.options.query.clone();
            let content_type = self.options.content_type;
            let force = self.options.force;
            let top = self.options.top;

            handles.push(tokio::spawn(async move {
                let step = page_size * workers as u64;
                let mut skip = base_skip + worker as u64 * page_size;

                loop {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    if let Some(top) = top {
                        if enqueued.load(Ordering::Relaxed) >= top {
                            break;
                        }
                    }

                    let page = match client.search(&query, skip, page_size).await {
                        Ok(page) => page,
                        Err(e) => {
                            tracing::warn!(worker, skip, error = %e, "Discovery page failed");
                            emit(
                                on_progress.as_ref(),
                                SyncProgress::Warning {
                                    message: format!("Search at offset {} failed: {}", skip, e),
                                },
                            );
                            break;
                        }
                    };

                    // An empty page means this partition is exhausted.
                    if page.raw_count == 0 {
                        break;
                    }

                    for item in page.items {
                        if item.content_type != Some(content_type) {
                            continue;
                        }
                        if !lock(&seen).insert(item.id.clone()) {
                            continue;
                        }
                        if !reserve_slot(&enqueued, top) {
                            break;
                        }
                        let target = repository.get_timestamp(&item.id);
                        lock(&queue).push_back(SyncActionState::new(item, target, force));
                    }

                    emit(
                        on_progress.as_ref(),
                        SyncProgress::DiscoveredPage {
                            worker,
                            skip,
                            matched: page.raw_count,
                            enqueued: enqueued.load(Ordering::Relaxed),
                            total: page.total,
                        },
                    );

                    skip += step;
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Discovery worker panicked");
            }
        }

        let backlog = std::mem::take(&mut *lock(&queue));
        emit(
            on_progress,
            SyncProgress::DiscoveryComplete {
                total: backlog.len(),
            },
        );

        if let Some(path) = &self.options.checkpoint {
            match save_checkpoint(path, &backlog) {
                Ok(()) => emit(
                    on_progress,
                    SyncProgress::CheckpointSaved {
                        path: path.clone(),
                        count: backlog.len(),
                    },
                ),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Checkpoint save failed");
                    emit(
                        on_progress,
                        SyncProgress::Warning {
                            message: format!("Could not save checkpoint: {}", e),
                        },
                    );
                }
            }
        }

        backlog
    }

    /// Drain the backlog with a pool of workers.
    ///
    /// Failed items go back to the end of the queue; a worker only stops
    /// once every item has been processed (written, skipped or poisoned),
    /// so the queue being momentarily empty is not a stop condition.
    async fn persist(
        &self,
        backlog: VecDeque<SyncActionState>,
        cancel: &Arc<AtomicBool>,
        on_progress: Option<Arc<ProgressCallback>>,
    ) -> SyncResult {
        let total = backlog.len();
        let workers = self.options.effective_concurrency().min(total.max(1));
        let summary = Arc::new(SyncSummary::start(self.options.query.label()));

        emit(
            on_progress.as_ref(),
            SyncProgress::SyncingDocuments {
                total,
                concurrency: workers,
            },
        );

        let queue = Arc::new(Mutex::new(backlog));
        let processed = Arc::new(AtomicUsize::new(0));
        let poisoned = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let client = Arc::clone(&self.client);
            let repository = Arc::clone(&self.repository);
            let queue = Arc::clone(&queue);
            let processed = Arc::clone(&processed);
            let poisoned = Arc::clone(&poisoned);
            let summary = Arc::clone(&summary);
            let cancel = Arc::clone(cancel);
            let on_progress = on_progress.clone();
            let max_attempts = self.options.max_attempts;
            let backoff_base = self.options.backoff_base;

            handles.push(tokio::spawn(async move {
                loop {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    if processed.load(Ordering::Relaxed) >= total {
                        break;
                    }

                    let Some(mut item) = lock(&queue).pop_front() else {
                        // Other workers still hold items in flight.
                        sleep(QUEUE_POLL_INTERVAL).await;
                        continue;
                    };

                    if item.attempts >= 2 {
                        let delay = backoff_base
                            .saturating_mul(2u32.saturating_pow(item.attempts.min(16)));
                        sleep(delay).await;
                    }

                    match item.execute(client.as_ref(), repository.as_ref()).await {
                        ExecuteOutcome::Done(outcome) => {
                            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                            emit(
                                on_progress.as_ref(),
                                SyncProgress::DocumentSynced {
                                    id: outcome.id.clone(),
                                    action: outcome.action,
                                    processed: done,
                                    total,
                                },
                            );
                            summary.add(outcome);
                        }
                        ExecuteOutcome::Retry { .. } => {
                            let error = item.last_error.clone().unwrap_or_default();
                            if item.attempts >= max_attempts {
                                processed.fetch_add(1, Ordering::Relaxed);
                                summary.add_failure();
                                emit(
                                    on_progress.as_ref(),
                                    SyncProgress::DocumentPoisoned {
                                        id: item.summary.id.clone(),
                                        attempts: item.attempts,
                                        error,
                                    },
                                );
                                lock(&poisoned).push(PoisonRecord {
                                    id: item.summary.id.clone(),
                                    attempts: item.attempts,
                                    last_error: item.last_error.clone(),
                                    at: Utc::now(),
                                });
                            } else {
                                emit(
                                    on_progress.as_ref(),
                                    SyncProgress::DocumentRetried {
                                        id: item.summary.id.clone(),
                                        attempts: item.attempts,
                                        error,
                                    },
                                );
                                lock(&queue).push_back(item);
                            }
                        }
                    }
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Persistence worker panicked");
            }
        }

        summary.stop();
        let poisoned = std::mem::take(&mut *lock(&poisoned));

        if let Some(dir) = &self.options.error_dir {
            if !poisoned.is_empty() {
                if let Err(e) = write_poison_records(dir, &poisoned) {
                    tracing::warn!(dir = %dir.display(), error = %e, "Could not write poison records");
                    emit(
                        on_progress.as_ref(),
                        SyncProgress::Warning {
                            message: format!("Could not write poison records: {}", e),
                        },
                    );
                }
            }
        }

        emit(
            on_progress.as_ref(),
            SyncProgress::SyncComplete {
                created: summary.created(),
                updated: summary.updated(),
                skipped: summary.skipped(),
                failed: summary.failed(),
            },
        );

        SyncResult {
            summary,
            poisoned,
            total,
        }
    }
}

/// Write one YAML file per poisoned document.
fn write_poison_records(dir: &std::path::Path, records: &[PoisonRecord]) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    for record in records {
        let yaml = serde_yaml::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(dir.join(format!("{}.yml", record.id)), yaml)?;
    }
    Ok(())
}
