//! Progress reporting for sync operations.
//!
//! This module provides two modes of progress reporting:
//! - Interactive mode (TTY): Animated progress bars using indicatif
//! - Logging mode (non-TTY): Structured logging using tracing
//!
//! Progress bars are organized as:
//! - Discovery bar: spinner while the search pages are walked
//! - Sync bar: one bar for the persistence phase

use std::sync::{Arc, Mutex};

use console::Term;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use normas::repository::ContentAction;
use normas::sync::{ProgressCallback, SyncProgress};

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Interactive progress bars for TTY.
    Interactive(InteractiveReporter),
    /// Structured logging for non-TTY (CI, pipes).
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: SyncProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> Arc<ProgressCallback> {
        let reporter = Arc::clone(self);
        Arc::new(Box::new(move |event| {
            reporter.handle(event);
        }))
    }

    /// Finish all progress bars (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress state under a single lock, so discovery and persistence
/// workers never race on bar creation.
#[derive(Default)]
struct ProgressState {
    discover_bar: Option<ProgressBar>,
    sync_bar: Option<ProgressBar>,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: SyncProgress) {
        let mut state = self.state.lock().unwrap();

        match event {
            SyncProgress::DiscoveryStarted { label, .. } => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::spinner_style());
                pb.set_prefix(format!("{:12}", "Buscando"));
                pb.set_message(format!("{}...", label));
                pb.enable_steady_tick(std::time::Duration::from_millis(100));
                state.discover_bar = Some(pb);
            }

            SyncProgress::DiscoveredPage {
                enqueued, total, ..
            } => {
                if let Some(ref pb) = state.discover_bar {
                    let msg = match total {
                        Some(total) => format!("{} de {} documentos", enqueued, total),
                        None => format!("{} documentos", enqueued),
                    };
                    pb.set_message(msg);
                }
            }

            SyncProgress::DiscoveryComplete { total } => {
                if let Some(ref pb) = state.discover_bar {
                    pb.finish_with_message(format!("✓ {} documentos para sincronizar", total));
                }
            }

            SyncProgress::CheckpointSaved { path, count } => {
                drop(state);
                self.multi
                    .println(format!("Checkpoint: {} items en {}", count, path.display()))
                    .ok();
            }

            SyncProgress::CheckpointLoaded { path, count } => {
                drop(state);
                self.multi
                    .println(format!(
                        "Reanudando {} items desde {}",
                        count,
                        path.display()
                    ))
                    .ok();
            }

            SyncProgress::SyncingDocuments { total, .. } => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::bar_style());
                pb.set_prefix(format!("{:12}", "Sincronizando"));
                state.sync_bar = Some(pb);
            }

            SyncProgress::DocumentSynced {
                id,
                action,
                processed,
                ..
            } => {
                if let Some(ref pb) = state.sync_bar {
                    pb.set_position(processed as u64);
                    let symbol = match action {
                        ContentAction::Created => "+",
                        ContentAction::Updated => "✎",
                        ContentAction::Timestamps | ContentAction::Skipped => "·",
                    };
                    pb.set_message(format!("{} {}", symbol, id));
                }
            }

            SyncProgress::DocumentRetried {
                id,
                attempts,
                error,
            } => {
                if let Some(ref pb) = state.sync_bar {
                    pb.set_message(format!("⟳ {} (intento {}): {}", id, attempts, error));
                }
            }

            SyncProgress::DocumentPoisoned { id, attempts, .. } => {
                if let Some(ref pb) = state.sync_bar {
                    pb.inc(1);
                    pb.set_message(format!("✗ {} ({} intentos)", id, attempts));
                }
            }

            SyncProgress::SyncComplete {
                created,
                updated,
                skipped,
                failed,
            } => {
                if let Some(ref pb) = state.sync_bar {
                    let msg = if failed > 0 {
                        format!(
                            "✓ {} nuevas, {} actualizadas, {} sin cambios, {} errores",
                            created, updated, skipped, failed
                        )
                    } else {
                        format!(
                            "✓ {} nuevas, {} actualizadas, {} sin cambios",
                            created, updated, skipped
                        )
                    };
                    pb.finish_with_message(msg);
                }
            }

            SyncProgress::Warning { message } => {
                // Release lock before printing to avoid holding it during I/O
                drop(state);
                self.multi.println(format!("⚠ {}", message)).ok();
            }

            _ => {}
        }
    }

    /// Finish all progress bars.
    pub fn finish(&self) {
        let state = self.state.lock().unwrap();
        if let Some(ref pb) = state.discover_bar {
            if !pb.is_finished() {
                pb.finish();
            }
        }
        if let Some(ref pb) = state.sync_bar {
            if !pb.is_finished() {
                pb.finish();
            }
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>4}/{len:4} {msg}")
            .expect("Invalid template")
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    /// Handle a progress event.
    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::DiscoveryStarted { label, total } => {
                tracing::info!(query = %label, total = ?total, "Discovering documents");
            }

            SyncProgress::DiscoveredPage {
                worker,
                skip,
                matched,
                enqueued,
                total,
            } => {
                tracing::debug!(worker, skip, matched, enqueued, total = ?total, "Discovered page");
            }

            SyncProgress::DiscoveryComplete { total } => {
                tracing::info!(total, "Discovery complete");
            }

            SyncProgress::CheckpointSaved { path, count } => {
                tracing::info!(path = %path.display(), count, "Checkpoint saved");
            }

            SyncProgress::CheckpointLoaded { path, count } => {
                tracing::info!(path = %path.display(), count, "Checkpoint loaded");
            }

            SyncProgress::SyncingDocuments { total, concurrency } => {
                tracing::info!(total, concurrency, "Syncing documents");
            }

            SyncProgress::DocumentSynced {
                id,
                action,
                processed,
                total,
            } => {
                tracing::debug!(id = %id, action = ?action, processed, total, "Document synced");
            }

            SyncProgress::DocumentRetried {
                id,
                attempts,
                error,
            } => {
                tracing::warn!(id = %id, attempts, error = %error, "Document retried");
            }

            SyncProgress::DocumentPoisoned {
                id,
                attempts,
                error,
            } => {
                tracing::error!(id = %id, attempts, error = %error, "Document poisoned");
            }

            SyncProgress::SyncComplete {
                created,
                updated,
                skipped,
                failed,
            } => {
                tracing::info!(created, updated, skipped, failed, "Sync complete");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
