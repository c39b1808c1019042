use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::repository::ContentAction;

use super::types::SyncOutcome;

/// Thread-safe tally of a sync run, rendered as a Markdown changelog.
///
/// Counters are atomics so persistence workers update them without
/// coordination; outcomes that belong in the changelog table are kept
/// aside for rendering.
pub struct SyncSummary {
    operation: String,
    created: AtomicUsize,
    updated: AtomicUsize,
    skipped: AtomicUsize,
    timestamps: AtomicUsize,
    failed: AtomicUsize,
    results: Mutex<Vec<SyncOutcome>>,
    started: Instant,
    elapsed: Mutex<Option<Duration>>,
}

impl SyncSummary {
    /// Start tallying a run labeled with the search it covers.
    pub fn start(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            created: AtomicUsize::new(0),
            updated: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            timestamps: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            results: Mutex::new(Vec::new()),
            started: Instant::now(),
            elapsed: Mutex::new(None),
        }
    }

    /// Record the outcome of one document.
    pub fn add(&self, outcome: SyncOutcome) {
        match outcome.action {
            ContentAction::Created => {
                self.created.fetch_add(1, Ordering::Relaxed);
            }
            ContentAction::Updated => {
                self.updated.fetch_add(1, Ordering::Relaxed);
            }
            ContentAction::Timestamps => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                self.timestamps.fetch_add(1, Ordering::Relaxed);
            }
            ContentAction::Skipped => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(outcome);
    }

    /// Record a document that exhausted its attempt budget.
    pub fn add_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Freeze the elapsed time. Later calls to [`elapsed`] return this.
    ///
    /// [`elapsed`]: Self::elapsed
    pub fn stop(&self) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed = Some(self.started.elapsed());
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn updated(&self) -> usize {
        self.updated.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Updates whose only changes were the known timestamp fields; a
    /// subset of [`skipped`](Self::skipped).
    pub fn timestamps(&self) -> usize {
        self.timestamps.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .unwrap_or_else(|| self.started.elapsed())
    }

    /// Render the run as a Markdown changelog fragment. The summary line
    /// carries only the nonzero counters, plus the elapsed time.
    pub fn to_report(&self) -> String {
        let mut report = format!("{}: ", self.operation);
        for (emoji, count) in [
            (":heavy_plus_sign:", self.created()),
            (":pencil:", self.updated()),
            (":white_check_mark:", self.skipped()),
            (":x:", self.failed()),
        ] {
            if count > 0 {
                report.push_str(&format!("{} {} ", emoji, count));
            }
        }
        report.push_str(&format!(
            ":hourglass: {}\n",
            format_elapsed(self.elapsed())
        ));

        let results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        let rows: Vec<&SyncOutcome> = results
            .iter()
            .filter(|o| matches!(o.action, ContentAction::Created | ContentAction::Updated))
            .collect();

        if rows.is_empty() && self.timestamps() == 0 {
            return report;
        }

        report.push_str("\n<details>\n\n<summary>:information_source: Detalles</summary>\n\n");
        if !rows.is_empty() {
            report.push_str("| | Nombre | Título|\n|-|------|------|\n");
            for outcome in rows {
                let emoji = match outcome.action {
                    ContentAction::Created => ":heavy_plus_sign:",
                    _ => ":pencil:",
                };
                report.push_str(&format!(
                    "|{}|[{}]({})|{}|\n",
                    emoji, outcome.name, outcome.web_url, outcome.title
                ));
            }
        }
        if self.timestamps() > 0 {
            report.push_str(&format!(
                "\n> Actualizaciones sin cambios de contenido: {}\n",
                self.timestamps()
            ));
        }
        report.push_str("\n</details>\n");
        report
    }

    /// Write the changelog to a file, plus a sibling `.txt` listing the
    /// files rewritten by timestamp-only updates so callers can revert
    /// them.
    pub fn save(&self, path: &Path, append: bool) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let report = self.to_report();
        if append && path.exists() {
            let mut existing = fs::read_to_string(path)?;
            existing.push('\n');
            existing.push_str(&report);
            fs::write(path, existing)?;
        } else {
            fs::write(path, &report)?;
        }

        let results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        let noisy: Vec<&SyncOutcome> = results
            .iter()
            .filter(|o| o.action == ContentAction::Timestamps)
            .collect();
        if !noisy.is_empty() {
            let mut lines = String::new();
            for outcome in &noisy {
                lines.push_str(&outcome.location.data.display().to_string());
                lines.push('\n');
            }
            for outcome in &noisy {
                lines.push_str(&outcome.location.text.display().to_string());
                lines.push('\n');
            }
            fs::write(path.with_extension("txt"), lines)?;
        }

        Ok(())
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use crate::repository::Location;

    use super::*;

    fn outcome(action: ContentAction, id: &str) -> SyncOutcome {
        SyncOutcome {
            action,
            id: id.to_string(),
            alias: format!("ley-{}", id),
            name: format!("Ley {}", id),
            title: "Una norma".to_string(),
            web_url: format!("https://www.saij.gob.ar/ley-{}", id),
            location: Location {
                text: PathBuf::from(format!("ley-{}.md", id)),
                data: PathBuf::from(format!("data/{}.json", id)),
            },
        }
    }

    #[test]
    fn test_counters() {
        let summary = SyncSummary::start("Ley (Nacional)");
        summary.add(outcome(ContentAction::Created, "1"));
        summary.add(outcome(ContentAction::Updated, "2"));
        summary.add(outcome(ContentAction::Timestamps, "3"));
        summary.add(outcome(ContentAction::Skipped, "4"));
        summary.add_failure();

        assert_eq!(summary.created(), 1);
        assert_eq!(summary.updated(), 1);
        assert_eq!(summary.skipped(), 2);
        assert_eq!(summary.timestamps(), 1);
        assert_eq!(summary.failed(), 1);
    }

    #[test]
    fn test_report_with_rows_and_footnote() {
        let summary = SyncSummary::start("Ley (Nacional)");
        summary.add(outcome(ContentAction::Created, "1"));
        summary.add(outcome(ContentAction::Timestamps, "3"));
        summary.stop();

        let report = summary.to_report();

        assert!(report.starts_with("Ley (Nacional): :heavy_plus_sign: 1 "));
        assert!(report.contains("<summary>:information_source: Detalles</summary>"));
        assert!(report.contains("| | Nombre | Título|"));
        assert!(report.contains("|:heavy_plus_sign:|[Ley 1](https://www.saij.gob.ar/ley-1)|Una norma|"));
        assert!(report.contains("> Actualizaciones sin cambios de contenido: 1"));
    }

    #[test]
    fn test_report_without_changes_has_no_details() {
        let summary = SyncSummary::start("Ley (Nacional)");
        summary.add(outcome(ContentAction::Skipped, "1"));

        let report = summary.to_report();

        assert!(!report.contains("<details>"));
        assert!(!report.contains("Actualizaciones"));
    }

    #[test]
    fn test_report_omits_zero_counters() {
        let summary = SyncSummary::start("Ley (Nacional)");
        summary.add(outcome(ContentAction::Created, "1"));

        let report = summary.to_report();
        let line = report.lines().next().unwrap();

        assert!(line.contains(":heavy_plus_sign: 1"));
        assert!(!line.contains(":pencil:"));
        assert!(!line.contains(":white_check_mark:"));
        assert!(!line.contains(":x:"));
        assert!(line.contains(":hourglass:"));
    }

    #[test]
    fn test_report_footnote_without_table() {
        let summary = SyncSummary::start("Ley (Nacional)");
        summary.add(outcome(ContentAction::Timestamps, "3"));

        let report = summary.to_report();

        assert!(report.contains("<details>"));
        assert!(!report.contains("| | Nombre | Título|"));
        assert!(report.contains("> Actualizaciones sin cambios de contenido: 1"));
    }

    #[test]
    fn test_save_appends_and_writes_noise_listing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("changelog.md");

        let first = SyncSummary::start("Ley (Nacional)");
        first.add(outcome(ContentAction::Created, "1"));
        first.save(&path, false).unwrap();

        let second = SyncSummary::start("Decreto (Nacional)");
        second.add(outcome(ContentAction::Timestamps, "2"));
        second.save(&path, true).unwrap();

        let changelog = fs::read_to_string(&path).unwrap();
        assert!(changelog.contains("Ley (Nacional):"));
        assert!(changelog.contains("Decreto (Nacional):"));

        let listing = fs::read_to_string(dir.path().join("changelog.txt")).unwrap();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines, vec!["data/2.json", "ley-2.md"]);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(42)), "42s");
        assert_eq!(format_elapsed(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_elapsed(Duration::from_secs(3700)), "1h 1m 40s");
    }
}
