use serde::{Deserialize, Serialize};

use crate::diff::timestamps_only;
use crate::repository::{ContentAction, FileDocumentRepository};
use crate::source::{Document, DocumentSummary, SourceClient, short_error_message};

use super::types::SyncOutcome;

/// What one execution of a sync action produced.
#[derive(Debug)]
pub enum ExecuteOutcome {
    /// The document was written or skipped; it leaves the backlog.
    Done(SyncOutcome),
    /// The document must be re-queued. `counted` says whether the failure
    /// consumed an attempt; transient failures do not.
    Retry { counted: bool },
}

/// One backlog item: a document to load, compare and persist.
///
/// The loaded document is cached across retries so a failure after a
/// successful load does not re-fetch. Only the fields needed to resume
/// survive a checkpoint round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncActionState {
    pub summary: DocumentSummary,
    /// Stored timestamp at discovery time; `None` when never persisted.
    pub target_timestamp: Option<i64>,
    /// Persist even when the stored timestamp is current.
    #[serde(default)]
    pub force: bool,
    /// Counted failures so far.
    #[serde(default)]
    pub attempts: u32,
    /// Message of the last counted failure.
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(skip)]
    document: Option<Document>,
}

impl SyncActionState {
    pub fn new(summary: DocumentSummary, target_timestamp: Option<i64>, force: bool) -> Self {
        Self {
            summary,
            target_timestamp,
            force,
            attempts: 0,
            last_error: None,
            document: None,
        }
    }

    /// Whether the document is newer than what the store holds.
    fn needs_write(&self, document: &Document) -> bool {
        self.force
            || match self.target_timestamp {
                None => true,
                Some(target) => document.timestamp > target,
            }
    }

    /// Run this action once: load the document (if not already cached),
    /// compare against the store and persist when needed.
    pub async fn execute(
        &mut self,
        client: &dyn SourceClient,
        repository: &FileDocumentRepository,
    ) -> ExecuteOutcome {
        let document = match self.document.take() {
            Some(document) => document,
            None => match client.load(&self.summary).await {
                Ok(document) => document,
                Err(e) if e.is_transient() => {
                    tracing::debug!(id = %self.summary.id, error = %e, "Transient load failure");
                    return ExecuteOutcome::Retry { counted: false };
                }
                Err(e) => {
                    self.attempts += 1;
                    self.last_error = Some(short_error_message(&e));
                    return ExecuteOutcome::Retry { counted: true };
                }
            },
        };

        let location = repository.location(&document);

        if !self.needs_write(&document) {
            return ExecuteOutcome::Done(SyncOutcome::new(
                ContentAction::Skipped,
                &document,
                location,
            ));
        }

        let previous = repository.get_document(&document.id);
        let action = match repository.set_document(&document) {
            Ok(action) => action,
            Err(e) => {
                self.attempts += 1;
                self.last_error = Some(short_error_message(&e));
                self.document = Some(document);
                return ExecuteOutcome::Retry { counted: true };
            }
        };

        // An update whose only changes are the known timestamp fields is
        // reported separately so the changelog stays quiet.
        let action = match (&action, &previous) {
            (ContentAction::Updated, Some(previous))
                if timestamps_only(&previous.payload, &document.payload) =>
            {
                ContentAction::Timestamps
            }
            _ => action,
        };

        ExecuteOutcome::Done(SyncOutcome::new(action, &document, location))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::source::{ContentType, Kind, Search};

    use super::*;

    fn summary(id: &str, timestamp: i64) -> DocumentSummary {
        DocumentSummary {
            id: id.to_string(),
            content_type: Some(ContentType::Legislacion),
            kind: Kind::default(),
            status: String::new(),
            date: String::new(),
            timestamp: Some(timestamp),
            query: Search::default(),
        }
    }

    #[test]
    fn test_needs_write_decision() {
        let fresh = SyncActionState::new(summary("a", 10), None, false);
        let current = SyncActionState::new(summary("a", 10), Some(10), false);
        let stale = SyncActionState::new(summary("a", 10), Some(5), false);
        let forced = SyncActionState::new(summary("a", 10), Some(10), true);

        let document = Document::from_payload(json!({
            "document": {
                "metadata": {
                    "uuid": "a",
                    "friendly-url": "ley-1",
                    "document-content-type": "legislacion",
                    "timestamp": 10
                },
                "content": {}
            }
        }))
        .unwrap();

        assert!(fresh.needs_write(&document));
        assert!(!current.needs_write(&document));
        assert!(stale.needs_write(&document));
        assert!(forced.needs_write(&document));
    }

    #[test]
    fn test_checkpoint_serialization_drops_cached_document() {
        let mut state = SyncActionState::new(summary("a", 10), Some(5), false);
        state.attempts = 2;
        state.last_error = Some("boom".to_string());

        let json = serde_json::to_string(&state).unwrap();
        let back: SyncActionState = serde_json::from_str(&json).unwrap();

        assert_eq!(back.summary.id, "a");
        assert_eq!(back.target_timestamp, Some(5));
        assert_eq!(back.attempts, 2);
        assert_eq!(back.last_error.as_deref(), Some("boom"));
        assert!(back.document.is_none());
    }
}
