//! Filesystem-backed document store.
//!
//! Each document is persisted twice under the repository root: the
//! canonical JSON payload at `data/{id}.json` (the unit of comparison)
//! and the rendered Markdown at `{alias}.md` (the human-facing mirror).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::source::{Document, TIMESTAMP_POINTER, value_as_i64};

/// Errors that can occur when reading or writing the document store.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The effect a write (or skip decision) had on the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentAction {
    /// The document did not exist and was written for the first time.
    Created,
    /// The document existed and its content changed.
    Updated,
    /// The document was rewritten but only timestamp noise changed.
    Timestamps,
    /// The stored document was already up to date; nothing was written.
    Skipped,
}

/// Where a document lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Rendered Markdown file.
    pub text: PathBuf,
    /// Canonical JSON payload file.
    pub data: PathBuf,
}

/// Document store rooted at a directory.
pub struct FileDocumentRepository {
    root: PathBuf,
}

impl FileDocumentRepository {
    /// Open (creating if needed) a repository at the given root.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let root = root.into();
        fs::create_dir_all(root.join("data"))?;
        Ok(Self { root })
    }

    /// The repository root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location for a document.
    pub fn location(&self, document: &Document) -> Location {
        Location {
            text: self.root.join(format!("{}.md", document.alias)),
            data: self.data_path(&document.id),
        }
    }

    fn data_path(&self, id: &str) -> PathBuf {
        self.root.join("data").join(format!("{}.json", id))
    }

    /// Read the stored timestamp for a document without parsing the whole
    /// payload into a [`Document`]. `None` if never persisted or unreadable.
    pub fn get_timestamp(&self, id: &str) -> Option<i64> {
        let raw = fs::read_to_string(self.data_path(id)).ok()?;
        let payload: Value = serde_json::from_str(&raw).ok()?;
        payload.pointer(TIMESTAMP_POINTER).and_then(value_as_i64)
    }

    /// Read the previously stored document, if any. Unreadable or malformed
    /// payloads are treated as absent so a fresh write can repair them.
    pub fn get_document(&self, id: &str) -> Option<Document> {
        let raw = fs::read_to_string(self.data_path(id)).ok()?;
        let payload: Value = serde_json::from_str(&raw).ok()?;
        Document::from_payload(payload).ok()
    }

    /// Persist a document: payload first, then the rendered Markdown, each
    /// written to a temp file and renamed into place so readers never see a
    /// rendering without its payload.
    pub fn set_document(&self, document: &Document) -> Result<ContentAction, RepositoryError> {
        let location = self.location(document);
        let action = if location.data.exists() && location.text.exists() {
            ContentAction::Updated
        } else {
            ContentAction::Created
        };

        let payload = serde_json::to_string_pretty(&document.payload)?;
        write_atomic(&self.root.join("data"), &location.data, &payload)?;
        write_atomic(&self.root, &location.text, &document.to_markdown())?;

        Ok(action)
    }
}

fn write_atomic(dir: &Path, path: &Path, content: &str) -> Result<(), RepositoryError> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn document(id: &str, alias: &str, timestamp: i64) -> Document {
        Document::from_payload(json!({
            "document": {
                "metadata": {
                    "uuid": id,
                    "friendly-url": alias,
                    "document-content-type": "legislacion",
                    "timestamp": timestamp
                },
                "content": {
                    "titulo-norma": "Alguna norma",
                    "fecha": "2020-01-01",
                    "fecha-umod": "20200101000000"
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_first_write_creates_both_files() {
        let dir = TempDir::new().unwrap();
        let repo = FileDocumentRepository::new(dir.path()).unwrap();
        let doc = document("abc", "ley-1", 10);

        let action = repo.set_document(&doc).unwrap();

        assert_eq!(action, ContentAction::Created);
        assert!(dir.path().join("data/abc.json").exists());
        assert!(dir.path().join("ley-1.md").exists());
    }

    #[test]
    fn test_second_write_is_an_update() {
        let dir = TempDir::new().unwrap();
        let repo = FileDocumentRepository::new(dir.path()).unwrap();
        let doc = document("abc", "ley-1", 10);

        repo.set_document(&doc).unwrap();
        let action = repo.set_document(&document("abc", "ley-1", 11)).unwrap();

        assert_eq!(action, ContentAction::Updated);
        assert_eq!(repo.get_timestamp("abc"), Some(11));
    }

    #[test]
    fn test_missing_rendering_means_created() {
        let dir = TempDir::new().unwrap();
        let repo = FileDocumentRepository::new(dir.path()).unwrap();
        let doc = document("abc", "ley-1", 10);

        repo.set_document(&doc).unwrap();
        fs::remove_file(dir.path().join("ley-1.md")).unwrap();

        let action = repo.set_document(&doc).unwrap();
        assert_eq!(action, ContentAction::Created);
    }

    #[test]
    fn test_get_timestamp_absent_document() {
        let dir = TempDir::new().unwrap();
        let repo = FileDocumentRepository::new(dir.path()).unwrap();

        assert_eq!(repo.get_timestamp("nope"), None);
        assert!(repo.get_document("nope").is_none());
    }

    #[test]
    fn test_get_document_roundtrip() {
        let dir = TempDir::new().unwrap();
        let repo = FileDocumentRepository::new(dir.path()).unwrap();
        let doc = document("abc", "ley-1", 10);

        repo.set_document(&doc).unwrap();
        let back = repo.get_document("abc").unwrap();

        assert_eq!(back.id, "abc");
        assert_eq!(back.alias, "ley-1");
        assert_eq!(back.timestamp, 10);
        assert_eq!(back.payload, doc.payload);
    }

    #[test]
    fn test_corrupt_payload_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let repo = FileDocumentRepository::new(dir.path()).unwrap();
        fs::write(dir.path().join("data/abc.json"), "{ not json").unwrap();

        assert_eq!(repo.get_timestamp("abc"), None);
        assert!(repo.get_document("abc").is_none());
    }
}
