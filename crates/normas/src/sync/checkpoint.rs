use std::collections::VecDeque;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::action::SyncActionState;

const CHECKPOINT_FILE: &str = "normas-sync.json";

/// Default checkpoint location, under the system temp directory.
pub fn default_checkpoint_path() -> PathBuf {
    env::temp_dir().join(CHECKPOINT_FILE)
}

/// Load a previously saved backlog.
///
/// Missing, empty or corrupt checkpoints read as `None`: resuming from a
/// bad checkpoint should fall back to a message, not a crash.
pub fn load_checkpoint(path: &Path) -> Option<VecDeque<SyncActionState>> {
    let raw = fs::read_to_string(path).ok()?;
    let backlog: VecDeque<SyncActionState> = serde_json::from_str(&raw).ok()?;
    if backlog.is_empty() { None } else { Some(backlog) }
}

/// Save the backlog so a later run can resume from it.
pub fn save_checkpoint(path: &Path, backlog: &VecDeque<SyncActionState>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(backlog)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::source::{ContentType, DocumentSummary, Kind, Search};

    use super::*;

    fn backlog(ids: &[&str]) -> VecDeque<SyncActionState> {
        ids.iter()
            .map(|id| {
                SyncActionState::new(
                    DocumentSummary {
                        id: id.to_string(),
                        content_type: Some(ContentType::Legislacion),
                        kind: Kind::default(),
                        status: String::new(),
                        date: String::new(),
                        timestamp: Some(1),
                        query: Search::default(),
                    },
                    None,
                    false,
                )
            })
            .collect()
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");

        save_checkpoint(&path, &backlog(&["a", "b", "c"])).unwrap();
        let loaded = load_checkpoint(&path).unwrap();

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].summary.id, "a");
        assert_eq!(loaded[2].summary.id, "c");
    }

    #[test]
    fn test_missing_checkpoint_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_checkpoint(&dir.path().join("nope.json")).is_none());
    }

    #[test]
    fn test_corrupt_checkpoint_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        fs::write(&path, "{ truncated").unwrap();

        assert!(load_checkpoint(&path).is_none());
    }

    #[test]
    fn test_empty_checkpoint_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");

        save_checkpoint(&path, &VecDeque::new()).unwrap();
        assert!(load_checkpoint(&path).is_none());
    }
}
