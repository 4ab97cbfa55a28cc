//! Per-account folder progress (`progress.json`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{read_if_exists, write_atomic};
use crate::Result;
use crate::account::AccountId;

/// Progress of one account that has started but not finished.
///
/// `completed_folders` is authoritative; `current_folder` is only a hint of
/// where the last run was.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Position in discovery order of the next folder to crawl.
    pub current_folder: usize,
    /// Folders fully crawled, in completion order.
    pub completed_folders: Vec<String>,
}

impl ProgressState {
    /// True if `folder` was already completed.
    #[must_use]
    pub fn is_completed(&self, folder: &str) -> bool {
        self.completed_folders.iter().any(|name| name == folder)
    }

    /// Records `folder`, found at `position` in discovery order, as completed.
    pub fn mark_completed(&mut self, folder: &str, position: usize) {
        if !self.is_completed(folder) {
            self.completed_folders.push(folder.to_string());
        }
        self.current_folder = position + 1;
    }
}

/// All in-flight accounts, keyed by address.
pub type ProgressMap = BTreeMap<AccountId, ProgressState>;

/// Reads and writes `progress.json`.
///
/// There is no partial update: callers load the whole map, change it, and
/// save it back.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    /// Creates a store for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the whole map. A missing file is an empty map.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> Result<ProgressMap> {
        let Some(contents) = read_if_exists(&self.path).await? else {
            debug!("No progress file at {}", self.path.display());
            return Ok(ProgressMap::new());
        };
        Ok(serde_json::from_str(&contents)?)
    }

    /// Atomically replaces the file with `map`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, map: &ProgressMap) -> Result<()> {
        let contents = serde_json::to_vec_pretty(map)?;
        write_atomic(&self.path, &contents).await?;
        debug!("Saved progress for {} accounts", map.len());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_completed_is_idempotent() {
        let mut state = ProgressState::default();
        state.mark_completed("Inbox", 0);
        state.mark_completed("Inbox", 0);
        state.mark_completed("Sent", 1);

        assert_eq!(state.completed_folders, ["Inbox", "Sent"]);
        assert_eq!(state.current_folder, 2);
        assert!(state.is_completed("Inbox"));
        assert!(!state.is_completed("Drafts"));
    }

    #[test]
    fn test_file_format() {
        let mut map = ProgressMap::new();
        map.insert(
            AccountId::new("a@x.com"),
            ProgressState {
                current_folder: 1,
                completed_folders: vec!["Inbox".to_string()],
            },
        );
        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "a@x.com": {"current_folder": 1, "completed_folders": ["Inbox"]}
            })
        );
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));

        let mut map = ProgressMap::new();
        map.entry(AccountId::new("a@x.com"))
            .or_default()
            .mark_completed("Inbox", 0);
        store.save(&map).await.unwrap();

        assert_eq!(store.load().await.unwrap(), map);
    }

    #[tokio::test]
    async fn test_save_overwrites_whole_map() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));

        let mut map = ProgressMap::new();
        map.insert(AccountId::new("a@x.com"), ProgressState::default());
        map.insert(AccountId::new("b@x.com"), ProgressState::default());
        store.save(&map).await.unwrap();

        map.remove(&AccountId::new("a@x.com"));
        store.save(&map).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&AccountId::new("b@x.com")));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        assert!(ProgressStore::new(path).load().await.is_err());
    }
}
