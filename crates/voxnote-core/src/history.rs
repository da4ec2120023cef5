//! Append-only history of processed recordings with soft-delete.
//!
//! The log is one JSON array document, newest entry first. Deleting marks an
//! entry invisible to `list()`; nothing is ever physically removed here.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::error::CoreError;
use crate::paths;

const HISTORY_FILE: &str = "history.json";

/// One processed recording. Immutable once created except for the `deleted`
/// flag, which only ever transitions false to true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: String,
    pub transcript: String,
    pub enriched: String,
    pub deleted: bool,
}

impl HistoryEntry {
    pub fn new(transcript: impl Into<String>, enriched: impl Into<String>) -> Self {
        Self {
            id: format!("evt_{}", Uuid::new_v4().simple()),
            timestamp: Utc::now().to_rfc3339(),
            transcript: transcript.into(),
            enriched: enriched.into(),
            deleted: false,
        }
    }
}

/// Append-only log store. Writes are serialized and re-read the latest
/// persisted state first, so a concurrent append and soft-delete cannot
/// overwrite one another's effect.
pub struct HistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(HISTORY_FILE),
            write_lock: Mutex::new(()),
        }
    }

    /// Prepend `entry` to the log. Newest-first ordering is part of the
    /// store's contract.
    pub async fn append(&self, entry: HistoryEntry) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut log = self.load().await;
        log.insert(0, entry);
        self.persist(&log).await
    }

    /// All entries not marked deleted, newest first.
    pub async fn list(&self) -> Vec<HistoryEntry> {
        self.load().await.into_iter().filter(|e| !e.deleted).collect()
    }

    /// The full log including soft-deleted entries.
    pub async fn raw(&self) -> Vec<HistoryEntry> {
        self.load().await
    }

    /// Mark the entry with `id` as deleted. Unknown ids leave the store
    /// unchanged and return `NotFound`.
    pub async fn soft_delete(&self, id: &str) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut log = self.load().await;
        let entry = log
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        entry.deleted = true;
        self.persist(&log).await
    }

    async fn load(&self) -> Vec<HistoryEntry> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(log) => log,
                Err(err) => {
                    warn!("unreadable history at {}: {err}; starting empty", self.path.display());
                    Vec::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                warn!("failed to read {}: {err}; starting empty", self.path.display());
                Vec::new()
            }
        }
    }

    async fn persist(&self, log: &[HistoryEntry]) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            paths::ensure_dir(parent)?;
        }
        let json = serde_json::to_vec_pretty(log)
            .map_err(|e| CoreError::persistence(format!("encoding history: {e}")))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| CoreError::persistence(format!("writing {}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn append_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());

        store.append(HistoryEntry::new("first", "e1")).await.unwrap();
        store.append(HistoryEntry::new("second", "e2")).await.unwrap();

        let entries = store.list().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].transcript, "second");
        assert_eq!(entries[1].transcript, "first");
    }

    #[tokio::test]
    async fn list_excludes_deleted_but_raw_retains_them() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());

        let entry = HistoryEntry::new("keep me around", "enriched");
        let id = entry.id.clone();
        store.append(entry).await.unwrap();
        store.soft_delete(&id).await.unwrap();

        assert!(store.list().await.is_empty());

        let raw = store.raw().await;
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].id, id);
        assert!(raw[0].deleted);
    }

    #[tokio::test]
    async fn soft_delete_is_one_way() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());

        let entry = HistoryEntry::new("t", "e");
        let id = entry.id.clone();
        store.append(entry).await.unwrap();

        store.soft_delete(&id).await.unwrap();
        // a repeated delete finds the entry again and leaves it deleted
        store.soft_delete(&id).await.unwrap();
        store.append(HistoryEntry::new("later", "e")).await.unwrap();

        let raw = store.raw().await;
        let deleted = raw.iter().find(|e| e.id == id).unwrap();
        assert!(deleted.deleted);
    }

    #[tokio::test]
    async fn soft_delete_unknown_id_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());

        store.append(HistoryEntry::new("t", "e")).await.unwrap();
        let before = store.raw().await;

        let err = store.soft_delete("evt_missing").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(store.raw().await, before);
    }

    #[tokio::test]
    async fn concurrent_appends_all_survive() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(HistoryStore::new(dir.path()));

        let mut tasks = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .append(HistoryEntry::new(format!("utterance {i}"), "enriched"))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.list().await.len(), 10);
    }

    #[tokio::test]
    async fn corrupt_log_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HISTORY_FILE), b"[{broken").unwrap();

        let store = HistoryStore::new(dir.path());
        assert!(store.list().await.is_empty());
    }
}
