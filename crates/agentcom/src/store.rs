//! Snapshot store: single-slot cache plus flat-file persistence
//!
//! Writers are serialized for the whole serialize, persist, publish
//! sequence. The cache slot only changes after the file has been replaced,
//! so a failed write leaves cache and file untouched. Readers only take the
//! slot lock for a pointer clone and never wait on disk.

use chrono::Utc;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::snapshot::{Snapshot, StoredSnapshot};
use crate::Result;

/// Owner of the cache slot and the persisted file
pub struct SnapshotStore {
    /// Persisted snapshot location
    path: PathBuf,

    /// Most recently accepted snapshot
    slot: RwLock<Option<Arc<StoredSnapshot>>>,

    /// Held across a full write
    writer: Mutex<()>,
}

impl SnapshotStore {
    /// Create an empty store persisting to `path`. Nothing is loaded from disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            slot: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    /// Persisted snapshot location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current cache value, or `None` before the first accepted report
    pub fn read(&self) -> Option<Arc<StoredSnapshot>> {
        self.slot.read().clone()
    }

    /// Persist and cache `snapshot` as one step
    pub async fn write(&self, snapshot: Snapshot) -> Result<Arc<StoredSnapshot>> {
        let bytes = snapshot.to_vec()?;

        let _guard = self.writer.lock().await;
        self.persist(&bytes).await?;

        let stored = Arc::new(StoredSnapshot {
            snapshot,
            accepted_at: Utc::now(),
        });
        *self.slot.write() = Some(stored.clone());

        tracing::debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            accepted_at = %stored.accepted_at,
            "Snapshot persisted"
        );
        Ok(stored)
    }

    /// Replace the file contents via a sibling temp file and rename
    async fn persist(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
            tracing::error!(path = %tmp_path.display(), "Failed to write snapshot: {}", e);
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            tracing::error!(path = %self.path.display(), "Failed to replace snapshot: {}", e);
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}
