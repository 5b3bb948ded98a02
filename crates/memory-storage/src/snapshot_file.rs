//! Corpus snapshot persistence.
//!
//! The change detector's last scan, stored as a path to
//! `{"hash", "modified"}` map. Written atomically, without backups.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use memory_corpus::CorpusSnapshot;

use crate::atomic::write_json_atomic;
use crate::error::StorageError;
use crate::memory_file::LoadOutcome;

#[derive(Debug, Clone)]
pub struct SnapshotPersistence {
    path: PathBuf,
}

impl SnapshotPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, snapshot: &CorpusSnapshot) -> Result<(), StorageError> {
        write_json_atomic(&self.path, snapshot)?;
        debug!(path = ?self.path, files = snapshot.len(), "Corpus snapshot saved");
        Ok(())
    }

    pub fn load(&self) -> LoadOutcome<CorpusSnapshot> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LoadOutcome::Absent,
            Err(e) => return self.corrupt(e.to_string()),
        };
        match serde_json::from_slice(&raw) {
            Ok(snapshot) => LoadOutcome::Loaded(snapshot),
            Err(e) => self.corrupt(e.to_string()),
        }
    }

    /// The stored snapshot, or an empty one when absent or unreadable.
    ///
    /// An empty snapshot makes the next scan see every file as new, which
    /// forces a full rebuild.
    pub fn load_or_default(&self) -> CorpusSnapshot {
        self.load().loaded().unwrap_or_default()
    }

    fn corrupt<T>(&self, reason: String) -> LoadOutcome<T> {
        warn!(path = ?self.path, reason = %reason, "Corpus snapshot unreadable, rescanning from scratch");
        LoadOutcome::Corrupt { reason }
    }
}
