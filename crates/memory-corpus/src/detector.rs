//! Corpus change detection.
//!
//! Fingerprints every document (content hash plus modification time) and
//! compares the result with the previous scan. A new path, a deleted path
//! or a changed content hash means the corpus segment of the memory store
//! has to be rebuilt. A modification time that moved on its own does not.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::CorpusError;
use crate::source::{modified_secs, DocumentSource};

/// Content hash and modification time of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFingerprint {
    /// Hex SHA-256 of the raw file bytes
    pub hash: String,
    /// Seconds since the Unix epoch
    pub modified: f64,
}

impl FileFingerprint {
    pub fn of_file(path: &Path) -> Result<Self, CorpusError> {
        let bytes = std::fs::read(path).map_err(|e| CorpusError::io(path, e))?;
        let modified = modified_secs(path).map_err(|e| CorpusError::io(path, e))?;
        Ok(Self {
            hash: content_hash(&bytes),
            modified,
        })
    }
}

/// Hex SHA-256 digest.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Path to fingerprint map from one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorpusSnapshot {
    files: BTreeMap<String, FileFingerprint>,
}

impl CorpusSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, fingerprint: FileFingerprint) {
        self.files.insert(path.into(), fingerprint);
    }

    pub fn get(&self, path: &str) -> Option<&FileFingerprint> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Fingerprint every document in `source`. Unreadable files are left out.
    pub fn scan(source: &DocumentSource) -> Result<Self, CorpusError> {
        let mut snapshot = Self::new();
        for path in source.paths()? {
            match FileFingerprint::of_file(&path) {
                Ok(fp) => snapshot.insert(path.to_string_lossy(), fp),
                Err(e) => warn!(error = %e, "Skipping unreadable document"),
            }
        }
        Ok(snapshot)
    }
}

/// What changed between two snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusDiff {
    pub added: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

impl CorpusDiff {
    pub fn between(previous: &CorpusSnapshot, current: &CorpusSnapshot) -> Self {
        let mut diff = Self::default();
        for (path, fp) in &current.files {
            match previous.files.get(path) {
                None => {
                    diff.added.insert(path.clone());
                }
                Some(old) if old.hash != fp.hash => {
                    diff.modified.insert(path.clone());
                }
                Some(_) => {}
            }
        }
        for path in previous.files.keys() {
            if !current.files.contains_key(path) {
                diff.deleted.insert(path.clone());
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Added and modified paths together.
    pub fn new_or_modified(&self) -> BTreeSet<String> {
        self.added.union(&self.modified).cloned().collect()
    }
}

/// Holds the last-seen snapshot and reports changes against it.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    snapshot: CorpusSnapshot,
}

impl ChangeDetector {
    pub fn new(snapshot: CorpusSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &CorpusSnapshot {
        &self.snapshot
    }

    /// Scan `source`, diff against the held snapshot and adopt the scan.
    ///
    /// The held snapshot is replaced even when the diff is empty. Callers
    /// that fail to act on a diff should [`restore`](Self::restore) the
    /// previous snapshot so the change is seen again.
    pub fn detect(&mut self, source: &DocumentSource) -> Result<CorpusDiff, CorpusError> {
        let current = CorpusSnapshot::scan(source)?;
        let diff = CorpusDiff::between(&self.snapshot, &current);
        debug!(
            files = current.len(),
            added = diff.added.len(),
            modified = diff.modified.len(),
            deleted = diff.deleted.len(),
            "Corpus scanned"
        );
        self.snapshot = current;
        Ok(diff)
    }

    pub fn restore(&mut self, snapshot: CorpusSnapshot) {
        self.snapshot = snapshot;
    }
}
