//! Memory file persistence.
//!
//! The store is written as `{"texts": [...], "embeddings": [[...]...],
//! "origins": [...]}` with all arrays positionally aligned. Every save
//! first copies the existing file to a timestamped backup, then replaces
//! it atomically.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use memory_types::Origin;
use memory_vector::{StoreParts, VectorMemoryStore};

use crate::atomic::commit;
use crate::error::StorageError;

/// Timestamp format used in backup file names.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// On-disk layout of the memory file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryFile {
    pub texts: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    /// Absent in files written before origins were tracked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origins: Option<Vec<Origin>>,
}

impl MemoryFile {
    pub fn from_store(store: &VectorMemoryStore) -> Self {
        let parts = store.to_parts();
        Self {
            texts: parts.texts,
            embeddings: parts.vectors,
            origins: Some(parts.origins),
        }
    }

    /// Column view of the file. Legacy files get origins from the chunk header.
    pub fn into_parts(self) -> StoreParts {
        let origins = match self.origins {
            Some(origins) => origins,
            None => self.texts.iter().map(|t| Origin::infer_legacy(t)).collect(),
        };
        StoreParts {
            texts: self.texts,
            vectors: self.embeddings,
            origins,
        }
    }

    pub fn into_store(self, dimension: usize) -> Result<VectorMemoryStore, StorageError> {
        Ok(VectorMemoryStore::from_parts(dimension, self.into_parts())?)
    }
}

/// Result of reading a persisted file.
#[derive(Debug)]
pub enum LoadOutcome<T> {
    Loaded(T),
    /// No file yet; start empty
    Absent,
    /// File exists but is unusable; start empty and keep the file
    Corrupt { reason: String },
}

impl<T> LoadOutcome<T> {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, LoadOutcome::Corrupt { .. })
    }

    pub fn loaded(self) -> Option<T> {
        match self {
            LoadOutcome::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

/// A timestamped copy of the memory file.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub created: NaiveDateTime,
}

/// Reads and writes the memory file and manages its backups.
#[derive(Debug, Clone)]
pub struct MemoryPersistence {
    path: PathBuf,
    backup_dir: PathBuf,
    retention: Option<usize>,
    dimension: usize,
}

impl MemoryPersistence {
    pub fn new(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>, dimension: usize) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
            retention: None,
            dimension,
        }
    }

    /// Keep only the newest `retention` backups. `None` keeps all.
    pub fn with_retention(mut self, retention: Option<usize>) -> Self {
        self.retention = retention;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Back up the current file, then atomically write `store`.
    ///
    /// A failed backup is logged and does not block the save.
    pub fn save(&self, store: &VectorMemoryStore) -> Result<(), StorageError> {
        if let Err(e) = self.backup() {
            warn!(error = %e, "Backup failed, saving anyway");
        }

        let result = serde_json::to_vec(&MemoryFile::from_store(store))
            .map_err(StorageError::from)
            .and_then(|bytes| commit(&self.path, &bytes, |staged| self.verify(staged)));

        match &result {
            Ok(()) => {
                debug!(path = ?self.path, records = store.size(), "Memory saved");
                if let Err(e) = self.prune_backups() {
                    warn!(error = %e, "Backup pruning failed");
                }
            }
            Err(e) => error!(path = ?self.path, error = %e, "Failed to save memory"),
        }
        result
    }

    /// Read the memory file into a store.
    pub fn load(&self) -> LoadOutcome<VectorMemoryStore> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = ?self.path, "No memory file yet, starting empty");
                return LoadOutcome::Absent;
            }
            Err(e) => return self.corrupt(e.to_string()),
        };

        match Self::parse(&raw, self.dimension) {
            Ok(store) => {
                info!(path = ?self.path, records = store.size(), "Memory loaded");
                LoadOutcome::Loaded(store)
            }
            Err(e) => self.corrupt(e.to_string()),
        }
    }

    fn corrupt<T>(&self, reason: String) -> LoadOutcome<T> {
        error!(
            path = ?self.path,
            reason = %reason,
            backups = ?self.backup_dir,
            "Memory file is corrupt; starting empty. The file was left in place, \
             restore from a backup with `backups restore`"
        );
        LoadOutcome::Corrupt { reason }
    }

    fn parse(raw: &[u8], dimension: usize) -> Result<VectorMemoryStore, StorageError> {
        let file: MemoryFile = serde_json::from_slice(raw)?;
        file.into_store(dimension)
    }

    fn verify(&self, staged: &Path) -> Result<(), StorageError> {
        let raw = std::fs::read(staged).map_err(|e| StorageError::io(staged, e))?;
        Self::parse(&raw, self.dimension)
            .map(|_| ())
            .map_err(|e| StorageError::Verification {
                path: staged.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn stem_and_ext(&self) -> (String, String) {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "memory".to_string());
        let ext = self
            .path
            .extension()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "json".to_string());
        (stem, ext)
    }

    /// Copy the current file to `<stem>_<YYYYMMDD_HHMMSS>.<ext>` in the
    /// backup directory, adding `_<n>` when that second is already taken.
    /// Returns `None` when there is nothing to back up.
    pub fn backup(&self) -> Result<Option<PathBuf>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.backup_dir)
            .map_err(|e| StorageError::io(&self.backup_dir, e))?;

        let (stem, ext) = self.stem_and_ext();
        let stamp = Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut target = self.backup_dir.join(format!("{}_{}.{}", stem, stamp, ext));
        let mut sequence = 1u32;
        while target.exists() {
            target = self
                .backup_dir
                .join(format!("{}_{}_{}.{}", stem, stamp, sequence, ext));
            sequence += 1;
        }

        std::fs::copy(&self.path, &target).map_err(|e| StorageError::io(&target, e))?;
        info!(backup = ?target, "Memory file backed up");
        Ok(Some(target))
    }

    /// Backups of this file, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, StorageError> {
        let entries = match std::fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.backup_dir, e)),
        };

        let (stem, ext) = self.stem_and_ext();
        let prefix = format!("{}_", stem);
        let suffix = format!(".{}", ext);

        let mut backups: Vec<(BackupInfo, u32)> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                let rest = name.strip_prefix(&prefix)?.strip_suffix(&suffix)?;
                let (created, sequence) = parse_backup_stamp(rest)?;
                Some((
                    BackupInfo {
                        path: entry.path(),
                        created,
                    },
                    sequence,
                ))
            })
            .collect();

        backups.sort_by(|(a, a_seq), (b, b_seq)| {
            b.created.cmp(&a.created).then_with(|| b_seq.cmp(a_seq))
        });
        Ok(backups.into_iter().map(|(info, _)| info).collect())
    }

    /// Delete backups beyond the retention count. Returns how many were removed.
    pub fn prune_backups(&self) -> Result<usize, StorageError> {
        let Some(keep) = self.retention else {
            return Ok(0);
        };

        let mut removed = 0;
        for backup in self.list_backups()?.into_iter().skip(keep) {
            std::fs::remove_file(&backup.path).map_err(|e| StorageError::io(&backup.path, e))?;
            removed += 1;
        }
        if removed > 0 {
            info!(removed, kept = keep, "Pruned old backups");
        }
        Ok(removed)
    }

    /// Replace the memory file with the newest backup that parses.
    ///
    /// The current file, if any, is backed up first. Returns the backup
    /// that was restored.
    pub fn restore_latest_backup(&self) -> Result<PathBuf, StorageError> {
        let mut chosen = None;
        for backup in self.list_backups()? {
            let raw = match std::fs::read(&backup.path) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(backup = ?backup.path, error = %e, "Unreadable backup");
                    continue;
                }
            };
            match Self::parse(&raw, self.dimension) {
                Ok(_) => {
                    chosen = Some((backup.path, raw));
                    break;
                }
                Err(e) => warn!(backup = ?backup.path, error = %e, "Skipping invalid backup"),
            }
        }

        let (source, raw) = chosen.ok_or_else(|| StorageError::NoBackup(self.backup_dir.clone()))?;

        if let Err(e) = self.backup() {
            warn!(error = %e, "Could not back up current memory file before restore");
        }
        commit(&self.path, &raw, |staged| self.verify(staged))?;

        info!(backup = ?source, path = ?self.path, "Memory file restored from backup");
        Ok(source)
    }
}

/// Split `YYYYMMDD_HHMMSS[_n]` into its timestamp and sequence number.
fn parse_backup_stamp(rest: &str) -> Option<(NaiveDateTime, u32)> {
    let stamp_len = "YYYYMMDD_HHMMSS".len();
    let stamp = rest.get(..stamp_len)?;
    let created = NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT).ok()?;
    let sequence = match &rest[stamp_len..] {
        "" => 0,
        tail => tail.strip_prefix('_')?.parse().ok()?,
    };
    Some((created, sequence))
}
