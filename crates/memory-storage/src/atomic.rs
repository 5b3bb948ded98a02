//! Atomic JSON file writes.
//!
//! Content goes to `<file>.tmp` first, is read back and parsed, and only
//! then renamed over the target. A crash at any point leaves either the old
//! file or the new one in place, never a partial write.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::StorageError;

/// Path of the staging file used for `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize `value` and atomically replace `path` with it.
///
/// The staged file must deserialize back into `T` before it is committed.
pub fn write_json_atomic<T>(path: &Path, value: &T) -> Result<(), StorageError>
where
    T: Serialize + DeserializeOwned,
{
    let bytes = serde_json::to_vec(value)?;
    commit(path, &bytes, |staged| {
        let raw = std::fs::read(staged).map_err(|e| StorageError::io(staged, e))?;
        serde_json::from_slice::<T>(&raw).map_err(|e| StorageError::Verification {
            path: staged.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(())
    })
}

/// Stage `bytes`, run `verify` on the staged file, then rename it over
/// `path`. On any failure the staged file is removed and `path` is left
/// untouched.
pub fn commit<V>(path: &Path, bytes: &[u8], verify: V) -> Result<(), StorageError>
where
    V: FnOnce(&Path) -> Result<(), StorageError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let staged = temp_path(path);
    let result = std::fs::write(&staged, bytes)
        .map_err(|e| StorageError::io(&staged, e))
        .and_then(|_| verify(&staged))
        .and_then(|_| std::fs::rename(&staged, path).map_err(|e| StorageError::io(path, e)));

    if result.is_err() && staged.exists() {
        if let Err(e) = std::fs::remove_file(&staged) {
            debug!(path = ?staged, error = %e, "Could not remove staged file");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path_sits_next_to_target() {
        assert_eq!(
            temp_path(Path::new("/data/memory_store.json")),
            PathBuf::from("/data/memory_store.json.tmp")
        );
    }

    #[test]
    fn test_write_replaces_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/state.json");

        write_json_atomic(&path, &BTreeMap::from([("a".to_string(), 1)])).unwrap();
        write_json_atomic(&path, &BTreeMap::from([("b".to_string(), 2)])).unwrap();

        let back: BTreeMap<String, i32> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, BTreeMap::from([("b".to_string(), 2)]));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_failed_verification_keeps_original() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        std::fs::write(&path, b"original").unwrap();

        let result = commit(&path, b"replacement", |staged| {
            Err(StorageError::Verification {
                path: staged.to_path_buf(),
                reason: "rejected".to_string(),
            })
        });

        assert!(matches!(result, Err(StorageError::Verification { .. })));
        assert_eq!(std::fs::read(&path).unwrap(), b"original");
        assert!(!temp_path(&path).exists());
    }
}
