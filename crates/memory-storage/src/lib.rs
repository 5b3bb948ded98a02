//! Persistence layer for memory-vault.
//!
//! Provides crash-safe JSON storage with:
//! - Atomic replace via a verified staging file
//! - Timestamped backups of the memory file on every overwrite
//! - Distinct absent / corrupt load outcomes
//! - Backup listing, retention and restore

pub mod atomic;
pub mod error;
pub mod memory_file;
pub mod snapshot_file;

pub use atomic::write_json_atomic;
pub use error::StorageError;
pub use memory_file::{BackupInfo, LoadOutcome, MemoryFile, MemoryPersistence, BACKUP_TIMESTAMP_FORMAT};
pub use snapshot_file::SnapshotPersistence;
