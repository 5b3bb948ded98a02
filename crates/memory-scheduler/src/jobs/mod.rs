//! Predefined jobs that can be registered with the scheduler.
//!
//! - **sync**: periodic corpus sync into the memory store

pub mod sync;

pub use sync::{create_sync_job, SyncJobConfig, SYNC_JOB_NAME};
