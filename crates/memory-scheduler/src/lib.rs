//! Background job scheduler for the memory-vault daemon.
//!
//! Runs named jobs on a fixed interval with optional jitter, retries
//! failed runs after a backoff, tracks every run in a [`JobRegistry`] and
//! stops cleanly through a `CancellationToken`.
//!
//! # Example
//!
//! ```ignore
//! use memory_scheduler::{PeriodicJobConfig, SchedulerConfig, SchedulerService};
//!
//! let scheduler = SchedulerService::new(SchedulerConfig::default());
//! scheduler
//!     .register_periodic_job("corpus-sync", PeriodicJobConfig::new(300, 60), |_token| async {
//!         do_sync().await
//!     })
//!     .await?;
//!
//! scheduler.start().await?;
//! let status = scheduler.registry().get_status("corpus-sync");
//! ```

mod config;
mod error;
mod jitter;
mod registry;
mod scheduler;

#[cfg(feature = "jobs")]
pub mod jobs;

pub use config::{PeriodicJobConfig, SchedulerConfig};
pub use error::SchedulerError;
pub use jitter::JitterConfig;
pub use registry::{JobOutput, JobRegistry, JobResult, JobStatus};
pub use scheduler::SchedulerService;

#[cfg(feature = "jobs")]
pub use jobs::{create_sync_job, SyncJobConfig, SYNC_JOB_NAME};
