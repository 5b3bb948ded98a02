//! Error types for the scheduler crate.

use thiserror::Error;

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Interval or backoff is unusable
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A job with this name is already registered
    #[error("Job already registered: {0}")]
    DuplicateJob(String),

    /// Scheduler is already running
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler is not running")]
    NotRunning,
}
