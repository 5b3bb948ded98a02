//! Periodic corpus sync job.
//!
//! Runs a sync pass on the memory service every interval. A failed pass
//! (model unavailable, vault unreadable, deadline exceeded) leaves the
//! published store untouched and is retried after the backoff.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use memory_service::MemoryService;

use crate::{JitterConfig, JobOutput, PeriodicJobConfig, SchedulerError, SchedulerService};

/// Registry name of the sync job.
pub const SYNC_JOB_NAME: &str = "corpus-sync";

/// Configuration for the sync job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncJobConfig {
    /// Seconds between passes (default: 300)
    pub interval_secs: u64,

    /// Seconds before retrying a failed pass (default: 60)
    pub retry_backoff_secs: u64,

    /// Max jitter in seconds (default: 0)
    pub jitter_secs: u64,

    /// Run a pass as soon as the scheduler starts (default: false)
    pub run_immediately: bool,
}

impl Default for SyncJobConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            retry_backoff_secs: 60,
            jitter_secs: 0,
            run_immediately: false,
        }
    }
}

impl SyncJobConfig {
    pub fn with_interval(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff_secs: u64) -> Self {
        self.retry_backoff_secs = retry_backoff_secs;
        self
    }

    pub fn with_jitter(mut self, jitter_secs: u64) -> Self {
        self.jitter_secs = jitter_secs;
        self
    }

    pub fn with_run_immediately(mut self, run_immediately: bool) -> Self {
        self.run_immediately = run_immediately;
        self
    }

    fn to_periodic(&self) -> PeriodicJobConfig {
        PeriodicJobConfig::new(self.interval_secs, self.retry_backoff_secs)
            .with_jitter(JitterConfig::new(self.jitter_secs))
            .with_run_immediately(self.run_immediately)
    }
}

/// Register the sync job with the scheduler.
///
/// # Errors
///
/// Returns error if the interval or backoff is zero or the job is
/// already registered.
///
/// # Example
///
/// ```ignore
/// let service = Arc::new(MemoryService::load(&settings, embedder, segmenter));
/// create_sync_job(&scheduler, service.clone(), SyncJobConfig::default()).await?;
/// scheduler.start().await?;
/// ```
pub async fn create_sync_job(
    scheduler: &SchedulerService,
    service: Arc<MemoryService>,
    config: SyncJobConfig,
) -> Result<(), SchedulerError> {
    scheduler
        .register_periodic_job(SYNC_JOB_NAME, config.to_periodic(), move |_token| {
            let service = service.clone();
            async move { run_sync_job(service).await }
        })
        .await?;

    info!(interval_secs = config.interval_secs, "Registered corpus sync job");
    Ok(())
}

async fn run_sync_job(service: Arc<MemoryService>) -> Result<JobOutput, String> {
    let report = service
        .sync_report()
        .await
        .map_err(|e| format!("Sync failed: {}", e))?;

    if report.rebuilt {
        info!(
            chunks_added = report.chunks_added,
            documents = report.documents,
            "Sync job rebuilt corpus memories"
        );
    } else {
        debug!("Sync job: corpus unchanged");
    }

    Ok(JobOutput::new()
        .with_metadata("rebuilt", report.rebuilt)
        .with_metadata("chunks_added", report.chunks_added)
        .with_metadata("documents", report.documents)
        .with_metadata("deleted_files", report.deleted_files))
}
