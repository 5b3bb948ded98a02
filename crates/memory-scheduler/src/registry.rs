//! Job registry for tracking periodic job status.
//!
//! Every registered job has a [`JobStatus`] recording when it last ran,
//! how long it took, how it ended and when it is due next.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a job execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobResult {
    /// Job completed successfully
    Success,
    /// Job returned an error or panicked
    Failed(String),
}

/// Stats a job reports back to the registry (e.g. chunks added).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobOutput {
    pub metadata: HashMap<String, String>,
}

impl JobOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}

/// Status of a registered job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_name: String,
    /// Nominal delay between runs
    pub interval_secs: u64,
    /// When the job last finished (if ever)
    pub last_run: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub last_result: Option<JobResult>,
    /// When the job is next due
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub error_count: u64,
    /// Failures since the last success
    pub consecutive_failures: u64,
    pub is_running: bool,
    #[serde(default)]
    pub last_run_metadata: HashMap<String, String>,
}

impl JobStatus {
    pub fn new(job_name: String, interval_secs: u64) -> Self {
        Self {
            job_name,
            interval_secs,
            last_run: None,
            last_duration_ms: None,
            last_result: None,
            next_run: None,
            run_count: 0,
            error_count: 0,
            consecutive_failures: 0,
            is_running: false,
            last_run_metadata: HashMap::new(),
        }
    }
}

/// Thread-safe registry of job status.
///
/// # Example
///
/// ```
/// use memory_scheduler::{JobRegistry, JobResult};
///
/// let registry = JobRegistry::new();
/// registry.register("corpus-sync", 300);
///
/// registry.record_start("corpus-sync");
/// assert!(registry.is_running("corpus-sync"));
///
/// registry.record_complete("corpus-sync", JobResult::Success, 1500);
/// assert!(!registry.is_running("corpus-sync"));
/// ```
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobStatus>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobStatus>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobStatus>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a job. Returns `false` if the name is already taken.
    pub fn register(&self, job_name: &str, interval_secs: u64) -> bool {
        let mut jobs = self.write();
        if jobs.contains_key(job_name) {
            return false;
        }
        jobs.insert(
            job_name.to_string(),
            JobStatus::new(job_name.to_string(), interval_secs),
        );
        true
    }

    pub fn record_start(&self, job_name: &str) {
        if let Some(status) = self.write().get_mut(job_name) {
            status.is_running = true;
            status.next_run = None;
        }
    }

    pub fn record_complete(&self, job_name: &str, result: JobResult, duration_ms: u64) {
        self.record_complete_with_metadata(job_name, result, duration_ms, HashMap::new());
    }

    pub fn record_complete_with_metadata(
        &self,
        job_name: &str,
        result: JobResult,
        duration_ms: u64,
        metadata: HashMap<String, String>,
    ) {
        if let Some(status) = self.write().get_mut(job_name) {
            status.is_running = false;
            status.last_run = Some(Utc::now());
            status.last_duration_ms = Some(duration_ms);
            status.run_count += 1;
            match result {
                JobResult::Failed(_) => {
                    status.error_count += 1;
                    status.consecutive_failures += 1;
                }
                JobResult::Success => status.consecutive_failures = 0,
            }
            status.last_result = Some(result);
            status.last_run_metadata = metadata;
        }
    }

    pub fn set_next_run(&self, job_name: &str, next: DateTime<Utc>) {
        if let Some(status) = self.write().get_mut(job_name) {
            status.next_run = Some(next);
        }
    }

    pub fn get_status(&self, job_name: &str) -> Option<JobStatus> {
        self.read().get(job_name).cloned()
    }

    /// All jobs, sorted by name.
    pub fn get_all_status(&self) -> Vec<JobStatus> {
        let mut all: Vec<JobStatus> = self.read().values().cloned().collect();
        all.sort_by(|a, b| a.job_name.cmp(&b.job_name));
        all
    }

    pub fn is_running(&self, job_name: &str) -> bool {
        self.read()
            .get(job_name)
            .map(|s| s.is_running)
            .unwrap_or(false)
    }

    pub fn is_registered(&self, job_name: &str) -> bool {
        self.read().contains_key(job_name)
    }

    pub fn job_count(&self) -> usize {
        self.read().len()
    }
}
