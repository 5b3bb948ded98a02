//! Scheduler service for periodic background jobs.
//!
//! Each registered job gets its own tokio task that sleeps for the job's
//! interval, runs the job, records the outcome in the [`JobRegistry`] and
//! goes back to sleep. A failed or panicked run is retried after the
//! job's backoff instead of the full interval. Runs of one job never
//! overlap: the next delay starts only after the previous run finished.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, warn};

use crate::{JobOutput, JobRegistry, JobResult, PeriodicJobConfig, SchedulerConfig, SchedulerError};

type JobFuture = Pin<Box<dyn Future<Output = Result<JobOutput, String>> + Send>>;
type JobFn = Arc<dyn Fn(CancellationToken) -> JobFuture + Send + Sync>;

#[derive(Clone)]
struct PeriodicJob {
    name: String,
    config: PeriodicJobConfig,
    run: JobFn,
}

/// Lifecycle owner for periodic jobs.
///
/// Jobs may be registered before or after [`start`](Self::start); jobs
/// registered on a running scheduler begin their loop right away.
pub struct SchedulerService {
    config: SchedulerConfig,
    registry: Arc<JobRegistry>,
    /// Replaced on every start, so a stopped scheduler can run again
    shutdown_token: Mutex<CancellationToken>,
    is_running: AtomicBool,
    jobs: Mutex<Vec<PeriodicJob>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SchedulerService {
    /// Create a scheduler. Nothing runs until `start()`.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(JobRegistry::new()),
            shutdown_token: Mutex::new(CancellationToken::new()),
            is_running: AtomicBool::new(false),
            jobs: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Token cancelled on the next shutdown. Long jobs should watch it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Register a job that runs every `config.interval_secs`.
    ///
    /// The job returns `Ok(JobOutput)` on success or `Err(reason)` on
    /// failure. Failures and panics are logged and retried after
    /// `config.retry_backoff_secs`; they never stop the loop.
    ///
    /// # Errors
    ///
    /// `InvalidSchedule` for a zero interval or backoff, `DuplicateJob`
    /// if `name` is taken.
    ///
    /// # Example
    ///
    /// ```ignore
    /// scheduler.register_periodic_job(
    ///     "corpus-sync",
    ///     PeriodicJobConfig::new(300, 60),
    ///     move |_token| {
    ///         let service = service.clone();
    ///         async move { service.sync().await.map(|_| JobOutput::new()).map_err(|e| e.to_string()) }
    ///     },
    /// ).await?;
    /// ```
    pub async fn register_periodic_job<F, Fut>(
        &self,
        name: &str,
        config: PeriodicJobConfig,
        job_fn: F,
    ) -> Result<(), SchedulerError>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<JobOutput, String>> + Send + 'static,
    {
        config.validate()?;
        if !self.registry.register(name, config.interval_secs) {
            return Err(SchedulerError::DuplicateJob(name.to_string()));
        }

        let run: JobFn = Arc::new(move |token: CancellationToken| Box::pin(job_fn(token)) as JobFuture);
        let job = PeriodicJob {
            name: name.to_string(),
            config,
            run,
        };

        info!(
            job = %job.name,
            interval_secs = job.config.interval_secs,
            retry_backoff_secs = job.config.retry_backoff_secs,
            jitter_secs = job.config.jitter.max_jitter_secs,
            "Job registered"
        );

        if self.is_running() {
            self.spawn(job.clone());
        }
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job);
        Ok(())
    }

    /// Start every registered job loop.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::AlreadyRunning` if already started.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        {
            let mut token = self
                .shutdown_token
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if token.is_cancelled() {
                *token = CancellationToken::new();
            }
        }

        let jobs = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for job in jobs {
            self.spawn(job);
        }

        info!(jobs = self.registry.job_count(), "Scheduler started");
        Ok(())
    }

    /// Stop all job loops.
    ///
    /// Cancels the shutdown token, then waits up to
    /// `shutdown_timeout_secs` for in-flight runs to finish before
    /// aborting them.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotRunning` if the scheduler is not started.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Initiating scheduler shutdown");
        self.shutdown_token().cancel();

        let handles =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let drain = async {
            for handle in handles {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(self.config.shutdown_timeout(), drain)
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.config.shutdown_timeout_secs,
                "Jobs did not finish in time, aborting"
            );
            for abort in aborts {
                abort.abort();
            }
        }

        info!("Scheduler shutdown complete");
        Ok(())
    }

    fn spawn(&self, job: PeriodicJob) {
        let handle = tokio::spawn(run_job_loop(
            job,
            self.registry.clone(),
            self.shutdown_token(),
        ));
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }
}

async fn run_job_loop(job: PeriodicJob, registry: Arc<JobRegistry>, token: CancellationToken) {
    let mut delay = if job.config.run_immediately {
        Duration::ZERO
    } else {
        job.config.jitter.apply(job.config.interval())
    };

    loop {
        let next = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        registry.set_next_run(&job.name, Utc::now() + next);

        tokio::select! {
            _ = token.cancelled() => {
                debug!(job = %job.name, "Job loop cancelled");
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        registry.record_start(&job.name);
        debug!(job = %job.name, "Job started");
        let started = Instant::now();

        // A panicking run surfaces as a JoinError instead of killing the loop.
        // The handle aborts the run if this loop is aborted on shutdown.
        let outcome = AbortOnDropHandle::new(tokio::spawn((job.run)(token.clone()))).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        delay = match outcome {
            Ok(Ok(output)) => {
                registry.record_complete_with_metadata(
                    &job.name,
                    JobResult::Success,
                    duration_ms,
                    output.metadata,
                );
                info!(job = %job.name, duration_ms, "Job completed");
                job.config.jitter.apply(job.config.interval())
            }
            Ok(Err(reason)) => {
                registry.record_complete(&job.name, JobResult::Failed(reason.clone()), duration_ms);
                warn!(
                    job = %job.name,
                    error = %reason,
                    retry_in_secs = job.config.retry_backoff_secs,
                    "Job failed"
                );
                job.config.retry_backoff()
            }
            Err(join_error) => {
                let reason = if join_error.is_panic() {
                    "job panicked".to_string()
                } else {
                    "job task cancelled".to_string()
                };
                registry.record_complete(&job.name, JobResult::Failed(reason.clone()), duration_ms);
                error!(
                    job = %job.name,
                    error = %reason,
                    retry_in_secs = job.config.retry_backoff_secs,
                    "Job did not complete"
                );
                job.config.retry_backoff()
            }
        };
    }
}
