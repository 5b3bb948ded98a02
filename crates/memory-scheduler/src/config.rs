//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{JitterConfig, SchedulerError};

/// Configuration for the scheduler service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Timeout in seconds for graceful shutdown.
    /// Running jobs get this long to finish before their tasks are aborted.
    /// Defaults to 30 seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl SchedulerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Timing of one periodic job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodicJobConfig {
    /// Delay between the end of one successful run and the start of the next
    pub interval_secs: u64,
    /// Delay before retrying after a failed or panicked run
    pub retry_backoff_secs: u64,
    /// Random extra delay added to each interval
    #[serde(default)]
    pub jitter: JitterConfig,
    /// Run once as soon as the scheduler starts
    #[serde(default)]
    pub run_immediately: bool,
}

impl PeriodicJobConfig {
    pub fn new(interval_secs: u64, retry_backoff_secs: u64) -> Self {
        Self {
            interval_secs,
            retry_backoff_secs,
            jitter: JitterConfig::none(),
            run_immediately: false,
        }
    }

    pub fn with_jitter(mut self, jitter: JitterConfig) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_run_immediately(mut self, run_immediately: bool) -> Self {
        self.run_immediately = run_immediately;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.interval_secs == 0 {
            return Err(SchedulerError::InvalidSchedule(
                "interval must be > 0".to_string(),
            ));
        }
        if self.retry_backoff_secs == 0 {
            return Err(SchedulerError::InvalidSchedule(
                "retry backoff must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.shutdown_timeout_secs, 30);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.shutdown_timeout_secs, 30);
    }

    #[test]
    fn test_periodic_config_validation() {
        assert!(PeriodicJobConfig::new(300, 60).validate().is_ok());
        assert!(matches!(
            PeriodicJobConfig::new(0, 60).validate(),
            Err(SchedulerError::InvalidSchedule(_))
        ));
        assert!(PeriodicJobConfig::new(300, 0).validate().is_err());
    }

    #[test]
    fn test_periodic_config_builders() {
        let config = PeriodicJobConfig::new(300, 60)
            .with_jitter(JitterConfig::new(5))
            .with_run_immediately(true);
        assert_eq!(config.interval(), Duration::from_secs(300));
        assert_eq!(config.retry_backoff(), Duration::from_secs(60));
        assert_eq!(config.jitter.max_jitter_secs, 5);
        assert!(config.run_immediately);
    }
}
