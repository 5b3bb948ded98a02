//! Jitter for periodic jobs.
//!
//! Adds a random delay on top of a job's interval so runs drift instead of
//! landing on exact multiples of the interval.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Maximum random delay added to each interval (0 = none).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JitterConfig {
    pub max_jitter_secs: u64,
}

impl JitterConfig {
    pub fn new(max_jitter_secs: u64) -> Self {
        Self { max_jitter_secs }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.max_jitter_secs > 0
    }

    /// A random delay in `[0, max_jitter_secs)`, millisecond resolution.
    pub fn sample(&self) -> Duration {
        if !self.is_enabled() {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..self.max_jitter_secs * 1000))
    }

    /// `base` plus a fresh sample.
    pub fn apply(&self, base: Duration) -> Duration {
        base + self.sample()
    }
}
