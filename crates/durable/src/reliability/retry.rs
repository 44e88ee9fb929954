//! Retry policy for failed polls

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Delay schedule applied after consecutive poll failures
///
/// The default reproduces a fixed two second pause with no retry ceiling.
///
/// # Example
///
/// ```
/// use swflow_durable::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential()
///     .with_max_attempts(Some(10))
///     .with_initial_interval(Duration::from_millis(500))
///     .with_max_interval(Duration::from_secs(30));
///
/// // First failure waits ~0.5s, second ~1s, third ~2s, ...
/// assert!(policy.has_attempts_remaining(9));
/// assert!(!policy.has_attempts_remaining(10));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated before giving up; `None` retries forever
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Delay after the first failure
    #[serde(with = "super::duration_millis")]
    pub initial_interval: Duration,

    /// Upper bound of any single delay
    #[serde(with = "super::duration_millis")]
    pub max_interval: Duration,

    /// Backoff multiplier (e.g., 2.0 for exponential)
    pub backoff_coefficient: f64,

    /// Jitter factor (0.0-1.0) to add randomness
    ///
    /// A value of 0.1 means ±10% randomness.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(2))
    }
}

impl RetryPolicy {
    /// Exponential backoff, 1s doubling up to 60s with 10% jitter, unbounded
    pub fn exponential() -> Self {
        Self {
            max_attempts: None,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
            backoff_coefficient: 2.0,
            jitter: 0.1,
        }
    }

    /// Same delay after every failure, unbounded
    pub fn fixed(interval: Duration) -> Self {
        Self {
            max_attempts: None,
            initial_interval: interval,
            max_interval: interval,
            backoff_coefficient: 1.0,
            jitter: 0.0,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Set the backoff coefficient (values below 1.0 are raised to 1.0)
    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient.max(1.0);
        self
    }

    /// Set the jitter factor (0.0-1.0)
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay to wait after the `failures`-th consecutive failure (1-based)
    pub fn delay_for_failure(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let exponent = (failures - 1).min(i32::MAX as u32) as i32;
        let base = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = base.min(self.max_interval.as_secs_f64());

        let jittered = if self.jitter > 0.0 && capped > 0.0 {
            let jitter_range = capped * self.jitter;
            let jitter_offset = rand::thread_rng().gen_range(-jitter_range..jitter_range);
            (capped + jitter_offset).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered)
    }

    /// Check if another poll may follow `failures` consecutive failures
    pub fn has_attempts_remaining(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures < max)
    }
}
