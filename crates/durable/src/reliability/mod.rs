//! Reliability patterns for the poll loop
//!
//! This module provides:
//! - [`RetryPolicy`] - Delay schedule and retry ceiling after failed polls
//! - [`CircuitBreaker`] - Suspends polling against a persistently failing service

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::RetryPolicy;

/// Serde support for Duration as milliseconds
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_durations_serialize_as_millis() {
        let retry = serde_json::to_value(RetryPolicy::fixed(Duration::from_millis(1500))).unwrap();
        assert_eq!(retry["initial_interval"], 1500);

        let breaker = serde_json::to_value(
            CircuitBreakerConfig::new().with_reset_timeout(Duration::from_secs(3)),
        )
        .unwrap();
        assert_eq!(breaker["reset_timeout"], 3000);
    }
}
