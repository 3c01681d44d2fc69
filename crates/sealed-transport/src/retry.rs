//! Connection-level retry policy
//!
//! The client facade never interprets this policy; it is merged from
//! instance and call config and handed to the transport unmodified. Only
//! failures where no response arrived (connect errors, timeouts) are retried.

use std::time::Duration;

use serde::Deserialize;

/// Upper bound on any single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Retry settings for one transport send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub backoff_ms: u64,
    /// Growth factor per retry. 1.0 gives a fixed backoff.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 100,
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that sends exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Sleep before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let millis = (self.backoff_ms as f64 * factor).min(MAX_BACKOFF.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}
