use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::StageError;

/// Bounded retry around a single stage invocation.
///
/// Only transient errors are retried and only the failing stage is invoked
/// again; stages that already succeeded are never re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A single attempt with no retry.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.backoff_ms))
    }

    /// Whether attempt number `attempt` (1-based) that failed with `error`
    /// should be followed by another one.
    pub fn should_retry(&self, attempt: u32, error: &StageError) -> bool {
        error.is_transient() && attempt < self.max_attempts
    }

    /// Delay before the attempt that follows `attempt`. Grows linearly.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
