//! Retry policy for retryable backend failures.

use dronecmd_config::{Backoff, RetryConfig};
use dronecmd_core::TaxonomyError;
use std::time::Duration;

/// How many times to attempt a call and how long to wait in between.
///
/// `attempts` counts the first try, so `attempts = 3` means at most two
/// retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn none() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
            backoff: Backoff::Fixed,
            max_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            delay: Duration::from_millis(config.delay_ms),
            backoff: config.backoff,
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based)
    pub fn should_retry(&self, attempt: u32, err: &TaxonomyError) -> bool {
        err.is_retryable() && attempt < self.attempts
    }

    /// Wait after failed attempt number `attempt` (1-based).
    ///
    /// Rate-limit hints from the backend raise the wait, up to `max_delay`.
    pub fn delay_for(&self, attempt: u32, err: &TaxonomyError) -> Duration {
        let cap = self.max_delay.max(self.delay);
        let base = match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor).min(cap)
            }
        };
        match err.retry_after_ms() {
            Some(hint) => base.max(Duration::from_millis(hint).min(cap)),
            None => base,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
