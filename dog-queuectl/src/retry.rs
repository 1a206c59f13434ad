use std::time::Duration;

use crate::config::QueueConfig;

/// Retry budget and exponential backoff for failed jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Budget given to jobs enqueued without an override
    pub default_max_retries: u32,
    /// Delay after the n-th failure is `backoff_base^n` seconds
    pub backoff_base: u32,
    /// Ceiling on a single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            default_max_retries: config.max_retries,
            backoff_base: config.backoff_base,
            max_backoff: Duration::from_secs(config.max_backoff_seconds),
        }
    }

    /// Delay before a job that has failed `attempts` times runs again
    pub fn backoff(&self, attempts: u32) -> Duration {
        let seconds = u64::from(self.backoff_base)
            .checked_pow(attempts)
            .unwrap_or(u64::MAX);
        Duration::from_secs(seconds).min(self.max_backoff)
    }

    /// Same as [`backoff`](Self::backoff), as a chrono offset
    pub fn backoff_offset(&self, attempts: u32) -> chrono::Duration {
        // chrono caps durations at i64::MAX milliseconds
        let seconds = self.backoff(attempts).as_secs().min(i64::MAX as u64 / 1000);
        chrono::Duration::seconds(seconds as i64)
    }
}
