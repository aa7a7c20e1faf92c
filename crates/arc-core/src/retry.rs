// ── Retry policy ──
//
// Bounded exponential backoff shared by the state fetcher and the apply
// coordinator. The retry budget counts retries, not attempts: a budget of
// 3 allows up to 4 requests for one fetch or one operation.

use std::time::Duration;

use crate::error::DeviceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum retries of one fetch or one operation. Default: 3.
    pub retry_budget: u32,

    /// Delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 10s.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            retry_budget: 0,
            ..Self::default()
        }
    }

    pub fn with_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    /// Whether a request that failed with `err` after `attempt` attempts
    /// (1-based) should be sent again.
    pub fn should_retry(&self, attempt: u32, err: &DeviceError) -> bool {
        err.is_recoverable() && attempt <= self.retry_budget
    }

    /// Delay before retry number `retry` (0-based).
    #[allow(
        clippy::cast_possible_wrap,
        clippy::cast_possible_truncation,
        clippy::cast_lossless
    )]
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * 2.0_f64.powi(retry.min(31) as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        // Deterministic jitter seeded from the retry number.
        let jitter_factor = 1.0 + 0.25 * ((retry as f64 * 7.3).sin());
        let with_jitter = (capped * jitter_factor).max(0.0);

        Duration::from_secs_f64(with_jitter)
    }
}
