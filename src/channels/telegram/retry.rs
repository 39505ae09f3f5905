//! Backoff policy for Bot API calls
//!
//! Flood control (429) and server errors are retried; anything else is final.
//! A server-supplied `retry_after` overrides the computed backoff.

use std::time::{Duration, SystemTime};

use reqwest::StatusCode;

/// What to do with a failed Bot API call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Give up and surface the error
    Fail,
    /// Try again, optionally after the server-requested wait
    Retry(Option<Duration>),
}

/// Retry limits for Bot API calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff step; doubles every attempt
    pub base_delay: Duration,
    /// Upper bound on any single wait
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Wait before retry number `attempt` (zero-based)
    ///
    /// Up to 25% jitter is added to the exponential step, taken from the
    /// clock's subsecond nanos.
    #[must_use]
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(wait) = retry_after {
            return wait.min(self.max_delay);
        }

        let step = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);

        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        let jitter = step.mul_f64(f64::from(nanos % 250) / 1000.0);

        (step + jitter).min(self.max_delay)
    }
}

/// Classify an HTTP failure from the Bot API
#[must_use]
pub fn classify(status: StatusCode, retry_after_secs: Option<u64>) -> Disposition {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Disposition::Retry(retry_after_secs.map(Duration::from_secs))
    } else {
        Disposition::Fail
    }
}

/// Whether a transport-level error is worth another attempt
#[must_use]
pub fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}
