//! Transport-level retry policy with exponential backoff and jitter.
//!
//! Network errors and 5xx responses are retryable; 4xx responses are
//! terminal. A policy covers a single logical fetch: `max_attempts` counts
//! total attempts, not retries.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;

/// Whether a failed attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    Terminal,
}

/// 5xx responses are retryable; everything else (including 4xx) is terminal.
#[must_use]
pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::Terminal
    }
}

/// Connection-level failures are retryable; protocol misuse is not.
#[must_use]
pub fn classify_transport_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::Terminal
    }
}

/// Exponential backoff: `wait_time * 2^(n-1)` capped at `max_wait_time`,
/// plus a uniform random jitter of up to half the base wait time.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero behaves like one.
    pub max_attempts: u32,
    pub wait_time: Duration,
    pub max_wait_time: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait_time: Duration::from_secs(1),
            max_wait_time: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Deterministic backoff component for the given 1-based attempt number.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.wait_time.saturating_mul(factor).min(self.max_wait_time)
    }

    /// Backoff plus jitter, as slept between attempts.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_delay(attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let span_ms = (self.wait_time.as_millis() / 2) as u64;
        if span_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=span_ms))
    }
}
