//! Per-provider circuit breaker.
//!
//! # State machine
//!
//! ```text
//!   Closed ──(requests >= 3 and failures/requests >= failure_ratio)──> Open
//!   Open ──(timeout elapsed)──> HalfOpen
//!   HalfOpen ──(max_requests consecutive successes)──> Closed
//!   HalfOpen ──(any failure)──> Open
//! ```
//!
//! While closed, counts accumulate in a sliding window of `interval` and are
//! reset when the window rolls over. While open, every call fails fast with
//! [`ProviderError::CircuitOpen`] without touching the wrapped operation.
//! While half-open, at most `max_requests` trial calls are admitted.
//!
//! The retry layer sits inside the breaker: one breaker call consumes all
//! retry attempts, and a terminally failed fetch counts as one failure.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::ProviderError;

/// Minimum observed requests in a window before the trip rule applies.
const MIN_REQUESTS_TO_TRIP: u32 = 3;

/// Circuit breaker thresholds and timing.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Trial calls admitted while half-open; also the number of consecutive
    /// successes needed to close again.
    pub max_requests: u32,
    /// Sliding window over which closed-state counts accumulate.
    /// Zero disables the rollover (counts accumulate forever).
    pub interval: Duration,
    /// How long to stay open before probing with half-open trials.
    pub timeout: Duration,
    /// Failure ratio at or above which the breaker trips.
    pub failure_ratio: f64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_requests: 3,
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
            failure_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    requests: u32,
    failures: u32,
    consecutive_successes: u32,
}

#[derive(Debug)]
struct Shared {
    state: BreakerState,
    /// Bumped on every state change and window rollover; outcomes reported
    /// against a stale generation are discarded.
    generation: u64,
    counts: Counts,
    /// When the current open period or closed window expires.
    deadline: Option<Instant>,
}

/// Shared, thread-safe circuit breaker. One instance per provider; counters
/// are mutated from all concurrent callers under the internal lock.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    shared: Mutex<Shared>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let deadline = window_deadline(&config);
        Self {
            name: name.into(),
            config,
            shared: Mutex::new(Shared {
                state: BreakerState::Closed,
                generation: 0,
                counts: Counts::default(),
                deadline,
            }),
        }
    }

    /// Runs `operation` under the breaker. Fails fast with
    /// [`ProviderError::CircuitOpen`] when the breaker refuses the call;
    /// otherwise the operation's own result is passed through and its
    /// outcome feeds the state machine.
    pub async fn call<T, F>(&self, operation: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let generation = self.before_call()?;
        let result = operation.await;
        self.after_call(generation, result.is_ok());
        result
    }

    /// Current state, after applying any due time-based transition.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        let mut shared = self.lock();
        self.advance(&mut shared);
        shared.state
    }

    fn before_call(&self) -> Result<u64, ProviderError> {
        let mut shared = self.lock();
        self.advance(&mut shared);

        match shared.state {
            BreakerState::Open => Err(ProviderError::CircuitOpen),
            BreakerState::HalfOpen if shared.counts.requests >= self.config.max_requests => {
                Err(ProviderError::CircuitOpen)
            }
            _ => {
                shared.counts.requests += 1;
                Ok(shared.generation)
            }
        }
    }

    fn after_call(&self, generation: u64, success: bool) {
        let mut shared = self.lock();
        self.advance(&mut shared);
        if shared.generation != generation {
            // The window rolled or the state changed while the call was in
            // flight; its outcome no longer belongs to the live counts.
            return;
        }

        if success {
            shared.counts.consecutive_successes += 1;
            if shared.state == BreakerState::HalfOpen
                && shared.counts.consecutive_successes >= self.config.max_requests
            {
                self.transition(&mut shared, BreakerState::Closed);
            }
        } else {
            shared.counts.failures += 1;
            shared.counts.consecutive_successes = 0;
            match shared.state {
                BreakerState::HalfOpen => self.transition(&mut shared, BreakerState::Open),
                BreakerState::Closed if self.ready_to_trip(&shared.counts) => {
                    self.transition(&mut shared, BreakerState::Open);
                }
                _ => {}
            }
        }
    }

    fn ready_to_trip(&self, counts: &Counts) -> bool {
        counts.requests >= MIN_REQUESTS_TO_TRIP
            && f64::from(counts.failures) / f64::from(counts.requests) >= self.config.failure_ratio
    }

    /// Applies due time-based transitions: open -> half-open after `timeout`,
    /// and closed-window rollover after `interval`.
    fn advance(&self, shared: &mut Shared) {
        let Some(deadline) = shared.deadline else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }

        match shared.state {
            BreakerState::Open => self.transition(shared, BreakerState::HalfOpen),
            BreakerState::Closed => {
                shared.generation += 1;
                shared.counts = Counts::default();
                shared.deadline = window_deadline(&self.config);
            }
            BreakerState::HalfOpen => {}
        }
    }

    fn transition(&self, shared: &mut Shared, to: BreakerState) {
        let from = shared.state;
        shared.state = to;
        shared.generation += 1;
        shared.counts = Counts::default();
        shared.deadline = match to {
            BreakerState::Open => Some(Instant::now() + self.config.timeout),
            BreakerState::Closed => window_deadline(&self.config),
            BreakerState::HalfOpen => None,
        };

        tracing::warn!(
            provider = %self.name,
            from = from.as_str(),
            state = to.as_str(),
            "circuit breaker state changed"
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        // A poisoned lock means a panic mid-transition; the counters are
        // still structurally valid, so keep serving.
        self.shared.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn window_deadline(config: &BreakerConfig) -> Option<Instant> {
    if config.interval.is_zero() {
        None
    } else {
        Some(Instant::now() + config.interval)
    }
}
