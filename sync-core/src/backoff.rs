//! Exponential retry delays for failed drains.
//!
//! Formula: `min(ceiling, seed * 2^(attempt - 1)) + random(0..=jitter)`.
//!
//! Jitter is off by default so that delays are reproducible under a
//! simulated clock; enable it when many devices may come back online
//! together after an outage.

use std::time::Duration;

/// Default delay after the first failed drain.
pub const DEFAULT_BACKOFF_SEED: Duration = Duration::from_secs(2);

/// Default upper bound for the exponential part of the delay.
pub const DEFAULT_BACKOFF_CEILING: Duration = Duration::from_secs(300);

/// Retry delay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub seed: Duration,
    /// Cap on the exponential part of the delay.
    pub ceiling: Duration,
    /// Maximum random jitter added on top (zero disables jitter).
    pub jitter: Duration,
}

impl BackoffPolicy {
    /// Create a policy without jitter.
    pub fn new(seed: Duration, ceiling: Duration) -> Self {
        Self {
            seed,
            ceiling: ceiling.max(seed),
            jitter: Duration::ZERO,
        }
    }

    /// Add up to `jitter` of random delay to every retry.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    ///
    /// Attempt 0 means "no failure yet" and yields zero.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        1u32.checked_shl(attempt - 1)
            .and_then(|factor| self.seed.checked_mul(factor))
            .map_or(self.ceiling, |delay| delay.min(self.ceiling))
    }

    /// Delay before retry number `attempt`, jitter included.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay(attempt) + random_jitter(self.jitter)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_SEED, DEFAULT_BACKOFF_CEILING)
    }
}

/// Random duration in `0..=max`, at millisecond granularity.
fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let mut bytes = [0u8; 8];
    // No entropy is not worth failing a retry over; fall back to no jitter.
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    Duration::from_millis(u64::from_le_bytes(bytes) % (max_ms + 1))
}
