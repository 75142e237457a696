//! Reconnect delay computation

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff with additive jitter and a retry budget.
///
/// `delay(attempt) = min(initial_delay * 2^attempt, max_delay) + uniform[0, jitter_max)`
///
/// The base term never decreases with `attempt`; jitter only ever adds to it,
/// so many clients dropped at the same instant spread their reconnects out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter_max: Duration,
    /// Failed attempts allowed before the session is closed for good
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self { initial_delay, max_delay, jitter_max: Duration::from_secs(1), max_retries }
    }

    pub fn with_jitter(mut self, jitter_max: Duration) -> Self {
        self.jitter_max = jitter_max;
        self
    }

    /// Backoff term without jitter for a 0-based attempt
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay.checked_mul(factor).unwrap_or(self.max_delay).min(self.max_delay)
    }

    /// Delay before reconnect attempt `attempt + 1`, jittered with the thread RNG
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    /// Delay with a caller-supplied RNG
    pub fn delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        self.base_delay(attempt) + self.jitter(rng)
    }

    fn jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let max = self.jitter_max.as_nanos().min(u64::MAX as u128) as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(rng.gen_range(0..max))
    }

    /// Whether a failure at `attempt` is fatal
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(30_000), 10)
    }
}
