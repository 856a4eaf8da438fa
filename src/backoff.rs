//! Exponential reconnection backoff.
//!
//! `delay = min(base * 2^attempt, max)`, with a hard cap on the number of
//! consecutive failures. The policy is a pure value; the connection manager
//! owns the attempt counter and resets it when a session opens.

use std::time::Duration;

/// What to do after the `attempt`-th consecutive failure (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry(Duration),
    GiveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt.
    pub base_delay: Duration,

    /// Upper bound on any single delay.
    pub max_delay: Duration,

    /// Consecutive failures tolerated before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: Some(5),
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }

    pub fn decide(&self, attempt: u32) -> ReconnectDecision {
        if let Some(max) = self.max_attempts
            && attempt >= max
        {
            return ReconnectDecision::GiveUp;
        }

        ReconnectDecision::Retry(self.delay_for(attempt))
    }

    /// Capped exponential delay, saturating instead of overflowing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Spread a delay by up to `±ratio` so many clients do not reconnect in lockstep.
pub fn apply_jitter(delay: Duration, ratio: f64) -> Duration {
    if ratio <= 0.0 {
        return delay;
    }
    let ratio = ratio.min(1.0);
    let factor = 1.0 + ratio * (fastrand::f64() * 2.0 - 1.0);
    delay.mul_f64(factor.max(0.0))
}
