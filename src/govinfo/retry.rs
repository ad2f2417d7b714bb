//! Bounded retry with exponential backoff.
//!
//! A [`RetryState`] lives for one logical request. Each failed attempt bumps
//! the counter; while it is below `max_attempts` the caller sleeps for
//! `backoff_base * 2^attempt` and tries again.

use std::time::Duration;

use rand::Rng;

/// Retry settings shared by all requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Hard ceiling on physical attempts per logical request.
    pub max_attempts: u32,
    /// Base delay, doubled for every failed attempt.
    pub backoff_base: Duration,
    /// Add up to 30% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Starts tracking a new logical request.
    #[must_use]
    pub const fn start(&self) -> RetryState {
        RetryState {
            attempt: 0,
            max_attempts: self.max_attempts,
            backoff_base: self.backoff_base,
            jitter: self.jitter,
        }
    }
}

/// Per-request retry counter.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
    backoff_base: Duration,
    jitter: bool,
}

impl RetryState {
    /// Number of failed attempts so far.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Records a failed attempt.
    ///
    /// Returns the delay to wait before the next attempt, or `None` once
    /// `max_attempts` has been reached.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }
        Some(self.delay_for(self.attempt))
    }

    /// Backoff for the given attempt number.
    ///
    /// Jitter is at most 30% of the un-jittered delay, so delays stay
    /// strictly increasing across attempts.
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        let delay = self.backoff_base.saturating_mul(factor);
        if !self.jitter {
            return delay;
        }
        let fraction: f64 = rand::rng().random_range(0.0..0.3);
        delay + delay.mul_f64(fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32, jitter: bool) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_base: Duration::from_millis(100),
            jitter,
        }
    }

    #[test]
    fn stops_at_max_attempts() {
        let mut state = policy(3, false).start();
        assert_eq!(state.record_failure(), Some(Duration::from_millis(200)));
        assert_eq!(state.record_failure(), Some(Duration::from_millis(400)));
        assert_eq!(state.record_failure(), None);
        assert_eq!(state.attempt(), 3);
    }

    #[test]
    fn single_attempt_never_retries() {
        let mut state = policy(1, false).start();
        assert_eq!(state.record_failure(), None);
    }

    #[test]
    fn jittered_delays_strictly_increase() {
        for _ in 0..50 {
            let mut state = policy(6, true).start();
            let mut previous = Duration::ZERO;
            while let Some(delay) = state.record_failure() {
                assert!(delay > previous, "{delay:?} <= {previous:?}");
                previous = delay;
            }
        }
    }

    #[test]
    fn large_attempt_counts_saturate() {
        let state = policy(100, false).start();
        let delay = state.delay_for(40);
        assert!(delay >= Duration::from_millis(100) * 65536);
    }
}
