//! Rate limiter shared by every outgoing request.
//!
//! The budget records when each admitted request started. A slot is granted
//! only while fewer than `limit` admissions fall inside the trailing
//! `window_duration`, so no span of that length, boundaries included, ever
//! sees more than `limit` requests. Pruning, checking and recording happen
//! under one lock with no `.await` in between, so two tasks can never both
//! take the last slot.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::govinfo::error::{ApiError, ErrorKind};

/// Mutable window accounting.
#[derive(Debug, Clone)]
pub struct RateBudget {
    /// Admission times inside the trailing window, oldest first.
    admitted: VecDeque<Instant>,
    /// Maximum requests per window.
    pub limit: u32,
    /// Length of a window.
    pub window_duration: Duration,
}

impl RateBudget {
    fn new(limit: u32, window_duration: Duration) -> Self {
        Self {
            admitted: VecDeque::new(),
            limit,
            window_duration,
        }
    }

    /// Forgets admissions that have left the window ending at `now`.
    fn prune(&mut self, now: Instant) {
        while self
            .admitted
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.window_duration)
        {
            self.admitted.pop_front();
        }
    }

    /// Requests admitted within the trailing window.
    fn count(&self) -> u32 {
        u32::try_from(self.admitted.len()).unwrap_or(u32::MAX)
    }

    /// Takes a slot if one is free, otherwise returns how long until the
    /// oldest admission leaves the window.
    fn take(&mut self, now: Instant) -> Result<(), Duration> {
        self.prune(now);
        if self.count() < self.limit {
            self.admitted.push_back(now);
            return Ok(());
        }
        let oldest = self.admitted.front().copied().unwrap_or(now);
        Err((oldest + self.window_duration).saturating_duration_since(now))
    }
}

/// Gates outgoing requests to `limit` per trailing `window_duration`.
#[derive(Debug)]
pub struct RateLimiter {
    budget: Mutex<RateBudget>,
}

impl RateLimiter {
    /// Creates a limiter admitting `limit` requests per `window_duration`.
    ///
    /// A `limit` of zero is treated as one.
    #[must_use]
    pub fn new(limit: u32, window_duration: Duration) -> Self {
        Self {
            budget: Mutex::new(RateBudget::new(limit.max(1), window_duration)),
        }
    }

    /// Waits until a slot is available and takes it.
    ///
    /// Dropping the returned future before it completes takes no slot.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.lock().take(Instant::now()) {
                Ok(()) => return,
                Err(wait) => wait,
            };
            tracing::debug!(wait_ms = wait.as_millis(), "Rate budget exhausted, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up after `deadline`.
    ///
    /// # Errors
    ///
    /// Returns a `RateLimited` error if no slot became available in time.
    pub async fn acquire_within(&self, deadline: Duration) -> Result<(), ApiError> {
        tokio::time::timeout(deadline, self.acquire())
            .await
            .map_err(|_| {
                ApiError::new(
                    ErrorKind::RateLimited,
                    format!(
                        "local rate budget exhausted; no slot within {}ms",
                        deadline.as_millis()
                    ),
                )
            })
    }

    /// Takes a slot without waiting. Returns `false` if the budget is spent.
    pub fn try_acquire(&self) -> bool {
        self.lock().take(Instant::now()).is_ok()
    }

    /// Returns the number of slots used in the trailing window.
    pub fn used(&self) -> u32 {
        let mut budget = self.lock();
        budget.prune(Instant::now());
        budget.count()
    }

    /// Returns the configured per-window limit.
    pub fn limit(&self) -> u32 {
        self.lock().limit
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateBudget> {
        self.budget.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
