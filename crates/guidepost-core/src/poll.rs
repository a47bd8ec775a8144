#![forbid(unsafe_code)]

//! Bounded polling.
//!
//! [`BoundedPoll`] is the one polling primitive shared by readiness waits,
//! advancement guards, and expansion retries. It holds no closure and never
//! sleeps: the caller evaluates its condition, feeds the result to
//! [`BoundedPoll::check`], and schedules the next check with the returned
//! delay. Because every poll carries a deadline or an attempt budget, a
//! condition that never becomes true always ends in
//! [`PollOutcome::Exhausted`].
//!
//! [`wait_until`] wraps the same primitive in a blocking loop for hosts that
//! can afford to block.

use core::time::Duration;

use crate::clock::Sleeper;

/// How a poll is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBound {
    /// Give up once this much time has elapsed since the poll started.
    Timeout(Duration),
    /// Give up after this many failed checks.
    Attempts(u32),
}

/// Result of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The condition holds.
    Ready,
    /// Check again after the given delay.
    Pending { retry_in: Duration },
    /// The bound was reached without the condition holding.
    Exhausted,
}

/// State of one bounded poll.
#[derive(Debug, Clone)]
pub struct BoundedPoll {
    interval: Duration,
    bound: PollBound,
    started: Duration,
    attempts: u32,
    finished: bool,
}

impl BoundedPoll {
    /// Create a poll started at `now`.
    #[must_use]
    pub fn new(now: Duration, interval: Duration, bound: PollBound) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            bound,
            started: now,
            attempts: 0,
            finished: false,
        }
    }

    /// Time-bounded poll.
    #[must_use]
    pub fn with_timeout(now: Duration, interval: Duration, timeout: Duration) -> Self {
        Self::new(now, interval, PollBound::Timeout(timeout))
    }

    /// Attempt-bounded poll.
    #[must_use]
    pub fn with_attempts(now: Duration, interval: Duration, max_attempts: u32) -> Self {
        Self::new(now, interval, PollBound::Attempts(max_attempts.max(1)))
    }

    /// Feed one evaluation of the condition taken at `now`.
    ///
    /// Once the poll has returned `Ready` or `Exhausted` it keeps returning
    /// that terminal outcome's equivalent: further checks report `Exhausted`
    /// unless `satisfied` is true.
    pub fn check(&mut self, now: Duration, satisfied: bool) -> PollOutcome {
        self.attempts = self.attempts.saturating_add(1);
        if satisfied {
            self.finished = true;
            crate::trace!(attempts = self.attempts, "poll satisfied");
            return PollOutcome::Ready;
        }
        if self.finished {
            return PollOutcome::Exhausted;
        }
        match self.bound {
            PollBound::Timeout(timeout) => {
                let deadline = self.started.saturating_add(timeout);
                if now >= deadline {
                    self.finished = true;
                    crate::debug!(attempts = self.attempts, "poll timed out");
                    PollOutcome::Exhausted
                } else {
                    let remaining = deadline - now;
                    PollOutcome::Pending {
                        retry_in: self.interval.min(remaining),
                    }
                }
            }
            PollBound::Attempts(max) => {
                if self.attempts >= max {
                    self.finished = true;
                    crate::debug!(attempts = self.attempts, "poll attempts exhausted");
                    PollOutcome::Exhausted
                } else {
                    PollOutcome::Pending {
                        retry_in: self.interval,
                    }
                }
            }
        }
    }

    /// Number of checks performed so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Poll interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the poll reached a terminal outcome.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Block until `predicate` holds or `timeout` elapses.
///
/// The predicate is evaluated immediately, then every `interval`. Returns
/// `true` if it held, `false` on timeout; never blocks longer than `timeout`
/// plus one predicate evaluation.
pub fn wait_until(
    sleeper: &mut dyn Sleeper,
    interval: Duration,
    timeout: Duration,
    mut predicate: impl FnMut() -> bool,
) -> bool {
    let mut poll = BoundedPoll::with_timeout(sleeper.now(), interval, timeout);
    loop {
        match poll.check(sleeper.now(), predicate()) {
            PollOutcome::Ready => return true,
            PollOutcome::Exhausted => return false,
            PollOutcome::Pending { retry_in } => sleeper.sleep(retry_in),
        }
    }
}
