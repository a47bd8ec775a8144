#![forbid(unsafe_code)]

//! Waiting for asynchronously rendered content before a tour starts.
//!
//! [`ReadinessWait`] is the scheduler-driven form: the engine calls
//! [`ReadinessWait::check`] from a timer and re-arms it with the returned
//! delay. [`wait_for`] is the blocking form for synchronous hosts. Both sit
//! on [`BoundedPoll`], so neither can hang.

use std::time::Duration;

use guidepost_core::clock::Sleeper;
use guidepost_core::poll::{self, BoundedPoll, PollOutcome};
use guidepost_core::surface::HostSurface;

use crate::condition::Condition;

/// Outcome of one readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessStatus {
    Ready,
    /// Check again after this delay.
    Waiting(Duration),
    TimedOut,
}

/// An in-flight readiness wait.
#[derive(Debug, Clone)]
pub struct ReadinessWait {
    condition: Condition,
    poll: BoundedPoll,
    started: Duration,
}

impl ReadinessWait {
    #[must_use]
    pub fn new(condition: Condition, now: Duration, interval: Duration, timeout: Duration) -> Self {
        Self {
            condition,
            poll: BoundedPoll::with_timeout(now, interval, timeout),
            started: now,
        }
    }

    /// Evaluate the condition at `now`.
    pub fn check(&mut self, now: Duration, surface: &dyn HostSurface) -> ReadinessStatus {
        let satisfied = self.condition.evaluate(surface);
        match self.poll.check(now, satisfied) {
            PollOutcome::Ready => ReadinessStatus::Ready,
            PollOutcome::Pending { retry_in } => ReadinessStatus::Waiting(retry_in),
            PollOutcome::Exhausted => ReadinessStatus::TimedOut,
        }
    }

    /// Time spent waiting as of `now`.
    #[must_use]
    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started)
    }

    #[must_use]
    pub fn condition(&self) -> &Condition {
        &self.condition
    }
}

/// Block until `condition` holds or `timeout` elapses.
pub fn wait_for(
    sleeper: &mut dyn Sleeper,
    surface: &dyn HostSurface,
    condition: &Condition,
    interval: Duration,
    timeout: Duration,
) -> bool {
    poll::wait_until(sleeper, interval, timeout, || condition.evaluate(surface))
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidepost_core::Rect;
    use guidepost_core::clock::DeterministicClock;
    use guidepost_harness::FakeSurface;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn ready_immediately() {
        let surface = FakeSurface::new("/");
        surface.add("#anchor", Rect::new(0, 0, 10, 10));
        let mut wait = ReadinessWait::new(Condition::exists("#anchor"), ms(0), ms(100), ms(5000));
        assert_eq!(wait.check(ms(0), &surface), ReadinessStatus::Ready);
    }

    #[test]
    fn becomes_ready_later() {
        let surface = FakeSurface::new("/");
        let cond = Condition::CollectionNonEmpty {
            locator: ".voice-item".into(),
        };
        let mut wait = ReadinessWait::new(cond, ms(0), ms(100), ms(5000));
        assert_eq!(wait.check(ms(0), &surface), ReadinessStatus::Waiting(ms(100)));
        assert_eq!(wait.check(ms(100), &surface), ReadinessStatus::Waiting(ms(100)));
        surface.add(".voice-item", Rect::new(0, 0, 10, 10));
        assert_eq!(wait.check(ms(200), &surface), ReadinessStatus::Ready);
        assert_eq!(wait.elapsed(ms(200)), ms(200));
    }

    #[test]
    fn times_out() {
        let surface = FakeSurface::new("/");
        let mut wait = ReadinessWait::new(Condition::exists("#never"), ms(0), ms(100), ms(250));
        let mut now = ms(0);
        loop {
            match wait.check(now, &surface) {
                ReadinessStatus::Waiting(dt) => now += dt,
                ReadinessStatus::TimedOut => break,
                ReadinessStatus::Ready => panic!("never-present element reported ready"),
            }
        }
        assert_eq!(now, ms(250));
    }

    #[test]
    fn blocking_wait_is_bounded() {
        let surface = FakeSurface::new("/");
        let mut clock = DeterministicClock::new();
        let ok = wait_for(&mut clock, &surface, &Condition::exists("#x"), ms(100), ms(1000));
        assert!(!ok);
        assert_eq!(clock.now(), ms(1000));

        surface.add("#x", Rect::new(0, 0, 1, 1));
        assert!(wait_for(&mut clock, &surface, &Condition::exists("#x"), ms(100), ms(1000)));
    }
}
