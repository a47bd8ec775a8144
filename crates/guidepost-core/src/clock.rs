#![forbid(unsafe_code)]

//! Monotonic time sources.
//!
//! The engine never reads wall-clock time. The host advances a
//! [`DeterministicClock`] explicitly, which makes every timer-driven
//! behavior reproducible in tests. Synchronous hosts that want to block on a
//! condition use a [`Sleeper`] instead.

use core::time::Duration;
use std::time::Instant;

/// Deterministic monotonic clock controlled by the host.
#[derive(Debug, Default, Clone)]
pub struct DeterministicClock {
    now: Duration,
}

impl DeterministicClock {
    /// Create a clock starting at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    /// Current monotonic time.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Set current monotonic time. Time never moves backwards.
    pub fn set(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Advance monotonic time by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }
}

/// A time source that can suspend the caller.
pub trait Sleeper {
    /// Current monotonic time.
    fn now(&self) -> Duration;

    /// Suspend for `dt`.
    fn sleep(&mut self, dt: Duration);
}

impl Sleeper for DeterministicClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep(&mut self, dt: Duration) {
        self.advance(dt);
    }
}

/// Real-time sleeper backed by `std::thread::sleep`.
#[derive(Debug, Clone)]
pub struct ThreadSleeper {
    origin: Instant,
}

impl ThreadSleeper {
    /// Create a sleeper whose `now()` starts at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for ThreadSleeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Sleeper for ThreadSleeper {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&mut self, dt: Duration) {
        std::thread::sleep(dt);
    }
}
