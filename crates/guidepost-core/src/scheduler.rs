#![forbid(unsafe_code)]

//! Deterministic timer queue.
//!
//! Every suspension point in the engine (poll intervals, deferred refreshes,
//! retries, timeouts) is an entry in a [`Scheduler`]. Entries carry a task
//! value instead of a closure so that the engine decides what a fired timer
//! means by reading its *current* state, not state captured at scheduling
//! time.
//!
//! # Ordering
//!
//! Timers fire in `(due, insertion sequence)` order. Two timers due at the
//! same instant fire in the order they were scheduled. A repeating timer is
//! re-armed before its task is handed out, so cancelling it from inside the
//! handler stops further firings.

use core::time::Duration;
use std::fmt;

/// Identifier of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    id: TimerId,
    due: Duration,
    seq: u64,
    repeat: Option<Duration>,
    task: T,
}

/// A fired timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<T> {
    pub id: TimerId,
    pub due: Duration,
    pub task: T,
}

/// Timer queue keyed by monotonic due time.
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    entries: Vec<Entry<T>>,
    next_id: u64,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
            next_seq: 0,
        }
    }
}

impl<T: Clone> Scheduler<T> {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a one-shot task `delay` after `now`.
    pub fn schedule_after(&mut self, now: Duration, delay: Duration, task: T) -> TimerId {
        self.insert(now.saturating_add(delay), None, task)
    }

    /// Schedule a repeating task first due `interval` after `now`.
    ///
    /// A zero interval is clamped to 1ms so a repeating task can never
    /// starve the queue.
    pub fn schedule_repeating(&mut self, now: Duration, interval: Duration, task: T) -> TimerId {
        let interval = interval.max(Duration::from_millis(1));
        self.insert(now.saturating_add(interval), Some(interval), task)
    }

    fn insert(&mut self, due: Duration, repeat: Option<Duration>, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let seq = self.bump_seq();
        self.entries.push(Entry {
            id,
            due,
            seq,
            repeat,
            task,
        });
        crate::trace!(timer = id.0, due_ms = due.as_millis() as u64, "timer scheduled");
        id
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Cancel a timer. Returns `true` if it was pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// Whether a timer is still pending.
    #[must_use]
    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Due time of the earliest pending timer.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.entries.iter().map(|e| e.due).min()
    }

    /// Pop the earliest timer due at or before `now`.
    ///
    /// Repeating timers are re-armed at `due + interval` and a clone of the
    /// task is returned.
    pub fn pop_due(&mut self, now: Duration) -> Option<Fired<T>> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= now)
            .min_by_key(|(_, e)| (e.due, e.seq))
            .map(|(i, _)| i)?;

        match self.entries[idx].repeat {
            Some(interval) => {
                let seq = self.bump_seq();
                let entry = &mut self.entries[idx];
                let fired = Fired {
                    id: entry.id,
                    due: entry.due,
                    task: entry.task.clone(),
                };
                entry.due = entry.due.saturating_add(interval);
                entry.seq = seq;
                Some(fired)
            }
            None => {
                let entry = self.entries.swap_remove(idx);
                Some(Fired {
                    id: entry.id,
                    due: entry.due,
                    task: entry.task,
                })
            }
        }
    }

    /// Drop every timer whose task does not satisfy `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.entries.retain(|e| keep(&e.task));
    }

    /// Number of pending timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no timers are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every timer.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
