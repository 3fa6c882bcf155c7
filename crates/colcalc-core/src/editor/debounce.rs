//! Cancellable one-shot timers driven by an explicit clock.
//!
//! The editor never sleeps or spawns: the host passes `Instant`s in and
//! polls. Every `schedule` bumps a generation counter, so a handle from an
//! earlier schedule can be recognised as stale and never fires.

use std::time::{Duration, Instant};

/// Identifies one scheduling of a [`Debouncer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    generation: u64,
    pending: Option<(TimerHandle, Instant)>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule a firing `delay` after `now`, replacing any pending one.
    pub fn schedule(&mut self, now: Instant) -> TimerHandle {
        self.generation += 1;
        let handle = TimerHandle {
            generation: self.generation,
        };
        self.pending = Some((handle, now + self.delay));
        handle
    }

    /// Drop the pending firing. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// True if `handle` came from the most recent `schedule`.
    pub fn is_current(&self, handle: TimerHandle) -> bool {
        handle.generation == self.generation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(_, due)| due)
    }

    /// Fire the pending timer if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<TimerHandle> {
        match self.pending {
            Some((handle, due)) if now >= due => {
                self.pending = None;
                Some(handle)
            }
            _ => None,
        }
    }

    /// Fire the pending timer regardless of its deadline.
    pub fn flush(&mut self) -> Option<TimerHandle> {
        self.pending.take().map(|(handle, _)| handle)
    }
}
