//! Test doubles for the clock contracts.
//!
//! [`ManualClock`] gives tests full control of "now", including stepping
//! across the tick wraparound. [`RecordingRescheduler`] captures every
//! reschedule request for later inspection.

#![cfg(any(test, feature = "std"))]

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::clock::{Clock, Rescheduler, Tick};
use crate::lock::{CriticalLock, Mutex};

/// Number of reschedule deltas a [`RecordingRescheduler`] keeps.
pub const RECORD_DEPTH: usize = 64;

/// Settable clock. `wait` advances virtual time instead of sleeping.
pub struct ManualClock {
    now: AtomicU32,
}

impl ManualClock {
    /// Clock reading `start`.
    pub const fn new(start: Tick) -> Self {
        Self {
            now: AtomicU32::new(start),
        }
    }

    /// Jump to `tick`.
    pub fn set(&self, tick: Tick) {
        self.now.store(tick, Ordering::SeqCst);
    }

    /// Move forward by `delta`, wrapping like real hardware.
    pub fn advance(&self, delta: Tick) {
        // fetch_add on atomics wraps on overflow.
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        self.now.load(Ordering::SeqCst)
    }

    fn wait(&self, delta: Tick) {
        self.advance(delta);
    }
}

/// Rescheduler that records each requested delta, oldest first.
///
/// Once [`RECORD_DEPTH`] deltas are held, later ones are counted but not
/// stored.
pub struct RecordingRescheduler {
    deltas: Mutex<CriticalLock, RefCell<heapless::Vec<Tick, RECORD_DEPTH>>>,
    calls: AtomicU32,
}

impl RecordingRescheduler {
    /// Empty record.
    pub const fn new() -> Self {
        Self {
            deltas: Mutex::new(RefCell::new(heapless::Vec::new())),
            calls: AtomicU32::new(0),
        }
    }

    /// Recorded deltas, oldest first.
    pub fn deltas(&self) -> Vec<Tick> {
        self.deltas.lock(|d| d.borrow().to_vec())
    }

    /// Most recent delta, if any was stored.
    pub fn last(&self) -> Option<Tick> {
        self.deltas.lock(|d| d.borrow().last().copied())
    }

    /// Total number of reschedule calls, stored or not.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.deltas.lock(|d| d.borrow_mut().clear());
        self.calls.store(0, Ordering::SeqCst);
    }
}

impl Default for RecordingRescheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Rescheduler for RecordingRescheduler {
    fn reschedule(&self, delta: Tick) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.deltas.lock(|d| {
            if d.borrow_mut().push(delta).is_err() {
                trace!("reschedule record full, dropping {}", delta);
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_wraps() {
        let clock = ManualClock::new(Tick::MAX - 1);
        clock.advance(3);
        assert_eq!(clock.now(), 1);
        clock.wait(10);
        assert_eq!(clock.now(), 11);
    }

    #[test]
    fn recorder_keeps_order_and_counts_overflow() {
        let r = RecordingRescheduler::new();
        for d in 0..(RECORD_DEPTH as Tick + 5) {
            r.reschedule(d);
        }
        assert_eq!(r.calls(), RECORD_DEPTH as u32 + 5);
        assert_eq!(r.deltas().len(), RECORD_DEPTH);
        assert_eq!(r.deltas().first(), Some(&0));
        assert_eq!(r.last(), Some(RECORD_DEPTH as Tick - 1));
        r.clear();
        assert!(r.deltas().is_empty());
        assert_eq!(r.calls(), 0);
    }
}
