//! Host back-end: OS threads stand in for tasks.
//!
//! There is no interrupt context on the host, so every flavour of lock is
//! safe from every thread. Blocking maps to `std::sync::Condvar`.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::clock::{ticks_from_millis, Clock, Rescheduler, Tick};
use crate::signal::{HookSlot, Signal};

fn relock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not wedge every other thread's Signal.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Task lock backed by `std::sync::Mutex`. Not re-entrant.
pub struct StdRawMutex {
    inner: Mutex<()>,
}

impl StdRawMutex {
    /// Unlocked mutex.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(()),
        }
    }
}

impl Default for StdRawMutex {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: `lock` holds the std mutex for the whole closure, so no two
// closures passed to the same instance run at once.
unsafe impl RawMutex for StdRawMutex {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    fn lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = relock(&self.inner);
        f()
    }
}

/// Counting semaphore over a `Mutex<u32>` and a `Condvar`.
pub struct HostSignal {
    count: Mutex<u32>,
    ready: Condvar,
    hook: HookSlot,
}

impl HostSignal {
    /// New Signal with a zero count and no hook.
    pub const fn new() -> Self {
        Self {
            count: Mutex::new(0),
            ready: Condvar::new(),
            hook: HookSlot::new(),
        }
    }

    /// Current post count.
    pub fn pending(&self) -> u32 {
        *relock(&self.count)
    }

    /// Like [`Signal::wait`] but gives up after `timeout`. Returns `true`
    /// when a post was consumed.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let guard = relock(&self.count);
        let (mut count, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |c| *c == 0)
            .unwrap_or_else(PoisonError::into_inner);
        if *count == 0 {
            return false;
        }
        *count = count.saturating_sub(1);
        true
    }
}

impl Default for HostSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal for HostSignal {
    fn raise(&self) {
        let mut count = relock(&self.count);
        *count = count.saturating_add(1);
        self.ready.notify_one();
    }

    fn wait(&self) {
        let mut count = relock(&self.count);
        while *count == 0 {
            count = self
                .ready
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *count = count.saturating_sub(1);
    }

    fn try_take(&self) -> bool {
        let mut count = relock(&self.count);
        if *count == 0 {
            return false;
        }
        *count = count.saturating_sub(1);
        true
    }

    fn hook(&self) -> &HookSlot {
        &self.hook
    }
}

/// Millisecond clock over `embassy_time::Instant` (std time driver).
///
/// [`Clock::wait`] sleeps on a condvar so that [`Rescheduler::reschedule`]
/// can cut it short when an earlier deadline is queued. Pass this clock as
/// both the queue's clock and its rescheduler.
pub struct HostClock {
    offset: Tick,
    kicked: Mutex<bool>,
    kick: Condvar,
}

impl HostClock {
    /// Clock reading the driver's milliseconds directly.
    pub const fn new() -> Self {
        Self::with_offset(0)
    }

    /// Clock shifted by `offset` ticks. A large offset puts the wraparound
    /// point a few moments into the future.
    pub const fn with_offset(offset: Tick) -> Self {
        Self {
            offset,
            kicked: Mutex::new(false),
            kick: Condvar::new(),
        }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for HostClock {
    fn now(&self) -> Tick {
        ticks_from_millis(embassy_time::Instant::now().as_millis()).wrapping_add(self.offset)
    }

    fn wait(&self, delta: Tick) {
        let guard = relock(&self.kicked);
        let (mut kicked, _) = self
            .kick
            .wait_timeout_while(guard, Duration::from_millis(delta.into()), |k| !*k)
            .unwrap_or_else(PoisonError::into_inner);
        *kicked = false;
    }
}

impl Rescheduler for HostClock {
    fn reschedule(&self, delta: Tick) {
        debug!("host clock rescheduled: {} ticks", delta);
        *relock(&self.kicked) = true;
        self.kick.notify_all();
    }
}
