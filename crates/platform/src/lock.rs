//! Scoped lock flavours.
//!
//! Every lock site in the scheduling core is generic over an
//! [`embassy_sync`] [`RawMutex`]: the whole operation runs inside
//! `RawMutex::lock`, and the guard is released on every exit path when the
//! closure returns.
//!
//! | Flavour            | Host (`std`)              | Hardware                    |
//! |--------------------|---------------------------|-----------------------------|
//! | [`TaskLock`]       | `StdRawMutex`             | `ThreadModeRawMutex`        |
//! | [`SystemLock`]     | `StdRawMutex`             | `ThreadModeRawMutex`        |
//! | [`CriticalLock`]   | `CriticalSectionRawMutex` | `CriticalSectionRawMutex`   |
//! | [`ReentrantLock`]  | `CriticalSectionRawMutex` | `CriticalSectionRawMutex`   |
//! | [`NoLock`]         | `NoopRawMutex`            | `NoopRawMutex`              |
//!
//! Code reachable from interrupt context may only use [`CriticalLock`] (or
//! [`NoLock`] when the structure is private to that context). Task and
//! system locks assume a schedulable caller; on hardware
//! `ThreadModeRawMutex` halts when taken from an exception handler.
//!
//! Critical sections nest, which is what makes them the re-entrant flavour:
//! a post hook invoked under one critical section may take another.

pub use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex, RawMutex};
pub use embassy_sync::blocking_mutex::Mutex;

/// Interrupt-disabling lock, safe from any context.
pub type CriticalLock = CriticalSectionRawMutex;

/// Lock that may be taken again while already held by the same context.
pub type ReentrantLock = CriticalSectionRawMutex;

/// Explicit "no lock" mode: the caller guarantees single-context access.
pub type NoLock = NoopRawMutex;

/// Task-level lock. Never take it from interrupt context.
#[cfg(feature = "std")]
pub type TaskLock = crate::host::StdRawMutex;

/// Task-level lock. Never take it from interrupt context.
#[cfg(all(feature = "hardware", not(feature = "std")))]
pub type TaskLock = embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

/// Task-level lock. Without a back-end the critical section is the only
/// lock that is sound everywhere.
#[cfg(not(any(feature = "std", feature = "hardware")))]
pub type TaskLock = CriticalSectionRawMutex;

/// Lock that keeps the scheduler running while held.
pub type SystemLock = TaskLock;

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn critical_lock_nests() {
        let outer: Mutex<CriticalLock, Cell<u32>> = Mutex::new(Cell::new(0));
        let inner: Mutex<ReentrantLock, Cell<u32>> = Mutex::new(Cell::new(0));
        outer.lock(|o| {
            o.set(1);
            inner.lock(|i| i.set(o.get() + 1));
        });
        assert_eq!(inner.lock(Cell::get), 2);
    }

    #[test]
    fn no_lock_runs_closure_in_place() {
        let m: Mutex<NoLock, Cell<u32>> = Mutex::new(Cell::new(7));
        let seen = m.lock(|c| {
            c.set(c.get() * 2);
            c.get()
        });
        assert_eq!(seen, 14);
    }
}
