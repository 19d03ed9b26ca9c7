//! Platform contracts for the scheduling core
//!
//! This crate defines the small set of primitives every driver and every
//! scheduling structure relies on, and provides them for two interchangeable
//! back-ends:
//!
//! ```text
//! Drivers (sensors, displays, motors, radios, expanders)
//!         ↓
//! Scheduling core (sched crate: EventQueue, Select, Dispatch, RingBuffer)
//!         ↓
//! Platform contracts (this crate: Lock, Signal, Clock)
//!         ↓
//! Back-end: Cortex-M (`hardware`) or host threads (`std`)
//! ```
//!
//! # Contracts
//!
//! - [`lock`] - scoped mutual exclusion in four flavours (task, system,
//!   critical section, re-entrant) plus the explicit "no lock" mode
//! - [`Signal`] - counting post/wait primitive with one [`PostHook`] slot
//! - [`Clock`] - wrapping tick source with an interruptible wait, and the
//!   [`Rescheduler`] callback used when the nearest deadline moves
//! - [`context::in_interrupt`] - interrupt-context predicate
//!
//! # Features
//!
//! - `std`: host back-end ([`host`]) and test doubles ([`mocks`])
//! - `hardware`: Cortex-M back-end ([`hardware`])
//! - `defmt`: defmt log output and `defmt::Format` derives
//! - `tracing`: tracing log output
//!
//! # Example
//!
//! ```no_run
//! use platform::Signal;
//!
//! fn producer(ready: &dyn Signal) {
//!     ready.post();
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() outside platform::fatal
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod fmt;

pub mod clock;
pub mod context;
pub mod fatal;
pub mod lock;
pub mod signal;

#[cfg(feature = "hardware")]
pub mod hardware;
#[cfg(feature = "std")]
pub mod host;
#[cfg(feature = "std")]
pub mod mocks;

pub use clock::{Clock, Rescheduler, Tick, TICK_HZ};
pub use fatal::fatal;
pub use lock::{CriticalLock, NoLock, ReentrantLock, SystemLock, TaskLock};
pub use signal::{HookError, HookSlot, PostHook, Signal, SpinSignal};

/// Signal type created by the active back-end's factory.
///
/// Components that own a Signal (Select's coordinator, Dispatch's work
/// counter) default to this type.
#[cfg(feature = "std")]
pub type DefaultSignal = host::HostSignal;

/// Signal type created by the active back-end's factory.
#[cfg(all(feature = "hardware", not(feature = "std")))]
pub type DefaultSignal = hardware::WfeSignal;

/// Signal type used when no back-end is enabled.
#[cfg(not(any(feature = "std", feature = "hardware")))]
pub type DefaultSignal = SpinSignal;
