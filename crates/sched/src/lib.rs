//! Timer scheduling and cross-context hand-off
//!
//! Every blocking call a driver makes ("wait for data or give up after
//! 50 ms", "wake me when any of these three sources fires", "run this
//! outside the interrupt handler") goes through one of the structures in
//! this crate. They sit on the [`platform`] contracts and behave the same on
//! the Cortex-M back-end and on host threads.
//!
//! ```text
//! RingBuffer ─┐
//! Select ─────┼──► EventQueue ──► WaitList
//! Dispatch ───┴──────────────────► WaitList
//!                  (all) ──► platform::{Signal, Lock, Clock}
//! ```
//!
//! - [`WaitList`]: intrusive list over caller-owned, pinned nodes
//! - [`EventQueue`]: deadline-sorted (Signal, deadline) pairs, fired by
//!   [`EventQueue::check`]
//! - [`Select`]: wait on any of several Signals
//! - [`Dispatch`]: interrupt-safe FIFO of deferred work
//! - [`RingBuffer`]: bounded buffer with a blocking "not empty" wait
//!
//! Nothing here allocates. Wait objects live on the blocked caller's stack
//! and are removed from their queue by `Drop` on every exit path.
//!
//! # Example
//!
//! ```
//! use platform::{host::HostSignal, mocks::ManualClock, Signal};
//! use sched::EventQueue;
//!
//! let clock = ManualClock::new(0);
//! let queue = EventQueue::new(&clock);
//! let ready = HostSignal::new();
//!
//! // A zero timeout never blocks.
//! assert!(!queue.wait(&ready, 0));
//! assert_eq!(queue.check(), 0);
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // fatal paths go through platform::fatal
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

mod fmt;

pub mod config;
pub mod dispatch;
pub mod event_queue;
pub mod ring_buffer;
pub mod select;
pub mod tick;
pub mod wait_list;

pub use config::RunConfig;
pub use dispatch::{Callback, Dispatch, Work};
pub use event_queue::{Event, EventQueue};
pub use ring_buffer::{Consumer, Producer, RingBuffer, RingError};
pub use select::{Select, SelectError};
pub use wait_list::{Link, Node, WaitList};

pub use platform::Tick;
