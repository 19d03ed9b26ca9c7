//! Const-generic ring buffer with an optional blocking read.
//!
//! `RingBuffer<T, N>` stores up to `N - 1` elements of `T` without heap
//! allocation: `in == out` means empty and `next(in) == out` means full, so
//! one slot always stays free. Adding to a full buffer is rejected, never
//! blocked.
//!
//! # Contexts
//!
//! - Owned (`&mut self`) access needs no synchronisation.
//! - [`RingBuffer::split`] hands out one [`Producer`] and one [`Consumer`]
//!   which may live in different contexts, e.g. a UART interrupt filling
//!   the buffer and a driver task draining it. Indices are single-word
//!   atomics, so no lock is taken on the data path.
//!
//! # Blocking reads
//!
//! Associate one [`Signal`] with the buffer. Every `add` that stores at
//! least one element posts it once, and [`RingBuffer::wait`] blocks on it
//! through an [`EventQueue`] until data arrives or the timeout expires.
//! A second association is refused with [`RingError::SignalAlreadyAssociated`].

use core::cell::{Cell, UnsafeCell};
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

use platform::lock::Mutex;
use platform::{fatal, CriticalLock, Signal, Tick};

use crate::event_queue::EventQueue;
use crate::tick;

/// Ring buffer configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RingError {
    /// A Signal is already associated; dissociate it first.
    #[error("a signal is already associated with this ring buffer")]
    SignalAlreadyAssociated,
}

/// A fixed-capacity ring buffer of `N` slots (`N - 1` usable).
pub struct RingBuffer<'s, T, const N: usize> {
    buf: [UnsafeCell<MaybeUninit<T>>; N],
    /// Next slot to write.
    head: AtomicUsize,
    /// Next slot to read.
    tail: AtomicUsize,
    signal: Mutex<CriticalLock, Cell<Option<&'s dyn Signal>>>,
}

// SAFETY: slots are written only by the single producer (`&mut self` or the
// one `Producer`) and read only by the single consumer, with the atomic
// indices ordering each hand-over.
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<'_, T, N> {}

impl<'s, T: Copy, const N: usize> RingBuffer<'s, T, N> {
    const SLOTS_OK: () = assert!(N >= 2, "a ring buffer needs at least two slots");

    /// Create a new, empty ring buffer with no associated Signal.
    ///
    /// This function is `const` so that ring buffers may be stored in
    /// `static` variables without a runtime initialiser.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SLOTS_OK;
        Self {
            buf: [const { UnsafeCell::new(MaybeUninit::uninit()) }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            signal: Mutex::new(Cell::new(None)),
        }
    }

    #[inline]
    const fn next(i: usize) -> usize {
        let n = i.wrapping_add(1);
        if n >= N {
            0
        } else {
            n
        }
    }

    /// Store as many of `items` as fit.
    ///
    /// # Safety
    ///
    /// The caller is the only producer for the duration of the call.
    unsafe fn push(&self, items: &[T]) -> usize {
        let mut head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let mut stored = 0usize;
        for &item in items {
            let next = Self::next(head);
            if next == tail {
                break;
            }
            if let Some(cell) = self.buf.get(head) {
                // SAFETY: slot `head` is outside the consumer's readable range
                // until `head` is published below.
                unsafe { cell.get().write(MaybeUninit::new(item)) };
            }
            head = next;
            stored = stored.saturating_add(1);
        }
        if stored == 0 {
            if !items.is_empty() {
                warn!("ring buffer full, {} elements rejected", items.len());
            }
            return 0;
        }
        self.head.store(head, Ordering::Release);
        self.signal.lock(|s| {
            if let Some(signal) = s.get() {
                signal.post();
            }
        });
        stored
    }

    /// Read up to `out.len()` elements.
    ///
    /// # Safety
    ///
    /// The caller is the only consumer for the duration of the call.
    unsafe fn pop(&self, out: &mut [T]) -> usize {
        let mut tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        let mut read = 0usize;
        for slot in out.iter_mut() {
            if tail == head {
                break;
            }
            if let Some(cell) = self.buf.get(tail) {
                // SAFETY: slots in `tail..head` were initialised by the
                // producer before it published `head`.
                *slot = unsafe { cell.get().read().assume_init() };
            }
            tail = Self::next(tail);
            read = read.saturating_add(1);
        }
        self.tail.store(tail, Ordering::Release);
        read
    }

    /// Read the oldest element.
    ///
    /// # Safety
    ///
    /// The caller is the only consumer for the duration of the call.
    unsafe fn pop_one(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        let cell = self.buf.get(tail)?;
        // SAFETY: `tail != head`, so the slot holds a published element.
        let value = unsafe { cell.get().read().assume_init() };
        self.tail.store(Self::next(tail), Ordering::Release);
        Some(value)
    }

    /// Add one element. Returns 1 if stored, 0 if the buffer was full.
    pub fn add(&mut self, item: T) -> usize {
        // SAFETY: `&mut self` excludes every other producer.
        unsafe { self.push(core::slice::from_ref(&item)) }
    }

    /// Add as many elements of `items` as fit, in order. Returns the count
    /// stored.
    pub fn add_slice(&mut self, items: &[T]) -> usize {
        // SAFETY: `&mut self` excludes every other producer.
        unsafe { self.push(items) }
    }

    /// Remove the oldest element.
    pub fn get(&mut self) -> Option<T> {
        // SAFETY: `&mut self` excludes every other consumer.
        unsafe { self.pop_one() }
    }

    /// Remove up to `out.len()` elements into `out`. Returns the count read.
    pub fn get_slice(&mut self, out: &mut [T]) -> usize {
        // SAFETY: `&mut self` excludes every other consumer.
        unsafe { self.pop(out) }
    }

    /// Discard every element.
    pub fn reset(&mut self) {
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Relaxed);
    }

    /// `true` when no elements are present.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Alias of [`is_empty`](Self::is_empty).
    pub fn empty(&self) -> bool {
        self.is_empty()
    }

    /// `true` when another `add` would be rejected.
    pub fn is_full(&self) -> bool {
        Self::next(self.head.load(Ordering::Acquire)) == self.tail.load(Ordering::Acquire)
    }

    /// Alias of [`is_full`](Self::is_full).
    pub fn full(&self) -> bool {
        self.is_full()
    }

    /// Number of elements currently available to read.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head >= tail {
            head.wrapping_sub(tail)
        } else {
            N.wrapping_sub(tail).wrapping_add(head)
        }
    }

    /// Maximum number of elements the buffer can hold (`N - 1`).
    pub const fn capacity(&self) -> usize {
        N.saturating_sub(1)
    }

    /// Make `signal` the one posted whenever data is added.
    ///
    /// # Errors
    ///
    /// [`RingError::SignalAlreadyAssociated`] if a Signal is already
    /// associated.
    pub fn associate(&self, signal: &'s dyn Signal) -> Result<(), RingError> {
        self.signal.lock(|s| {
            if s.get().is_some() {
                warn!("ring buffer signal already associated");
                return Err(RingError::SignalAlreadyAssociated);
            }
            s.set(Some(signal));
            Ok(())
        })
    }

    /// Drop the associated Signal. Returns whether one was associated.
    pub fn dissociate(&self) -> bool {
        self.signal.lock(|s| s.take().is_some())
    }

    /// Block until the buffer is non-empty or `timeout` ticks of `queue`'s
    /// clock pass. Returns `true` when data is available.
    ///
    /// Waiting without an associated Signal is fatal.
    pub fn wait(&self, queue: &EventQueue<'_>, timeout: Tick) -> bool {
        if !self.is_empty() {
            return true;
        }
        let Some(signal) = self.signal.lock(Cell::get) else {
            fatal("ring buffer wait without an associated signal");
        };
        let deadline = tick::after(queue.now(), timeout.min(tick::MAX_DELTA));
        loop {
            if !self.is_empty() {
                return true;
            }
            // A stale post from an earlier add wakes us early; go round again
            // until data shows up or the deadline passes.
            if !queue.wait_absolute(signal, deadline) {
                return !self.is_empty();
            }
        }
    }

    /// Split into a producer and a consumer half.
    pub fn split(&mut self) -> (Producer<'_, 's, T, N>, Consumer<'_, 's, T, N>) {
        let ring: &Self = self;
        (Producer { ring }, Consumer { ring })
    }
}

impl<T: Copy, const N: usize> Default for RingBuffer<'_, T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writing half of a split [`RingBuffer`].
pub struct Producer<'r, 's, T, const N: usize> {
    ring: &'r RingBuffer<'s, T, N>,
}

impl<T: Copy, const N: usize> Producer<'_, '_, T, N> {
    /// Add one element. Returns 1 if stored, 0 if the buffer was full.
    pub fn add(&mut self, item: T) -> usize {
        // SAFETY: `split` creates exactly one producer, and `&mut self`
        // serialises its calls.
        unsafe { self.ring.push(core::slice::from_ref(&item)) }
    }

    /// Add as many elements of `items` as fit. Returns the count stored.
    pub fn add_slice(&mut self, items: &[T]) -> usize {
        // SAFETY: as in `add`.
        unsafe { self.ring.push(items) }
    }

    /// `true` when another `add` would be rejected.
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Number of elements waiting to be read.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// `true` when the consumer has drained everything.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

/// Reading half of a split [`RingBuffer`].
pub struct Consumer<'r, 's, T, const N: usize> {
    ring: &'r RingBuffer<'s, T, N>,
}

impl<T: Copy, const N: usize> Consumer<'_, '_, T, N> {
    /// Remove the oldest element.
    pub fn get(&mut self) -> Option<T> {
        // SAFETY: `split` creates exactly one consumer, and `&mut self`
        // serialises its calls.
        unsafe { self.ring.pop_one() }
    }

    /// Remove up to `out.len()` elements into `out`. Returns the count read.
    pub fn get_slice(&mut self, out: &mut [T]) -> usize {
        // SAFETY: sole consumer, serialised by `&mut self`.
        unsafe { self.ring.pop(out) }
    }

    /// `true` when nothing is waiting to be read.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Number of elements waiting to be read.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Block until data is available or `timeout` passes; see
    /// [`RingBuffer::wait`].
    pub fn wait(&self, queue: &EventQueue<'_>, timeout: Tick) -> bool {
        self.ring.wait(queue, timeout)
    }
}
