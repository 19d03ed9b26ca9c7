//! Wait on whichever of several Signals is posted first.
//!
//! A [`Select`] attaches itself as the [`PostHook`] of every Signal added to
//! it. A post on one of those Signals then lands in the Select's ready FIFO
//! (once, however many posts arrive before it is drained) and wakes the
//! Select's own coordinating Signal. [`Select::wait`] drains the FIFO in
//! post order.
//!
//! The observed Signals hold pointers back into the Select, so it is pinned
//! while in use and detaches every remaining Signal when dropped.
//!
//! ```
//! use core::pin::pin;
//! use platform::{host::HostSignal, Signal};
//! use sched::Select;
//!
//! let rx = HostSignal::new();
//! let button = HostSignal::new();
//! let select = pin!(Select::<2, HostSignal>::new());
//! let select = select.as_ref();
//! select.add(&rx);
//! select.add(&button);
//!
//! button.post();
//! let fired = select.wait();
//! assert!(core::ptr::addr_eq(core::ptr::from_ref(fired), core::ptr::from_ref(&button)));
//! ```

use core::cell::Cell;
use core::marker::{PhantomData, PhantomPinned};
use core::pin::{pin, Pin};
use core::ptr;

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use platform::{fatal, CriticalLock, DefaultSignal, PostHook, Signal, Tick};

use crate::event_queue::{Event, EventQueue};
use crate::tick;
use crate::wait_list::{Link, Node, WaitList};

/// Why a Signal could not be added to a [`Select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SelectError {
    /// Every slot is in use.
    #[error("select capacity exhausted")]
    Full,
    /// The Signal already has a post hook (possibly this Select).
    #[error("signal already has a post hook")]
    HookOccupied,
}

struct Slot {
    link: Link<Slot>,
    signal: Cell<Option<&'static dyn Signal>>,
}

impl Slot {
    const fn new() -> Self {
        Self {
            link: Link::new(),
            signal: Cell::new(None),
        }
    }
}

// SAFETY: always the embedded field.
unsafe impl Node for Slot {
    fn link(&self) -> &Link<Self> {
        &self.link
    }
}

// SAFETY: `signal` is only read or written under the owning Select's table
// lock; the link is guarded by the ready list's lock.
unsafe impl Sync for Slot {}

/// Multiplexed wait over up to `N` Signals, woken through the coordinating
/// Signal `S`.
pub struct Select<'s, const N: usize, S: Signal = DefaultSignal> {
    slots: [Slot; N],
    ready: WaitList<Slot, CriticalLock>,
    table: CriticalSectionRawMutex,
    coordinator: S,
    _pinned: PhantomPinned,
    _signals: PhantomData<fn(&'s dyn Signal) -> &'s dyn Signal>,
}

impl<'s, const N: usize, S: Signal + Default> Select<'s, N, S> {
    /// Empty Select with a fresh coordinating Signal.
    pub fn new() -> Self {
        Self::with_signal(S::default())
    }
}

impl<'s, const N: usize, S: Signal + Default> Default for Select<'s, N, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'s, const N: usize, S: Signal> Select<'s, N, S> {
    /// Empty Select woken through `coordinator`.
    pub const fn with_signal(coordinator: S) -> Self {
        Self {
            slots: [const { Slot::new() }; N],
            ready: WaitList::new(),
            table: CriticalSectionRawMutex::new(),
            coordinator,
            _pinned: PhantomPinned,
            _signals: PhantomData,
        }
    }

    /// Start observing `signal`.
    ///
    /// # Errors
    ///
    /// [`SelectError::Full`] when all `N` slots are taken,
    /// [`SelectError::HookOccupied`] when `signal` already has a hook.
    pub fn try_add(self: Pin<&Self>, signal: &'s dyn Signal) -> Result<(), SelectError> {
        let this = self.get_ref();
        this.table.lock(|| {
            let (index, slot) = this
                .slots
                .iter()
                .enumerate()
                .find(|(_, s)| s.signal.get().is_none())
                .ok_or(SelectError::Full)?;
            // SAFETY: the Select is pinned and detaches every hook it holds in
            // `remove` or `Drop`.
            unsafe { signal.hook().attach(this, index) }.map_err(|_| SelectError::HookOccupied)?;
            // SAFETY: `signal` outlives `'s`, and the Select cannot outlive
            // `'s`.
            let erased = unsafe { core::mem::transmute::<&dyn Signal, &'static dyn Signal>(signal) };
            slot.signal.set(Some(erased));
            trace!("select slot {} attached", index);
            Ok(())
        })
    }

    /// Start observing `signal`; running out of slots or finding another hook
    /// already attached is fatal.
    pub fn add(self: Pin<&Self>, signal: &'s dyn Signal) {
        match self.try_add(signal) {
            Ok(()) => {}
            Err(SelectError::Full) => fatal("select capacity exhausted"),
            Err(SelectError::HookOccupied) => fatal("signal already has a post hook"),
        }
    }

    /// Stop observing `signal` and drop any pending ready entry for it.
    /// Returns `false` if it was not being observed.
    pub fn remove(&self, signal: &dyn Signal) -> bool {
        self.table.lock(|| {
            let Some(slot) = self.slot_of(signal) else {
                return false;
            };
            signal.hook().detach(self);
            self.ready.remove(slot);
            slot.signal.set(None);
            true
        })
    }

    /// Block until an observed Signal is posted and return it.
    ///
    /// Signals come back in post order; posts repeated before a Signal is
    /// returned count once.
    pub fn wait(self: Pin<&Self>) -> &'s dyn Signal {
        loop {
            if let Some(signal) = self.pop_ready() {
                return signal;
            }
            self.coordinator.wait();
        }
    }

    /// Like [`wait`](Self::wait), giving up after `timeout` ticks of
    /// `queue`'s clock. Returns `None` on timeout; a zero timeout only
    /// reports a Signal that is already ready.
    pub fn wait_timeout(
        self: Pin<&Self>,
        queue: &EventQueue<'_>,
        timeout: Tick,
    ) -> Option<&'s dyn Signal> {
        if let Some(signal) = self.pop_ready() {
            return Some(signal);
        }
        if timeout == 0 {
            return None;
        }
        let deadline = tick::after(queue.now(), timeout.min(tick::MAX_DELTA));
        // SAFETY: the Event is pinned in this frame and dropped before the
        // borrow of `self` (and so of the coordinator) ends.
        let event = pin!(unsafe { Event::scoped(queue, &self.coordinator, deadline) });
        queue.add(event.as_ref());
        loop {
            self.coordinator.wait();
            if let Some(signal) = self.pop_ready() {
                return Some(signal);
            }
            if !event.is_queued() {
                debug!("select timed out");
                return None;
            }
        }
    }

    /// Return a ready Signal without blocking.
    pub fn try_wait(self: Pin<&Self>) -> Option<&'s dyn Signal> {
        self.pop_ready()
    }

    /// Number of observed Signals.
    pub fn len(&self) -> usize {
        self.table
            .lock(|| self.slots.iter().filter(|s| s.signal.get().is_some()).count())
    }

    /// Whether no Signal is observed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of observed Signals.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Whether `signal` is observed.
    pub fn contains(&self, signal: &dyn Signal) -> bool {
        self.table.lock(|| self.slot_of(signal).is_some())
    }

    /// Call with the table lock held.
    fn slot_of(&self, signal: &dyn Signal) -> Option<&Slot> {
        self.slots.iter().find(|s| {
            s.signal
                .get()
                .is_some_and(|held| ptr::addr_eq(ptr::from_ref(held), ptr::from_ref(signal)))
        })
    }

    fn pop_ready(&self) -> Option<&'s dyn Signal> {
        self.table.lock(|| {
            self.ready
                .pop_head_if(|_| true, |slot| slot.signal.get())
                .flatten()
        })
    }
}

impl<const N: usize, S: Signal> PostHook for Select<'_, N, S> {
    fn post(&self, cookie: usize) {
        let Some(slot) = self.slots.get(cookie) else {
            warn!("select hook called with unknown slot {}", cookie);
            return;
        };
        // SAFETY: slots live inside this pinned Select, whose `ready` list is
        // dropped together with them.
        if !unsafe { self.ready.push_tail(Pin::new_unchecked(slot)) } {
            trace!("select slot {} already ready", cookie);
        }
        self.coordinator.post();
    }
}

impl<const N: usize, S: Signal> Drop for Select<'_, N, S> {
    fn drop(&mut self) {
        let this: &Self = self;
        this.table.lock(|| {
            for slot in &this.slots {
                if let Some(signal) = slot.signal.take() {
                    signal.hook().detach(this);
                }
            }
        });
    }
}
