//! Signal contract: a counting post/wait primitive with one observer slot.
//!
//! A [`Signal`] counts posts. [`Signal::wait`] consumes one post, blocking
//! while the count is zero. Exactly one [`PostHook`] may be attached to a
//! Signal's [`HookSlot`]; while attached, [`Signal::post`] calls the hook
//! *instead of* the native wake. This is how a multiplexer redirects posts
//! on many Signals into a single ready queue.
//!
//! Posting is always interrupt-safe. Waiting is not: back-ends halt via
//! [`crate::fatal`] when `wait` is reached from interrupt context.

use core::cell::Cell;
use core::ptr;

use crate::lock::{CriticalLock, Mutex};

/// Error returned when attaching a [`PostHook`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HookError {
    /// A hook is already attached; it is never silently replaced.
    #[error("post hook slot already occupied")]
    Occupied,
}

/// Observer notified in place of a Signal's native wake.
pub trait PostHook: Sync {
    /// Called from [`Signal::post`], possibly in interrupt context.
    ///
    /// `cookie` is the value given to [`HookSlot::attach`]. It lets one hook
    /// observe several Signals and tell them apart without comparing
    /// pointers.
    fn post(&self, cookie: usize);
}

/// Counting wake primitive.
///
/// Implementors provide the native wake ([`raise`](Signal::raise)), the
/// blocking consume ([`wait`](Signal::wait)) and storage for one hook. The
/// provided [`post`](Signal::post) routes through the hook when one is
/// attached.
pub trait Signal: Sync {
    /// Increment the count and wake a waiter, bypassing any hook.
    fn raise(&self);

    /// Block until the count is non-zero, then decrement it.
    fn wait(&self);

    /// Decrement the count if it is non-zero. Never blocks.
    fn try_take(&self) -> bool;

    /// This Signal's observer slot.
    fn hook(&self) -> &HookSlot;

    /// Post the Signal: forward to the attached hook, or raise natively.
    fn post(&self) {
        if !self.hook().forward() {
            self.raise();
        }
    }
}

#[derive(Clone, Copy)]
struct Attached {
    hook: &'static dyn PostHook,
    cookie: usize,
}

/// Single-owner [`PostHook`] slot embedded in every Signal.
///
/// The slot is guarded by a critical section. [`forward`](Self::forward)
/// calls the hook while that critical section is held, so once
/// [`detach`](Self::detach) returns no call into the detached hook is in
/// flight.
pub struct HookSlot {
    attached: Mutex<CriticalLock, Cell<Option<Attached>>>,
}

impl HookSlot {
    /// Empty slot.
    pub const fn new() -> Self {
        Self {
            attached: Mutex::new(Cell::new(None)),
        }
    }

    /// Attach `hook`, tagging its calls with `cookie`.
    ///
    /// # Errors
    ///
    /// [`HookError::Occupied`] if any hook, including `hook` itself, is
    /// already attached.
    ///
    /// # Safety
    ///
    /// The slot keeps a lifetime-erased reference to `hook`. The caller must
    /// [`detach`](Self::detach) it before `hook` is moved or dropped.
    pub unsafe fn attach(&self, hook: &dyn PostHook, cookie: usize) -> Result<(), HookError> {
        // SAFETY: the caller detaches before `hook` goes away, so the
        // reference is never used past its real lifetime.
        let hook: &'static dyn PostHook =
            unsafe { core::mem::transmute::<&dyn PostHook, &'static dyn PostHook>(hook) };
        self.attached.lock(|slot| {
            if slot.get().is_some() {
                warn!("post hook refused: slot occupied");
                return Err(HookError::Occupied);
            }
            slot.set(Some(Attached { hook, cookie }));
            Ok(())
        })
    }

    /// Detach `hook` if it is the one attached. Returns `false` when the slot
    /// is empty or holds a different hook.
    pub fn detach(&self, hook: &dyn PostHook) -> bool {
        self.attached.lock(|slot| match slot.get() {
            Some(a) if ptr::addr_eq(ptr::from_ref(a.hook), ptr::from_ref(hook)) => {
                slot.set(None);
                true
            }
            _ => false,
        })
    }

    /// Whether any hook is attached.
    pub fn is_attached(&self) -> bool {
        self.attached.lock(|slot| slot.get().is_some())
    }

    /// Call the attached hook, if any. Returns `true` when a hook ran.
    pub fn forward(&self) -> bool {
        self.attached.lock(|slot| match slot.get() {
            Some(a) => {
                a.hook.post(a.cookie);
                true
            }
            None => false,
        })
    }
}

impl Default for HookSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Post count shared by the back-end Signals, guarded by a critical
/// section so `raise` is safe from interrupt context.
pub(crate) struct Count(Mutex<CriticalLock, Cell<u32>>);

impl Count {
    pub(crate) const fn new() -> Self {
        Self(Mutex::new(Cell::new(0)))
    }

    pub(crate) fn increment(&self) {
        self.0.lock(|c| c.set(c.get().saturating_add(1)));
    }

    pub(crate) fn take(&self) -> bool {
        self.0.lock(|c| match c.get() {
            0 => false,
            n => {
                c.set(n.saturating_sub(1));
                true
            }
        })
    }
}

/// Portable Signal that busy-waits with [`core::hint::spin_loop`].
///
/// The fallback when neither back-end is enabled, and a reasonable choice
/// for very short waits on either.
pub struct SpinSignal {
    count: Count,
    hook: HookSlot,
}

impl SpinSignal {
    /// New Signal with a zero count and no hook.
    pub const fn new() -> Self {
        Self {
            count: Count::new(),
            hook: HookSlot::new(),
        }
    }
}

impl Default for SpinSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal for SpinSignal {
    fn raise(&self) {
        self.count.increment();
    }

    fn wait(&self) {
        crate::fatal::require(
            !crate::context::in_interrupt(),
            "signal wait from interrupt context",
        );
        while !self.count.take() {
            core::hint::spin_loop();
        }
    }

    fn try_take(&self) -> bool {
        self.count.take()
    }

    fn hook(&self) -> &HookSlot {
        &self.hook
    }
}
