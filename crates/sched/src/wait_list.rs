//! Intrusive singly-linked list over caller-owned nodes.
//!
//! The list never owns its members. Each member embeds a [`Link`] and stays
//! where it is (pinned) for as long as it is linked; the list only stores
//! pointers to it. Every operation runs entirely under the list's
//! [`RawMutex`], chosen per list:
//!
//! - `CriticalLock` when any caller may be an interrupt handler
//! - `TaskLock` for lists only touched from tasks
//! - `NoLock` when a single context owns the list
//!
//! A node carries an atomic "linked" claim, so pushing a node that is
//! already a member of this or any other list is refused instead of
//! corrupting both chains.

use core::cell::Cell;
use core::cmp::Ordering as CmpOrdering;
use core::marker::PhantomPinned;
use core::pin::Pin;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// Forward link embedded in every list member.
pub struct Link<T> {
    next: Cell<Option<NonNull<T>>>,
    linked: AtomicBool,
    _pinned: PhantomPinned,
}

impl<T> Link<T> {
    /// Unlinked.
    pub const fn new() -> Self {
        Self {
            next: Cell::new(None),
            linked: AtomicBool::new(false),
            _pinned: PhantomPinned,
        }
    }

    /// Whether the owning node is currently a member of some list.
    ///
    /// Only a hint when read outside that list's lock.
    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }

    fn claim(&self) -> bool {
        self.linked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.next.set(None);
        self.linked.store(false, Ordering::Release);
    }
}

impl<T> Default for Link<T> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: `next` is only read or written with the owning list's lock held;
// `linked` is atomic.
unsafe impl<T: Sync> Sync for Link<T> {}
// SAFETY: as above; the pointer targets a `Sync` node.
unsafe impl<T: Sync> Send for Link<T> {}

/// A type that can be a [`WaitList`] member.
///
/// # Safety
///
/// `link` must return the same [`Link`], embedded in `self`, on every call.
pub unsafe trait Node: Sized {
    /// The embedded link.
    fn link(&self) -> &Link<Self>;
}

struct Chain<T> {
    head: Cell<Option<NonNull<T>>>,
    tail: Cell<Option<NonNull<T>>>,
    len: Cell<usize>,
}

// SAFETY: the chain is only reachable through the list's mutex, and every
// pointer in it targets a `Sync` node.
unsafe impl<T: Sync> Send for Chain<T> {}

impl<T: Node> Chain<T> {
    const fn new() -> Self {
        Self {
            head: Cell::new(None),
            tail: Cell::new(None),
            len: Cell::new(0),
        }
    }

    /// # Safety
    ///
    /// `p` is a live member of this chain.
    unsafe fn node<'a>(p: NonNull<T>) -> &'a T {
        // SAFETY: members stay valid until unlinked (see `WaitList::push_tail`).
        unsafe { p.as_ref() }
    }

    fn grow(&self) {
        self.len.set(self.len.get().saturating_add(1));
    }

    fn shrink(&self) {
        self.len.set(self.len.get().saturating_sub(1));
    }

    /// Link `p` after `prev` (or at the head when `prev` is `None`).
    ///
    /// # Safety
    ///
    /// `p` is live and claimed; `prev`, if any, is a member.
    unsafe fn insert_after(&self, prev: Option<NonNull<T>>, p: NonNull<T>) {
        // SAFETY: forwarded from the caller.
        let node = unsafe { Self::node(p) };
        let next = match prev {
            // SAFETY: `prev` is a member.
            Some(prev) => unsafe { Self::node(prev) }.link().next.replace(Some(p)),
            None => self.head.replace(Some(p)),
        };
        node.link().next.set(next);
        if next.is_none() {
            self.tail.set(Some(p));
        }
        self.grow();
    }

    /// Unlink `p`, whose predecessor is `prev`.
    ///
    /// # Safety
    ///
    /// `p` is a member and `prev` is its predecessor (`None` for the head).
    unsafe fn unlink(&self, prev: Option<NonNull<T>>, p: NonNull<T>) {
        // SAFETY: forwarded from the caller.
        let node = unsafe { Self::node(p) };
        let next = node.link().next.get();
        match prev {
            // SAFETY: `prev` is a member.
            Some(prev) => unsafe { Self::node(prev) }.link().next.set(next),
            None => self.head.set(next),
        }
        if self.tail.get() == Some(p) {
            self.tail.set(prev);
        }
        self.shrink();
        node.link().release();
    }

    /// Walk the chain, yielding `(predecessor, member)` pairs until `f`
    /// returns `Some`.
    fn walk<R>(&self, mut f: impl FnMut(Option<NonNull<T>>, NonNull<T>) -> Option<R>) -> Option<R> {
        let mut prev = None;
        let mut cur = self.head.get();
        while let Some(p) = cur {
            if let Some(r) = f(prev, p) {
                return Some(r);
            }
            prev = Some(p);
            // SAFETY: `p` came from the chain.
            cur = unsafe { Self::node(p) }.link().next.get();
        }
        None
    }

    fn position_of(&self, target: *const T) -> Option<Option<NonNull<T>>> {
        self.walk(|prev, p| ptr::eq(p.as_ptr(), target).then_some(prev))
    }
}

/// Intrusive list of `T` guarded by `M`.
///
/// Closures passed to [`find`](Self::find), [`visit`](Self::visit) and the
/// `pop_head_*` family run under the list lock and must not call back into
/// the same list.
pub struct WaitList<T: Node, M: RawMutex> {
    chain: Mutex<M, Chain<T>>,
}

impl<T: Node, M: RawMutex> WaitList<T, M> {
    /// Empty list.
    pub const fn new() -> Self {
        Self {
            chain: Mutex::new(Chain::new()),
        }
    }

    /// Insert `node` at the front. Returns `false` if it is already linked.
    ///
    /// # Safety
    ///
    /// `node` must stay valid until it has been unlinked, either by this
    /// list (pop or remove) or by the list being dropped.
    pub unsafe fn push_head(&self, node: Pin<&T>) -> bool {
        let node = node.get_ref();
        self.chain.lock(|c| {
            if !node.link().claim() {
                return false;
            }
            // SAFETY: claimed just now; validity is the caller's contract.
            unsafe { c.insert_after(None, NonNull::from(node)) };
            true
        })
    }

    /// Insert `node` at the back. Returns `false` if it is already linked.
    ///
    /// # Safety
    ///
    /// Same contract as [`push_head`](Self::push_head).
    pub unsafe fn push_tail(&self, node: Pin<&T>) -> bool {
        let node = node.get_ref();
        self.chain.lock(|c| {
            if !node.link().claim() {
                return false;
            }
            let tail = c.tail.get();
            // SAFETY: claimed just now; `tail` is a member.
            unsafe { c.insert_after(tail, NonNull::from(node)) };
            true
        })
    }

    /// Alias of [`push_tail`](Self::push_tail).
    ///
    /// # Safety
    ///
    /// Same contract as [`push_head`](Self::push_head).
    pub unsafe fn append(&self, node: Pin<&T>) -> bool {
        // SAFETY: forwarded.
        unsafe { self.push_tail(node) }
    }

    /// Insert `node` before the first member `m` with
    /// `cmp(node, m) == Less`. Members comparing equal keep arrival order:
    /// a node equal to existing members lands after all of them.
    ///
    /// Returns the position the node landed at (`Some(0)` means it is the
    /// new head), or `None` if it was already linked.
    ///
    /// # Safety
    ///
    /// Same contract as [`push_head`](Self::push_head).
    pub unsafe fn add_sorted(
        &self,
        node: Pin<&T>,
        mut cmp: impl FnMut(&T, &T) -> CmpOrdering,
    ) -> Option<usize> {
        let node = node.get_ref();
        self.chain.lock(|c| {
            if !node.link().claim() {
                return None;
            }
            let mut index = 0usize;
            let mut prev = None;
            c.walk(|_, p| {
                // SAFETY: `p` came from the chain.
                if cmp(node, unsafe { Chain::node(p) }) == CmpOrdering::Less {
                    return Some(());
                }
                prev = Some(p);
                index = index.saturating_add(1);
                None
            });
            // SAFETY: claimed just now; `prev` is a member or `None`.
            unsafe { c.insert_after(prev, NonNull::from(node)) };
            Some(index)
        })
    }

    /// Unlink and return the front member.
    pub fn pop_head(&self) -> Option<NonNull<T>> {
        self.chain.lock(|c| {
            let head = c.head.get()?;
            // SAFETY: `head` is the first member.
            unsafe { c.unlink(None, head) };
            Some(head)
        })
    }

    /// Unlink the front member if `pred` accepts it, then pass it to `f`
    /// before the lock is released.
    pub fn pop_head_if<R>(
        &self,
        pred: impl FnOnce(&T) -> bool,
        f: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        self.chain.lock(|c| {
            let head = c.head.get()?;
            // SAFETY: `head` is a member; it stays valid while the lock is
            // held because its owner must take the lock to retire it.
            let node = unsafe { Chain::node(head) };
            if !pred(node) {
                return None;
            }
            // SAFETY: `head` is the first member.
            unsafe { c.unlink(None, head) };
            Some(f(node))
        })
    }

    /// Run `f` on the front member without unlinking it.
    pub fn with_head<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        self.chain.lock(|c| {
            // SAFETY: the head is a member.
            f(c.head.get().map(|p| unsafe { Chain::node(p) }))
        })
    }

    /// Unlink `node`. Returns `false` if it is not a member of this list.
    pub fn remove(&self, node: &T) -> bool {
        self.chain.lock(|c| match c.position_of(node) {
            Some(prev) => {
                // SAFETY: `position_of` found `node` right after `prev`.
                unsafe { c.unlink(prev, NonNull::from(node)) };
                true
            }
            None => false,
        })
    }

    /// Whether `node` is a member of this list.
    pub fn contains(&self, node: &T) -> bool {
        self.chain.lock(|c| c.position_of(node).is_some())
    }

    /// First member satisfying `pred`.
    ///
    /// The pointer is only valid while the member stays linked.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<NonNull<T>> {
        self.chain.lock(|c| {
            // SAFETY: `p` came from the chain.
            c.walk(|_, p| pred(unsafe { Chain::node(p) }).then_some(p))
        })
    }

    /// Call `f` on members in order until it returns `true`. Returns whether
    /// it stopped early.
    pub fn visit(&self, mut f: impl FnMut(&T) -> bool) -> bool {
        self.chain.lock(|c| {
            // SAFETY: `p` came from the chain.
            c.walk(|_, p| f(unsafe { Chain::node(p) }).then_some(())).is_some()
        })
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.chain.lock(|c| c.len.get())
    }

    /// Whether the list has no members.
    pub fn is_empty(&self) -> bool {
        self.chain.lock(|c| c.head.get().is_none())
    }
}

impl<T: Node, M: RawMutex> Default for WaitList<T, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Node, M: RawMutex> Drop for WaitList<T, M> {
    fn drop(&mut self) {
        // Members outlive their membership, so they can be released here and
        // linked into another list later.
        while self.pop_head().is_some() {}
    }
}
