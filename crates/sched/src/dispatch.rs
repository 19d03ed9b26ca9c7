//! Deferred work: enqueue from anywhere, execute on one consumer.
//!
//! Interrupt handlers [`put`](Dispatch::put) a [`Work`] item and return;
//! a task blocked in [`run`](Dispatch::run) executes items in the order they
//! were enqueued. The queue is a [`WaitList`] under the critical-section
//! lock, used strictly push-tail/pop-head, and a counting Signal tracks
//! how many items are waiting.
//!
//! Items are caller-owned. The dispatcher only links them while queued, and
//! unlinks each one before executing it, so a callback may put itself again.

use core::pin::Pin;
use core::sync::atomic::{AtomicBool, Ordering};

use platform::{CriticalLock, DefaultSignal, Signal};

use crate::wait_list::{Link, Node, WaitList};

/// A unit of deferred work.
pub trait Callback: Sync {
    /// Run the work. Failures are the callback's own business; the
    /// dispatcher neither catches nor retries.
    fn execute(&self);

    /// Short tag for diagnostics.
    fn label(&self) -> Option<&'static str> {
        None
    }
}

/// Queue entry wrapping a [`Callback`]. Reusable once it has run.
pub struct Work<'a> {
    link: Link<Work<'a>>,
    callback: &'a dyn Callback,
}

impl<'a> Work<'a> {
    /// Entry that runs `callback`.
    pub const fn new(callback: &'a dyn Callback) -> Self {
        Self {
            link: Link::new(),
            callback,
        }
    }

    /// Whether the entry is waiting in a dispatcher.
    pub fn is_queued(&self) -> bool {
        self.link.is_linked()
    }
}

// SAFETY: always the embedded field.
unsafe impl Node for Work<'_> {
    fn link(&self) -> &Link<Self> {
        &self.link
    }
}

/// Single-consumer FIFO of [`Work`] items borrowed for `'a`.
pub struct Dispatch<'a, S: Signal = DefaultSignal> {
    queue: WaitList<Work<'a>, CriticalLock>,
    ready: S,
    killed: AtomicBool,
}

impl<'a, S: Signal + Default> Dispatch<'a, S> {
    /// Empty dispatcher with a fresh Signal.
    pub fn new() -> Self {
        Self::with_signal(S::default())
    }
}

impl<'a, S: Signal + Default> Default for Dispatch<'a, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, S: Signal> Dispatch<'a, S> {
    /// Empty dispatcher counting pending items on `ready`. `const`, so a
    /// dispatcher can be a `static`.
    pub const fn with_signal(ready: S) -> Self {
        Self {
            queue: WaitList::new(),
            ready,
            killed: AtomicBool::new(false),
        }
    }

    /// Enqueue `work`. Safe from interrupt context.
    ///
    /// Returns `false`, and changes nothing, while `work` is still queued.
    pub fn put(&self, work: &'a Work<'a>) -> bool {
        // SAFETY: `work` is borrowed for `'a`, which outlives `self`, so it
        // cannot move or be dropped while linked.
        let queued = unsafe { self.queue.push_tail(Pin::new_unchecked(work)) };
        if queued {
            self.ready.post();
        } else {
            warn!("dispatch: work already queued");
        }
        queued
    }

    /// Execute queued work until [`kill`](Self::kill) is called.
    ///
    /// Items still queued when the kill is observed stay queued.
    pub fn run(&self) {
        loop {
            self.ready.wait();
            if self.is_killed() {
                debug!("dispatch stopped");
                return;
            }
            self.run_once();
        }
    }

    /// Execute the oldest queued item, if any, without blocking. Returns
    /// whether one ran.
    pub fn run_once(&self) -> bool {
        let Some(work) = self.queue.pop_head() else {
            return false;
        };
        // SAFETY: every queued item is borrowed for `'a`.
        let work = unsafe { work.as_ref() };
        if let Some(label) = work.callback.label() {
            trace!("dispatch: {}", label);
        }
        work.callback.execute();
        true
    }

    /// Ask [`run`](Self::run) to return.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::Release);
        self.ready.post();
    }

    /// Whether [`kill`](Self::kill) has been called.
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::host::HostSignal;
    use std::sync::Mutex;

    struct Record<'l> {
        id: u32,
        log: &'l Mutex<Vec<u32>>,
    }

    impl Callback for Record<'_> {
        fn execute(&self) {
            self.log.lock().unwrap().push(self.id);
        }

        fn label(&self) -> Option<&'static str> {
            Some("record")
        }
    }

    #[test]
    fn items_run_in_enqueue_order() {
        let log = Mutex::new(Vec::new());
        let (one, two, three) = (
            Record { id: 1, log: &log },
            Record { id: 2, log: &log },
            Record { id: 3, log: &log },
        );
        let (w1, w2, w3) = (Work::new(&one), Work::new(&two), Work::new(&three));
        let dispatch: Dispatch<'_, HostSignal> = Dispatch::new();
        assert!(dispatch.put(&w2));
        assert!(dispatch.put(&w1));
        assert!(dispatch.put(&w3));
        assert_eq!(dispatch.len(), 3);
        while dispatch.run_once() {}
        assert_eq!(*log.lock().unwrap(), vec![2, 1, 3]);
        assert!(dispatch.is_empty());
    }

    #[test]
    fn queued_item_is_not_put_twice() {
        let log = Mutex::new(Vec::new());
        let rec = Record { id: 9, log: &log };
        let work = Work::new(&rec);
        let dispatch: Dispatch<'_, HostSignal> = Dispatch::new();
        assert!(dispatch.put(&work));
        assert!(!dispatch.put(&work));
        assert!(work.is_queued());
        assert!(dispatch.run_once());
        assert!(!work.is_queued());
        // Executed items can be queued again.
        assert!(dispatch.put(&work));
        assert_eq!(dispatch.len(), 1);
    }

    #[test]
    fn kill_stops_run_and_leaves_pending_work() {
        let log = Mutex::new(Vec::new());
        let rec = Record { id: 1, log: &log };
        let work = Work::new(&rec);
        let dispatch: Dispatch<'_, HostSignal> = Dispatch::new();
        dispatch.kill();
        dispatch.put(&work);
        dispatch.run();
        assert!(dispatch.is_killed());
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(dispatch.len(), 1);
    }
}
