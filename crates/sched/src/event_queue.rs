//! Deadline queue of (Signal, deadline) pairs.
//!
//! An [`Event`] moves through three states: unscheduled, queued, and
//! fired-or-removed. [`EventQueue::check`] fires every due head in deadline
//! order, called from the timer interrupt or from [`EventQueue::run`].
//!
//! Firing unlinks the Event *before* posting its Signal and does both under
//! the queue's critical section. A waiter woken by that post retires its
//! Event through [`EventQueue::remove`], which needs the same lock, so it
//! cannot free the Event while `check` is still touching it.
//!
//! Events are pinned, caller-owned values. Dropping one removes it from the
//! queue, which covers every way a blocking call can return.

use core::marker::PhantomData;
use core::pin::{pin, Pin};
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

use platform::{fatal, Clock, CriticalLock, Rescheduler, Signal, Tick};

use crate::config::RunConfig;
use crate::tick;
use crate::wait_list::{Link, Node, WaitList};

struct EventNode {
    link: Link<EventNode>,
    // Erased from the owning Event's lifetime; valid while linked.
    signal: &'static dyn Signal,
    deadline: Tick,
}

// SAFETY: always the embedded field.
unsafe impl Node for EventNode {
    fn link(&self) -> &Link<Self> {
        &self.link
    }
}

/// A scheduled wake-up: post `signal` once `deadline` is reached.
///
/// Pin it (`core::pin::pin!`) and hand it to [`EventQueue::add`]. It is
/// removed from the queue when dropped.
pub struct Event<'e, 'q> {
    node: EventNode,
    queue: &'e EventQueue<'q>,
    _signal: PhantomData<&'q dyn Signal>,
}

impl<'e, 'q> Event<'e, 'q> {
    /// Event for `queue` that posts `signal` at the absolute tick
    /// `deadline`.
    pub fn new(queue: &'e EventQueue<'q>, signal: &'q dyn Signal, deadline: Tick) -> Self {
        // SAFETY: `signal` lives at least as long as the queue can be used,
        // so even a leaked Event never posts a dead Signal.
        unsafe { Self::scoped(queue, signal, deadline) }
    }

    /// Event that fires `delta` ticks from now.
    pub fn after(queue: &'e EventQueue<'q>, signal: &'q dyn Signal, delta: Tick) -> Self {
        Self::new(queue, signal, tick::after(queue.now(), delta.min(tick::MAX_DELTA)))
    }

    /// # Safety
    ///
    /// The Event must be dropped before `signal`'s borrow ends, which holds
    /// for an Event pinned on the stack of a function borrowing `signal`.
    pub(crate) unsafe fn scoped(queue: &'e EventQueue<'q>, signal: &dyn Signal, deadline: Tick) -> Self {
        // SAFETY: the caller bounds the Event's lifetime by `signal`'s.
        let signal = unsafe { core::mem::transmute::<&dyn Signal, &'static dyn Signal>(signal) };
        Self {
            node: EventNode {
                link: Link::new(),
                signal,
                deadline,
            },
            queue,
            _signal: PhantomData,
        }
    }

    /// Absolute tick at which the Event fires.
    pub fn deadline(&self) -> Tick {
        self.node.deadline
    }

    /// Whether the Event is still waiting in its queue.
    pub fn is_queued(&self) -> bool {
        self.queue.events.contains(&self.node)
    }

    /// Shorthand for [`EventQueue::add`] on the Event's own queue.
    pub fn schedule(self: Pin<&Self>) -> bool {
        self.queue.add(self)
    }

    /// Shorthand for [`EventQueue::remove`] on the Event's own queue.
    pub fn cancel(&self) -> bool {
        self.queue.remove(self)
    }

    fn pinned_node(self: Pin<&Self>) -> Pin<&EventNode> {
        // SAFETY: `node` is structurally pinned; it is never moved out.
        unsafe { self.map_unchecked(|e| &e.node) }
    }
}

impl Drop for Event<'_, '_> {
    fn drop(&mut self) {
        self.queue.events.remove(&self.node);
    }
}

/// Deadline-ordered queue of [`Event`]s.
///
/// The queue owns its critical-section lock and borrows the clock (and an
/// optional [`Rescheduler`]) for `'q`. Signals scheduled through
/// [`Event::new`] must outlive `'q` as well; the blocking calls accept any
/// Signal because their Event never escapes the call.
pub struct EventQueue<'q> {
    events: WaitList<EventNode, CriticalLock>,
    clock: &'q dyn Clock,
    rescheduler: Option<&'q dyn Rescheduler>,
    _invariant: PhantomData<fn(&'q ()) -> &'q ()>,
}

impl<'q> EventQueue<'q> {
    /// Empty queue reading time from `clock`.
    pub const fn new(clock: &'q dyn Clock) -> Self {
        Self {
            events: WaitList::new(),
            clock,
            rescheduler: None,
            _invariant: PhantomData,
        }
    }

    /// Empty queue that tells `rescheduler` whenever its nearest deadline
    /// changes.
    pub const fn with_rescheduler(clock: &'q dyn Clock, rescheduler: &'q dyn Rescheduler) -> Self {
        Self {
            events: WaitList::new(),
            clock,
            rescheduler: Some(rescheduler),
            _invariant: PhantomData,
        }
    }

    /// The queue's clock.
    pub fn clock(&self) -> &'q dyn Clock {
        self.clock
    }

    /// Current tick of the queue's clock.
    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    /// Queue `event` in deadline order.
    ///
    /// Returns `true` iff it became the head, in which case the rescheduler
    /// (if any) is told the new distance to the nearest deadline. Adding an
    /// Event that is already queued returns `false` and changes nothing.
    /// Adding an Event built for another queue is fatal.
    pub fn add(&self, event: Pin<&Event<'_, 'q>>) -> bool {
        if !ptr::eq(event.queue, self) {
            fatal("event added to a foreign queue");
        }
        let node = event.pinned_node();
        // SAFETY: the node is pinned inside its Event, whose Drop unlinks it.
        let position = unsafe {
            self.events
                .add_sorted(node, |new, old| tick::cmp(new.deadline, old.deadline))
        };
        match position {
            Some(0) => {
                let delta = tick::until(node.deadline, self.clock.now());
                debug!("event queue head changed: due in {}", delta);
                if let Some(r) = self.rescheduler {
                    r.reschedule(delta);
                }
                true
            }
            Some(_) => false,
            None => {
                warn!("event already queued");
                false
            }
        }
    }

    /// Take `event` out of the queue. Returns `true` only if it was still
    /// queued; removing a fired or never-added Event is a no-op.
    pub fn remove(&self, event: &Event<'_, 'q>) -> bool {
        self.events.remove(&event.node)
    }

    /// Fire every due Event in deadline order.
    ///
    /// Returns the ticks until the next deadline (at least 1) or `0` when
    /// nothing is pending.
    pub fn check(&self) -> Tick {
        let now = self.clock.now();
        while let Some(deadline) = self.events.pop_head_if(
            |e| tick::is_due(e.deadline, now),
            |e| {
                let signal = e.signal;
                signal.post();
                e.deadline
            },
        ) {
            trace!("event fired: deadline {} at {}", deadline, now);
        }
        self.events
            .with_head(|head| head.map_or(0, |e| tick::until(e.deadline, now).max(1)))
    }

    /// Block on `signal` for at most `delta` ticks.
    ///
    /// Returns `true` when `signal` was posted by someone else before the
    /// deadline, `false` on timeout. A zero `delta` returns `false` at once
    /// without touching `signal`.
    pub fn wait(&self, signal: &dyn Signal, delta: Tick) -> bool {
        if delta == 0 {
            return false;
        }
        self.wait_absolute(signal, tick::after(self.clock.now(), delta.min(tick::MAX_DELTA)))
    }

    /// Block on `signal` until the absolute tick `deadline`.
    ///
    /// Same result as [`wait`](Self::wait). A deadline already reached
    /// returns `false` at once.
    pub fn wait_absolute(&self, signal: &dyn Signal, deadline: Tick) -> bool {
        if tick::is_due(deadline, self.clock.now()) {
            return false;
        }
        // SAFETY: the Event is pinned in this frame and dropped before the
        // borrow of `signal` ends.
        let event = pin!(unsafe { Event::scoped(self, signal, deadline) });
        self.add(event.as_ref());
        signal.wait();
        // Still queued means the deadline has not fired: someone else posted.
        self.remove(&event)
    }

    /// Drive [`check`](Self::check) forever with the default
    /// [`RunConfig`].
    pub fn run(&self) -> ! {
        let config = RunConfig::new();
        loop {
            self.step(&config);
        }
    }

    /// Drive [`check`](Self::check) until `stop` is set.
    ///
    /// `stop` is polled once per iteration; pair it with a reschedule (or a
    /// short `idle_ticks`) to shut down promptly.
    pub fn run_until(&self, stop: &AtomicBool, config: &RunConfig) {
        while !stop.load(Ordering::Acquire) {
            self.step(config);
        }
        debug!("event loop stopped");
    }

    fn step(&self, config: &RunConfig) {
        let delta = self.check();
        self.clock.wait(config.sleep_for(delta));
    }

    /// Number of queued Events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Deadline of the head Event.
    pub fn next_deadline(&self) -> Option<Tick> {
        self.events.with_head(|head| head.map(|e| e.deadline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::host::HostSignal;
    use platform::mocks::{ManualClock, RecordingRescheduler};

    #[test]
    fn empty_queue_checks_to_zero() {
        let clock = ManualClock::new(0);
        let queue = EventQueue::new(&clock);
        assert_eq!(queue.check(), 0);
        assert!(queue.is_empty());
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn event_fires_once_deadline_passes() {
        let clock = ManualClock::new(500);
        let queue = EventQueue::new(&clock);
        let signal = HostSignal::new();
        let event = pin!(Event::after(&queue, &signal, 1_000));
        assert!(queue.add(event.as_ref()));

        assert_eq!(queue.check(), 1_000);
        assert_eq!(signal.pending(), 0);

        clock.advance(1_005);
        assert_eq!(queue.check(), 0);
        assert_eq!(signal.pending(), 1);
        assert!(!event.is_queued());
    }

    #[test]
    fn pending_event_reports_at_least_one_tick() {
        let clock = ManualClock::new(0);
        let queue = EventQueue::new(&clock);
        let signal = HostSignal::new();
        let event = pin!(Event::new(&queue, &signal, 1));
        queue.add(event.as_ref());
        assert_eq!(queue.check(), 1);
    }

    #[test]
    fn new_head_reschedules() {
        let clock = ManualClock::new(100);
        let rescheduler = RecordingRescheduler::new();
        let queue = EventQueue::with_rescheduler(&clock, &rescheduler);
        let signal = HostSignal::new();
        let late = pin!(Event::new(&queue, &signal, 400));
        let later = pin!(Event::new(&queue, &signal, 900));
        let early = pin!(Event::new(&queue, &signal, 150));

        assert!(late.as_ref().schedule());
        assert!(!queue.add(later.as_ref()));
        assert!(queue.add(early.as_ref()));
        assert_eq!(rescheduler.deltas(), vec![300, 50]);
        assert_eq!(queue.next_deadline(), Some(150));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn double_add_is_refused() {
        let clock = ManualClock::new(0);
        let queue = EventQueue::new(&clock);
        let signal = HostSignal::new();
        let event = pin!(Event::new(&queue, &signal, 10));
        assert!(queue.add(event.as_ref()));
        assert!(!queue.add(event.as_ref()));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn removal_is_idempotent() {
        let clock = ManualClock::new(0);
        let queue = EventQueue::new(&clock);
        let signal = HostSignal::new();
        let keep = pin!(Event::new(&queue, &signal, 20));
        let gone = pin!(Event::new(&queue, &signal, 10));
        assert!(!gone.cancel());
        queue.add(keep.as_ref());
        queue.add(gone.as_ref());
        assert!(queue.remove(&gone));
        assert!(!queue.remove(&gone));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_deadline(), Some(20));
    }

    #[test]
    fn dropping_an_event_unqueues_it() {
        let clock = ManualClock::new(0);
        let queue = EventQueue::new(&clock);
        let signal = HostSignal::new();
        {
            let event = pin!(Event::new(&queue, &signal, 10));
            queue.add(event.as_ref());
            assert_eq!(queue.len(), 1);
        }
        assert!(queue.is_empty());
        clock.advance(20);
        queue.check();
        assert_eq!(signal.pending(), 0);
    }

    #[test]
    #[should_panic(expected = "fatal: event added to a foreign queue")]
    fn adding_to_a_foreign_queue_is_fatal() {
        let clock = ManualClock::new(0);
        let home = EventQueue::new(&clock);
        let other = EventQueue::new(&clock);
        let signal = HostSignal::new();
        let event = pin!(Event::new(&home, &signal, 10));
        other.add(event.as_ref());
    }

    #[test]
    fn zero_timeout_never_blocks() {
        let clock = ManualClock::new(0);
        let queue = EventQueue::new(&clock);
        let signal = HostSignal::new();
        assert!(!queue.wait(&signal, 0));
        assert!(queue.is_empty());
        // Even with a post pending the Signal is left alone.
        signal.post();
        assert!(!queue.wait(&signal, 0));
        assert_eq!(signal.pending(), 1);
    }

    #[test]
    fn past_absolute_deadline_returns_immediately() {
        let clock = ManualClock::new(1_000);
        let queue = EventQueue::new(&clock);
        let signal = HostSignal::new();
        assert!(!queue.wait_absolute(&signal, 999));
        assert!(!queue.wait_absolute(&signal, 1_000));
    }

    #[test]
    fn early_post_wins_over_deadline() {
        let clock = ManualClock::new(0);
        let queue = EventQueue::new(&clock);
        let signal = HostSignal::new();
        signal.post();
        assert!(queue.wait(&signal, 50));
        assert!(queue.is_empty());
    }

    #[test]
    fn run_until_stops_when_flagged() {
        let clock = ManualClock::new(0);
        let queue = EventQueue::new(&clock);
        let stop = AtomicBool::new(true);
        queue.run_until(&stop, &RunConfig::default());
        assert_eq!(clock.now(), 0);
    }
}
