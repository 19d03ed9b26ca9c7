//! Property tests for deadline ordering.
//! Events are scheduled around an arbitrary start tick, so many cases cross
//! the `u32` wraparound while the clock steps forward.

#![allow(clippy::arithmetic_side_effects, clippy::indexing_slicing)]

use core::pin::Pin;
use std::sync::Mutex;

use platform::mocks::ManualClock;
use platform::{HookSlot, Signal, Tick};
use proptest::prelude::*;
use sched::{Event, EventQueue};

/// Signal that logs its id every time it is posted.
struct Marker<'l> {
    id: usize,
    log: &'l Mutex<Vec<usize>>,
    hook: HookSlot,
}

impl<'l> Marker<'l> {
    fn new(id: usize, log: &'l Mutex<Vec<usize>>) -> Self {
        Self {
            id,
            log,
            hook: HookSlot::new(),
        }
    }
}

impl Signal for Marker<'_> {
    fn raise(&self) {
        self.log.lock().unwrap().push(self.id);
    }

    fn wait(&self) {
        panic!("markers are never waited on");
    }

    fn try_take(&self) -> bool {
        false
    }

    fn hook(&self) -> &HookSlot {
        &self.hook
    }
}

proptest::proptest! {
    /// Every Event fires exactly when its deadline is reached, earliest
    /// first, and Events sharing a deadline fire in the order they were
    /// added.
    #[test]
    fn events_fire_in_deadline_order(
        start in any::<Tick>(),
        offsets in prop::collection::vec(0u32..5_000, 1..24),
        steps in prop::collection::vec(1u32..700, 1..40),
    ) {
        let log = Mutex::new(Vec::new());
        let markers: Vec<Marker<'_>> = (0..offsets.len()).map(|id| Marker::new(id, &log)).collect();
        let clock = ManualClock::new(start);
        let queue = EventQueue::new(&clock);
        let events: Vec<Pin<Box<Event<'_, '_>>>> = markers
            .iter()
            .zip(&offsets)
            .map(|(p, &off)| Box::pin(Event::new(&queue, p, start.wrapping_add(off))))
            .collect();
        for event in &events {
            queue.add(event.as_ref());
        }

        let mut elapsed = 0u32;
        for step in steps.iter().copied().chain(core::iter::once(5_000)) {
            clock.advance(step);
            elapsed += step;
            let next = queue.check();
            let fired = log.lock().unwrap().clone();
            for (id, &off) in offsets.iter().enumerate() {
                prop_assert_eq!(
                    fired.contains(&id),
                    off <= elapsed,
                    "event {} (offset {}) at elapsed {}", id, off, elapsed
                );
            }
            match offsets.iter().filter(|&&off| off > elapsed).min() {
                Some(&off) => prop_assert_eq!(next, off - elapsed),
                None => prop_assert_eq!(next, 0),
            }
        }

        let fired = log.lock().unwrap().clone();
        prop_assert_eq!(fired.len(), offsets.len());
        for pair in fired.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            prop_assert!(
                offsets[a] < offsets[b] || (offsets[a] == offsets[b] && a < b),
                "event {} fired before event {}", a, b
            );
        }
        prop_assert!(queue.is_empty());
    }

    /// Removed Events never fire, and removing twice reports `false` the
    /// second time.
    #[test]
    fn removed_events_never_fire(
        start in any::<Tick>(),
        plan in prop::collection::vec((1u32..1_000, any::<bool>()), 1..16),
    ) {
        let log = Mutex::new(Vec::new());
        let markers: Vec<Marker<'_>> = (0..plan.len()).map(|id| Marker::new(id, &log)).collect();
        let clock = ManualClock::new(start);
        let queue = EventQueue::new(&clock);
        let events: Vec<Pin<Box<Event<'_, '_>>>> = markers
            .iter()
            .zip(&plan)
            .map(|(p, &(off, _))| Box::pin(Event::new(&queue, p, start.wrapping_add(off))))
            .collect();
        for event in &events {
            queue.add(event.as_ref());
        }
        for (event, &(_, drop_it)) in events.iter().zip(&plan) {
            if drop_it {
                prop_assert!(queue.remove(event));
                prop_assert!(!queue.remove(event));
            }
        }

        clock.advance(1_000);
        prop_assert_eq!(queue.check(), 0);

        let fired = log.lock().unwrap().clone();
        for (id, &(_, dropped)) in plan.iter().enumerate() {
            prop_assert_eq!(fired.contains(&id), !dropped);
        }
        // Fired Events are already out of the queue.
        for event in &events {
            prop_assert!(!queue.remove(event));
        }
    }
}
