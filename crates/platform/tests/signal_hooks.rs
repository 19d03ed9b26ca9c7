//! Post hooks and back-end Signals exercised through the public API only.

#![cfg(feature = "std")]
#![allow(clippy::indexing_slicing)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use platform::host::HostSignal;
use platform::{HookError, PostHook, Signal, SpinSignal};

/// Hook that counts calls per cookie.
struct PerCookie {
    counts: [AtomicUsize; 4],
}

impl PerCookie {
    const fn new() -> Self {
        Self {
            counts: [const { AtomicUsize::new(0) }; 4],
        }
    }

    fn count(&self, cookie: usize) -> usize {
        self.counts[cookie].load(Ordering::SeqCst)
    }
}

impl PostHook for PerCookie {
    fn post(&self, cookie: usize) {
        self.counts[cookie].fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn hooked_posts_from_many_threads_are_all_forwarded() {
    let hook = PerCookie::new();
    let signals = [HostSignal::new(), HostSignal::new()];
    for (cookie, s) in signals.iter().enumerate() {
        // SAFETY: `hook` outlives every Signal's attachment; detached below.
        unsafe { s.hook().attach(&hook, cookie) }.unwrap();
    }

    thread::scope(|scope| {
        for s in &signals {
            for _ in 0..4 {
                scope.spawn(move || {
                    for _ in 0..250 {
                        s.post();
                    }
                });
            }
        }
    });

    assert_eq!(hook.count(0), 1_000);
    assert_eq!(hook.count(1), 1_000);
    // Nothing reached the native counts.
    assert!(signals.iter().all(|s| s.pending() == 0));
    for s in &signals {
        assert!(s.hook().detach(&hook));
    }
}

#[test]
fn detached_signal_wakes_its_own_waiter_again() {
    let hook = PerCookie::new();
    let signal = HostSignal::new();
    // SAFETY: detached before `hook` is dropped.
    unsafe { signal.hook().attach(&hook, 3) }.unwrap();
    signal.post();
    assert!(!signal.wait_for(Duration::from_millis(5)));
    assert!(signal.hook().detach(&hook));

    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(10));
            signal.post();
        });
        signal.wait();
    });
    assert_eq!(hook.count(3), 1);
}

#[test]
fn a_slot_holds_one_hook_at_a_time() {
    let first = PerCookie::new();
    let second = PerCookie::new();
    let signal = SpinSignal::new();
    // SAFETY: both hooks outlive the Signal.
    unsafe {
        assert_eq!(signal.hook().attach(&first, 0), Ok(()));
        assert_eq!(signal.hook().attach(&second, 1), Err(HookError::Occupied));
    }
    // Only the attached hook can detach itself.
    assert!(!signal.hook().detach(&second));
    assert!(signal.hook().detach(&first));
    // SAFETY: as above.
    unsafe { signal.hook().attach(&second, 1) }.unwrap();
    signal.post();
    assert_eq!(second.count(1), 1);
    assert_eq!(first.count(0), 0);
    assert!(!signal.try_take());
    assert!(signal.hook().detach(&second));
}

#[test]
fn spin_signal_counts_across_threads() {
    let signal = SpinSignal::new();
    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..3 {
                signal.post();
            }
        });
        for _ in 0..3 {
            signal.wait();
        }
    });
    assert!(!signal.try_take());
}
