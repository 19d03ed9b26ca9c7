//! Monotonic tick source and the rescheduling callback.
//!
//! Ticks are fixed-width and wrap: a device running long enough will see
//! `now()` roll over from `Tick::MAX` to `0`. Deadline comparisons must
//! therefore use signed differences (see `sched::tick`), never `<`.

/// Fixed-width, wrapping tick count.
pub type Tick = u32;

/// Tick rate of every [`Clock`] in this crate: one tick per millisecond.
pub const TICK_HZ: u32 = 1_000;

/// Platform timer: `timer_init`, `timer_now` and `timer_wait`.
pub trait Clock: Sync {
    /// Bring the timer up. Back-ends whose timer is started elsewhere (the
    /// embassy time driver, the host clock constructor) keep the default.
    fn init(&self) {}

    /// Current tick. Wraps on overflow.
    fn now(&self) -> Tick;

    /// Block the calling context for up to `delta` ticks.
    ///
    /// Implementations that also act as a [`Rescheduler`] may return early
    /// when the nearest deadline moves.
    fn wait(&self, delta: Tick);

    /// Ticks elapsed since `start`, correct across one wraparound.
    fn elapsed_since(&self, start: Tick) -> Tick {
        self.now().wrapping_sub(start)
    }
}

/// Observer told when an event queue's nearest deadline changes, so the
/// platform's single hardware timer can be reprogrammed.
pub trait Rescheduler: Sync {
    /// The nearest deadline is now `delta` ticks away.
    fn reschedule(&self, delta: Tick);
}

/// Convert a millisecond count to ticks, wrapping like the clock does.
#[inline]
#[allow(clippy::cast_possible_truncation)] // ticks wrap by definition
pub const fn ticks_from_millis(ms: u64) -> Tick {
    ms as Tick
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    struct Fixed(Tick);

    impl Clock for Fixed {
        fn now(&self) -> Tick {
            self.0
        }

        fn wait(&self, _delta: Tick) {}
    }

    #[test]
    fn elapsed_crosses_wraparound() {
        let clock = Fixed(5);
        assert_eq!(clock.elapsed_since(Tick::MAX - 4), 10);
    }

    #[test]
    fn millis_truncate_to_tick_width() {
        assert_eq!(ticks_from_millis(u64::from(Tick::MAX) + 3), 2);
        assert_eq!(ticks_from_millis(1_500), 1_500);
    }
}
