//! Scheduling constants and the event-loop configuration.
//!
//! Compile-time defaults live here so the hardware and host builds agree on
//! them; [`RunConfig`] lets a particular loop override them.

use platform::Tick;

pub use platform::TICK_HZ;

/// Ticks [`crate::EventQueue::run`] sleeps when nothing is pending.
///
/// A new head always reschedules the clock, so this only bounds how long an
/// idle loop goes without re-checking.
pub const RUN_IDLE_TICKS: Tick = TICK_HZ;

/// Longest single sleep of the event loop, whatever the next deadline.
pub const RUN_MAX_WAIT_TICKS: Tick = TICK_HZ.saturating_mul(10);

/// Event-loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RunConfig {
    /// Sleep when the queue is empty.
    pub idle_ticks: Tick,
    /// Upper bound on any single sleep.
    pub max_wait_ticks: Tick,
}

impl RunConfig {
    /// The compile-time defaults.
    pub const fn new() -> Self {
        Self {
            idle_ticks: RUN_IDLE_TICKS,
            max_wait_ticks: RUN_MAX_WAIT_TICKS,
        }
    }

    /// How long to sleep after `check` returned `delta`.
    pub fn sleep_for(&self, delta: Tick) -> Tick {
        let wanted = if delta == 0 { self.idle_ticks } else { delta };
        wanted.clamp(1, self.max_wait_ticks.max(1))
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_queue_sleeps_idle_ticks() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.sleep_for(0), RUN_IDLE_TICKS);
    }

    #[test]
    fn long_deltas_are_capped() {
        let cfg = RunConfig {
            idle_ticks: 5,
            max_wait_ticks: 100,
        };
        assert_eq!(cfg.sleep_for(40), 40);
        assert_eq!(cfg.sleep_for(4_000), 100);
        assert_eq!(cfg.sleep_for(0), 5);
    }

    #[test]
    fn zero_limits_still_make_progress() {
        let cfg = RunConfig {
            idle_ticks: 0,
            max_wait_ticks: 0,
        };
        assert_eq!(cfg.sleep_for(0), 1);
        assert_eq!(cfg.sleep_for(9), 1);
    }
}
