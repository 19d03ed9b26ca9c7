//! Cortex-M back-end.
//!
//! Waiting parks the core with `wfe`; posting from any context (thread or
//! interrupt) bumps a critical-section counter and executes `sev`, which
//! wakes a core sleeping in `wfe`. Ticks come from the embassy time driver
//! the firmware links in.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::clock::{ticks_from_millis, Clock, Rescheduler, Tick};
use crate::context::in_interrupt;
use crate::fatal::require;
use crate::signal::{Count, HookSlot, Signal};

/// Signal that sleeps in `wfe` until posted.
pub struct WfeSignal {
    count: Count,
    hook: HookSlot,
}

impl WfeSignal {
    /// New Signal with a zero count and no hook.
    pub const fn new() -> Self {
        Self {
            count: Count::new(),
            hook: HookSlot::new(),
        }
    }
}

impl Default for WfeSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal for WfeSignal {
    fn raise(&self) {
        self.count.increment();
        cortex_m::asm::sev();
    }

    fn wait(&self) {
        require(!in_interrupt(), "signal wait from interrupt context");
        while !self.count.take() {
            cortex_m::asm::wfe();
        }
    }

    fn try_take(&self) -> bool {
        self.count.take()
    }

    fn hook(&self) -> &HookSlot {
        &self.hook
    }
}

/// Clock over `embassy_time::Instant`, truncated to millisecond ticks.
///
/// `wait` sleeps in `wfe` between time-driver interrupts and returns early
/// after [`Rescheduler::reschedule`].
pub struct EmbassyClock {
    kicked: AtomicBool,
}

impl EmbassyClock {
    /// Clock bound to the linked embassy time driver.
    pub const fn new() -> Self {
        Self {
            kicked: AtomicBool::new(false),
        }
    }
}

impl Default for EmbassyClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for EmbassyClock {
    fn now(&self) -> Tick {
        ticks_from_millis(embassy_time::Instant::now().as_millis())
    }

    fn wait(&self, delta: Tick) {
        require(!in_interrupt(), "clock wait from interrupt context");
        let start = self.now();
        while self.elapsed_since(start) < delta {
            if self.kicked.swap(false, Ordering::AcqRel) {
                return;
            }
            cortex_m::asm::wfe();
        }
    }
}

impl Rescheduler for EmbassyClock {
    fn reschedule(&self, delta: Tick) {
        debug!("timer rescheduled: {} ticks", delta);
        self.kicked.store(true, Ordering::Release);
        cortex_m::asm::sev();
    }
}
