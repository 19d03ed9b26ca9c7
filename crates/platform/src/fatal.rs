//! Fatal precondition violations.
//!
//! Misuse that would corrupt shared scheduling structures (double-attaching
//! a post hook, overflowing a Select, waiting from interrupt context) is not
//! recoverable. These helpers log the violation and halt: on hardware the
//! panic handler (`panic-probe`) stops the core, on the host the thread
//! unwinds so tests can observe it with `#[should_panic]`.
//!
//! Capacity and timeout outcomes never come through here; they are ordinary
//! return values.

/// Log `reason` and halt.
#[cold]
#[track_caller]
#[allow(clippy::panic)] // the single sanctioned halt path
pub fn fatal(reason: &'static str) -> ! {
    error!("fatal: {}", reason);
    panic!("fatal: {reason}")
}

/// Halt with `reason` unless `condition` holds.
#[inline]
#[track_caller]
pub fn require(condition: bool, reason: &'static str) {
    if !condition {
        fatal(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "fatal: hook already attached")]
    fn fatal_halts_with_reason() {
        fatal("hook already attached");
    }

    #[test]
    fn require_passes_when_condition_holds() {
        require(true, "never printed");
    }

    #[test]
    #[should_panic(expected = "fatal: null signal")]
    fn require_halts_when_condition_fails() {
        require(false, "null signal");
    }
}
