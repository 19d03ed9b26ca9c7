//! Wraparound-safe tick arithmetic.
//!
//! Ticks are compared through their signed difference. A deadline up to
//! half the tick range behind "now" counts as past, up to half ahead counts
//! as future, regardless of where the counter wrapped.

use core::cmp::Ordering;

use platform::Tick;

/// Longest relative delay that still lands in the future.
pub const MAX_DELTA: Tick = Tick::MAX >> 1;

/// Signed distance from `b` to `a`.
#[inline]
#[allow(clippy::cast_possible_wrap)] // the reinterpretation is the point
pub const fn diff(a: Tick, b: Tick) -> i32 {
    a.wrapping_sub(b) as i32
}

/// Order two deadlines, earliest first.
#[inline]
pub fn cmp(a: Tick, b: Tick) -> Ordering {
    diff(a, b).cmp(&0)
}

/// Whether `deadline` has been reached at `now`.
#[inline]
pub const fn is_due(deadline: Tick, now: Tick) -> bool {
    diff(deadline, now) <= 0
}

/// Ticks from `now` until `deadline`; zero once it is due.
#[inline]
pub const fn until(deadline: Tick, now: Tick) -> Tick {
    let d = diff(deadline, now);
    if d <= 0 {
        0
    } else {
        d.unsigned_abs()
    }
}

/// Deadline `delta` ticks after `now`.
#[inline]
pub const fn after(now: Tick, delta: Tick) -> Tick {
    now.wrapping_add(delta)
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn ordering_survives_wraparound() {
        let before = Tick::MAX - 10;
        let after_wrap = 5;
        assert_eq!(cmp(before, after_wrap), Ordering::Less);
        assert_eq!(cmp(after_wrap, before), Ordering::Greater);
        assert_eq!(cmp(7, 7), Ordering::Equal);
    }

    #[test]
    fn due_and_until_agree() {
        let now = Tick::MAX - 2;
        let deadline = after(now, 10);
        assert_eq!(deadline, 7);
        assert!(!is_due(deadline, now));
        assert_eq!(until(deadline, now), 10);
        assert!(is_due(deadline, 7));
        assert!(is_due(deadline, 100));
        assert_eq!(until(deadline, 100), 0);
    }

    #[test]
    fn max_delta_is_still_in_the_future() {
        let now = 123;
        assert!(!is_due(after(now, MAX_DELTA), now));
        assert!(is_due(after(now, MAX_DELTA + 1), now));
    }

    #[test]
    fn half_range_boundary() {
        let half: Tick = 1 << 31;
        // Exactly half the range away reads as the past.
        assert!(is_due(half, 0));
        assert!(!is_due(half - 1, 0));
    }
}
