//! Execution-context queries.

/// `true` when called from an exception or interrupt handler.
///
/// Lock and Signal implementations use this to refuse blocking operations
/// that assume a schedulable caller. The host back-end has no interrupt
/// context, so it always answers `false`.
#[inline]
pub fn in_interrupt() -> bool {
    #[cfg(all(feature = "hardware", target_arch = "arm"))]
    {
        use cortex_m::peripheral::{scb::VectActive, SCB};
        SCB::vect_active() != VectActive::ThreadMode
    }
    #[cfg(not(all(feature = "hardware", target_arch = "arm")))]
    {
        false
    }
}
