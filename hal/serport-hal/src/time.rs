//! Tick source abstraction
//!
//! Timeouts are tracked as 32-bit millisecond deadlines that are allowed to
//! wrap; comparisons go through [`deadline_elapsed`].

/// Monotonic millisecond counter
pub trait TickSource {
    /// Current time in milliseconds, wrapping at `u32::MAX`
    fn now_ms(&self) -> u32;

    /// Deadline `timeout_ms` from now
    fn deadline_after(&self, timeout_ms: u32) -> u32 {
        self.now_ms().wrapping_add(timeout_ms)
    }
}

impl<T: TickSource + ?Sized> TickSource for &T {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Check if `deadline` has been reached at time `now`
///
/// Correct across counter wrap as long as the deadline is less than
/// 2^31 ms away.
pub fn deadline_elapsed(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}
