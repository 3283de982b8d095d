//! Tick source backed by the embassy time driver

use embassy_time::Instant;
use serport_hal::TickSource;

/// Milliseconds since boot, truncated to 32 bits
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyTicks;

impl TickSource for EmbassyTicks {
    fn now_ms(&self) -> u32 {
        Instant::now().as_millis() as u32
    }
}
