//! RP2040 implementation of the serport HAL
//!
//! - [`uart::Pl011Uart`]: register-level access to a PL011 UART for the
//!   interrupt-driven port driver
//! - [`time::EmbassyTicks`]: millisecond ticks from the embassy time driver

#![no_std]

pub mod time;
pub mod uart;

pub use serport_hal::{LineErrors, SerialPeripheral, TickSource};
pub use time::EmbassyTicks;
pub use uart::Pl011Uart;
