//! serport Hardware Abstraction Layer
//!
//! This crate defines the small set of primitives the serial transport needs
//! from a chip: byte-level access to a UART-like peripheral and a millisecond
//! tick source. Chip-specific crates implement them; everything above this
//! crate is board-agnostic.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (serport-firmware, etc.)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  serport-core (port driver)             │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  serport-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!          ┌─────────────────────┐
//!          │ serport-hal-rp2040  │
//!          └─────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::SerialPeripheral`] - Register-level serial byte access
//! - [`time::TickSource`] - Monotonic millisecond counter

#![no_std]
#![deny(unsafe_code)]

pub mod time;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use time::{deadline_elapsed, TickSource};
pub use uart::{LineErrors, SerialPeripheral};
