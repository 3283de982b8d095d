//! Interrupt-driven serial port core
//!
//! Ties the ring buffers and escape codec to a UART peripheral:
//!
//! - [`SerialPort`]: the TX/RX driver with its Idle/Transmitting/Stopping
//!   state machine, format-aware write API and stall timeout
//! - [`ListenerRegistry`]: fan-out of received bytes to extra buffers
//! - [`AddressStatusRing`]: outcome of recent addressed bus transactions
//! - [`SharedPort`]: critical-section wrapper used by interrupt handlers
//!   and tasks alike
//! - [`PortConfig`]: persisted port settings
//!
//! The peripheral and the millisecond clock come in through the
//! `serport-hal` traits, so everything here runs on the host under test.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate std;

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod io;
pub mod listener;
pub mod port;
pub mod shared;
pub mod status;

#[cfg(test)]
mod mock;

pub use config::{ConfigError, PortConfig, DEFAULT_TX_TIMEOUT_MS};
pub use error::PortError;
pub use listener::{ListenerError, ListenerMask, ListenerRegistry, DEFAULT_LISTENERS, MAX_LISTENERS};
pub use port::{PortDiagnostics, PortState, SerialPort, DEFAULT_STATUS_SLOTS};
pub use shared::SharedPort;
pub use status::{AddressStatusRing, TxStatus};

pub use serport_buffer as buffer;
pub use serport_protocol as protocol;
