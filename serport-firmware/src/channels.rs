//! Statics shared between the interrupt handler and tasks

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::once_lock::OnceLock;
use embassy_sync::signal::Signal;

use crate::ConsolePort;

/// The console port, set once during startup
pub static PORT: OnceLock<ConsolePort> = OnceLock::new();

/// Raised by the UART interrupt; the console task checks for new lines
pub static RX_READY: Signal<CriticalSectionRawMutex, ()> = Signal::new();
