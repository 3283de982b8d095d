//! Host-side stand-ins for the peripheral and the tick source

use core::cell::Cell;
use std::collections::VecDeque;
use std::vec::Vec;

use serport_hal::{LineErrors, SerialPeripheral, TickSource};

/// UART with a receive queue and a bounded transmit register
#[derive(Debug, Default)]
pub struct MockUart {
    pub incoming: VecDeque<u8>,
    pub sent: Vec<u8>,
    /// Bytes the transmitter accepts before it reports busy
    pub tx_room: usize,
    /// Pending line error flags
    pub errors: LineErrors,
    /// Transmit interrupt enabled
    pub tx_enabled: bool,
}

impl MockUart {
    /// Idle UART with an empty one-byte transmit register
    pub fn new() -> Self {
        Self {
            tx_room: 1,
            ..Default::default()
        }
    }

    pub fn receive(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes.iter().copied());
    }
}

impl SerialPeripheral for MockUart {
    fn has_rx_byte(&self) -> bool {
        !self.incoming.is_empty()
    }

    fn take_rx_byte(&mut self) -> u8 {
        self.incoming.pop_front().unwrap_or(0)
    }

    fn can_tx_byte(&self) -> bool {
        self.tx_room > 0
    }

    fn put_tx_byte(&mut self, byte: u8) {
        self.sent.push(byte);
        self.tx_room = self.tx_room.saturating_sub(1);
    }

    fn clear_error_flags(&mut self) -> LineErrors {
        core::mem::take(&mut self.errors)
    }

    fn start_tx(&mut self) {
        self.tx_enabled = true;
    }

    fn stop_tx(&mut self) {
        self.tx_enabled = false;
    }
}

/// Tick source advanced by hand
#[derive(Debug, Default)]
pub struct ManualTicks {
    now: Cell<u32>,
}

impl ManualTicks {
    pub fn new(start_ms: u32) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: u32) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl TickSource for ManualTicks {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}
