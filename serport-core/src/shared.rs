//! Port shared between the interrupt handler and tasks
//!
//! Every access runs inside a critical section, so the interrupt handler
//! never observes the status ring or the listener table half-updated.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use serport_hal::{SerialPeripheral, TickSource};

use crate::error::PortError;
use crate::port::SerialPort;
use crate::status::TxStatus;
use crate::{DEFAULT_LISTENERS, DEFAULT_STATUS_SLOTS};

/// A [`SerialPort`] behind a critical-section mutex
pub struct SharedPort<
    'r,
    P,
    T,
    const L: usize = DEFAULT_LISTENERS,
    const S: usize = DEFAULT_STATUS_SLOTS,
> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<SerialPort<'r, P, T, L, S>>>,
}

impl<'r, P, T, const L: usize, const S: usize> SharedPort<'r, P, T, L, S>
where
    P: SerialPeripheral,
    T: TickSource,
{
    pub const fn new(port: SerialPort<'r, P, T, L, S>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(port)),
        }
    }

    /// Run `f` with exclusive access to the port, interrupts masked
    pub fn lock<R>(&self, f: impl FnOnce(&mut SerialPort<'r, P, T, L, S>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Interrupt entry for a shared RX/TX vector
    pub fn on_interrupt(&self) {
        self.lock(|port| port.on_interrupt());
    }

    /// Task entry
    pub fn poll(&self) {
        self.lock(|port| port.poll());
    }

    pub fn write_array(&self, data: &[u8]) -> Result<usize, PortError> {
        self.lock(|port| port.write_array(data))
    }

    pub fn write_string(&self, text: &str) -> Result<usize, PortError> {
        self.lock(|port| port.write_string(text))
    }

    pub fn write_addressed(&self, address: u8, payload: &[u8]) -> Result<usize, PortError> {
        self.lock(|port| port.write_addressed(address, payload))
    }

    pub fn transaction_status(&self, address: u8) -> Option<TxStatus> {
        self.lock(|port| port.transaction_status(address))
    }

    pub fn is_busy(&self) -> bool {
        self.lock(|port| port.is_busy())
    }

    pub fn into_inner(self) -> SerialPort<'r, P, T, L, S> {
        self.inner.into_inner().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ManualTicks, MockUart};
    use crate::{PortConfig, PortState};
    use serport_buffer::RingBuffer;

    #[test]
    fn test_interrupt_and_task_through_lock() {
        let ticks = ManualTicks::new(0);
        let mut tx_storage = [0u8; 16];
        let mut rx_storage = [0u8; 16];
        let tx = RingBuffer::new(&mut tx_storage).unwrap();
        let rx = RingBuffer::new(&mut rx_storage).unwrap();
        let port: SerialPort<'_, MockUart, &ManualTicks> =
            SerialPort::new(MockUart::new(), &ticks, &tx, &rx, PortConfig::default()).unwrap();
        let shared = SharedPort::new(port);

        assert_eq!(shared.write_string("ping"), Ok(4));
        assert!(shared.is_busy());

        shared.lock(|port| {
            port.peripheral_mut().tx_room = 8;
            port.peripheral_mut().receive(b"pong");
        });
        shared.on_interrupt();
        assert!(!shared.is_busy());
        assert_eq!(rx.count(), 4);

        let port = shared.into_inner();
        assert_eq!(port.peripheral().sent, b"ping");
        assert_eq!(port.state(), PortState::Idle);
    }

    #[test]
    fn test_poll_times_out_through_lock() {
        let ticks = ManualTicks::new(0);
        let mut tx_storage = [0u8; 16];
        let mut rx_storage = [0u8; 16];
        let tx = RingBuffer::new(&mut tx_storage).unwrap();
        let rx = RingBuffer::new(&mut rx_storage).unwrap();
        let port: SerialPort<'_, MockUart, &ManualTicks> =
            SerialPort::new(MockUart::new(), &ticks, &tx, &rx, PortConfig::default()).unwrap();
        let shared = SharedPort::new(port);

        shared.write_array(b"abc").unwrap();
        ticks.advance(250);
        shared.poll();
        ticks.advance(250);
        shared.poll();

        assert_eq!(
            shared.write_array(b"d"),
            Err(PortError::Faulted(TxStatus::Timeout))
        );
    }
}
