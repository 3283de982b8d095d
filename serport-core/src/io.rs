//! `embedded-io` adapter
//!
//! Lets generic writers (formatters, protocol encoders) target a port.
//! Writes never block: a full TX buffer is reported as [`PortError::Busy`].

use embedded_io::{ErrorType, Write};
use serport_hal::{SerialPeripheral, TickSource};

use crate::error::PortError;
use crate::port::SerialPort;

impl<P, T, const L: usize, const S: usize> ErrorType for SerialPort<'_, P, T, L, S> {
    type Error = PortError;
}

impl<P, T, const L: usize, const S: usize> Write for SerialPort<'_, P, T, L, S>
where
    P: SerialPeripheral,
    T: TickSource,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.write_available(buf)
    }

    /// Reports `Busy` until the TX buffer has drained
    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.is_busy() {
            Err(PortError::Busy)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ManualTicks, MockUart};
    use crate::PortConfig;
    use serport_buffer::{BufferFormat, BufferKind, RingBuffer};

    #[test]
    fn test_write_fmt_through_port() {
        let ticks = ManualTicks::new(0);
        let mut tx_storage = [0u8; 32];
        let mut rx_storage = [0u8; 8];
        let tx = RingBuffer::new(&mut tx_storage).unwrap();
        let rx = RingBuffer::new(&mut rx_storage).unwrap();
        let mut port: SerialPort<'_, MockUart, &ManualTicks> =
            SerialPort::new(MockUart::new(), &ticks, &tx, &rx, PortConfig::default()).unwrap();

        write!(port, "t={}ms", 42).unwrap();
        assert_eq!(port.flush(), Err(PortError::Busy));

        port.peripheral_mut().tx_room = 32;
        port.on_tx_interrupt();
        port.on_tx_interrupt();
        assert_eq!(port.flush(), Ok(()));
        assert_eq!(port.peripheral().sent, b"t=42ms");
    }

    #[test]
    fn test_write_hex_encodes_for_ascii() {
        let ticks = ManualTicks::new(0);
        let mut tx_storage = [0u8; 8];
        let mut rx_storage = [0u8; 8];
        let tx = RingBuffer::with_config(&mut tx_storage, BufferKind::Stream, BufferFormat::Ascii)
            .unwrap();
        let rx = RingBuffer::new(&mut rx_storage).unwrap();
        let mut port: SerialPort<'_, MockUart, &ManualTicks> =
            SerialPort::new(MockUart::new(), &ticks, &tx, &rx, PortConfig::default()).unwrap();
        port.peripheral_mut().tx_room = 0;

        // Seven free bytes hold three hex pairs
        assert_eq!(port.write(&[1, 2, 3, 4]), Ok(3));
        assert_eq!(tx.count(), 6);
        assert_eq!(port.write(&[]), Ok(0));
    }
}
