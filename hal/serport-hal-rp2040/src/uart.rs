//! PL011 UART register access
//!
//! embassy-rp configures the pins, baud rate and frame format; after that
//! the port driver owns the data path and talks to the FIFOs directly from
//! the `UARTx_IRQ` handler.

use embassy_rp::pac;
use embassy_rp::uart::{Blocking, Instance, Uart};
use serport_hal::{LineErrors, SerialPeripheral};

/// PL011 UART driven byte by byte
pub struct Pl011Uart<'d, T: Instance> {
    /// Keeps the pins and the peripheral claimed
    _uart: Uart<'d, T, Blocking>,
    regs: pac::uart::Uart,
}

impl<'d, T: Instance> Pl011Uart<'d, T> {
    /// Take over a configured blocking UART
    ///
    /// `regs` must be the register block of the same instance (for example
    /// `embassy_rp::pac::UART0`). Enables the receive and receive-timeout
    /// interrupts; the transmit interrupt is enabled only while sending.
    ///
    /// The transmit interrupt fires only when the FIFO drains past its
    /// trigger level, which a short write never fills up to. The port's
    /// poll routine feeds the FIFO in that case.
    pub fn new(uart: Uart<'d, T, Blocking>, regs: pac::uart::Uart) -> Self {
        // Lowest trigger levels: TX at 1/8 full, RX at 1/8 full
        regs.uartifls().write(|w| {
            w.set_rxiflsel(0b000);
            w.set_txiflsel(0b000);
        });
        regs.uartimsc().modify(|w| {
            w.set_rxim(true);
            w.set_rtim(true);
            w.set_txim(false);
        });
        Self { _uart: uart, regs }
    }
}

impl<T: Instance> SerialPeripheral for Pl011Uart<'_, T> {
    fn has_rx_byte(&self) -> bool {
        !self.regs.uartfr().read().rxfe()
    }

    fn take_rx_byte(&mut self) -> u8 {
        self.regs.uartdr().read().data()
    }

    fn can_tx_byte(&self) -> bool {
        !self.regs.uartfr().read().txff()
    }

    fn put_tx_byte(&mut self, byte: u8) {
        self.regs.uartdr().write(|w| w.set_data(byte));
    }

    fn clear_error_flags(&mut self) -> LineErrors {
        let status = self.regs.uartrsr().read();
        let mut errors = LineErrors::NONE;
        if status.oe() {
            errors |= LineErrors::OVERRUN;
        }
        if status.fe() || status.be() {
            errors |= LineErrors::FRAMING;
        }
        if status.pe() {
            errors |= LineErrors::PARITY;
        }
        if !errors.is_empty() {
            // Any write clears the receive status register
            self.regs.uartrsr().write_value(pac::uart::regs::Uartrsr(0));
        }
        errors
    }

    fn start_tx(&mut self) {
        self.regs.uartimsc().modify(|w| w.set_txim(true));
    }

    fn stop_tx(&mut self) {
        self.regs.uartimsc().modify(|w| w.set_txim(false));
        self.regs.uarticr().write(|w| w.set_txic(true));
    }
}
