//! Serial peripheral abstractions
//!
//! The port driver talks to the peripheral one byte at a time from its
//! interrupt handler, so these are plain non-blocking register operations
//! rather than the buffered read/write calls of a general UART API.

/// Byte-level access to a UART-like peripheral
///
/// Every method must be callable from interrupt context and must never block.
pub trait SerialPeripheral {
    /// Check if the receive register holds a byte
    fn has_rx_byte(&self) -> bool;

    /// Take one byte from the receive register
    ///
    /// Only valid after [`has_rx_byte`](Self::has_rx_byte) returned `true`.
    fn take_rx_byte(&mut self) -> u8;

    /// Check if the transmit register can accept a byte
    fn can_tx_byte(&self) -> bool;

    /// Write one byte to the transmit register
    ///
    /// Only valid after [`can_tx_byte`](Self::can_tx_byte) returned `true`.
    fn put_tx_byte(&mut self, byte: u8);

    /// Clear latched line errors, returning the ones that were set
    fn clear_error_flags(&mut self) -> LineErrors;

    /// Transmission is starting; enable the transmit interrupt
    fn start_tx(&mut self) {}

    /// Nothing left to send; mask a level-triggered transmit interrupt
    fn stop_tx(&mut self) {}
}

/// Latched receive line errors
///
/// Bit positions follow the UART status register layout (OERR/FERR/PERR)
/// so implementations can pass the masked register value straight through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineErrors(u8);

impl LineErrors {
    /// No errors
    pub const NONE: Self = Self(0);
    /// Receive overrun, data was lost in the peripheral FIFO
    pub const OVERRUN: Self = Self(0x02);
    /// Framing error (missing stop bit)
    pub const FRAMING: Self = Self(0x04);
    /// Parity mismatch
    pub const PARITY: Self = Self(0x08);

    const MASK: u8 = 0x0E;

    /// Build from a raw status register value, ignoring unrelated bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    /// Raw bit value
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Check if no error bit is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn overrun(self) -> bool {
        self.contains(Self::OVERRUN)
    }

    pub fn framing(self) -> bool {
        self.contains(Self::FRAMING)
    }

    pub fn parity(self) -> bool {
        self.contains(Self::PARITY)
    }
}

impl core::ops::BitOr for LineErrors {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for LineErrors {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
