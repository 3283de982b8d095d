//! Buffer configuration and error types

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{MAX_LARGE_PACKET_LEN, MAX_PACKET_LEN};

/// How the bytes in a buffer are framed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BufferKind {
    /// Opaque byte stream
    #[default]
    Stream,
    /// Records with a 1-byte length prefix (1..=254 bytes)
    Packet,
    /// Records with a 2-byte big-endian length prefix (1..=65279 bytes)
    LargePacket,
}

impl BufferKind {
    /// Length prefix size, or `None` for streams
    pub const fn prefix_len(self) -> Option<usize> {
        match self {
            BufferKind::Stream => None,
            BufferKind::Packet => Some(1),
            BufferKind::LargePacket => Some(2),
        }
    }

    /// Largest payload a single record can carry
    pub const fn max_payload(self) -> usize {
        match self {
            BufferKind::Stream => 0,
            BufferKind::Packet => MAX_PACKET_LEN,
            BufferKind::LargePacket => MAX_LARGE_PACKET_LEN,
        }
    }

    pub const fn is_packet(self) -> bool {
        !matches!(self, BufferKind::Stream)
    }
}

/// How individual bytes are encoded inside the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BufferFormat {
    /// No format attached; raw access only
    #[default]
    None,
    /// Plain binary
    Binary,
    /// Binary with escape sequences for control codes
    BinaryEscaped,
    /// Uppercase hex pairs and quoted text
    Ascii,
    /// ASCII with control characters and escape sequences
    AsciiEscaped,
}

impl BufferFormat {
    pub const fn is_ascii(self) -> bool {
        matches!(self, BufferFormat::Ascii | BufferFormat::AsciiEscaped)
    }

    /// Check if the format can carry out-of-band control codes
    pub const fn is_escaped(self) -> bool {
        matches!(self, BufferFormat::BinaryEscaped | BufferFormat::AsciiEscaped)
    }
}

/// Errors reported by buffer operations
///
/// Capacity failures additionally latch the buffer's sticky error flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// Storage length outside `MIN_CAPACITY..=MAX_CAPACITY`
    InvalidCapacity,
    /// Not enough (contiguous) free space
    NoSpace,
    /// Operation not valid for this [`BufferKind`]
    WrongKind,
    /// Operation not valid for this [`BufferFormat`]
    WrongFormat,
    /// Payload longer than the record format can describe
    PayloadTooLarge,
    /// Attempt to write an empty packet
    EmptyPacket,
    /// Packet with a zero length prefix found while reading
    ZeroLength,
    /// Destination too small for the requested data
    TooSmall,
    /// Position outside the current transaction
    OutOfRange,
}
