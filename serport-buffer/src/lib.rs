//! Ring buffers for serial transports
//!
//! A [`RingBuffer`] wraps caller-supplied storage and is shared between
//! exactly two execution contexts: the one that puts bytes in (usually a
//! task writing outgoing data, or a receive interrupt) and the one that takes
//! them out. Each side works through its own capability handle:
//!
//! ```text
//!            ┌──────────────── RingBuffer ────────────────┐
//! Producer ─►│ put ──► [ . . D D D D D . . . . ] ──► get │─► Consumer
//!            └────────────────────────────────────────────┘
//! ```
//!
//! Handles are claimed once and released on drop, so the single-producer /
//! single-consumer rule is enforced by the type system rather than by
//! convention.
//!
//! On top of the raw byte store the same buffer can be framed as a stream of
//! opaque bytes, or as length-prefixed packets that are always stored in one
//! contiguous span ([`packet`]). Multi-byte records are published atomically
//! through a [`ShadowTransaction`].

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod kind;
pub mod packet;
pub mod ring;
pub mod shadow;
pub mod stream;

pub use kind::{BufferError, BufferFormat, BufferKind};
pub use ring::{Consumer, Producer, RingBuffer};
pub use shadow::{ShadowMark, ShadowTransaction};

/// Smallest usable capacity; one slot is always kept free
pub const MIN_CAPACITY: usize = 2;

/// Largest capacity, bounded by the 16-bit offsets
pub const MAX_CAPACITY: usize = u16::MAX as usize;

/// Spin budget for the blocking "wait" writers before giving up
pub const WAIT_SPIN_LIMIT: u32 = 0xFFFF;

/// Length byte that marks a filler record in packet buffers
pub const FILLER: u8 = 0xFF;

/// Maximum payload of a [`BufferKind::Packet`] record
pub const MAX_PACKET_LEN: usize = 254;

/// Maximum payload of a [`BufferKind::LargePacket`] record
pub const MAX_LARGE_PACKET_LEN: usize = 0xFEFF;
