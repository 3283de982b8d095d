//! Addressed transaction status
//!
//! Multi-drop bus protocols queue a frame for some device address and later
//! ask how it went. The port keeps the outcome of recent transactions in a
//! small most-recent-first table keyed by address.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Raw code of a free status slot
pub const NOT_AVAILABLE: u8 = 0xFF;

/// Outcome of an addressed transaction
///
/// The discriminants are the numeric codes bus protocols exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum TxStatus {
    Ok = 0,
    /// Queued in the TX buffer, not yet on the wire
    AddedToBuf = 1,
    /// Left the TX buffer
    Transmitted = 2,
    Error = 4,
    NoSpace = 5,
    AddressNack = 6,
    DataNack = 7,
    BufferFormat = 8,
    Timeout = 9,
}

impl TxStatus {
    /// Decode a status code
    ///
    /// Returns `None` for [`NOT_AVAILABLE`] and unassigned codes.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::AddedToBuf),
            2 => Some(Self::Transmitted),
            4 => Some(Self::Error),
            5 => Some(Self::NoSpace),
            6 => Some(Self::AddressNack),
            7 => Some(Self::DataNack),
            8 => Some(Self::BufferFormat),
            9 => Some(Self::Timeout),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether the transaction is still waiting to go out
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::AddedToBuf)
    }

    /// Whether the status reports a failure
    pub const fn is_failure(self) -> bool {
        !matches!(self, Self::Ok | Self::AddedToBuf | Self::Transmitted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Entry {
    address: u8,
    status: TxStatus,
}

/// Bounded address to status table, most recent first
///
/// Addresses are stored with the read/write bit (bit 0) cleared, so a
/// write to `0x50` and a read from `0x51` share one entry. When the table
/// is full the oldest entry is evicted.
#[derive(Debug, Clone)]
pub struct AddressStatusRing<const S: usize> {
    entries: Vec<Entry, S>,
}

impl<const S: usize> Default for AddressStatusRing<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const S: usize> AddressStatusRing<S> {
    const NON_EMPTY: () = assert!(S > 0, "status ring needs at least one slot");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NON_EMPTY;
        Self {
            entries: Vec::new(),
        }
    }

    const fn key(address: u8) -> u8 {
        address & 0xFE
    }

    fn position(&self, address: u8) -> Option<usize> {
        let key = Self::key(address);
        self.entries.iter().position(|e| e.address == key)
    }

    /// Record `status` for `address`, making it the most recent entry
    pub fn record(&mut self, address: u8, status: TxStatus) {
        if let Some(index) = self.position(address) {
            self.entries.remove(index);
        } else if self.entries.is_full() {
            self.entries.pop();
        }
        // A slot was freed above, so the insert cannot fail
        let _ = self.entries.insert(
            0,
            Entry {
                address: Self::key(address),
                status,
            },
        );
    }

    /// Remove and return the status recorded for `address`
    pub fn take(&mut self, address: u8) -> Option<TxStatus> {
        let index = self.position(address)?;
        Some(self.entries.remove(index).status)
    }

    /// Status recorded for `address`, left in place
    pub fn peek(&self, address: u8) -> Option<TxStatus> {
        self.position(address).map(|i| self.entries[i].status)
    }

    /// Move every entry with status `from` to `to`
    ///
    /// Returns the number of entries updated.
    pub fn mark_pending(&mut self, from: TxStatus, to: TxStatus) -> usize {
        let mut updated = 0;
        for entry in self.entries.iter_mut().filter(|e| e.status == from) {
            entry.status = to;
            updated += 1;
        }
        updated
    }

    /// Whether any transaction is still queued
    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| e.status.is_pending())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
