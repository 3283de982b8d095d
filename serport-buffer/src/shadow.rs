//! Shadow transactions
//!
//! A shadow transaction writes into the free region of a ring through a
//! private cursor. Nothing it writes is visible to the consumer until
//! [`ShadowTransaction::commit`] publishes the cursor as the new put offset
//! with a single atomic store. Dropping the transaction without committing
//! discards everything it wrote.
//!
//! This is how records whose header depends on their body (length prefixes,
//! escaped frames) are produced without the reader ever seeing half of one.

use crate::ring::Producer;
use crate::BufferError;

/// Position of a byte written inside a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMark(usize);

/// Speculative writer over a [`Producer`]
///
/// Borrows the producer mutably, so no other put operation can interleave.
#[must_use = "a shadow transaction publishes nothing until committed"]
pub struct ShadowTransaction<'p, 'r> {
    producer: &'p mut Producer<'r>,
    /// Put offset when the transaction began
    start: usize,
    /// Private put offset
    cursor: usize,
    /// Lowest position `unwrite` may rewind to
    floor: usize,
    /// Slots consumed so far, including skipped tail space
    staged: usize,
}

impl<'r> Producer<'r> {
    /// Begin a shadow transaction at the current put offset
    pub fn begin(&mut self) -> ShadowTransaction<'_, 'r> {
        let start = self.ring.put_offset();
        ShadowTransaction {
            producer: self,
            start,
            cursor: start,
            floor: start,
            staged: 0,
        }
    }
}

impl<'p, 'r> ShadowTransaction<'p, 'r> {
    /// Number of slots staged, including any filler padding
    pub fn len(&self) -> usize {
        self.staged
    }

    pub fn is_empty(&self) -> bool {
        self.staged == 0
    }

    /// Free slots still available to this transaction
    pub fn remaining(&self) -> usize {
        let ring = self.producer.ring;
        ring.free() - self.staged
    }

    /// Stage one byte
    ///
    /// Fails with `NoSpace` (and latches the sticky flag) when the next slot
    /// belongs to the consumer.
    pub fn write(&mut self, byte: u8) -> Result<(), BufferError> {
        let ring = self.producer.ring;
        let next = ring.wrap(self.cursor + 1);
        if next == ring.get_offset() {
            ring.flag_error();
            return Err(BufferError::NoSpace);
        }
        ring.write_slot(self.cursor, byte);
        self.cursor = next;
        self.staged += 1;
        Ok(())
    }

    /// Stage every byte of `bytes`, stopping at the first failure
    pub fn write_slice(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        bytes.iter().try_for_each(|&b| self.write(b))
    }

    /// Position of the next byte to be written
    pub fn mark(&self) -> ShadowMark {
        ShadowMark(self.cursor)
    }

    /// Overwrite a byte staged earlier in this transaction
    ///
    /// `mark` must have been taken from this transaction and written since;
    /// anything else is rejected with `OutOfRange`.
    pub fn patch(&mut self, mark: ShadowMark, byte: u8) -> Result<(), BufferError> {
        let ring = self.producer.ring;
        let capacity = ring.capacity();
        let offset = ring.wrap(mark.0 % capacity + capacity - self.start);
        let written = ring.wrap(self.cursor + capacity - self.start);
        // A full-circle transaction is impossible, so `written == 0` means empty
        if offset >= written {
            return Err(BufferError::OutOfRange);
        }
        ring.write_slot(mark.0, byte);
        Ok(())
    }

    /// Remove the most recently staged byte
    ///
    /// Does not rewind past a filler jump.
    pub fn unwrite(&mut self) -> Option<u8> {
        if self.cursor == self.floor {
            return None;
        }
        let ring = self.producer.ring;
        self.cursor = ring.wrap(self.cursor + ring.capacity() - 1);
        self.staged -= 1;
        Some(ring.read_slot(self.cursor))
    }

    /// Write a filler byte and continue at offset 0
    ///
    /// Only possible when the consumer is not inside the skipped tail and is
    /// not parked at offset 0.
    pub(crate) fn pad_to_start(&mut self, filler: u8) -> Result<(), BufferError> {
        let ring = self.producer.ring;
        let get = ring.get_offset();
        if get == 0 || get > self.cursor {
            ring.flag_error();
            return Err(BufferError::NoSpace);
        }
        ring.write_slot(self.cursor, filler);
        self.staged += ring.capacity() - self.cursor;
        self.cursor = 0;
        self.floor = 0;
        Ok(())
    }

    /// Publish everything staged with one atomic store
    ///
    /// Returns the number of slots published.
    pub fn commit(self) -> usize {
        self.producer.ring.publish_put(self.cursor);
        self.staged
    }

    /// Discard everything staged
    pub fn rollback(self) {}
}
