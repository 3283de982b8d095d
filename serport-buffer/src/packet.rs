//! Packet framing
//!
//! Packet buffers hold length-prefixed records:
//!
//! ```text
//! Packet:       ┌─────┬──────────────┐
//!               │ LEN │ LEN bytes    │   LEN in 1..=254
//!               └─────┴──────────────┘
//! LargePacket:  ┌─────┬─────┬────────┐
//!               │ HI  │ LO  │ bytes  │   length in 1..=65279, big-endian
//!               └─────┴─────┴────────┘
//! ```
//!
//! A record never crosses the physical end of storage. When the tail is too
//! short for the next record but the start of the buffer has room, a single
//! [`FILLER`] byte is written at the put offset and the record goes to
//! offset 0. Readers drop fillers transparently, so every payload can be
//! handed out as one contiguous slice.
//!
//! Empty payloads are not representable: writers reject them and readers
//! report a zero prefix as [`BufferError::ZeroLength`] without consuming it.

use crate::ring::{Consumer, Producer, RingBuffer};
use crate::{BufferError, BufferKind, FILLER};

impl RingBuffer<'_> {
    fn packet_prefix(&self) -> Result<usize, BufferError> {
        self.kind().prefix_len().ok_or(BufferError::WrongKind)
    }
}

/// Where a packet of `required` bytes can be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// At the current put offset
    InPlace,
    /// At offset 0, after a filler
    AfterFiller,
}

fn placement(capacity: usize, put: usize, get: usize, required: usize) -> Option<Placement> {
    if get > put {
        return (required < get - put).then_some(Placement::InPlace);
    }
    let tail = if get == 0 { capacity - put - 1 } else { capacity - put };
    if required <= tail {
        Some(Placement::InPlace)
    } else if get != 0 && required < get {
        Some(Placement::AfterFiller)
    } else {
        None
    }
}

fn encode_prefix(kind: BufferKind, len: usize, out: &mut [u8; 2]) -> &[u8] {
    debug_assert!(len >= 1 && len <= kind.max_payload());
    match kind {
        BufferKind::LargePacket => {
            *out = (len as u16).to_be_bytes();
            &out[..]
        }
        _ => {
            out[0] = len as u8;
            &out[..1]
        }
    }
}

impl Producer<'_> {
    /// Write one packet, all or nothing
    ///
    /// Returns the payload length. On `NoSpace` nothing is written and the
    /// sticky error flag is latched; all other errors leave the buffer
    /// untouched.
    pub fn put_packet(&mut self, payload: &[u8]) -> Result<usize, BufferError> {
        let kind = self.ring.kind();
        let prefix = self.ring.packet_prefix()?;
        if payload.is_empty() {
            return Err(BufferError::EmptyPacket);
        }
        if payload.len() > kind.max_payload() {
            return Err(BufferError::PayloadTooLarge);
        }

        let required = prefix + payload.len();
        let put = self.ring.put_offset();
        let get = self.ring.get_offset();
        let Some(placement) = placement(self.ring.capacity(), put, get, required) else {
            self.ring.flag_error();
            return Err(BufferError::NoSpace);
        };

        let mut header = [0u8; 2];
        let header = encode_prefix(kind, payload.len(), &mut header);

        let mut shadow = self.begin();
        if placement == Placement::AfterFiller {
            shadow.pad_to_start(FILLER)?;
        }
        shadow.write_slice(header)?;
        shadow.write_slice(payload)?;
        shadow.commit();
        Ok(payload.len())
    }

    /// Largest payload [`put_packet`](Self::put_packet) would accept now
    ///
    /// Zero for stream buffers.
    pub fn free_for_packet(&self) -> usize {
        let Ok(prefix) = self.ring.packet_prefix() else {
            return 0;
        };
        let capacity = self.ring.capacity();
        let put = self.ring.put_offset();
        let get = self.ring.get_offset();

        let (tail, head) = if get > put {
            (get - put - 1, 0)
        } else if get == 0 {
            (capacity - put - 1, 0)
        } else {
            (capacity - put, get - 1)
        };

        tail.max(head)
            .saturating_sub(prefix)
            .min(self.ring.kind().max_payload())
    }
}

impl<'r> Consumer<'r> {
    /// Drop filler records sitting at the get offset
    fn skip_fillers(&mut self) {
        while self.peek() == Some(FILLER) {
            // A filler always pads the physical tail; the record it
            // precedes starts at offset 0.
            self.ring.publish_get(0);
        }
    }

    /// Size (prefix plus payload) of the next complete packet
    ///
    /// Returns `Ok(None)` while the next packet is incomplete or the buffer
    /// is empty. Fillers in front of it are removed.
    pub fn has_whole_packet(&mut self) -> Result<Option<usize>, BufferError> {
        let kind = self.ring.kind();
        let prefix = self.ring.packet_prefix()?;
        self.skip_fillers();

        let count = self.count();
        if count < prefix {
            return Ok(None);
        }

        let len = match kind {
            BufferKind::LargePacket => {
                let hi = self.peek_at(0).unwrap_or(0);
                let lo = self.peek_at(1).unwrap_or(0);
                u16::from_be_bytes([hi, lo]) as usize
            }
            _ => self.peek_at(0).unwrap_or(0) as usize,
        };
        if len == 0 {
            return Err(BufferError::ZeroLength);
        }
        debug_assert!(len <= kind.max_payload(), "packet length out of range");

        let whole = prefix + len;
        Ok((count >= whole).then_some(whole))
    }

    /// Payload length of the next complete packet
    pub fn peek_packet_len(&mut self) -> Result<Option<usize>, BufferError> {
        let prefix = self.ring.packet_prefix()?;
        Ok(self.has_whole_packet()?.map(|whole| whole - prefix))
    }

    /// Payload of the next complete packet as one contiguous slice
    ///
    /// The packet stays in the buffer until [`remove_packet`](Self::remove_packet).
    pub fn packet(&mut self) -> Result<Option<&[u8]>, BufferError> {
        let prefix = self.ring.packet_prefix()?;
        let Some(whole) = self.has_whole_packet()? else {
            return Ok(None);
        };
        let start = self.ring.get_offset() + prefix;
        Ok(Some(self.ring.slice(start, whole - prefix)))
    }

    /// Byte `index` of the next complete packet's payload
    pub fn peek_packet_byte(&mut self, index: usize) -> Result<Option<u8>, BufferError> {
        Ok(self.packet()?.and_then(|payload| payload.get(index).copied()))
    }

    /// Copy the next complete packet into `dst` and remove it
    ///
    /// Returns the payload length. If `dst` is too small the packet stays
    /// in the buffer.
    pub fn get_packet(&mut self, dst: &mut [u8]) -> Result<Option<usize>, BufferError> {
        let len = match self.packet()? {
            Some(payload) if payload.len() > dst.len() => return Err(BufferError::TooSmall),
            Some(payload) => {
                dst[..payload.len()].copy_from_slice(payload);
                payload.len()
            }
            None => return Ok(None),
        };
        self.remove_packet()?;
        Ok(Some(len))
    }

    /// Discard the next complete packet, returning its payload length
    pub fn remove_packet(&mut self) -> Result<Option<usize>, BufferError> {
        let prefix = self.ring.packet_prefix()?;
        let Some(whole) = self.has_whole_packet()? else {
            return Ok(None);
        };
        self.remove(whole);
        Ok(Some(whole - prefix))
    }

    /// Compare the next complete packet's payload with `bytes`
    pub fn packet_eq(&mut self, bytes: &[u8]) -> Result<bool, BufferError> {
        Ok(self.packet()?.is_some_and(|payload| payload == bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BufferFormat;
    use proptest::prelude::*;
    use std::vec::Vec;

    fn packet_ring(storage: &mut [u8]) -> RingBuffer<'_> {
        RingBuffer::with_config(storage, BufferKind::Packet, BufferFormat::Binary).unwrap()
    }

    /// Advance both offsets of an empty ring to `offset`
    fn park_at(tx: &mut Producer<'_>, rx: &mut Consumer<'_>, offset: usize) {
        for _ in 0..offset {
            tx.put(0);
        }
        rx.remove(offset);
    }

    #[test]
    fn test_packet_round_trip() {
        let mut storage = [0u8; 16];
        let ring = packet_ring(&mut storage);
        let (mut tx, mut rx) = ring.split().unwrap();

        assert_eq!(tx.put_packet(b"hello"), Ok(5));
        assert_eq!(rx.has_whole_packet(), Ok(Some(6)));
        assert_eq!(rx.peek_packet_len(), Ok(Some(5)));
        assert_eq!(rx.peek_packet_byte(1), Ok(Some(b'e')));
        assert_eq!(rx.packet_eq(b"hello"), Ok(true));
        assert_eq!(rx.packet(), Ok(Some(&b"hello"[..])));

        let mut out = [0u8; 8];
        assert_eq!(rx.get_packet(&mut out), Ok(Some(5)));
        assert_eq!(&out[..5], b"hello");
        assert_eq!(rx.has_whole_packet(), Ok(None));
    }

    #[test]
    fn test_filler_layout() {
        let mut storage = [0u8; 16];
        {
            let ring = packet_ring(&mut storage);
            let (mut tx, mut rx) = ring.split().unwrap();
            park_at(&mut tx, &mut rx, 14);

            // Tail holds 2 bytes, the record needs 4
            assert_eq!(tx.put_packet(&[0xA1, 0xA2, 0xA3]), Ok(3));
            assert_eq!(ring.count(), 6);

            assert_eq!(rx.has_whole_packet(), Ok(Some(4)));
            assert_eq!(rx.packet(), Ok(Some(&[0xA1, 0xA2, 0xA3][..])));
        }
        assert_eq!(&storage[..4], &[3, 0xA1, 0xA2, 0xA3]);
        assert_eq!(storage[14], FILLER);
        assert_eq!(storage[15], 0);
    }

    #[test]
    fn test_exact_tail_fit_needs_no_filler() {
        let mut storage = [0u8; 16];
        {
            let ring = packet_ring(&mut storage);
            let (mut tx, mut rx) = ring.split().unwrap();
            park_at(&mut tx, &mut rx, 12);

            assert_eq!(tx.put_packet(&[1, 2, 3]), Ok(3));
            assert_eq!(rx.has_whole_packet(), Ok(Some(4)));
            assert_eq!(rx.remove_packet(), Ok(Some(3)));
            assert!(rx.is_empty());
        }
        assert_eq!(&storage[12..], &[3, 1, 2, 3]);
    }

    #[test]
    fn test_no_space_is_all_or_nothing() {
        let mut storage = [0u8; 8];
        let ring = packet_ring(&mut storage);
        let (mut tx, mut rx) = ring.split().unwrap();

        assert_eq!(tx.put_packet(&[1, 2, 3, 4]), Ok(4));
        assert_eq!(tx.put_packet(&[5, 6, 7]), Err(BufferError::NoSpace));
        assert!(ring.has_error());
        assert_eq!(ring.count(), 5);
        assert_eq!(rx.remove_packet(), Ok(Some(4)));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_no_filler_when_reader_at_zero() {
        let mut storage = [0u8; 8];
        let ring = packet_ring(&mut storage);
        let (mut tx, rx) = ring.split().unwrap();

        assert_eq!(tx.put_packet(&[1, 2]), Ok(2));
        assert_eq!(tx.free_for_packet(), 3);
        assert_eq!(tx.put_packet(&[1, 2, 3, 4]), Err(BufferError::NoSpace));
        drop(rx);
    }

    #[test]
    fn test_free_for_packet_prefers_larger_region() {
        let mut storage = [0u8; 16];
        let ring = packet_ring(&mut storage);
        let (mut tx, mut rx) = ring.split().unwrap();
        park_at(&mut tx, &mut rx, 13);

        // Tail of 3 slots, head of 12 usable after a filler
        assert_eq!(tx.free_for_packet(), 11);
        assert_eq!(tx.put_packet(&[7; 11]), Ok(11));
        assert_eq!(rx.packet().unwrap().map(|p| p.len()), Some(11));
    }

    #[test]
    fn test_empty_and_oversized_rejected() {
        let mut storage = [0u8; 300];
        let ring = packet_ring(&mut storage);
        let mut tx = ring.producer().unwrap();

        assert_eq!(tx.put_packet(&[]), Err(BufferError::EmptyPacket));
        assert_eq!(tx.put_packet(&[0; 255]), Err(BufferError::PayloadTooLarge));
        assert_eq!(tx.put_packet(&[0; 254]), Ok(254));
        assert!(!ring.has_error());
    }

    #[test]
    fn test_zero_length_prefix_reported() {
        let mut storage = [0u8; 8];
        let ring = packet_ring(&mut storage);
        let (mut tx, mut rx) = ring.split().unwrap();

        tx.put(0);
        tx.put(0x55);
        assert_eq!(rx.has_whole_packet(), Err(BufferError::ZeroLength));
        assert_eq!(rx.count(), 2);
        rx.clear();
        assert_eq!(rx.has_whole_packet(), Ok(None));
    }

    #[test]
    fn test_stream_rejects_packet_ops() {
        let mut storage = [0u8; 8];
        let ring = RingBuffer::new(&mut storage).unwrap();
        let (mut tx, mut rx) = ring.split().unwrap();

        assert_eq!(tx.put_packet(b"x"), Err(BufferError::WrongKind));
        assert_eq!(tx.free_for_packet(), 0);
        assert_eq!(rx.has_whole_packet(), Err(BufferError::WrongKind));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_large_packet() {
        let mut storage = [0u8; 600];
        let ring =
            RingBuffer::with_config(&mut storage, BufferKind::LargePacket, BufferFormat::Binary)
                .unwrap();
        let (mut tx, mut rx) = ring.split().unwrap();

        let payload = [0x5Au8; 300];
        assert_eq!(tx.put_packet(&payload), Ok(300));
        assert_eq!(rx.peek_at(0), Some(0x01));
        assert_eq!(rx.peek_at(1), Some(0x2C));
        assert_eq!(rx.has_whole_packet(), Ok(Some(302)));
        assert_eq!(rx.remove_packet(), Ok(Some(300)));

        assert_eq!(tx.put_packet(&[2u8; 250]), Ok(250));
        assert_eq!(rx.remove_packet(), Ok(Some(250)));

        // Offsets now at 554; a 302-byte record wraps behind a filler
        assert_eq!(tx.put_packet(&payload), Ok(300));
        assert_eq!(rx.peek_at(0), Some(FILLER));
        assert_eq!(rx.peek_packet_len(), Ok(Some(300)));
        assert_eq!(rx.packet_eq(&payload), Ok(true));
        assert_eq!(rx.count(), 302);
    }

    #[test]
    fn test_large_packet_one_byte_tail_filler() {
        let mut storage = [0u8; 16];
        {
            let ring = RingBuffer::with_config(
                &mut storage,
                BufferKind::LargePacket,
                BufferFormat::Binary,
            )
            .unwrap();
            let (mut tx, mut rx) = ring.split().unwrap();
            park_at(&mut tx, &mut rx, 15);

            // Only the last slot is free before the wrap
            assert_eq!(tx.put_packet(&[0xB1, 0xB2, 0xB3]), Ok(3));
            assert_eq!(ring.count(), 6);
            assert_eq!(rx.has_whole_packet(), Ok(Some(5)));
            assert_eq!(rx.packet(), Ok(Some(&[0xB1, 0xB2, 0xB3][..])));

            assert_eq!(rx.remove_packet(), Ok(Some(3)));
            assert_eq!(ring.count(), 0);
            assert_eq!(rx.has_whole_packet(), Ok(None));
        }
        assert_eq!(storage[15], FILLER);
        assert_eq!(&storage[..5], &[0, 3, 0xB1, 0xB2, 0xB3]);
    }

    #[test]
    fn test_whole_packet_fills_to_last_usable_slot() {
        let mut storage = [0u8; 16];
        {
            let ring = packet_ring(&mut storage);
            let (mut tx, mut rx) = ring.split().unwrap();

            // Reader at 0, so the record may reach capacity - 1
            let payload = [0x3Cu8; 14];
            assert_eq!(tx.put_packet(&payload), Ok(14));
            assert_eq!(ring.count(), 15);
            assert_eq!(rx.has_whole_packet(), Ok(Some(15)));
            assert_eq!(rx.packet_eq(&payload), Ok(true));

            assert_eq!(rx.remove_packet(), Ok(Some(14)));
            assert_eq!(ring.count(), 0);
        }
        assert_eq!(storage[0], 14);
        assert_eq!(storage[15], 0);
    }

    #[test]
    fn test_get_packet_too_small_keeps_packet() {
        let mut storage = [0u8; 16];
        let ring = packet_ring(&mut storage);
        let (mut tx, mut rx) = ring.split().unwrap();

        tx.put_packet(b"abcd").unwrap();
        let mut out = [0u8; 2];
        assert_eq!(rx.get_packet(&mut out), Err(BufferError::TooSmall));
        assert_eq!(rx.peek_packet_len(), Ok(Some(4)));
    }

    proptest! {
        #[test]
        fn test_packets_survive_wrapping(
            lens in prop::collection::vec(1usize..12, 1..60),
        ) {
            let mut storage = [0u8; 23];
            let ring = packet_ring(&mut storage);
            let (mut tx, mut rx) = ring.split().unwrap();
            let mut expected = std::collections::VecDeque::new();

            for (i, len) in lens.into_iter().enumerate() {
                let payload: Vec<u8> = (0..len).map(|j| (i * 31 + j) as u8).collect();
                let fits = tx.free_for_packet() >= len;
                let result = tx.put_packet(&payload);
                prop_assert_eq!(result.is_ok(), fits);
                if result.is_ok() {
                    expected.push_back(payload);
                }
                // Drain every other round to keep the offsets moving
                if i % 2 == 1 {
                    while let Some(want) = expected.pop_front() {
                        let got = rx.packet().unwrap().map(|p| p.to_vec());
                        prop_assert_eq!(got, Some(want));
                        rx.remove_packet().unwrap();
                    }
                    prop_assert!(rx.is_empty());
                }
            }
        }
    }
}
