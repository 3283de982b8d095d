//! Stream helpers
//!
//! Convenience operations on top of the raw byte store: bulk copies,
//! little-endian words, ASCII number rendering, delimiter search and the
//! busy-waiting writer for interrupt-serviced ports.

use core::fmt::Write as _;

use heapless::String;

use crate::ring::{Consumer, Producer};
use crate::WAIT_SPIN_LIMIT;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

impl Producer<'_> {
    /// Put as many bytes of `bytes` as fit
    ///
    /// Returns the number written. A truncated write latches the sticky
    /// error flag.
    pub fn put_slice(&mut self, bytes: &[u8]) -> usize {
        let written = self.put_available(bytes);
        if written < bytes.len() {
            self.ring.flag_error();
        }
        written
    }

    /// Put as many bytes as fit without touching the error flag
    pub(crate) fn put_available(&mut self, bytes: &[u8]) -> usize {
        let mut written = 0;
        while written < bytes.len() {
            let span = self.write_span();
            let n = span.len().min(bytes.len() - written);
            if n == 0 {
                break;
            }
            span[..n].copy_from_slice(&bytes[written..written + n]);
            self.commit_write(n);
            written += n;
        }
        written
    }

    /// Put a whole string or nothing
    ///
    /// Returns the number of bytes written.
    pub fn put_str(&mut self, text: &str) -> usize {
        self.put_all(text.as_bytes())
    }

    /// Put a 16-bit word, least significant byte first
    pub fn put_word(&mut self, word: u16) -> usize {
        self.put_all(&word.to_le_bytes())
    }

    /// Put a byte as two uppercase hex digits
    pub fn put_hex(&mut self, byte: u8) -> usize {
        self.put_all(&hex_pair(byte))
    }

    /// Put a word as four uppercase hex digits, most significant first
    pub fn put_hex_word(&mut self, word: u16) -> usize {
        let [hi, lo] = word.to_be_bytes();
        let [a, b] = hex_pair(hi);
        let [c, d] = hex_pair(lo);
        self.put_all(&[a, b, c, d])
    }

    /// Put a word as unpadded ASCII decimal
    pub fn put_decimal(&mut self, value: u16) -> usize {
        let mut text: String<5> = String::new();
        if write!(text, "{}", value).is_err() {
            return 0;
        }
        self.put_all(text.as_bytes())
    }

    /// Put `bytes` only if all of them fit
    fn put_all(&mut self, bytes: &[u8]) -> usize {
        if bytes.len() > self.free() {
            self.ring.flag_error();
            return 0;
        }
        self.put_available(bytes)
    }

    /// Put every byte, spinning on `service` while the buffer is full
    ///
    /// `service` must make progress on the consumer side (typically by
    /// running the port's task function). Gives up after
    /// [`WAIT_SPIN_LIMIT`] consecutive spins without space and returns the
    /// number of bytes written so far.
    pub fn put_slice_wait(&mut self, bytes: &[u8], mut service: impl FnMut()) -> usize {
        let mut written = 0;
        let mut spins = 0u32;
        while written < bytes.len() {
            let n = self.put_available(&bytes[written..]);
            if n > 0 {
                written += n;
                spins = 0;
                continue;
            }
            if spins >= WAIT_SPIN_LIMIT {
                self.ring.flag_error();
                break;
            }
            spins += 1;
            service();
        }
        written
    }
}

/// Uppercase hex digits for one byte
pub fn hex_pair(byte: u8) -> [u8; 2] {
    [
        HEX_DIGITS[(byte >> 4) as usize],
        HEX_DIGITS[(byte & 0x0F) as usize],
    ]
}

impl Consumer<'_> {
    /// Copy bytes up to and including the first `value`, then remove them
    ///
    /// Returns `None` (removing nothing) if `dst` fills up before `value`
    /// is found and unread data remains. If all available data is copied
    /// without finding `value`, it is removed and its length returned.
    pub fn get_until(&mut self, value: u8, dst: &mut [u8]) -> Option<usize> {
        let available = self.count();
        let limit = available.min(dst.len());

        let mut copied = 0;
        let mut found = false;
        while copied < limit {
            let Some(byte) = self.peek_at(copied) else {
                break;
            };
            dst[copied] = byte;
            copied += 1;
            if byte == value {
                found = true;
                break;
            }
        }

        if !found && copied < available {
            return None;
        }
        self.remove(copied);
        Some(copied)
    }

    /// Offset of the first `value` at or after `offset`
    pub fn find(&self, offset: usize, value: u8) -> Option<usize> {
        (offset..self.count()).find(|&i| self.peek_at(i) == Some(value))
    }

    /// Move as many bytes as fit into another buffer
    ///
    /// Returns the number moved. Neither buffer's error flag is touched.
    pub fn move_into(&mut self, dst: &mut Producer<'_>) -> usize {
        let mut moved = 0;
        loop {
            let (n, span_len) = {
                let span = self.read_span();
                (dst.put_available(span), span.len())
            };
            self.remove(n);
            moved += n;
            if n == 0 || n < span_len {
                break;
            }
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use crate::RingBuffer;
    use std::vec::Vec;

    #[test]
    fn test_put_slice_truncates_and_flags() {
        let mut storage = [0u8; 5];
        let ring = RingBuffer::new(&mut storage).unwrap();
        let (mut tx, mut rx) = ring.split().unwrap();

        assert_eq!(tx.put_slice(b"abcdef"), 4);
        assert!(ring.has_error());

        let mut out = [0u8; 4];
        rx.get_slice(&mut out);
        assert_eq!(&out, b"abcd");
    }

    #[test]
    fn test_put_str_all_or_nothing() {
        let mut storage = [0u8; 6];
        let ring = RingBuffer::new(&mut storage).unwrap();
        let mut tx = ring.producer().unwrap();

        assert_eq!(tx.put_str("abc"), 3);
        assert_eq!(tx.put_str("xyz"), 0);
        assert_eq!(ring.count(), 3);
        assert!(ring.has_error());
    }

    #[test]
    fn test_number_rendering() {
        let mut storage = [0u8; 32];
        let ring = RingBuffer::new(&mut storage).unwrap();
        let (mut tx, mut rx) = ring.split().unwrap();

        assert_eq!(tx.put_word(0x1234), 2);
        assert_eq!(tx.put_hex(0x5A), 2);
        assert_eq!(tx.put_hex_word(0xBEEF), 4);
        assert_eq!(tx.put_decimal(0), 1);
        assert_eq!(tx.put_decimal(65535), 5);

        let mut out = [0u8; 14];
        assert_eq!(rx.get_slice(&mut out), 14);
        assert_eq!(&out, b"\x34\x125ABEEF065535");
    }

    #[test]
    fn test_get_until_found() {
        let mut storage = [0u8; 16];
        let ring = RingBuffer::new(&mut storage).unwrap();
        let (mut tx, mut rx) = ring.split().unwrap();

        tx.put_str("ab\ncd");
        let mut line = [0u8; 8];
        assert_eq!(rx.get_until(b'\n', &mut line), Some(3));
        assert_eq!(&line[..3], b"ab\n");
        assert_eq!(rx.count(), 2);
    }

    #[test]
    fn test_get_until_dst_too_small() {
        let mut storage = [0u8; 16];
        let ring = RingBuffer::new(&mut storage).unwrap();
        let (mut tx, mut rx) = ring.split().unwrap();

        tx.put_str("abcdef\n");
        let mut line = [0u8; 4];
        assert_eq!(rx.get_until(b'\n', &mut line), None);
        assert_eq!(rx.count(), 7);
    }

    #[test]
    fn test_get_until_takes_everything_without_delimiter() {
        let mut storage = [0u8; 16];
        let ring = RingBuffer::new(&mut storage).unwrap();
        let (mut tx, mut rx) = ring.split().unwrap();

        tx.put_str("abc");
        let mut line = [0u8; 8];
        assert_eq!(rx.get_until(b'\n', &mut line), Some(3));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_find() {
        let mut storage = [0u8; 8];
        let ring = RingBuffer::new(&mut storage).unwrap();
        let (mut tx, rx) = ring.split().unwrap();

        tx.put_slice(&[1, 2, 3, 2]);
        assert_eq!(rx.find(0, 2), Some(1));
        assert_eq!(rx.find(2, 2), Some(3));
        assert_eq!(rx.find(0, 9), None);
    }

    #[test]
    fn test_move_into_partial() {
        let mut src_storage = [0u8; 8];
        let mut dst_storage = [0u8; 4];
        let src = RingBuffer::new(&mut src_storage).unwrap();
        let dst = RingBuffer::new(&mut dst_storage).unwrap();
        let (mut src_tx, mut src_rx) = src.split().unwrap();
        let mut dst_tx = dst.producer().unwrap();

        src_tx.put_slice(&[1, 2, 3, 4, 5]);
        assert_eq!(src_rx.move_into(&mut dst_tx), 3);
        assert_eq!(src_rx.count(), 2);
        assert_eq!(dst.count(), 3);
        assert!(!dst.has_error());
    }

    #[test]
    fn test_put_slice_wait_services_consumer() {
        let mut storage = [0u8; 4];
        let ring = RingBuffer::new(&mut storage).unwrap();
        let (mut tx, rx) = ring.split().unwrap();
        let rx = core::cell::RefCell::new(rx);
        let mut drained = Vec::new();

        let written = tx.put_slice_wait(b"abcdefgh", || {
            let mut rx = rx.borrow_mut();
            drained.extend(rx.get());
        });
        assert_eq!(written, 8);

        let mut rx = rx.into_inner();
        while let Some(b) = rx.get() {
            drained.push(b);
        }
        assert_eq!(drained, b"abcdefgh");
    }

    #[test]
    fn test_put_slice_wait_gives_up() {
        let mut storage = [0u8; 4];
        let ring = RingBuffer::new(&mut storage).unwrap();
        let mut tx = ring.producer().unwrap();

        let mut calls = 0u32;
        assert_eq!(tx.put_slice_wait(b"abcdef", || calls += 1), 3);
        assert_eq!(calls, crate::WAIT_SPIN_LIMIT);
        assert!(ring.has_error());
    }
}
