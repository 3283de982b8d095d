//! Fixed-capacity ring store
//!
//! Offsets are 16-bit atomics. The producer owns `put` and the consumer owns
//! `get`; each side only ever loads the other's offset. Bytes are written
//! before `put` is published with `Release`, and read after it is loaded with
//! `Acquire`, so a consumer never sees a slot before its contents.
//!
//! One slot is always left free: empty is `put == get`, full is
//! `put + 1 == get` (mod capacity).

#![allow(unsafe_code)]

use core::marker::PhantomData;
use core::ptr::NonNull;

use portable_atomic::{AtomicBool, AtomicU16, Ordering};

use crate::{BufferError, BufferFormat, BufferKind, MAX_CAPACITY, MIN_CAPACITY};

/// Ring buffer over caller-supplied storage
///
/// The buffer itself is shared by reference; all reads and writes go
/// through a [`Producer`] or [`Consumer`] handle.
pub struct RingBuffer<'a> {
    storage: NonNull<u8>,
    capacity: usize,
    /// `capacity - 1` when the capacity is a power of two
    mask: Option<usize>,
    put: AtomicU16,
    get: AtomicU16,
    error: AtomicBool,
    producer_claimed: AtomicBool,
    consumer_claimed: AtomicBool,
    kind: BufferKind,
    format: BufferFormat,
    _storage: PhantomData<&'a mut [u8]>,
}

// SAFETY: the storage is exclusively borrowed for 'a and only reached through
// the ring. Offsets and flags are atomics. Byte slots are partitioned between
// the single producer (free region) and the single consumer (readable region),
// and the claim flags guarantee at most one handle of each kind exists.
unsafe impl Send for RingBuffer<'_> {}
unsafe impl Sync for RingBuffer<'_> {}

impl<'a> RingBuffer<'a> {
    /// Create a stream buffer with no format
    pub fn new(storage: &'a mut [u8]) -> Result<Self, BufferError> {
        Self::with_config(storage, BufferKind::Stream, BufferFormat::None)
    }

    /// Create a buffer with the given framing and byte format
    ///
    /// The capacity is the storage length, which must be in
    /// `MIN_CAPACITY..=MAX_CAPACITY`.
    pub fn with_config(
        storage: &'a mut [u8],
        kind: BufferKind,
        format: BufferFormat,
    ) -> Result<Self, BufferError> {
        let capacity = storage.len();
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(BufferError::InvalidCapacity);
        }

        let mask = capacity.is_power_of_two().then(|| capacity - 1);

        Ok(Self {
            storage: NonNull::from(storage).cast(),
            capacity,
            mask,
            put: AtomicU16::new(0),
            get: AtomicU16::new(0),
            error: AtomicBool::new(false),
            producer_claimed: AtomicBool::new(false),
            consumer_claimed: AtomicBool::new(false),
            kind,
            format,
            _storage: PhantomData,
        })
    }

    /// Claim the producer handle
    ///
    /// Returns `None` while another producer handle is alive.
    pub fn producer(&self) -> Option<Producer<'_>> {
        if self.producer_claimed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Producer { ring: self })
    }

    /// Claim the consumer handle
    ///
    /// Returns `None` while another consumer handle is alive.
    pub fn consumer(&self) -> Option<Consumer<'_>> {
        if self.consumer_claimed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Consumer { ring: self })
    }

    /// Claim both handles at once
    pub fn split(&self) -> Option<(Producer<'_>, Consumer<'_>)> {
        let producer = self.producer()?;
        let consumer = self.consumer()?;
        Some((producer, consumer))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn format(&self) -> BufferFormat {
        self.format
    }

    /// Number of readable bytes
    pub fn count(&self) -> usize {
        let put = self.put_offset();
        let get = self.get_offset();
        self.wrap(put + self.capacity - get)
    }

    /// Number of bytes that can still be put
    pub fn free(&self) -> usize {
        self.capacity - 1 - self.count()
    }

    pub fn is_empty(&self) -> bool {
        self.put_offset() == self.get_offset()
    }

    pub fn is_full(&self) -> bool {
        self.wrap(self.put_offset() + 1) == self.get_offset()
    }

    /// Check the sticky error flag
    pub fn has_error(&self) -> bool {
        self.error.load(Ordering::Acquire)
    }

    /// Reset the sticky error flag
    pub fn clear_error(&self) {
        self.error.store(false, Ordering::Release);
    }

    pub(crate) fn flag_error(&self) {
        self.error.store(true, Ordering::Release);
    }

    pub(crate) fn put_offset(&self) -> usize {
        self.put.load(Ordering::Acquire) as usize
    }

    pub(crate) fn get_offset(&self) -> usize {
        self.get.load(Ordering::Acquire) as usize
    }

    pub(crate) fn publish_put(&self, offset: usize) {
        debug_assert!(offset < self.capacity);
        self.put.store(offset as u16, Ordering::Release);
    }

    pub(crate) fn publish_get(&self, offset: usize) {
        debug_assert!(offset < self.capacity);
        self.get.store(offset as u16, Ordering::Release);
    }

    /// Reduce an offset below `2 * capacity` into range
    ///
    /// Mask and subtract paths give identical results.
    pub(crate) fn wrap(&self, offset: usize) -> usize {
        debug_assert!(offset < 2 * self.capacity);
        match self.mask {
            Some(mask) => offset & mask,
            None if offset >= self.capacity => offset - self.capacity,
            None => offset,
        }
    }

    /// Free bytes reachable from `put` without crossing the physical end
    pub(crate) fn contiguous_free(&self, put: usize, get: usize) -> usize {
        if get > put {
            get - put - 1
        } else if get == 0 {
            self.capacity - put - 1
        } else {
            self.capacity - put
        }
    }

    pub(crate) fn read_slot(&self, index: usize) -> u8 {
        debug_assert!(index < self.capacity);
        // SAFETY: index is in bounds; callers only read slots they own under
        // the producer/consumer partition.
        unsafe { self.storage.as_ptr().add(index).read() }
    }

    pub(crate) fn write_slot(&self, index: usize, byte: u8) {
        debug_assert!(index < self.capacity);
        // SAFETY: index is in bounds; only the producer calls this, and only
        // for slots outside the readable region.
        unsafe { self.storage.as_ptr().add(index).write(byte) }
    }

    /// Borrow `len` bytes starting at `start`
    ///
    /// The range must not cross the physical end and must lie in the region
    /// owned by the caller's handle for the lifetime of the slice.
    pub(crate) fn slice(&self, start: usize, len: usize) -> &[u8] {
        debug_assert!(start + len <= self.capacity);
        // SAFETY: bounds checked above; the range belongs to the calling
        // handle and the handle's borrow keeps it from being handed out twice.
        unsafe { core::slice::from_raw_parts(self.storage.as_ptr().add(start), len) }
    }

    #[allow(clippy::mut_from_ref)]
    pub(crate) fn slice_mut(&self, start: usize, len: usize) -> &mut [u8] {
        debug_assert!(start + len <= self.capacity);
        // SAFETY: as for `slice`; only the producer borrows free slots mutably
        // and it does so through `&mut Producer`.
        unsafe { core::slice::from_raw_parts_mut(self.storage.as_ptr().add(start), len) }
    }
}

impl core::fmt::Debug for RingBuffer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("put", &self.put_offset())
            .field("get", &self.get_offset())
            .field("kind", &self.kind)
            .field("format", &self.format)
            .field("error", &self.has_error())
            .finish()
    }
}

/// Write side of a [`RingBuffer`]
pub struct Producer<'r> {
    pub(crate) ring: &'r RingBuffer<'r>,
}

impl<'r> Producer<'r> {
    /// The buffer this handle writes to
    pub fn ring(&self) -> &'r RingBuffer<'r> {
        self.ring
    }

    pub fn count(&self) -> usize {
        self.ring.count()
    }

    pub fn free(&self) -> usize {
        self.ring.free()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn has_error(&self) -> bool {
        self.ring.has_error()
    }

    /// Put one byte if there is room
    ///
    /// Returns the number of bytes written (0 or 1). A full buffer latches
    /// the sticky error flag.
    pub fn put(&mut self, byte: u8) -> usize {
        let put = self.ring.put_offset();
        let next = self.ring.wrap(put + 1);
        if next == self.ring.get_offset() {
            self.ring.flag_error();
            return 0;
        }
        self.ring.write_slot(put, byte);
        self.ring.publish_put(next);
        1
    }

    /// Put one byte without checking for room
    ///
    /// The caller must have confirmed space (for example via [`free`](Self::free)).
    /// Writing into a full buffer loses its contents.
    pub fn put_unchecked(&mut self, byte: u8) {
        debug_assert!(!self.is_full(), "put_unchecked on a full buffer");
        let put = self.ring.put_offset();
        self.ring.write_slot(put, byte);
        self.ring.publish_put(self.ring.wrap(put + 1));
    }

    /// Largest free span starting at the put offset
    ///
    /// Never crosses the physical end of storage. Fill it, then publish with
    /// [`commit_write`](Self::commit_write).
    pub fn write_span(&mut self) -> &mut [u8] {
        let put = self.ring.put_offset();
        let len = self.ring.contiguous_free(put, self.ring.get_offset());
        self.ring.slice_mut(put, len)
    }

    /// Publish `n` bytes written into the [`write_span`](Self::write_span)
    ///
    /// `n` is clamped to the current span. Returns the number published.
    pub fn commit_write(&mut self, n: usize) -> usize {
        let put = self.ring.put_offset();
        let n = n.min(self.ring.contiguous_free(put, self.ring.get_offset()));
        self.ring.publish_put(self.ring.wrap(put + n));
        n
    }
}

impl Drop for Producer<'_> {
    fn drop(&mut self) {
        self.ring.producer_claimed.store(false, Ordering::Release);
    }
}

impl core::fmt::Debug for Producer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Producer").field(self.ring).finish()
    }
}

/// Read side of a [`RingBuffer`]
pub struct Consumer<'r> {
    pub(crate) ring: &'r RingBuffer<'r>,
}

impl<'r> Consumer<'r> {
    /// The buffer this handle reads from
    pub fn ring(&self) -> &'r RingBuffer<'r> {
        self.ring
    }

    pub fn count(&self) -> usize {
        self.ring.count()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.ring.has_error()
    }

    pub fn clear_error(&self) {
        self.ring.clear_error();
    }

    /// Take the next byte
    pub fn get(&mut self) -> Option<u8> {
        let get = self.ring.get_offset();
        if get == self.ring.put_offset() {
            return None;
        }
        let byte = self.ring.read_slot(get);
        self.ring.publish_get(self.ring.wrap(get + 1));
        Some(byte)
    }

    /// Look at the next byte without removing it
    pub fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    /// Look at the byte `offset` positions after the next one
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        if offset >= self.count() {
            return None;
        }
        let get = self.ring.get_offset();
        Some(self.ring.read_slot(self.ring.wrap(get + offset)))
    }

    /// Discard up to `n` bytes, returning how many were removed
    pub fn remove(&mut self, n: usize) -> usize {
        let n = n.min(self.count());
        let get = self.ring.get_offset();
        self.ring.publish_get(self.ring.wrap(get + n));
        n
    }

    /// Discard everything currently readable
    pub fn clear(&mut self) {
        self.ring.publish_get(self.ring.put_offset());
    }

    /// Largest readable span starting at the get offset
    ///
    /// Never crosses the physical end of storage; remaining bytes (if any)
    /// start at offset 0 and are returned by the next call after
    /// [`remove`](Self::remove).
    pub fn read_span(&self) -> &[u8] {
        let get = self.ring.get_offset();
        let put = self.ring.put_offset();
        let end = if put >= get { put } else { self.ring.capacity() };
        self.ring.slice(get, end - get)
    }

    /// Copy and remove up to `dst.len()` bytes
    pub fn get_slice(&mut self, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < dst.len() {
            let n = {
                let span = self.read_span();
                let n = span.len().min(dst.len() - copied);
                dst[copied..copied + n].copy_from_slice(&span[..n]);
                n
            };
            if n == 0 {
                break;
            }
            self.remove(n);
            copied += n;
        }
        copied
    }
}

impl Drop for Consumer<'_> {
    fn drop(&mut self) {
        self.ring.consumer_claimed.store(false, Ordering::Release);
    }
}

impl core::fmt::Debug for Consumer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Consumer").field(self.ring).finish()
    }
}
