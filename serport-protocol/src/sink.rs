//! Output targets for encoders

use serport_buffer::{BufferError, ShadowTransaction};

use crate::CodecError;

/// Byte-at-a-time encoder output
pub trait ByteSink {
    fn push(&mut self, byte: u8) -> Result<(), CodecError>;

    fn push_all(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        bytes.iter().try_for_each(|&b| self.push(b))
    }
}

impl ByteSink for ShadowTransaction<'_, '_> {
    fn push(&mut self, byte: u8) -> Result<(), CodecError> {
        self.write(byte).map_err(CodecError::from)
    }
}

impl<const N: usize> ByteSink for heapless::Vec<u8, N> {
    fn push(&mut self, byte: u8) -> Result<(), CodecError> {
        heapless::Vec::push(self, byte).map_err(|_| CodecError::Buffer(BufferError::TooSmall))
    }
}

/// Sink writing into a caller-provided slice
#[derive(Debug)]
pub struct SliceSink<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> SliceSink<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    /// Bytes written so far
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl ByteSink for SliceSink<'_> {
    fn push(&mut self, byte: u8) -> Result<(), CodecError> {
        let slot = self
            .buf
            .get_mut(self.len)
            .ok_or(CodecError::Buffer(BufferError::TooSmall))?;
        *slot = byte;
        self.len += 1;
        Ok(())
    }
}
