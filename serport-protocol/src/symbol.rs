//! Codec symbols, errors and input sources

use serport_buffer::{BufferError, BufferFormat, Consumer};

/// One decoded unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Symbol {
    /// Ordinary data byte
    Data(u8),
    /// Out-of-band control code
    Control(u8),
}

/// Errors that can occur while encoding or decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Control code equal to the escape character
    ReservedControl,
    /// Second character of a hex pair is not an uppercase hex digit
    InvalidHex,
    /// Input ended inside an escape sequence or hex pair
    Truncated,
    /// Input ended inside a quoted text run
    UnterminatedQuote,
    /// Buffer format cannot carry this operation
    WrongFormat,
    /// Underlying buffer error
    Buffer(BufferError),
}

impl From<BufferError> for CodecError {
    fn from(err: BufferError) -> Self {
        CodecError::Buffer(err)
    }
}

/// Random-access input for decoders
///
/// Implemented for byte slices and buffer consumers so the same decoder
/// logic can peek into either without copying.
pub trait ByteSource {
    /// Byte at `offset` from the read position, if present
    fn byte_at(&self, offset: usize) -> Option<u8>;

    /// Format of the underlying buffer, if the source is one
    fn format(&self) -> Option<BufferFormat> {
        None
    }
}

impl ByteSource for [u8] {
    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.get(offset).copied()
    }
}

impl ByteSource for Consumer<'_> {
    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.peek_at(offset)
    }

    fn format(&self) -> Option<BufferFormat> {
        Some(self.ring().format())
    }
}

/// View of a source starting `skip` bytes in
pub(crate) struct Skip<'s, S: ?Sized>(pub &'s S, pub usize);

impl<S: ByteSource + ?Sized> ByteSource for Skip<'_, S> {
    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.0.byte_at(self.1 + offset)
    }

    fn format(&self) -> Option<BufferFormat> {
        self.0.format()
    }
}

/// Reject sources whose buffer format is not in `allowed`
pub(crate) fn check_format<S: ByteSource + ?Sized>(
    src: &S,
    allowed: impl Fn(BufferFormat) -> bool,
) -> Result<(), CodecError> {
    match src.format() {
        Some(format) if !allowed(format) => Err(CodecError::WrongFormat),
        _ => Ok(()),
    }
}
