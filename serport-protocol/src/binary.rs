//! Binary escape codec
//!
//! In the escaped binary format every byte stands for itself except the
//! escape character, which always starts a two-byte sequence:
//!
//! - `esc esc` is one literal escape byte
//! - `esc c` is control code `c`

use heapless::Vec;
use serport_buffer::{BufferFormat, Consumer, Producer, ShadowTransaction};

use crate::sink::ByteSink;
use crate::symbol::{check_format, ByteSource, CodecError, Symbol};
use crate::{DEFAULT_ESCAPE, DEFAULT_QUOTE};

/// Escape/quote configuration plus the binary escape codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EscapeCodec {
    escape: u8,
    quote: u8,
}

impl Default for EscapeCodec {
    fn default() -> Self {
        Self::new(DEFAULT_ESCAPE)
    }
}

fn binary_escaped(format: BufferFormat) -> bool {
    format == BufferFormat::BinaryEscaped
}

impl EscapeCodec {
    /// Codec with the given escape character and the default quote
    ///
    /// The escape character should be ASCII punctuation other than the
    /// quote, so the ASCII formats can tell it apart from hex digits and
    /// control letters.
    pub const fn new(escape: u8) -> Self {
        Self {
            escape,
            quote: DEFAULT_QUOTE,
        }
    }

    /// Replace the quote character used by the ASCII formats
    pub const fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    pub const fn escape(&self) -> u8 {
        self.escape
    }

    pub const fn quote(&self) -> u8 {
        self.quote
    }

    /// Encoded form of one symbol
    pub fn encode(&self, symbol: Symbol) -> Result<Vec<u8, 2>, CodecError> {
        let mut out = Vec::new();
        self.encode_into(symbol, &mut out)?;
        Ok(out)
    }

    /// Write the encoded form of one symbol to `sink`
    pub fn encode_into<K: ByteSink + ?Sized>(
        &self,
        symbol: Symbol,
        sink: &mut K,
    ) -> Result<(), CodecError> {
        match symbol {
            Symbol::Data(b) if b == self.escape => sink.push_all(&[self.escape, self.escape]),
            Symbol::Data(b) => sink.push(b),
            Symbol::Control(c) if c == self.escape => Err(CodecError::ReservedControl),
            Symbol::Control(c) => sink.push_all(&[self.escape, c]),
        }
    }

    /// Escape a run of data bytes into `sink`
    pub fn encode_data<K: ByteSink + ?Sized>(
        &self,
        data: &[u8],
        sink: &mut K,
    ) -> Result<(), CodecError> {
        data.iter()
            .try_for_each(|&b| self.encode_into(Symbol::Data(b), sink))
    }

    /// Number of bytes needed to hold the encoded symbol starting with `first`
    pub fn required_len(&self, first: u8) -> usize {
        if first == self.escape {
            2
        } else {
            1
        }
    }

    /// Encoded size of a run of data bytes
    pub fn escaped_len(&self, data: &[u8]) -> usize {
        data.len() + data.iter().filter(|&&b| b == self.escape).count()
    }

    /// Decode the symbol at the start of `src`
    ///
    /// Returns the symbol and the number of bytes it occupies, or `None` if
    /// the sequence is not complete yet. Never consumes anything.
    pub fn decode<S: ByteSource + ?Sized>(
        &self,
        src: &S,
    ) -> Result<Option<(Symbol, usize)>, CodecError> {
        check_format(src, binary_escaped)?;
        let Some(first) = src.byte_at(0) else {
            return Ok(None);
        };
        if first != self.escape {
            return Ok(Some((Symbol::Data(first), 1)));
        }
        let Some(second) = src.byte_at(1) else {
            return Ok(None);
        };
        let symbol = if second == self.escape {
            Symbol::Data(self.escape)
        } else {
            Symbol::Control(second)
        };
        Ok(Some((symbol, 2)))
    }

    /// Decode a complete escaped byte sequence
    ///
    /// Calls `f` for every symbol and returns how many there were. A lone
    /// trailing escape is reported as `Truncated`.
    pub fn decode_slice(
        &self,
        src: &[u8],
        mut f: impl FnMut(Symbol),
    ) -> Result<usize, CodecError> {
        let mut pos = 0;
        let mut symbols = 0;
        while pos < src.len() {
            let Some((symbol, used)) = self.decode(&src[pos..])? else {
                return Err(CodecError::Truncated);
            };
            f(symbol);
            pos += used;
            symbols += 1;
        }
        Ok(symbols)
    }

    /// Look at the next escaped symbol in a BinaryEscaped buffer
    pub fn peek_escaped(&self, rx: &Consumer<'_>) -> Result<Option<Symbol>, CodecError> {
        Ok(self.decode(rx)?.map(|(symbol, _)| symbol))
    }

    /// Take the next escaped symbol from a BinaryEscaped buffer
    ///
    /// Removes exactly the bytes of the returned symbol; an incomplete
    /// sequence stays in the buffer.
    pub fn get_escaped(&self, rx: &mut Consumer<'_>) -> Result<Option<Symbol>, CodecError> {
        let decoded = self.decode(&*rx)?;
        Ok(decoded.map(|(symbol, used)| {
            rx.remove(used);
            symbol
        }))
    }

    /// Put one data byte, escaping it if needed
    ///
    /// All or nothing; returns the number of bytes written.
    pub fn put_escaped(&self, tx: &mut Producer<'_>, byte: u8) -> Result<usize, CodecError> {
        self.put_with(tx, |codec, shadow| {
            codec.encode_into(Symbol::Data(byte), shadow)
        })
    }

    /// Put one control code
    pub fn put_control(&self, tx: &mut Producer<'_>, code: u8) -> Result<usize, CodecError> {
        self.put_with(tx, |codec, shadow| {
            codec.encode_into(Symbol::Control(code), shadow)
        })
    }

    /// Put a run of data bytes, escaping as needed
    ///
    /// Either every byte is written or none is.
    pub fn put_escaped_slice(
        &self,
        tx: &mut Producer<'_>,
        data: &[u8],
    ) -> Result<usize, CodecError> {
        self.put_with(tx, |codec, shadow| codec.encode_data(data, shadow))
    }

    fn put_with(
        &self,
        tx: &mut Producer<'_>,
        f: impl FnOnce(&Self, &mut ShadowTransaction<'_, '_>) -> Result<(), CodecError>,
    ) -> Result<usize, CodecError> {
        if tx.ring().format() != BufferFormat::BinaryEscaped {
            return Err(CodecError::WrongFormat);
        }
        let mut shadow = tx.begin();
        f(self, &mut shadow)?;
        Ok(shadow.commit())
    }
}
