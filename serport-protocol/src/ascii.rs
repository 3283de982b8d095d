//! ASCII codec
//!
//! Data bytes travel as pairs of uppercase hex digits and literal text as a
//! quoted run, with a doubled quote standing for one quote character:
//!
//! ```text
//! 41 42 'it''s' ^X q
//! └─┬─┘ └──┬──┘ └┬┘ └ control 'q' (AsciiEscaped only)
//!   │      │     └─── control 'X' (AsciiEscaped only)
//!   │      └───────── data "it's"
//!   └──────────────── data 0x41 0x42
//! ```
//!
//! Characters with no meaning (spaces, line breaks, and in plain ASCII also
//! lowercase letters and the escape character) are skipped.

use serport_buffer::stream::hex_pair;
use serport_buffer::{BufferFormat, Consumer, Producer, ShadowTransaction};

use crate::binary::EscapeCodec;
use crate::sink::ByteSink;
use crate::symbol::{check_format, ByteSource, CodecError, Skip, Symbol};

fn ascii_format(format: BufferFormat) -> bool {
    format.is_ascii()
}

/// Value of an uppercase hex digit
fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Encoder for the Ascii and AsciiEscaped formats
///
/// Remembers whether the last thing written was a quoted run, so that two
/// runs in a row are kept apart instead of merging into one with a literal
/// quote in the middle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsciiEncoder {
    codec: EscapeCodec,
    escaped: bool,
    after_text: bool,
}

impl AsciiEncoder {
    /// Encoder for plain ASCII (no control codes)
    pub const fn plain(codec: EscapeCodec) -> Self {
        Self {
            codec,
            escaped: false,
            after_text: false,
        }
    }

    /// Encoder for escaped ASCII
    pub const fn escaped(codec: EscapeCodec) -> Self {
        Self {
            codec,
            escaped: true,
            after_text: false,
        }
    }

    /// Encoder matching a buffer format
    pub fn for_format(codec: EscapeCodec, format: BufferFormat) -> Result<Self, CodecError> {
        match format {
            BufferFormat::Ascii => Ok(Self::plain(codec)),
            BufferFormat::AsciiEscaped => Ok(Self::escaped(codec)),
            _ => Err(CodecError::WrongFormat),
        }
    }

    /// Forget any pending text run state
    pub fn reset(&mut self) {
        self.after_text = false;
    }

    /// Encode one data byte as a hex pair
    pub fn encode_byte<K: ByteSink + ?Sized>(
        &mut self,
        byte: u8,
        sink: &mut K,
    ) -> Result<(), CodecError> {
        sink.push_all(&hex_pair(byte))?;
        self.after_text = false;
        Ok(())
    }

    /// Encode data bytes as hex pairs
    pub fn encode_data<K: ByteSink + ?Sized>(
        &mut self,
        data: &[u8],
        sink: &mut K,
    ) -> Result<(), CodecError> {
        data.iter().try_for_each(|&b| self.encode_byte(b, sink))
    }

    /// Encode bytes as one quoted text run
    ///
    /// Empty text writes nothing.
    pub fn encode_text<K: ByteSink + ?Sized>(
        &mut self,
        text: &[u8],
        sink: &mut K,
    ) -> Result<(), CodecError> {
        if text.is_empty() {
            return Ok(());
        }
        let quote = self.codec.quote();
        if self.after_text {
            sink.push(b' ')?;
        }
        sink.push(quote)?;
        for &b in text {
            if b == quote {
                sink.push(quote)?;
            }
            sink.push(b)?;
        }
        sink.push(quote)?;
        self.after_text = true;
        Ok(())
    }

    /// Encode a control code
    ///
    /// Lowercase letters are written bare, anything else behind the escape
    /// character. Plain ASCII has no control codes.
    pub fn encode_control<K: ByteSink + ?Sized>(
        &mut self,
        code: u8,
        sink: &mut K,
    ) -> Result<(), CodecError> {
        if !self.escaped {
            return Err(CodecError::WrongFormat);
        }
        if code == self.codec.escape() {
            return Err(CodecError::ReservedControl);
        }
        if code.is_ascii_lowercase() {
            sink.push(code)?;
        } else {
            sink.push_all(&[self.codec.escape(), code])?;
        }
        self.after_text = false;
        Ok(())
    }

    pub fn encode_symbol<K: ByteSink + ?Sized>(
        &mut self,
        symbol: Symbol,
        sink: &mut K,
    ) -> Result<(), CodecError> {
        match symbol {
            Symbol::Data(b) => self.encode_byte(b, sink),
            Symbol::Control(c) => self.encode_control(c, sink),
        }
    }

    /// Put data bytes into an ASCII buffer, all or nothing
    pub fn put_data(&mut self, tx: &mut Producer<'_>, data: &[u8]) -> Result<usize, CodecError> {
        self.put_with(tx, |enc, shadow| enc.encode_data(data, shadow))
    }

    /// Put a quoted text run into an ASCII buffer, all or nothing
    pub fn put_text(&mut self, tx: &mut Producer<'_>, text: &[u8]) -> Result<usize, CodecError> {
        self.put_with(tx, |enc, shadow| enc.encode_text(text, shadow))
    }

    /// Put a control code into an AsciiEscaped buffer
    pub fn put_control(&mut self, tx: &mut Producer<'_>, code: u8) -> Result<usize, CodecError> {
        self.put_with(tx, |enc, shadow| enc.encode_control(code, shadow))
    }

    fn put_with(
        &mut self,
        tx: &mut Producer<'_>,
        f: impl FnOnce(&mut Self, &mut ShadowTransaction<'_, '_>) -> Result<(), CodecError>,
    ) -> Result<usize, CodecError> {
        if !tx.ring().format().is_ascii() {
            return Err(CodecError::WrongFormat);
        }
        let saved = *self;
        let mut shadow = tx.begin();
        match f(self, &mut shadow) {
            Ok(()) => Ok(shadow.commit()),
            Err(err) => {
                *self = saved;
                Err(err)
            }
        }
    }
}

/// Position relative to quoted text runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum QuoteState {
    #[default]
    Outside,
    Inside,
    /// Saw a quote inside a run: either a doubled quote or the closing one
    QuoteSeen,
}

/// Result of scanning the input once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Symbol(Symbol),
    /// Input ended before a complete symbol
    Pending,
    /// Malformed hex pair
    Invalid,
}

#[derive(Debug, Clone, Copy)]
struct Scan {
    outcome: Outcome,
    consumed: usize,
    state: QuoteState,
}

/// Resumable decoder for the Ascii and AsciiEscaped formats
///
/// The decoder carries the quote state across calls, so input may arrive
/// in arbitrary pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsciiDecoder {
    codec: EscapeCodec,
    escaped: bool,
    state: QuoteState,
}

impl AsciiDecoder {
    pub const fn plain(codec: EscapeCodec) -> Self {
        Self {
            codec,
            escaped: false,
            state: QuoteState::Outside,
        }
    }

    pub const fn escaped(codec: EscapeCodec) -> Self {
        Self {
            codec,
            escaped: true,
            state: QuoteState::Outside,
        }
    }

    /// Decoder matching a buffer format
    pub fn for_format(codec: EscapeCodec, format: BufferFormat) -> Result<Self, CodecError> {
        match format {
            BufferFormat::Ascii => Ok(Self::plain(codec)),
            BufferFormat::AsciiEscaped => Ok(Self::escaped(codec)),
            _ => Err(CodecError::WrongFormat),
        }
    }

    /// Reset the decoder state
    pub fn reset(&mut self) {
        self.state = QuoteState::Outside;
    }

    /// Check if the decoder is inside a quoted run
    pub fn in_text(&self) -> bool {
        self.state != QuoteState::Outside
    }

    fn scan<S: ByteSource + ?Sized>(&self, src: &S) -> Scan {
        let quote = self.codec.quote();
        let escape = self.codec.escape();
        let mut state = self.state;
        let mut i = 0;

        let symbol = |symbol, consumed, state| Scan {
            outcome: Outcome::Symbol(symbol),
            consumed,
            state,
        };
        let pending = |consumed, state| Scan {
            outcome: Outcome::Pending,
            consumed,
            state,
        };

        loop {
            let Some(c) = src.byte_at(i) else {
                return pending(i, state);
            };

            match state {
                QuoteState::Inside => {
                    if c == quote {
                        state = QuoteState::QuoteSeen;
                        i += 1;
                    } else {
                        return symbol(Symbol::Data(c), i + 1, state);
                    }
                }
                QuoteState::QuoteSeen => {
                    if c == quote {
                        return symbol(Symbol::Data(quote), i + 1, QuoteState::Inside);
                    }
                    // Run closed; look at `c` again outside of it
                    state = QuoteState::Outside;
                }
                QuoteState::Outside => {
                    if c == quote {
                        state = QuoteState::Inside;
                        i += 1;
                        continue;
                    }
                    if let Some(hi) = hex_value(c) {
                        let Some(c2) = src.byte_at(i + 1) else {
                            return pending(i, state);
                        };
                        return match hex_value(c2) {
                            Some(lo) => symbol(Symbol::Data(hi << 4 | lo), i + 2, state),
                            None => Scan {
                                outcome: Outcome::Invalid,
                                consumed: i + 2,
                                state,
                            },
                        };
                    }
                    if self.escaped && c == escape {
                        let Some(c2) = src.byte_at(i + 1) else {
                            return pending(i, state);
                        };
                        let decoded = if c2 == escape {
                            Symbol::Data(escape)
                        } else {
                            Symbol::Control(c2)
                        };
                        return symbol(decoded, i + 2, state);
                    }
                    if self.escaped && c.is_ascii_lowercase() {
                        return symbol(Symbol::Control(c), i + 1, state);
                    }
                    i += 1;
                }
            }
        }
    }

    /// Look at the next symbol without consuming anything
    ///
    /// Buffers must be in an ASCII format.
    pub fn peek<S: ByteSource + ?Sized>(&self, src: &S) -> Result<Option<Symbol>, CodecError> {
        check_format(src, ascii_format)?;
        match self.scan(src).outcome {
            Outcome::Symbol(symbol) => Ok(Some(symbol)),
            Outcome::Pending => Ok(None),
            Outcome::Invalid => Err(CodecError::InvalidHex),
        }
    }

    /// Take the next symbol from an ASCII buffer
    ///
    /// Skipped characters and quote marks in front of the symbol are
    /// removed with it. An incomplete unit stays in the buffer. A malformed
    /// hex pair is removed and reported as `InvalidHex`.
    pub fn get(&mut self, rx: &mut Consumer<'_>) -> Result<Option<Symbol>, CodecError> {
        check_format(&*rx, ascii_format)?;
        let scan = self.scan(&*rx);
        rx.remove(scan.consumed);
        self.state = scan.state;
        match scan.outcome {
            Outcome::Symbol(symbol) => Ok(Some(symbol)),
            Outcome::Pending => Ok(None),
            Outcome::Invalid => Err(CodecError::InvalidHex),
        }
    }

    /// Decode as much of `src` as possible
    ///
    /// Calls `f` for every symbol and returns the number of bytes consumed.
    /// Bytes of an incomplete trailing unit are left over for the next call.
    pub fn feed<S: ByteSource + ?Sized>(
        &mut self,
        src: &S,
        mut f: impl FnMut(Symbol),
    ) -> Result<usize, CodecError> {
        let mut pos = 0;
        loop {
            let scan = self.scan(&Skip(src, pos));
            pos += scan.consumed;
            self.state = scan.state;
            match scan.outcome {
                Outcome::Symbol(symbol) => f(symbol),
                Outcome::Pending => return Ok(pos),
                Outcome::Invalid => return Err(CodecError::InvalidHex),
            }
        }
    }

    /// Close the input
    ///
    /// An open quoted run is an error; a pending closing quote is accepted.
    pub fn finish(&mut self) -> Result<(), CodecError> {
        let state = core::mem::take(&mut self.state);
        match state {
            QuoteState::Inside => Err(CodecError::UnterminatedQuote),
            _ => Ok(()),
        }
    }

    /// Decode a complete ASCII text
    ///
    /// Returns the number of symbols. The decoder is left reset.
    pub fn decode_slice(
        &mut self,
        src: &[u8],
        mut f: impl FnMut(Symbol),
    ) -> Result<usize, CodecError> {
        let mut symbols = 0;
        let consumed = self.feed(src, |s| {
            symbols += 1;
            f(s)
        });
        let consumed = match consumed {
            Ok(n) => n,
            Err(err) => {
                self.reset();
                return Err(err);
            }
        };
        if consumed < src.len() {
            self.reset();
            return Err(CodecError::Truncated);
        }
        self.finish()?;
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serport_buffer::{BufferKind, RingBuffer};
    use std::vec::Vec;

    type Out = heapless::Vec<u8, 256>;

    fn decode(decoder: &mut AsciiDecoder, text: &[u8]) -> Result<Vec<Symbol>, CodecError> {
        let mut out = Vec::new();
        decoder.decode_slice(text, |s| out.push(s))?;
        Ok(out)
    }

    fn data(bytes: &[u8]) -> Vec<Symbol> {
        bytes.iter().map(|&b| Symbol::Data(b)).collect()
    }

    #[test]
    fn test_encode_hex_and_text() {
        let mut enc = AsciiEncoder::plain(EscapeCodec::default());
        let mut out = Out::new();
        enc.encode_data(&[0x00, 0x5A, 0xFF], &mut out).unwrap();
        enc.encode_text(b"it's", &mut out).unwrap();
        enc.encode_text(b"ok", &mut out).unwrap();
        assert_eq!(out.as_slice(), b"005AFF'it''s' 'ok'");
    }

    #[test]
    fn test_encode_controls() {
        let mut enc = AsciiEncoder::escaped(EscapeCodec::default());
        let mut out = Out::new();
        enc.encode_control(b's', &mut out).unwrap();
        enc.encode_control(b'X', &mut out).unwrap();
        enc.encode_control(0x01, &mut out).unwrap();
        assert_eq!(out.as_slice(), b"s^X^\x01");
        assert_eq!(
            enc.encode_control(b'^', &mut out),
            Err(CodecError::ReservedControl)
        );

        let mut plain = AsciiEncoder::plain(EscapeCodec::default());
        assert_eq!(
            plain.encode_control(b's', &mut out),
            Err(CodecError::WrongFormat)
        );
    }

    #[test]
    fn test_decode_mixed() {
        let mut dec = AsciiDecoder::escaped(EscapeCodec::default());
        let symbols = decode(&mut dec, b"s 41 'a''b' ^^ ^X p\r\n").unwrap();
        assert_eq!(
            symbols,
            [
                Symbol::Control(b's'),
                Symbol::Data(0x41),
                Symbol::Data(b'a'),
                Symbol::Data(b'\''),
                Symbol::Data(b'b'),
                Symbol::Data(b'^'),
                Symbol::Control(b'X'),
                Symbol::Control(b'p'),
            ]
        );
    }

    #[test]
    fn test_plain_ignores_controls() {
        let mut dec = AsciiDecoder::plain(EscapeCodec::default());
        assert_eq!(decode(&mut dec, b"s41^p").unwrap(), data(&[0x41]));
    }

    #[test]
    fn test_decode_errors() {
        let mut dec = AsciiDecoder::escaped(EscapeCodec::default());
        assert_eq!(decode(&mut dec, b"4"), Err(CodecError::Truncated));
        assert_eq!(decode(&mut dec, b"^"), Err(CodecError::Truncated));
        assert_eq!(decode(&mut dec, b"'abc"), Err(CodecError::UnterminatedQuote));
        assert_eq!(decode(&mut dec, b"4G"), Err(CodecError::InvalidHex));
        assert_eq!(decode(&mut dec, b"4a"), Err(CodecError::InvalidHex));
        // Decoder recovers after each error
        assert_eq!(decode(&mut dec, b"''").unwrap(), data(&[]));
    }

    #[test]
    fn test_feed_in_pieces() {
        let mut dec = AsciiDecoder::escaped(EscapeCodec::default());
        let mut out = Vec::new();

        assert_eq!(dec.feed(&b"'a'"[..], |s| out.push(s)), Ok(3));
        assert!(dec.in_text());
        // The quote might have been the first half of a doubled quote
        assert_eq!(dec.feed(&b"'b'"[..], |s| out.push(s)), Ok(3));
        // Half a hex pair is left for the caller to resubmit
        assert_eq!(dec.feed(&b"4"[..], |s| out.push(s)), Ok(0));
        assert!(!dec.in_text());
        assert_eq!(dec.feed(&b"41"[..], |s| out.push(s)), Ok(2));
        dec.finish().unwrap();

        assert_eq!(out, data(b"a'b\x41"));
    }

    #[test]
    fn test_ring_peek_and_get() {
        let codec = EscapeCodec::default();
        let mut storage = [0u8; 32];
        let ring =
            RingBuffer::with_config(&mut storage, BufferKind::Stream, BufferFormat::AsciiEscaped)
                .unwrap();
        let (mut tx, mut rx) = ring.split().unwrap();
        let mut enc = AsciiEncoder::escaped(codec);
        let mut dec = AsciiDecoder::escaped(codec);

        enc.put_control(&mut tx, b's').unwrap();
        enc.put_data(&mut tx, &[0xAB]).unwrap();
        tx.put(b'C');

        assert_eq!(dec.peek(&rx), Ok(Some(Symbol::Control(b's'))));
        assert_eq!(dec.get(&mut rx), Ok(Some(Symbol::Control(b's'))));
        assert_eq!(dec.get(&mut rx), Ok(Some(Symbol::Data(0xAB))));
        // Half a hex pair stays put
        assert_eq!(dec.get(&mut rx), Ok(None));
        assert_eq!(rx.count(), 1);
        tx.put(b'D');
        assert_eq!(dec.get(&mut rx), Ok(Some(Symbol::Data(0xCD))));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_ring_invalid_pair_dropped() {
        let codec = EscapeCodec::default();
        let mut storage = [0u8; 16];
        let ring =
            RingBuffer::with_config(&mut storage, BufferKind::Stream, BufferFormat::Ascii).unwrap();
        let (mut tx, mut rx) = ring.split().unwrap();
        let mut dec = AsciiDecoder::plain(codec);

        tx.put_str("4Z41");
        assert_eq!(dec.get(&mut rx), Err(CodecError::InvalidHex));
        assert_eq!(dec.get(&mut rx), Ok(Some(Symbol::Data(0x41))));
    }

    #[test]
    fn test_ring_put_rolls_back_state() {
        let codec = EscapeCodec::default();
        let mut storage = [0u8; 8];
        let ring =
            RingBuffer::with_config(&mut storage, BufferKind::Stream, BufferFormat::Ascii).unwrap();
        let mut tx = ring.producer().unwrap();
        let mut enc = AsciiEncoder::plain(codec);

        assert_eq!(enc.put_text(&mut tx, b"ab"), Ok(4));
        assert!(enc.put_text(&mut tx, b"too long").is_err());
        assert_eq!(ring.count(), 4);
        assert_eq!(enc.put_data(&mut tx, &[1]), Ok(2));
    }

    #[test]
    fn test_wrong_format() {
        let codec = EscapeCodec::default();
        let mut storage = [0u8; 8];
        let ring = RingBuffer::new(&mut storage).unwrap();
        let (mut tx, rx) = ring.split().unwrap();

        assert_eq!(
            AsciiEncoder::plain(codec).put_data(&mut tx, &[1]),
            Err(CodecError::WrongFormat)
        );
        assert_eq!(
            AsciiDecoder::plain(codec).peek(&rx),
            Err(CodecError::WrongFormat)
        );
        assert_eq!(
            AsciiDecoder::for_format(codec, BufferFormat::Binary),
            Err(CodecError::WrongFormat)
        );
    }

    /// Something an encoder can be asked to write
    #[derive(Debug, Clone)]
    enum Item {
        Byte(u8),
        Text(Vec<u8>),
        Control(u8),
    }

    fn item_strategy(escaped: bool) -> BoxedStrategy<Item> {
        let special = prop_oneof![Just(b'\''), Just(b'^'), Just(b' '), any::<u8>()];
        let text = prop::collection::vec(special, 0..8).prop_map(Item::Text);
        let byte = any::<u8>().prop_map(Item::Byte);
        if escaped {
            let control = any::<u8>()
                .prop_filter("escape is reserved", |c| *c != b'^')
                .prop_map(Item::Control);
            prop_oneof![byte, text, control].boxed()
        } else {
            prop_oneof![byte, text].boxed()
        }
    }

    fn round_trip(escaped: bool, items: &[Item]) -> Result<(), TestCaseError> {
        let codec = EscapeCodec::default();
        let (mut enc, mut dec) = if escaped {
            (AsciiEncoder::escaped(codec), AsciiDecoder::escaped(codec))
        } else {
            (AsciiEncoder::plain(codec), AsciiDecoder::plain(codec))
        };

        let mut encoded = heapless::Vec::<u8, 1024>::new();
        let mut expected = Vec::new();
        for item in items {
            match item {
                Item::Byte(b) => {
                    enc.encode_byte(*b, &mut encoded).unwrap();
                    expected.push(Symbol::Data(*b));
                }
                Item::Text(text) => {
                    enc.encode_text(text, &mut encoded).unwrap();
                    expected.extend(text.iter().map(|&b| Symbol::Data(b)));
                }
                Item::Control(c) => {
                    enc.encode_control(*c, &mut encoded).unwrap();
                    expected.push(Symbol::Control(*c));
                }
            }
        }

        prop_assert_eq!(decode(&mut dec, &encoded).unwrap(), expected);
        Ok(())
    }

    proptest! {
        #[test]
        fn test_round_trip_escaped(items in prop::collection::vec(item_strategy(true), 0..24)) {
            round_trip(true, &items)?;
        }

        #[test]
        fn test_round_trip_plain(items in prop::collection::vec(item_strategy(false), 0..24)) {
            round_trip(false, &items)?;
        }
    }
}
