//! ASCII to binary transcoding
//!
//! Debug consoles and test scripts produce escaped ASCII (`s 12 'AB' p`),
//! while bus drivers consume escaped binary. The transcoder converts one into
//! the other inside a single shadow transaction: either the whole message
//! lands in the destination buffer or nothing does.

use serport_buffer::{BufferFormat, Consumer, Producer};

use crate::ascii::AsciiDecoder;
use crate::binary::EscapeCodec;
use crate::symbol::{ByteSource, CodecError, Symbol};
use crate::{CONTROL_START, CONTROL_STOP};

/// Control codes bracketing a bus frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameControls {
    pub start: u8,
    pub stop: u8,
}

impl Default for FrameControls {
    fn default() -> Self {
        Self {
            start: CONTROL_START,
            stop: CONTROL_STOP,
        }
    }
}

impl EscapeCodec {
    /// Transcode escaped ASCII text into a BinaryEscaped buffer
    ///
    /// With `frame` set, the output is bracketed by its start and stop
    /// controls. Returns the number of bytes written.
    pub fn put_ascii_escaped(
        &self,
        tx: &mut Producer<'_>,
        text: &[u8],
        frame: Option<FrameControls>,
    ) -> Result<usize, CodecError> {
        self.transcode(tx, text, frame).map(|(written, _)| written)
    }

    /// Transcode escaped ASCII held in another buffer
    ///
    /// The source buffer must hold AsciiEscaped text. Stream sources are
    /// converted as a whole; packet sources one packet at a time. The source
    /// data is removed only when the conversion succeeds. Returns the number
    /// of bytes written (0 if no packet was ready).
    pub fn put_ascii_escaped_from(
        &self,
        tx: &mut Producer<'_>,
        rx: &mut Consumer<'_>,
        frame: Option<FrameControls>,
    ) -> Result<usize, CodecError> {
        if rx.ring().format() != BufferFormat::AsciiEscaped {
            return Err(CodecError::WrongFormat);
        }
        if rx.ring().kind().is_packet() {
            let written = {
                let Some(payload) = rx.packet()? else {
                    return Ok(0);
                };
                self.transcode(tx, payload, frame)?.0
            };
            rx.remove_packet()?;
            Ok(written)
        } else {
            let (written, consumed) = self.transcode(tx, &*rx, frame)?;
            rx.remove(consumed);
            Ok(written)
        }
    }

    fn transcode<S: ByteSource + ?Sized>(
        &self,
        tx: &mut Producer<'_>,
        src: &S,
        frame: Option<FrameControls>,
    ) -> Result<(usize, usize), CodecError> {
        if tx.ring().format() != BufferFormat::BinaryEscaped {
            return Err(CodecError::WrongFormat);
        }

        let mut decoder = AsciiDecoder::escaped(*self);
        let mut shadow = tx.begin();

        if let Some(frame) = frame {
            self.encode_into(Symbol::Control(frame.start), &mut shadow)?;
        }

        let mut failed = None;
        let consumed = decoder.feed(src, |symbol| {
            if failed.is_none() {
                failed = self.encode_into(symbol, &mut shadow).err();
            }
        })?;
        if let Some(err) = failed {
            return Err(err);
        }
        if src.byte_at(consumed).is_some() {
            return Err(CodecError::Truncated);
        }
        decoder.finish()?;

        if let Some(frame) = frame {
            self.encode_into(Symbol::Control(frame.stop), &mut shadow)?;
        }
        Ok((shadow.commit(), consumed))
    }
}
