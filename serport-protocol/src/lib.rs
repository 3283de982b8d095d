//! Escape-sequence codec for serial buffers
//!
//! Carries out-of-band control codes (frame start/stop, bus commands) inside
//! a data stream. The unit of the codec is a [`Symbol`]: either a data byte
//! or a control code.
//!
//! # Formats
//!
//! ```text
//! BinaryEscaped   data byte        ──► byte           (escape ──► ^ ^)
//!                 control c        ──► ^ c
//!
//! Ascii           data byte 0x5A   ──► "5A"
//!                 text "it's"      ──► "'it''s'"
//!
//! AsciiEscaped    as Ascii, plus
//!                 control a..z     ──► "a".."z"
//!                 other control c  ──► "^c"
//! ```
//!
//! `^` is the default escape character and `'` the quote character; both
//! are configurable through [`EscapeCodec`].
//!
//! Decoders never block: when the next unit is not complete they report
//! "nothing yet" and leave the input untouched.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod ascii;
pub mod binary;
pub mod sink;
pub mod symbol;
pub mod transcode;

pub use ascii::{AsciiDecoder, AsciiEncoder};
pub use binary::EscapeCodec;
pub use sink::{ByteSink, SliceSink};
pub use symbol::{ByteSource, CodecError, Symbol};
pub use transcode::FrameControls;

/// Default escape character
pub const DEFAULT_ESCAPE: u8 = b'^';

/// Default quote character for ASCII text runs
pub const DEFAULT_QUOTE: u8 = b'\'';

/// Default control code opening a bus frame
pub const CONTROL_START: u8 = b's';

/// Default control code closing a bus frame
pub const CONTROL_STOP: u8 = b'p';
