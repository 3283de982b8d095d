//! Port errors

use serport_buffer::BufferError;
use serport_protocol::CodecError;

use crate::config::ConfigError;
use crate::listener::ListenerError;
use crate::status::TxStatus;

/// Serial port error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortError {
    /// A sticky status is set; writes are refused until it is cleared
    Faulted(TxStatus),
    /// The TX buffer cannot hold the whole write
    NoSpace,
    /// Operation not available in the TX buffer's format or kind
    WrongFormat,
    /// Transmission still in progress
    Busy,
    /// A buffer handle is already owned elsewhere
    Claimed,
    Listener(ListenerError),
    Codec(CodecError),
    Config(ConfigError),
}

impl From<ListenerError> for PortError {
    fn from(err: ListenerError) -> Self {
        PortError::Listener(err)
    }
}

impl From<ConfigError> for PortError {
    fn from(err: ConfigError) -> Self {
        PortError::Config(err)
    }
}

impl From<BufferError> for PortError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::NoSpace => PortError::NoSpace,
            BufferError::WrongKind | BufferError::WrongFormat => PortError::WrongFormat,
            other => PortError::Codec(CodecError::Buffer(other)),
        }
    }
}

impl From<CodecError> for PortError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Buffer(inner) => inner.into(),
            CodecError::WrongFormat => PortError::WrongFormat,
            other => PortError::Codec(other),
        }
    }
}

impl embedded_io::Error for PortError {
    fn kind(&self) -> embedded_io::ErrorKind {
        use embedded_io::ErrorKind;

        match self {
            PortError::Faulted(TxStatus::Timeout) => ErrorKind::TimedOut,
            PortError::NoSpace => ErrorKind::OutOfMemory,
            PortError::WrongFormat | PortError::Codec(_) => ErrorKind::InvalidInput,
            _ => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_errors_flatten() {
        assert_eq!(
            PortError::from(CodecError::Buffer(BufferError::NoSpace)),
            PortError::NoSpace
        );
        assert_eq!(PortError::from(CodecError::WrongFormat), PortError::WrongFormat);
        assert_eq!(
            PortError::from(CodecError::ReservedControl),
            PortError::Codec(CodecError::ReservedControl)
        );
    }

    #[test]
    fn test_io_error_kind() {
        use embedded_io::{Error, ErrorKind};

        assert_eq!(PortError::Faulted(TxStatus::Timeout).kind(), ErrorKind::TimedOut);
        assert_eq!(PortError::NoSpace.kind(), ErrorKind::OutOfMemory);
        assert_eq!(PortError::Busy.kind(), ErrorKind::Other);
    }
}
