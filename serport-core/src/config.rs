//! Port configuration
//!
//! Serializable with postcard (behind the `serde` feature) so boards can
//! keep a tuned configuration in flash next to their other settings.

use serport_protocol::{EscapeCodec, FrameControls, CONTROL_START, CONTROL_STOP, DEFAULT_ESCAPE};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default transmit stall timeout
pub const DEFAULT_TX_TIMEOUT_MS: u32 = 500;

/// Configuration error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A zero timeout would expire on every poll
    ZeroTimeout,
    /// A frame control code equals the escape character
    ReservedControl,
    /// Serialization or deserialization failed
    Encoding,
}

/// Serial port settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PortConfig {
    /// Time without TX progress before the transmission is abandoned
    pub tx_timeout_ms: u32,
    /// Escape character for the escaped formats
    pub escape: u8,
    /// Control code opening an addressed frame
    pub start_control: u8,
    /// Control code closing an addressed frame
    pub stop_control: u8,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            tx_timeout_ms: DEFAULT_TX_TIMEOUT_MS,
            escape: DEFAULT_ESCAPE,
            start_control: CONTROL_START,
            stop_control: CONTROL_STOP,
        }
    }
}

impl PortConfig {
    /// Check the settings for values the driver cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tx_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.start_control == self.escape || self.stop_control == self.escape {
            return Err(ConfigError::ReservedControl);
        }
        Ok(())
    }

    /// Codec using the configured escape character
    pub fn codec(&self) -> EscapeCodec {
        EscapeCodec::new(self.escape)
    }

    pub fn frame(&self) -> FrameControls {
        FrameControls {
            start: self.start_control,
            stop: self.stop_control,
        }
    }

    /// Serialize into `buf`, returning the used prefix
    #[cfg(feature = "serde")]
    pub fn to_slice<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| ConfigError::Encoding)
    }

    /// Deserialize and validate
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Encoding)?;
        config.validate()?;
        Ok(config)
    }
}
