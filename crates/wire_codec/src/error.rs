//! Codec errors

use thiserror::Error;

/// Reasons a payload is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer bytes than a full message
    #[error("payload too short: {len} bytes")]
    TooShort { len: usize },

    /// Top nibble of the first byte is not the supported version
    #[error("unsupported version byte {byte:#04x}")]
    BadVersion { byte: u8 },
}
