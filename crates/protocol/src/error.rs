//! Protocol error types

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from framing and envelope decoding
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame length prefix exceeds the configured maximum
    #[error("frame of {len} bytes exceeds maximum {max}")]
    FrameTooLarge {
        /// Declared frame length
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Frame carried no opcode byte
    #[error("empty frame")]
    EmptyFrame,

    /// Opcode byte is not part of the protocol
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// Payload failed to decode as the expected message
    #[error("payload decode failed: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Underlying transport error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
