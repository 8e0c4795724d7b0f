//! Wire codec errors.

use thiserror::Error;

/// Errors produced while framing or (de)serializing messages.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Frame length exceeds the configured limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Declared or encoded payload size.
        size: usize,
        /// Configured maximum payload size.
        max: usize,
    },

    /// CBOR serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// CBOR deserialization failed.
    #[error("decode failed: {0}")]
    Decode(String),
}
