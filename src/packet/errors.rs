//! Packet codec errors

use thiserror::Error;

/// Result type for codec operations
pub type PacketResult<T> = Result<T, PacketError>;

/// Errors raised while encoding or decoding a packet
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Header is malformed, lengths disagree, or decompression failed
    #[error("corrupt packet: {0}")]
    Corrupt(String),

    /// Encoded body does not fit in the u16 length field
    #[error("payload too large: encoded body is {encoded_len} bytes (limit {limit})")]
    TooLarge {
        /// Size of the encoded body that was rejected
        encoded_len: usize,
        /// Maximum body size a packet can describe
        limit: usize,
    },
}

impl PacketError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        PacketError::Corrupt(reason.into())
    }
}
