//! Packet codec for ledger payloads
//!
//! Every payload persisted in the `packet` column is wrapped in a
//! self-describing envelope:
//!
//! ```text
//! +------------------+
//! | Flag             | (u8: 0 = raw, 1 = compressed)
//! +------------------+
//! | Original Length  | (u32 BE)
//! +------------------+
//! | Encoded Length   | (u16 BE)
//! +------------------+
//! | Encoded Body     | (encoded_len bytes)
//! +------------------+
//! ```
//!
//! The u16 length field caps a single packet body at 65535 bytes. Bodies
//! above that limit are rejected at encode time, never truncated.

mod codec;
mod errors;

pub use codec::{decode, encode, encode_with_level, PacketHeader, DEFAULT_COMPRESSION_LEVEL};
pub use errors::{PacketError, PacketResult};

/// Size of the fixed packet header in bytes.
pub const HEADER_LEN: usize = 7;

/// Largest body the u16 length field can describe.
pub const MAX_ENCODED_LEN: usize = u16::MAX as usize;
