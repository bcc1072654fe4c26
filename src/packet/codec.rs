//! Packet encoding and decoding
//!
//! Compressed bodies use zstd frames. Decoding verifies that the body length
//! matches the header and that decompression reproduces exactly
//! `original_len` bytes.

use super::errors::{PacketError, PacketResult};
use super::{HEADER_LEN, MAX_ENCODED_LEN};

/// zstd level used when the caller does not pick one.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

const FLAG_RAW: u8 = 0;
const FLAG_COMPRESSED: u8 = 1;

/// Parsed packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Whether the body is compressed
    pub compressed: bool,
    /// Length of the payload before encoding
    pub original_len: u32,
    /// Length of the body following the header
    pub encoded_len: u16,
}

impl PacketHeader {
    /// Parse the fixed header at the start of a packet.
    pub fn parse(packet: &[u8]) -> PacketResult<Self> {
        if packet.len() < HEADER_LEN {
            return Err(PacketError::corrupt(format!(
                "packet is {} bytes, header needs {}",
                packet.len(),
                HEADER_LEN
            )));
        }

        let compressed = match packet[0] {
            FLAG_RAW => false,
            FLAG_COMPRESSED => true,
            other => {
                return Err(PacketError::corrupt(format!("unknown flag byte {:#04x}", other)));
            }
        };
        let original_len = u32::from_be_bytes([packet[1], packet[2], packet[3], packet[4]]);
        let encoded_len = u16::from_be_bytes([packet[5], packet[6]]);

        Ok(Self {
            compressed,
            original_len,
            encoded_len,
        })
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(if self.compressed { FLAG_COMPRESSED } else { FLAG_RAW });
        buf.extend_from_slice(&self.original_len.to_be_bytes());
        buf.extend_from_slice(&self.encoded_len.to_be_bytes());
    }
}

/// Encode a payload at the default compression level.
pub fn encode(payload: &[u8], compress: bool) -> PacketResult<Vec<u8>> {
    encode_with_level(payload, compress, DEFAULT_COMPRESSION_LEVEL)
}

/// Encode a payload into a packet.
///
/// Fails with [`PacketError::TooLarge`] when the encoded body would not fit
/// in the 16-bit length field.
pub fn encode_with_level(payload: &[u8], compress: bool, level: i32) -> PacketResult<Vec<u8>> {
    let original_len = u32::try_from(payload.len()).map_err(|_| PacketError::TooLarge {
        encoded_len: payload.len(),
        limit: u32::MAX as usize,
    })?;

    let compressed_body;
    let body: &[u8] = if compress {
        compressed_body = zstd::bulk::compress(payload, level)
            .map_err(|e| PacketError::corrupt(format!("compression failed: {}", e)))?;
        &compressed_body
    } else {
        payload
    };

    if body.len() > MAX_ENCODED_LEN {
        return Err(PacketError::TooLarge {
            encoded_len: body.len(),
            limit: MAX_ENCODED_LEN,
        });
    }

    let header = PacketHeader {
        compressed: compress,
        original_len,
        encoded_len: body.len() as u16,
    };

    let mut packet = Vec::with_capacity(HEADER_LEN + body.len());
    header.write_to(&mut packet);
    packet.extend_from_slice(body);
    Ok(packet)
}

/// Decode a packet back into its original payload.
pub fn decode(packet: &[u8]) -> PacketResult<Vec<u8>> {
    let header = PacketHeader::parse(packet)?;
    let body = &packet[HEADER_LEN..];

    if body.len() != header.encoded_len as usize {
        return Err(PacketError::corrupt(format!(
            "header declares {} body bytes, found {}",
            header.encoded_len,
            body.len()
        )));
    }

    let payload = if header.compressed {
        // Bounded by the declared length; a larger frame fails instead of
        // growing the buffer.
        zstd::bulk::decompress(body, header.original_len as usize)
            .map_err(|e| PacketError::corrupt(format!("decompression failed: {}", e)))?
    } else {
        body.to_vec()
    };

    if payload.len() != header.original_len as usize {
        return Err(PacketError::corrupt(format!(
            "header declares {} payload bytes, decoded {}",
            header.original_len,
            payload.len()
        )));
    }

    Ok(payload)
}
