//! SHA-256 Merkle roots over payload chunks

use sha2::{Digest, Sha256};

/// Fixed chunk size used when splitting a payload into leaves.
pub const CHUNK_SIZE: usize = 256;

/// Value hashed to produce the root of an empty chunk list.
pub const EMPTY_SENTINEL: &[u8] = b"empty";

/// Compute the hex-encoded Merkle root of `chunks`.
///
/// Leaves are the SHA-256 of each chunk. Each level hashes the
/// concatenation of adjacent pairs; an odd trailing node is paired with
/// itself. An empty list yields `sha256(EMPTY_SENTINEL)`.
pub fn merkle_root<C: AsRef<[u8]>>(chunks: &[C]) -> String {
    if chunks.is_empty() {
        return hex::encode(Sha256::digest(EMPTY_SENTINEL));
    }

    let mut level: Vec<[u8; 32]> = chunks
        .iter()
        .map(|chunk| Sha256::digest(chunk.as_ref()).into())
        .collect();

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                let mut hasher = Sha256::new();
                hasher.update(left);
                hasher.update(right);
                hasher.finalize().into()
            })
            .collect();
    }

    hex::encode(level[0])
}

/// Split a payload into `CHUNK_SIZE` pieces; the final piece may be shorter.
pub fn chunk_payload(payload: &[u8]) -> Vec<&[u8]> {
    payload.chunks(CHUNK_SIZE).collect()
}

/// Integrity proof for a raw payload.
pub fn payload_proof(payload: &[u8]) -> String {
    merkle_root(&chunk_payload(payload))
}
