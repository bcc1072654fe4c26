//! Integrity beacons over event ranges
//!
//! A beacon's leaves are canonical serializations of the immutable columns
//! of each event row:
//!
//! ```text
//! +------------------+
//! | Event Sequence   | (i64 BE)
//! +------------------+
//! | Key              | (length-prefixed string)
//! +------------------+
//! | Zone             | (length-prefixed string)
//! +------------------+
//! | Event Type       | (length-prefixed string)
//! +------------------+
//! | Pulse Time       | (f64 bits, BE)
//! +------------------+
//! | Integrity Proof  | (length-prefixed string)
//! +------------------+
//! | Packet           | (length-prefixed bytes)
//! +------------------+
//! ```
//!
//! `is_active` is left out: superseding a key flips it on the older row.

use serde::Serialize;

/// Borrowed view of the columns that feed a beacon leaf.
#[derive(Debug, Clone, Copy)]
pub struct EventLeaf<'a> {
    pub event_sequence: i64,
    pub key: &'a str,
    pub zone: &'a str,
    pub event_type: &'a str,
    pub pulse_time: f64,
    pub integrity_proof: &'a str,
    pub packet: &'a [u8],
}

fn push_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// Serialize an event row into its beacon leaf.
pub fn event_leaf(leaf: &EventLeaf<'_>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + leaf.packet.len());
    buf.extend_from_slice(&leaf.event_sequence.to_be_bytes());
    push_prefixed(&mut buf, leaf.key.as_bytes());
    push_prefixed(&mut buf, leaf.zone.as_bytes());
    push_prefixed(&mut buf, leaf.event_type.as_bytes());
    buf.extend_from_slice(&leaf.pulse_time.to_bits().to_be_bytes());
    push_prefixed(&mut buf, leaf.integrity_proof.as_bytes());
    push_prefixed(&mut buf, leaf.packet);
    buf
}

/// A persisted checkpoint over `range_start..=range_end`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Beacon {
    pub beacon_id: i64,
    pub merkle_root: String,
    pub range_start: i64,
    pub range_end: i64,
    pub beacon_time: f64,
}

/// Outcome of re-deriving a beacon's root from the current ledger rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeaconVerification {
    pub beacon_id: i64,
    pub recorded_root: String,
    pub computed_root: String,
    /// Rows found inside the beacon's range
    pub event_count: u64,
}

impl BeaconVerification {
    /// True when the ledger rows still hash to the recorded root.
    pub fn is_intact(&self) -> bool {
        self.recorded_root == self.computed_root
    }
}
