//! Integrity proofs for ledger events
//!
//! Every write carries a Merkle root over 256-byte chunks of its raw
//! payload. Proofs are advisory: they are stored next to the event and
//! checked only when an audit asks for it.
//!
//! Beacons extend the same tree construction across a contiguous range of
//! events, so a verifier can detect rows altered after the beacon was taken.

mod beacon;
mod merkle;

pub use beacon::{event_leaf, Beacon, BeaconVerification, EventLeaf};
pub use merkle::{chunk_payload, merkle_root, payload_proof, CHUNK_SIZE, EMPTY_SENTINEL};
