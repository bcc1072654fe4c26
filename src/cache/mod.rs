//! Payload cache with resonance-based eviction
//!
//! The cache is a disposable, process-local view of decoded payloads. The
//! ledger stays the source of truth: entries carry bytes only, never zone or
//! timestamp metadata, tagged with the event sequence they came from, and a
//! fresh process starts empty.
//!
//! # Eviction
//!
//! When a new key arrives at capacity, the victim is the entry with the
//! lowest resonance score:
//!
//! ```text
//! resonance = access_frequency * 1 / (1 + age_seconds)
//! ```
//!
//! Scores are computed only when a victim is chosen. Touching an entry bumps
//! its frequency and refreshes its timestamp but never reorders anything.

mod clock;
mod resonance;

pub use clock::{Clock, ManualClock, SystemClock};
pub use resonance::{CacheStats, ResonanceCache};

/// Default number of entries held by a ledger's cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;
