//! Bounded key -> bytes map with resonance eviction
//!
//! Every entry carries the version (ledger event sequence) its bytes were
//! read from. A fill never replaces bytes of a newer version.

use std::collections::HashMap;

use super::clock::{Clock, SystemClock};

/// Cache statistics.
///
/// Counters are passive: they never influence which entry is evicted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry
    pub hits: u64,
    /// All lookups, hit or miss
    pub queries: u64,
    /// Entries removed to make room for a new key
    pub evictions: u64,
}

impl CacheStats {
    /// Hits over queries, 0.0 before the first query.
    pub fn efficiency(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.hits as f64 / self.queries as f64
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    version: i64,
    value: Vec<u8>,
    access_frequency: u64,
    last_access_time: f64,
}

impl CacheEntry {
    fn resonance(&self, now: f64) -> f64 {
        let age = (now - self.last_access_time).max(0.0);
        self.access_frequency as f64 * (1.0 / (1.0 + age))
    }

    fn touch(&mut self, now: f64) {
        self.access_frequency = self.access_frequency.saturating_add(1);
        self.last_access_time = now;
    }
}

/// Payload cache evicting the entry with the lowest
/// `frequency * 1 / (1 + age)` when a new key arrives at capacity.
///
/// Not internally synchronized; the ledger wraps it in a mutex.
#[derive(Debug)]
pub struct ResonanceCache<C: Clock = SystemClock> {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    clock: C,
    stats: CacheStats,
}

impl ResonanceCache<SystemClock> {
    /// Create a cache on the system clock.
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, SystemClock)
    }
}

impl<C: Clock> ResonanceCache<C> {
    /// Create a cache reading time from `clock`.
    ///
    /// A capacity of zero disables caching entirely.
    pub fn with_clock(capacity: usize, clock: C) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(1024)),
            capacity,
            clock,
            stats: CacheStats::default(),
        }
    }

    /// Insert or overwrite an entry at `version`.
    ///
    /// Overwrites bump frequency and never evict. New keys at capacity
    /// displace the lowest-resonance entry first. Returns `false`, leaving
    /// the entry untouched, when the cached version is newer.
    pub fn put(&mut self, key: &str, version: i64, value: Vec<u8>) -> bool {
        if self.capacity == 0 {
            return false;
        }

        let now = self.clock.now();

        if let Some(entry) = self.entries.get_mut(key) {
            if entry.version > version {
                return false;
            }
            entry.touch(now);
            entry.version = version;
            entry.value = value;
            return true;
        }

        if self.entries.len() >= self.capacity {
            if let Some(victim) = self.lowest_resonance(now) {
                self.entries.remove(&victim);
                self.stats.evictions += 1;
            }
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                version,
                value,
                access_frequency: 1,
                last_access_time: now,
            },
        );
        true
    }

    /// Look up an entry and its version, counting the query and refreshing
    /// the entry on hit.
    pub fn get(&mut self, key: &str) -> Option<(i64, Vec<u8>)> {
        self.stats.queries += 1;

        let now = self.clock.now();
        let entry = self.entries.get_mut(key)?;
        self.stats.hits += 1;
        entry.touch(now);
        Some((entry.version, entry.value.clone()))
    }

    /// Drop a single entry. Returns whether it was present.
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Whether `key` is cached. Does not count as a query.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Current resonance score of `key`, if cached.
    pub fn resonance(&self, key: &str) -> Option<f64> {
        let now = self.clock.now();
        self.entries.get(key).map(|e| e.resonance(now))
    }

    /// Access frequency of `key`, if cached.
    pub fn frequency(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|e| e.access_frequency)
    }

    /// Remove every entry and reset all counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = CacheStats::default();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Hit ratio, 0.0 before the first query.
    pub fn efficiency(&self) -> f64 {
        self.stats.efficiency()
    }

    /// First entry found with the strictly lowest score.
    fn lowest_resonance(&self, now: f64) -> Option<String> {
        let mut victim: Option<(&String, f64)> = None;
        for (key, entry) in &self.entries {
            let score = entry.resonance(now);
            match victim {
                Some((_, best)) if score >= best => {}
                _ => victim = Some((key, score)),
            }
        }
        victim.map(|(key, _)| key.clone())
    }
}
