//! Ledger Invariant Tests
//!
//! Tests for invariants:
//! - L1: After a put, get returns the written value and exactly one event is active
//! - L2: Deleted keys are never served, even from a warm cache
//! - L3: Deleting an absent key mutates nothing
//! - L4: Scans are bounded, active-only and newest first
//! - L5: History grows by one event per put and per successful delete
//! - L6: Concurrent writers never leave two active events for one key
//! - L7: A get after a successful put returns that put's value, even while
//!   other threads keep filling and evicting the cache

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use ledgerdb::integrity::payload_proof;
use ledgerdb::store::{EventKind, LedgerError};
use ledgerdb::{LedgerConfig, LedgerStore};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

fn open_store(dir: &TempDir) -> LedgerStore {
    LedgerStore::open_with(LedgerConfig::new(dir.path().join("ledger.db")))
        .expect("Failed to open ledger")
}

fn active_count(store: &LedgerStore, key: &str) -> usize {
    store
        .history(key)
        .unwrap()
        .iter()
        .filter(|e| e.is_active())
        .count()
}

// =============================================================================
// INVARIANT L1: Put Then Get
// =============================================================================

/// L1: The alpha scenario, write then overwrite.
#[test]
fn test_l1_put_then_overwrite() {
    let dir = create_temp_dir();
    let store = open_store(&dir);

    store.put("alpha", "z1", b"hello").unwrap();
    let first = store.get("alpha").unwrap().unwrap();
    assert_eq!(first.zone, "z1");
    assert_eq!(first.payload, b"hello");

    store.put("alpha", "z1", b"world").unwrap();
    let second = store.get("alpha").unwrap().unwrap();
    assert_eq!(second.zone, "z1");
    assert_eq!(second.payload, b"world");
    assert!(second.pulse_time >= first.pulse_time);

    let history = store.history("alpha").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, EventKind::Superseded);
    assert_eq!(history[1].kind, EventKind::Active);
}

/// L1: A put may move a key into a different zone.
#[test]
fn test_l1_put_moves_zone() {
    let dir = create_temp_dir();
    let store = open_store(&dir);

    store.put("alpha", "z1", b"one").unwrap();
    store.put("alpha", "z2", b"two").unwrap();

    assert_eq!(store.get("alpha").unwrap().unwrap().zone, "z2");
    assert!(store.scan("z1", 10).unwrap().is_empty());
    assert_eq!(store.scan("z2", 10).unwrap().len(), 1);
    assert_eq!(active_count(&store, "alpha"), 1);
}

/// L1: Empty and large payloads survive the codec.
#[test]
fn test_l1_edge_payloads() {
    let dir = create_temp_dir();
    let store = open_store(&dir);

    store.put("empty", "z", b"").unwrap();
    assert_eq!(store.get("empty").unwrap().unwrap().payload, b"");

    let big = vec![b'a'; 1 << 20];
    store.put("big", "z", &big).unwrap();
    assert_eq!(store.get("big").unwrap().unwrap().payload, big);
}

/// L1: A payload that does not compress below the envelope limit is refused
/// and leaves no trace.
#[test]
fn test_l1_incompressible_payload_rejected() {
    let dir = create_temp_dir();
    let store = open_store(&dir);

    let mut state: u32 = 0x9e37_79b9;
    let noise: Vec<u8> = (0..70_000)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect();

    let err = store.put("noise", "z", &noise).unwrap_err();
    assert!(matches!(err, LedgerError::PayloadTooLarge { .. }));
    assert_eq!(err.code(), "LEDGER_PAYLOAD_TOO_LARGE");
    assert!(store.history("noise").unwrap().is_empty());
}

// =============================================================================
// INVARIANT L2: Deleted Keys Are Never Served
// =============================================================================

/// L2: Delete after the alpha scenario.
#[test]
fn test_l2_delete_hides_key() {
    let dir = create_temp_dir();
    let store = open_store(&dir);

    store.put("alpha", "z1", b"hello").unwrap();
    store.put("alpha", "z1", b"world").unwrap();

    // Warm the cache first
    assert!(store.get("alpha").unwrap().is_some());

    assert!(store.delete("alpha").unwrap());
    assert!(store.get("alpha").unwrap().is_none());
    assert!(store
        .scan("z1", 10)
        .unwrap()
        .iter()
        .all(|entry| entry.key != "alpha"));
    assert_eq!(active_count(&store, "alpha"), 0);
}

/// L2: A key can be written again after deletion.
#[test]
fn test_l2_rewrite_after_delete() {
    let dir = create_temp_dir();
    let store = open_store(&dir);

    store.put("alpha", "z1", b"hello").unwrap();
    store.delete("alpha").unwrap();
    store.put("alpha", "z1", b"again").unwrap();

    assert_eq!(store.get("alpha").unwrap().unwrap().payload, b"again");
    let kinds: Vec<EventKind> = store.history("alpha").unwrap().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        [EventKind::Superseded, EventKind::Tombstone, EventKind::Active]
    );
}

// =============================================================================
// INVARIANT L3: Deleting An Absent Key Mutates Nothing
// =============================================================================

/// L3: Never-written and already-deleted keys both report false.
#[test]
fn test_l3_delete_absent_key() {
    let dir = create_temp_dir();
    let store = open_store(&dir);

    assert!(!store.delete("ghost").unwrap());

    store.put("alpha", "z1", b"hello").unwrap();
    assert!(store.delete("alpha").unwrap());
    let before = store.metrics().unwrap().total_events;

    assert!(!store.delete("alpha").unwrap());
    assert_eq!(store.metrics().unwrap().total_events, before);
}

// =============================================================================
// INVARIANT L4: Scan Bounds And Order
// =============================================================================

/// L4: Limit, activity and ordering.
#[test]
fn test_l4_scan_bounds_and_order() {
    let dir = create_temp_dir();
    let store = open_store(&dir);

    for i in 0..12 {
        store.put(&format!("k{}", i), "z1", b"v").unwrap();
    }
    store.put("other", "z2", b"v").unwrap();
    store.delete("k3").unwrap();

    let entries = store.scan("z1", 5).unwrap();
    assert_eq!(entries.len(), 5);
    assert!(entries
        .windows(2)
        .all(|w| w[0].pulse_time >= w[1].pulse_time));
    assert_eq!(entries[0].key, "k11");

    let all = store.scan("z1", 100).unwrap();
    assert_eq!(all.len(), 11);
    assert!(all.iter().all(|entry| entry.key != "k3"));

    assert!(store.scan("z1", 0).unwrap().is_empty());
    assert!(store.scan("missing", 10).unwrap().is_empty());
}

/// L4: Range queries include both bounds and honor the active filter.
#[test]
fn test_l4_range_query() {
    let dir = create_temp_dir();
    let store = open_store(&dir);

    let first = store.put("a", "z", b"1").unwrap();
    store.put("a", "z", b"2").unwrap();
    let last = store.put("b", "z", b"3").unwrap();

    let all = store
        .range_query(first.pulse_time, last.pulse_time, false)
        .unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].pulse_time <= w[1].pulse_time));

    let active = store
        .range_query(first.pulse_time, last.pulse_time, true)
        .unwrap();
    assert_eq!(active.len(), 2);
    assert!(active.iter().all(|e| e.is_active()));

    assert!(store.range_query(last.pulse_time + 1.0, last.pulse_time + 2.0, false)
        .unwrap()
        .is_empty());
}

// =============================================================================
// INVARIANT L5: History Growth
// =============================================================================

/// L5: One event per put and per successful delete, and every event audits clean.
#[test]
fn test_l5_history_growth_and_audit() {
    let dir = create_temp_dir();
    let store = open_store(&dir);

    store.put("alpha", "z1", b"one").unwrap();
    store.put("alpha", "z1", b"two").unwrap();
    store.delete("alpha").unwrap();
    store.delete("alpha").unwrap();
    store.put("alpha", "z1", b"three").unwrap();

    let history = store.history("alpha").unwrap();
    assert_eq!(history.len(), 4);
    assert!(history
        .windows(2)
        .all(|w| w[0].event_sequence < w[1].event_sequence));

    for event in &history {
        assert!(store.audit(event.event_sequence).unwrap().is_intact());
    }

    let metrics = store.metrics().unwrap();
    assert_eq!(metrics.total_events, 4);
    assert_eq!(metrics.total_keys_ever, 1);
    assert_eq!(metrics.active_keys, 1);
    assert_eq!(metrics.zone_count, 1);
}

// =============================================================================
// INVARIANT L6: Concurrent Writers
// =============================================================================

/// L6: Threads sharing one store through an Arc.
#[test]
fn test_l6_concurrent_puts() {
    let dir = create_temp_dir();
    let store = Arc::new(open_store(&dir));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..20 {
                    store
                        .put(&format!("t{}-{}", t, i), "z", b"own")
                        .unwrap();
                    store
                        .put("shared", "z", format!("{}:{}", t, i).as_bytes())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let metrics = store.metrics().unwrap();
    assert_eq!(metrics.total_events, 8 * 20 * 2);
    assert_eq!(metrics.active_keys, 8 * 20 + 1);
    assert_eq!(active_count(&store, "shared"), 1);
    let history = store.history("shared").unwrap();
    assert_eq!(history.len(), 8 * 20);

    let active = history.iter().find(|e| e.is_active()).unwrap();
    let record = store.get("shared").unwrap().unwrap();
    assert_eq!(payload_proof(&record.payload), active.integrity_proof);
    assert_eq!(record.pulse_time, active.pulse_time);
}

// =============================================================================
// INVARIANT L7: Reads Follow Committed Writes
// =============================================================================

/// L7: One writer checks every value it wrote while readers race cache
/// fills and evictions on a single-entry cache.
#[test]
fn test_l7_get_after_put_under_concurrent_reads() {
    let dir = create_temp_dir();
    let config = LedgerConfig::new(dir.path().join("ledger.db")).with_cache_capacity(1);
    let store = Arc::new(LedgerStore::open_with(config).unwrap());
    store.put("k", "z", b"v000000").unwrap();
    store.put("x", "z", b"other").unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    store.get("k").unwrap();
                    store.get("x").unwrap();
                }
            })
        })
        .collect();

    let mut mismatches = Vec::new();
    for i in 1..=1000 {
        let payload = format!("v{:06}", i).into_bytes();
        let receipt = store.put("k", "z", &payload).unwrap();
        let record = store.get("k").unwrap().unwrap();

        let active = store
            .history("k")
            .unwrap()
            .into_iter()
            .find(|e| e.is_active())
            .unwrap();
        if record.payload != payload
            || payload_proof(&record.payload) != active.integrity_proof
            || active.event_sequence != receipt.event_sequence
        {
            mismatches.push((i, String::from_utf8_lossy(&record.payload).into_owned()));
        }
    }

    done.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }
    assert!(mismatches.is_empty(), "stale reads: {:?}", mismatches);
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Operations outside the open window fail with NotOpen.
#[test]
fn test_operations_require_open_store() {
    let dir = create_temp_dir();
    let store = LedgerStore::new(LedgerConfig::new(dir.path().join("ledger.db")));

    assert!(matches!(store.get("a"), Err(LedgerError::NotOpen)));

    store.open().unwrap();
    store.put("a", "z", b"v").unwrap();
    store.close();
    store.close();

    let err = store.put("a", "z", b"v").unwrap_err();
    assert_eq!(err.code(), "LEDGER_NOT_OPEN");
    assert!(!err.is_retryable());

    store.open().unwrap();
    assert_eq!(store.get("a").unwrap().unwrap().payload, b"v");
}

/// An invalid configuration is rejected before any file is touched.
#[test]
fn test_invalid_config_rejected() {
    let dir = create_temp_dir();
    let path = dir.path().join("ledger.db");
    let result = LedgerStore::open_with(LedgerConfig::new(&path).with_pool_size(0));

    assert!(matches!(result, Err(LedgerError::Config { .. })));
    assert!(!path.exists());
}
