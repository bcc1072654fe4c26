//! The ledger engine
//!
//! `LedgerStore` owns the connection pool, the payload cache and the codec
//! settings. It is `Send + Sync`; share it behind an `Arc`.
//!
//! # Write path
//!
//! 1. Encode the payload and compute its proof (no lock held)
//! 2. `BEGIN IMMEDIATE` on a pooled connection
//! 3. Deactivate the current active row, append the new row
//! 4. Commit; any error before this point rolls back when the
//!    transaction guard drops
//! 5. Update the cache
//!
//! # Read path
//!
//! `get` always consults the active row, even on a cache hit. Cache entries
//! are tagged with the event sequence they were read from; bytes whose
//! sequence differs from the active row are ignored and reloaded. Cached
//! bytes for a deleted key are never returned.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, Transaction, TransactionBehavior};

use crate::cache::{Clock, ResonanceCache, SystemClock};
use crate::config::LedgerConfig;
use crate::integrity::{self, event_leaf, Beacon, BeaconVerification, EventLeaf};
use crate::packet;

use super::errors::{LedgerError, LedgerResult};
use super::event::{
    AuditReport, EventKind, EventSummary, EventType, LedgerMetrics, PutReceipt, Record, ScanEntry,
};
use super::pool::{ConnectionPool, PooledConnection};

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

const SUMMARY_COLUMNS: &str =
    "event_sequence, key, zone, pulse_time, integrity_proof, event_type, is_active";

const DEACTIVATE_SQL: &str = "UPDATE events SET is_active = 0 WHERE key = ?1 AND is_active = 1";

const INSERT_SQL: &str = "INSERT INTO events
     (key, zone, packet, integrity_proof, pulse_time, event_type, is_active)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

/// Event-sourced key store over SQLite.
pub struct LedgerStore {
    config: LedgerConfig,
    pool: RwLock<Option<ConnectionPool>>,
    cache: Mutex<ResonanceCache>,
}

impl LedgerStore {
    /// Build an unopened store. Every operation fails with `NotOpen` until
    /// [`open`](Self::open) succeeds.
    pub fn new(config: LedgerConfig) -> Self {
        let cache = ResonanceCache::new(config.cache_capacity);
        Self {
            config,
            pool: RwLock::new(None),
            cache: Mutex::new(cache),
        }
    }

    /// Build and open a store in one step.
    pub fn open_with(config: LedgerConfig) -> LedgerResult<Self> {
        let store = Self::new(config);
        store.open()?;
        Ok(store)
    }

    /// Create the schema if needed and fill the connection pool.
    ///
    /// Opening an already-open store is a no-op. A closed store may be
    /// opened again.
    pub fn open(&self) -> LedgerResult<()> {
        self.config.validate()?;

        let mut slot = self.pool.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Ok(());
        }

        let mut connections = Vec::with_capacity(self.config.pool_size);
        for _ in 0..self.config.pool_size {
            connections.push(self.open_connection()?);
        }
        connections[0].execute_batch(SCHEMA_SQL)?;

        *slot = Some(ConnectionPool::new(connections, self.config.acquire_timeout()));
        Ok(())
    }

    fn open_connection(&self) -> LedgerResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.config.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.config.busy_timeout())?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -{};",
            self.config.sqlite_cache_kib
        ))?;
        Ok(conn)
    }

    /// Release every connection and empty the cache. Idempotent.
    pub fn close(&self) {
        let pool = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = pool {
            pool.close();
        }
        self.cache().clear();
    }

    pub fn is_open(&self) -> bool {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn connection(&self) -> LedgerResult<PooledConnection> {
        let pool = self
            .pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(LedgerError::NotOpen)?;
        pool.checkout()
    }

    // The cache holds no invariants a panicking holder could break.
    fn cache(&self) -> MutexGuard<'_, ResonanceCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write a new value for `key`, superseding the current one.
    pub fn put(&self, key: &str, zone: &str, payload: &[u8]) -> LedgerResult<PutReceipt> {
        let packet = packet::encode_with_level(payload, true, self.config.compression_level)?;
        let integrity_proof = integrity::payload_proof(payload);
        let pulse_time = SystemClock.now();

        let mut conn = self.connection()?;
        let tx = begin_immediate(&mut conn)?;
        let event_sequence = append_write(&tx, key, zone, &packet, &integrity_proof, pulse_time)
            .map_err(|e| LedgerError::write_failed("put", e))?;
        tx.commit().map_err(|e| LedgerError::write_failed("put", e))?;
        drop(conn);

        self.cache().put(key, event_sequence, payload.to_vec());

        Ok(PutReceipt {
            event_sequence,
            pulse_time,
            integrity_proof,
        })
    }

    /// Current value of `key`, or `None` if it was never written or is
    /// deleted.
    pub fn get(&self, key: &str) -> LedgerResult<Option<Record>> {
        let conn = self.connection()?;

        let cached = self.cache().get(key);
        let active = conn
            .query_row(
                "SELECT event_sequence, zone, pulse_time FROM events
                 WHERE key = ?1 AND is_active = 1
                 ORDER BY event_sequence DESC LIMIT 1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((event_sequence, zone, pulse_time)) = active else {
            return Ok(None);
        };

        // Cached bytes count only when they belong to the active event.
        if let Some((version, payload)) = cached {
            if version == event_sequence {
                return Ok(Some(Record {
                    zone,
                    payload,
                    pulse_time,
                }));
            }
        }

        let packet: Vec<u8> = conn.query_row(
            "SELECT packet FROM events WHERE event_sequence = ?1",
            params![event_sequence],
            |row| row.get(0),
        )?;
        drop(conn);

        let payload = packet::decode(&packet)?;
        self.cache().put(key, event_sequence, payload.clone());

        Ok(Some(Record {
            zone,
            payload,
            pulse_time,
        }))
    }

    /// Deactivate `key` and append a tombstone.
    ///
    /// Returns `false`, writing nothing, when `key` has no active event.
    /// Cached bytes are left in place; `get` re-checks activity.
    pub fn delete(&self, key: &str) -> LedgerResult<bool> {
        let tombstone = packet::encode(&[], false)?;
        let proof = integrity::payload_proof(&[]);
        let pulse_time = SystemClock.now();

        let mut conn = self.connection()?;
        let tx = begin_immediate(&mut conn)?;
        let deleted = append_tombstone(&tx, key, &tombstone, &proof, pulse_time)
            .map_err(|e| LedgerError::write_failed("delete", e))?;
        if deleted {
            tx.commit()
                .map_err(|e| LedgerError::write_failed("delete", e))?;
        }
        Ok(deleted)
    }

    /// Up to `limit` active events in `zone`, newest first.
    pub fn scan(&self, zone: &str, limit: usize) -> LedgerResult<Vec<ScanEntry>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT key, pulse_time, integrity_proof, event_sequence FROM events
             WHERE zone = ?1 AND is_active = 1
             ORDER BY pulse_time DESC, event_sequence DESC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let entries = stmt
            .query_map(params![zone, limit], |row| {
                Ok(ScanEntry {
                    key: row.get(0)?,
                    pulse_time: row.get(1)?,
                    integrity_proof: row.get(2)?,
                    event_sequence: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Events with `start_time <= pulse_time <= end_time`, oldest first.
    pub fn range_query(
        &self,
        start_time: f64,
        end_time: f64,
        active_only: bool,
    ) -> LedgerResult<Vec<EventSummary>> {
        let conn = self.connection()?;
        let sql = format!(
            "SELECT {} FROM events
             WHERE pulse_time BETWEEN ?1 AND ?2{}
             ORDER BY pulse_time ASC, event_sequence ASC",
            SUMMARY_COLUMNS,
            if active_only { " AND is_active = 1" } else { "" }
        );
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![start_time, end_time], summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Every event ever recorded for `key`, in sequence order.
    pub fn history(&self, key: &str) -> LedgerResult<Vec<EventSummary>> {
        let conn = self.connection()?;
        let sql = format!(
            "SELECT {} FROM events WHERE key = ?1 ORDER BY event_sequence ASC",
            SUMMARY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![key], summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Ledger-wide counts plus cache counters.
    pub fn metrics(&self) -> LedgerResult<LedgerMetrics> {
        let conn = self.connection()?;
        let (total_keys_ever, active_keys, zone_count, total_events) = conn.query_row(
            "SELECT
                COUNT(DISTINCT key),
                COUNT(DISTINCT CASE WHEN is_active = 1 THEN key END),
                COUNT(DISTINCT zone),
                COUNT(*)
             FROM events",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?;
        drop(conn);

        let stats = self.cache().stats();
        Ok(LedgerMetrics {
            total_keys_ever: total_keys_ever as u64,
            active_keys: active_keys as u64,
            zone_count: zone_count as u64,
            total_events: total_events as u64,
            cache_efficiency: stats.efficiency(),
            cache_hits: stats.hits,
            cache_queries: stats.queries,
        })
    }

    /// Re-derive the proof of a stored event from its packet.
    pub fn audit(&self, event_sequence: i64) -> LedgerResult<AuditReport> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                "SELECT key, packet, integrity_proof FROM events WHERE event_sequence = ?1",
                params![event_sequence],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        drop(conn);

        let (key, packet, stored_proof) =
            row.ok_or_else(|| LedgerError::not_found(format!("event {}", event_sequence)))?;
        let payload = packet::decode(&packet)?;

        Ok(AuditReport {
            event_sequence,
            key,
            stored_proof,
            computed_proof: integrity::payload_proof(&payload),
        })
    }

    /// Record a beacon over every event appended since the previous one.
    ///
    /// Returns `None` when no new events exist.
    pub fn record_beacon(&self) -> LedgerResult<Option<Beacon>> {
        let beacon_time = SystemClock.now();
        let mut conn = self.connection()?;
        let tx = begin_immediate(&mut conn)?;
        let beacon =
            append_beacon(&tx, beacon_time).map_err(|e| LedgerError::write_failed("beacon", e))?;
        if beacon.is_some() {
            tx.commit()
                .map_err(|e| LedgerError::write_failed("beacon", e))?;
        }
        Ok(beacon)
    }

    /// All recorded beacons, oldest first.
    pub fn beacons(&self) -> LedgerResult<Vec<Beacon>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT beacon_id, merkle_root, range_start, range_end, beacon_time
             FROM integrity_beacons ORDER BY beacon_id ASC",
        )?;
        let beacons = stmt
            .query_map([], beacon_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(beacons)
    }

    /// Recompute a beacon's root from the rows currently in its range.
    pub fn verify_beacon(&self, beacon_id: i64) -> LedgerResult<BeaconVerification> {
        let conn = self.connection()?;
        let beacon = conn
            .query_row(
                "SELECT beacon_id, merkle_root, range_start, range_end, beacon_time
                 FROM integrity_beacons WHERE beacon_id = ?1",
                params![beacon_id],
                beacon_from_row,
            )
            .optional()?
            .ok_or_else(|| LedgerError::not_found(format!("beacon {}", beacon_id)))?;

        let leaves = range_leaves(&conn, beacon.range_start, beacon.range_end)?;

        Ok(BeaconVerification {
            beacon_id,
            recorded_root: beacon.merkle_root,
            computed_root: integrity::merkle_root(&leaves),
            event_count: leaves.len() as u64,
        })
    }
}

impl Drop for LedgerStore {
    fn drop(&mut self) {
        self.close();
    }
}

fn begin_immediate(conn: &mut Connection) -> LedgerResult<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

fn append_write(
    tx: &Transaction<'_>,
    key: &str,
    zone: &str,
    packet: &[u8],
    proof: &str,
    pulse_time: f64,
) -> rusqlite::Result<i64> {
    tx.execute(DEACTIVATE_SQL, params![key])?;
    tx.execute(
        INSERT_SQL,
        params![key, zone, packet, proof, pulse_time, EventType::Write, true],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Returns whether an active event existed.
fn append_tombstone(
    tx: &Transaction<'_>,
    key: &str,
    packet: &[u8],
    proof: &str,
    pulse_time: f64,
) -> rusqlite::Result<bool> {
    let zone: Option<String> = tx
        .query_row(
            "SELECT zone FROM events WHERE key = ?1 AND is_active = 1
             ORDER BY event_sequence DESC LIMIT 1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    let Some(zone) = zone else {
        return Ok(false);
    };

    tx.execute(DEACTIVATE_SQL, params![key])?;
    tx.execute(
        INSERT_SQL,
        params![key, zone, packet, proof, pulse_time, EventType::Tombstone, false],
    )?;
    Ok(true)
}

fn append_beacon(tx: &Transaction<'_>, beacon_time: f64) -> rusqlite::Result<Option<Beacon>> {
    let last_end: i64 = tx.query_row(
        "SELECT COALESCE(MAX(range_end), 0) FROM integrity_beacons",
        [],
        |row| row.get(0),
    )?;
    let newest: Option<i64> =
        tx.query_row("SELECT MAX(event_sequence) FROM events", [], |row| row.get(0))?;

    let range_end = match newest {
        Some(newest) if newest > last_end => newest,
        _ => return Ok(None),
    };
    let range_start = last_end + 1;

    let leaves = range_leaves(tx, range_start, range_end)?;
    let merkle_root = integrity::merkle_root(&leaves);

    tx.execute(
        "INSERT INTO integrity_beacons (merkle_root, range_start, range_end, beacon_time)
         VALUES (?1, ?2, ?3, ?4)",
        params![merkle_root, range_start, range_end, beacon_time],
    )?;

    Ok(Some(Beacon {
        beacon_id: tx.last_insert_rowid(),
        merkle_root,
        range_start,
        range_end,
        beacon_time,
    }))
}

/// Beacon leaves for every event in `start..=end`, in sequence order.
fn range_leaves(conn: &Connection, start: i64, end: i64) -> rusqlite::Result<Vec<Vec<u8>>> {
    let mut stmt = conn.prepare(
        "SELECT event_sequence, key, zone, event_type, pulse_time, integrity_proof, packet
         FROM events
         WHERE event_sequence BETWEEN ?1 AND ?2
         ORDER BY event_sequence ASC",
    )?;
    let mut rows = stmt.query(params![start, end])?;
    let mut leaves = Vec::new();
    while let Some(row) = rows.next()? {
        let key: String = row.get(1)?;
        let zone: String = row.get(2)?;
        let event_type: String = row.get(3)?;
        let integrity_proof: String = row.get(5)?;
        let packet: Vec<u8> = row.get(6)?;
        leaves.push(event_leaf(&EventLeaf {
            event_sequence: row.get(0)?,
            key: &key,
            zone: &zone,
            event_type: &event_type,
            pulse_time: row.get(4)?,
            integrity_proof: &integrity_proof,
            packet: &packet,
        }));
    }
    Ok(leaves)
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<EventSummary> {
    let event_type: EventType = row.get(5)?;
    let is_active: bool = row.get(6)?;
    Ok(EventSummary {
        event_sequence: row.get(0)?,
        key: row.get(1)?,
        zone: row.get(2)?,
        pulse_time: row.get(3)?,
        integrity_proof: row.get(4)?,
        kind: EventKind::from_flags(event_type, is_active),
    })
}

fn beacon_from_row(row: &Row<'_>) -> rusqlite::Result<Beacon> {
    Ok(Beacon {
        beacon_id: row.get(0)?,
        merkle_root: row.get(1)?,
        range_start: row.get(2)?,
        range_end: row.get(3)?,
        beacon_time: row.get(4)?,
    })
}
