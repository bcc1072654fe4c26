//! Ledger event types
//!
//! The table stores a flag-based representation (`event_type` text plus an
//! `is_active` integer). The API lifts it into [`EventKind`] so callers match
//! on a closed set of states instead of interpreting flags.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

/// Persisted event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Write,
    Tombstone,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Write => "WRITE",
            EventType::Tombstone => "TOMBSTONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WRITE" => Some(EventType::Write),
            "TOMBSTONE" => Some(EventType::Tombstone),
            _ => None,
        }
    }
}

impl ToSql for EventType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EventType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        EventType::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown event type '{}'", s).into()))
    }
}

/// Lifecycle state of an event, derived from its type and active flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Current value of its key
    Active,
    /// A write that a later write or delete replaced
    Superseded,
    /// Deletion marker with an empty payload
    Tombstone,
}

impl EventKind {
    pub fn from_flags(event_type: EventType, is_active: bool) -> Self {
        match (event_type, is_active) {
            (EventType::Tombstone, _) => EventKind::Tombstone,
            (EventType::Write, true) => EventKind::Active,
            (EventType::Write, false) => EventKind::Superseded,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::Tombstone => EventType::Tombstone,
            EventKind::Active | EventKind::Superseded => EventType::Write,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, EventKind::Active)
    }
}

/// Current value of a key as returned by `get`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub zone: String,
    pub payload: Vec<u8>,
    pub pulse_time: f64,
}

/// Acknowledgement of a committed `put`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PutReceipt {
    pub event_sequence: i64,
    pub pulse_time: f64,
    pub integrity_proof: String,
}

/// One row of a zone scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanEntry {
    pub key: String,
    pub pulse_time: f64,
    pub integrity_proof: String,
    pub event_sequence: i64,
}

/// Metadata of one ledger event, without its payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub event_sequence: i64,
    pub key: String,
    pub zone: String,
    pub pulse_time: f64,
    pub integrity_proof: String,
    pub kind: EventKind,
}

impl EventSummary {
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    pub fn is_active(&self) -> bool {
        self.kind.is_active()
    }
}

/// Ledger-wide counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerMetrics {
    pub total_keys_ever: u64,
    pub active_keys: u64,
    pub zone_count: u64,
    pub total_events: u64,
    pub cache_efficiency: f64,
    pub cache_hits: u64,
    pub cache_queries: u64,
}

/// Result of re-deriving a stored event's integrity proof.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub event_sequence: i64,
    pub key: String,
    pub stored_proof: String,
    pub computed_proof: String,
}

impl AuditReport {
    pub fn is_intact(&self) -> bool {
        self.stored_proof == self.computed_proof
    }
}
