//! Ledger storage engine
//!
//! The ledger is an append-only event table in SQLite. Writes never update
//! a payload in place: a new value appends a `WRITE` event and flips the
//! previous event's active flag, a delete appends a `TOMBSTONE`.
//!
//! # Design Principles
//!
//! - Append-only history, reconstructable per key by sequence order
//! - At most one active event per key (also enforced by a partial unique index)
//! - Every mutation inside `BEGIN IMMEDIATE`, WAL journal, `synchronous=NORMAL`
//! - Errors roll back before they are returned
//! - The cache is a disposable accelerator, never consulted for activity
//! - The engine never prints or logs

mod errors;
mod event;
mod ledger;
mod pool;

pub use errors::{LedgerError, LedgerResult};
pub use event::{
    AuditReport, EventKind, EventSummary, EventType, LedgerMetrics, PutReceipt, Record, ScanEntry,
};
pub use ledger::LedgerStore;
