//! ledgerdb - An event-sourced, integrity-checked key ledger
//!
//! Every write is an appended event in SQLite, compressed into a small
//! packet and sealed with a Merkle proof. Hot payloads are kept in a
//! resonance cache that evicts by frequency over staleness.

pub mod cache;
pub mod cli;
pub mod config;
pub mod integrity;
pub mod observability;
pub mod packet;
pub mod store;

pub use config::LedgerConfig;
pub use store::{LedgerError, LedgerResult, LedgerStore};
