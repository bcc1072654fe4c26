//! Ledger error types
//!
//! Error codes:
//! - LEDGER_NOT_OPEN
//! - LEDGER_WRITE_FAILED
//! - LEDGER_CORRUPT_PACKET
//! - LEDGER_PAYLOAD_TOO_LARGE
//! - LEDGER_BACKING_STORE_UNAVAILABLE
//! - LEDGER_KEY_NOT_FOUND
//! - LEDGER_CONFIG_INVALID
//!
//! Write errors are only raised after the enclosing transaction has been
//! rolled back, so callers never observe a partial mutation.

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::packet::PacketError;

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors returned by the ledger engine
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Operation attempted before `open` or after `close`
    #[error("ledger is not open")]
    NotOpen,

    /// Transaction could not commit; nothing was applied
    #[error("{operation} failed and was rolled back: {source}")]
    WriteFailed {
        /// Ledger operation that was running
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Stored packet failed to decode
    #[error("corrupt packet: {reason}")]
    CorruptPacket {
        /// What was wrong with the packet
        reason: String,
    },

    /// Encoded payload exceeds the packet length field
    #[error("payload too large: encoded body is {encoded_len} bytes (limit {limit})")]
    PayloadTooLarge {
        /// Size of the encoded body
        encoded_len: usize,
        /// Maximum body size
        limit: usize,
    },

    /// I/O failure, lock timeout or pool exhaustion
    #[error("backing store unavailable: {reason}")]
    BackingStoreUnavailable {
        /// Underlying failure
        reason: String,
        /// Whether retrying the operation may succeed
        retryable: bool,
    },

    /// An addressed record does not exist
    #[error("not found: {what}")]
    KeyNotFound {
        /// Description of what was looked up
        what: String,
    },

    /// Configuration failed validation or could not be read
    #[error("invalid configuration: {reason}")]
    Config {
        /// Validation failure
        reason: String,
    },
}

impl LedgerError {
    /// Stable string code for this error
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotOpen => "LEDGER_NOT_OPEN",
            LedgerError::WriteFailed { .. } => "LEDGER_WRITE_FAILED",
            LedgerError::CorruptPacket { .. } => "LEDGER_CORRUPT_PACKET",
            LedgerError::PayloadTooLarge { .. } => "LEDGER_PAYLOAD_TOO_LARGE",
            LedgerError::BackingStoreUnavailable { .. } => "LEDGER_BACKING_STORE_UNAVAILABLE",
            LedgerError::KeyNotFound { .. } => "LEDGER_KEY_NOT_FOUND",
            LedgerError::Config { .. } => "LEDGER_CONFIG_INVALID",
        }
    }

    /// Whether the same call may succeed if retried later.
    ///
    /// Lock contention and pool exhaustion are retryable, including a
    /// write whose commit lost a lock race.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::BackingStoreUnavailable { retryable, .. } => *retryable,
            LedgerError::WriteFailed { source, .. } => is_contention(source),
            _ => false,
        }
    }

    pub(crate) fn write_failed(operation: &'static str, source: rusqlite::Error) -> Self {
        LedgerError::WriteFailed { operation, source }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        LedgerError::KeyNotFound { what: what.into() }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        LedgerError::Config {
            reason: reason.into(),
        }
    }

    pub(crate) fn pool_exhausted(waited_ms: u128) -> Self {
        LedgerError::BackingStoreUnavailable {
            reason: format!("no connection available after {} ms", waited_ms),
            retryable: true,
        }
    }
}

fn is_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::BackingStoreUnavailable {
            retryable: is_contention(&err),
            reason: err.to_string(),
        }
    }
}

impl From<PacketError> for LedgerError {
    fn from(err: PacketError) -> Self {
        match err {
            PacketError::Corrupt(reason) => LedgerError::CorruptPacket { reason },
            PacketError::TooLarge { encoded_len, limit } => {
                LedgerError::PayloadTooLarge { encoded_len, limit }
            }
        }
    }
}
