//! Ledger configuration
//!
//! Loaded from a JSON file. Only `db_path` is required; every other field
//! has a default.
//!
//! ```json
//! {
//!   "db_path": "./ledger.db",
//!   "cache_capacity": 512,
//!   "pool_size": 4
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::packet::DEFAULT_COMPRESSION_LEVEL;
use crate::store::{LedgerError, LedgerResult};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite database file (required)
    pub db_path: PathBuf,

    /// Entries held by the payload cache; 0 disables caching
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Connections opened against the database file
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long SQLite waits on a locked database before giving up
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// How long a caller waits for a free pooled connection
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// zstd level for packet compression (1..=22)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    /// SQLite page cache per connection, in KiB
    #[serde(default = "default_sqlite_cache_kib")]
    pub sqlite_cache_kib: i64,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}
fn default_pool_size() -> usize {
    4
}
fn default_busy_timeout_ms() -> u64 {
    45_000
}
fn default_acquire_timeout_ms() -> u64 {
    45_000
}
fn default_compression_level() -> i32 {
    DEFAULT_COMPRESSION_LEVEL
}
fn default_sqlite_cache_kib() -> i64 {
    64_000
}

impl LedgerConfig {
    /// Configuration with defaults for everything but the database path.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            cache_capacity: default_cache_capacity(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            compression_level: default_compression_level(),
            sqlite_cache_kib: default_sqlite_cache_kib(),
        }
    }

    /// Load and validate configuration from a JSON file.
    pub fn load(path: &Path) -> LedgerResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| LedgerError::config(format!("failed to read {}: {}", path.display(), e)))?;

        let config: LedgerConfig = serde_json::from_str(&content)
            .map_err(|e| LedgerError::config(format!("invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(LedgerError::config("db_path must not be empty"));
        }
        if self.pool_size == 0 {
            return Err(LedgerError::config("pool_size must be > 0"));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(LedgerError::config(format!(
                "compression_level must be within 1..=22, got {}",
                self.compression_level
            )));
        }
        if self.sqlite_cache_kib <= 0 {
            return Err(LedgerError::config("sqlite_cache_kib must be > 0"));
        }
        Ok(())
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("ledger.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"db_path": "/tmp/ledger.db"}"#);
        let config = LedgerConfig::load(&path).unwrap();
        assert_eq!(config, LedgerConfig::new("/tmp/ledger.db"));
        assert_eq!(config.cache_capacity, 512);
        assert_eq!(config.busy_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn test_missing_db_path_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"cache_capacity": 8}"#);
        let err = LedgerConfig::load(&path).unwrap_err();
        assert_eq!(err.code(), "LEDGER_CONFIG_INVALID");
    }

    #[test]
    fn test_zero_pool_rejected() {
        let config = LedgerConfig::new("x.db").with_pool_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_compression_level_bounds() {
        let mut config = LedgerConfig::new("x.db");
        config.compression_level = 0;
        assert!(config.validate().is_err());
        config.compression_level = 22;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unreadable_file_is_config_error() {
        let err = LedgerConfig::load(Path::new("/nonexistent/ledger.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
