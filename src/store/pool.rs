//! Fixed-size SQLite connection pool
//!
//! Connections are never shared between threads: a caller checks one out,
//! owns it for the duration of one ledger operation, and the guard returns
//! it on drop. Checkout blocks on a condition variable for at most the
//! configured acquire timeout.
//!
//! Closing the pool drops every idle connection immediately. Connections
//! still checked out are dropped when their guard goes away.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use super::errors::{LedgerError, LedgerResult};

struct PoolState {
    idle: Vec<Connection>,
    closed: bool,
}

struct PoolInner {
    state: Mutex<PoolState>,
    available: Condvar,
    acquire_timeout: Duration,
}

impl PoolInner {
    fn lock(&self) -> LedgerResult<MutexGuard<'_, PoolState>> {
        self.state
            .lock()
            .map_err(|_| LedgerError::BackingStoreUnavailable {
                reason: "connection pool lock poisoned".to_string(),
                retryable: false,
            })
    }
}

/// Shared handle to the pool. Clones refer to the same connections.
#[derive(Clone)]
pub(crate) struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub(crate) fn new(connections: Vec<Connection>, acquire_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    idle: connections,
                    closed: false,
                }),
                available: Condvar::new(),
                acquire_timeout,
            }),
        }
    }

    /// Check out a connection, waiting up to the acquire timeout.
    pub(crate) fn checkout(&self) -> LedgerResult<PooledConnection> {
        let started = Instant::now();
        let deadline = started + self.inner.acquire_timeout;
        let mut state = self.inner.lock()?;

        loop {
            if state.closed {
                return Err(LedgerError::NotOpen);
            }
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection {
                    conn: Some(conn),
                    pool: Arc::clone(&self.inner),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(LedgerError::pool_exhausted(started.elapsed().as_millis()));
            }

            state = self
                .inner
                .available
                .wait_timeout(state, deadline - now)
                .map_err(|_| LedgerError::BackingStoreUnavailable {
                    reason: "connection pool lock poisoned".to_string(),
                    retryable: false,
                })?
                .0;
        }
    }

    /// Drop idle connections and refuse further checkouts.
    pub(crate) fn close(&self) {
        let drained = match self.inner.state.lock() {
            Ok(mut state) => {
                state.closed = true;
                std::mem::take(&mut state.idle)
            }
            Err(poisoned) => {
                let mut state = poisoned.into_inner();
                state.closed = true;
                std::mem::take(&mut state.idle)
            }
        };
        self.inner.available.notify_all();
        drop(drained);
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.inner.state.lock().map(|s| s.idle.len()).unwrap_or(0)
    }
}

/// A checked-out connection. Returned to the pool on drop.
pub(crate) struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if let Ok(mut state) = self.pool.state.lock() {
            if !state.closed {
                state.idle.push(conn);
                drop(state);
                self.pool.available.notify_one();
            }
        }
    }
}
