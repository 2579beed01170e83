//! SQLite connection handling with read/write separation and busy retry.
//!
//! - Each unit of work opens a **fresh connection** (WAL mode). Nothing is cached
//!   between calls, so the pool is `Send + Sync` and safe to share across the
//!   rayon workers that build thread views.
//! - **Write** units run inside `retry_on_busy`: `SQLITE_BUSY` / `SQLITE_LOCKED`
//!   is retried with exponential backoff. Constraint failures are not retried
//!   here; they carry meaning for the caller.
//!
//! No in-process write mutex: pair creation is serialized by the database's
//! UNIQUE constraint, which also holds across processes.

use crate::core::db;
use crate::core::error::DmregError;
use rusqlite::Connection;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Maximum retry attempts for busy/locked errors.
const MAX_RETRIES: u32 = 5;
/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 100;
/// Maximum delay cap (milliseconds).
const MAX_DELAY_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct SqlitePool {
    db_path: PathBuf,
    busy_timeout_secs: u32,
}

impl SqlitePool {
    pub fn new(db_path: impl Into<PathBuf>, busy_timeout_secs: u32) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout_secs,
        }
    }

    /// Execute a closure with a write connection. The closure may run more
    /// than once if the database reports busy, so it must be `FnMut` and must
    /// not commit partial state outside its own transaction.
    pub fn with_write<F, R>(&self, mut f: F) -> Result<R, DmregError>
    where
        F: FnMut(&mut Connection) -> Result<R, DmregError>,
    {
        retry_on_busy(|| {
            let mut conn = db::db_connect(&self.db_path, self.busy_timeout_secs)?;
            f(&mut conn)
        })
    }

    /// Execute a closure with a read connection. WAL allows concurrent readers
    /// across threads and processes.
    pub fn with_read<F, R>(&self, f: F) -> Result<R, DmregError>
    where
        F: FnOnce(&Connection) -> Result<R, DmregError>,
    {
        let conn = db::db_connect(&self.db_path, self.busy_timeout_secs)?;
        f(&conn)
    }
}

/// Retry a closure on `SQLITE_BUSY` / `SQLITE_LOCKED` with exponential backoff.
pub fn retry_on_busy<F, R>(mut f: F) -> Result<R, DmregError>
where
    F: FnMut() -> Result<R, DmregError>,
{
    let mut attempt = 0u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if is_busy_error(&e) && attempt < MAX_RETRIES => {
                attempt += 1;
                let delay_ms = (BASE_DELAY_MS * 2u64.pow(attempt - 1)).min(MAX_DELAY_MS);
                tracing::debug!(attempt, delay_ms, "sqlite busy, retrying write");
                thread::sleep(Duration::from_millis(delay_ms));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Check if an error is a SQLite busy/locked error that is retryable.
pub fn is_busy_error(err: &DmregError) -> bool {
    match err {
        DmregError::RusqliteError(rusqlite::Error::SqliteFailure(code, _)) => matches!(
            code.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}
