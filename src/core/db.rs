use crate::core::error::DmregError;
use crate::core::schemas;
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub fn db_connect(db_path: &Path, busy_timeout_secs: u32) -> Result<Connection, DmregError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(u64::from(busy_timeout_secs)))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

pub fn registry_db_path(root: &Path, db_name: &str) -> PathBuf {
    root.join(db_name)
}

/// Create the registry tables if needed and stamp the schema version.
pub fn initialize_registry_db(db_path: &Path, busy_timeout_secs: u32) -> Result<(), DmregError> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let conn = db_connect(db_path, busy_timeout_secs)?;
    for stmt in schemas::REGISTRY_DB_SCHEMA {
        conn.execute(stmt, [])?;
    }
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES('schema_version', ?1)",
        params![schemas::REGISTRY_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<Option<u32>, DmregError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(v) => v
            .parse::<u32>()
            .map(Some)
            .map_err(|e| DmregError::ValidationError(format!("bad schema_version {v:?}: {e}"))),
        None => Ok(None),
    }
}
