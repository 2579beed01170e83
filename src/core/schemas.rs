//! Schema definitions for the registry database.
//!
//! Everything lives in one SQLite file under the store root:
//! - `users`: the identity directory this core reads from (owned elsewhere in
//!   a full deployment, seeded through `dmreg user add` locally).
//! - `threads`: one row per unordered user pair, keyed by `(user_low, user_high)`.
//! - `memberships`: exactly two rows per thread.

pub const REGISTRY_DB_NAME: &str = "dmreg.db";
pub const REGISTRY_SCHEMA_VERSION: u32 = 1;

pub const REGISTRY_DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const REGISTRY_DB_SCHEMA_USERS: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        image TEXT,
        created_at TEXT NOT NULL
    )
";

// The UNIQUE pair key is what serializes concurrent creation for a pair.
// Memberships carry no FK to users: the directory is an external collaborator.
pub const REGISTRY_DB_SCHEMA_THREADS: &str = "
    CREATE TABLE IF NOT EXISTS threads (
        id TEXT PRIMARY KEY,
        user_low TEXT NOT NULL,
        user_high TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(user_low, user_high),
        CHECK(user_low < user_high)
    )
";

pub const REGISTRY_DB_SCHEMA_MEMBERSHIPS: &str = "
    CREATE TABLE IF NOT EXISTS memberships (
        thread_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        PRIMARY KEY(thread_id, user_id),
        FOREIGN KEY(thread_id) REFERENCES threads(id)
    )
";

pub const REGISTRY_DB_SCHEMA_INDEX_MEMBERSHIP_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships(user_id)";
pub const REGISTRY_DB_SCHEMA_INDEX_MEMBERSHIP_THREAD: &str =
    "CREATE INDEX IF NOT EXISTS idx_memberships_thread ON memberships(thread_id)";

/// Statements run, in order, when a registry database is initialized.
pub const REGISTRY_DB_SCHEMA: &[&str] = &[
    REGISTRY_DB_SCHEMA_META,
    REGISTRY_DB_SCHEMA_USERS,
    REGISTRY_DB_SCHEMA_THREADS,
    REGISTRY_DB_SCHEMA_MEMBERSHIPS,
    REGISTRY_DB_SCHEMA_INDEX_MEMBERSHIP_USER,
    REGISTRY_DB_SCHEMA_INDEX_MEMBERSHIP_THREAD,
];
