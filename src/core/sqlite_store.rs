//! SQLite-backed [`ThreadStore`].
//!
//! Pair creation runs in a `BEGIN IMMEDIATE` transaction and relies on
//! `UNIQUE(user_low, user_high)` on `threads`. When two writers race for the
//! same pair, exactly one insert succeeds; the other hits
//! `SQLITE_CONSTRAINT_UNIQUE`, rolls back, and reports `DuplicateThread`.

use crate::core::db;
use crate::core::error::DmregError;
use crate::core::pool::SqlitePool;
use crate::core::store::{Membership, PairKey, Thread, ThreadId, ThreadStore, User, UserId};
use crate::core::time;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use std::path::Path;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (and initialize if needed) the registry database at `db_path`.
    pub fn open(db_path: &Path, busy_timeout_secs: u32) -> Result<Self, DmregError> {
        db::initialize_registry_db(db_path, busy_timeout_secs)?;
        Ok(Self {
            pool: SqlitePool::new(db_path, busy_timeout_secs),
        })
    }
}

fn row_to_user(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: UserId::from(row.get::<_, String>(0)?),
        username: row.get(1)?,
        image: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_thread(row: &rusqlite::Row) -> Result<Thread, rusqlite::Error> {
    Ok(Thread {
        id: ThreadId::from(row.get::<_, String>(0)?),
        created_at: row.get(1)?,
    })
}

fn row_to_membership(row: &rusqlite::Row) -> Result<Membership, rusqlite::Error> {
    Ok(Membership {
        thread_id: ThreadId::from(row.get::<_, String>(0)?),
        user_id: UserId::from(row.get::<_, String>(1)?),
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl ThreadStore for SqliteStore {
    fn user(&self, id: &UserId) -> Result<Option<User>, DmregError> {
        self.pool.with_read(|conn| {
            let user = conn
                .query_row(
                    "SELECT id, username, image, created_at FROM users WHERE id = ?1",
                    params![id.as_str()],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, DmregError> {
        self.pool.with_read(|conn| {
            let user = conn
                .query_row(
                    "SELECT id, username, image, created_at FROM users WHERE username = ?1",
                    params![username],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
    }

    fn insert_user(&self, username: &str, image: Option<&str>) -> Result<User, DmregError> {
        let user = User {
            id: UserId::generate(),
            username: username.to_string(),
            image: image.map(|s| s.to_string()),
            created_at: time::now_epoch_z(),
        };
        self.pool.with_write(|conn| {
            let res = conn.execute(
                "INSERT INTO users(id, username, image, created_at) VALUES(?1, ?2, ?3, ?4)",
                params![
                    user.id.as_str(),
                    user.username,
                    user.image,
                    user.created_at
                ],
            );
            match res {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => Err(DmregError::Conflict(format!(
                    "username {:?} is already taken",
                    username
                ))),
                Err(e) => Err(e.into()),
            }
        })?;
        Ok(user)
    }

    fn thread(&self, id: &ThreadId) -> Result<Option<Thread>, DmregError> {
        self.pool.with_read(|conn| {
            let thread = conn
                .query_row(
                    "SELECT id, created_at FROM threads WHERE id = ?1",
                    params![id.as_str()],
                    row_to_thread,
                )
                .optional()?;
            Ok(thread)
        })
    }

    fn all_threads(&self) -> Result<Vec<Thread>, DmregError> {
        self.pool.with_read(|conn| {
            let mut stmt = conn.prepare("SELECT id, created_at FROM threads ORDER BY id")?;
            let rows = stmt.query_map([], row_to_thread)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    fn memberships_of_user(&self, user: &UserId) -> Result<Vec<Membership>, DmregError> {
        self.pool.with_read(|conn| {
            let mut stmt =
                conn.prepare("SELECT thread_id, user_id FROM memberships WHERE user_id = ?1")?;
            let rows = stmt.query_map(params![user.as_str()], row_to_membership)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    fn membership(
        &self,
        thread: &ThreadId,
        user: &UserId,
    ) -> Result<Option<Membership>, DmregError> {
        self.pool.with_read(|conn| {
            let m = conn
                .query_row(
                    "SELECT thread_id, user_id FROM memberships
                     WHERE thread_id = ?1 AND user_id = ?2",
                    params![thread.as_str(), user.as_str()],
                    row_to_membership,
                )
                .optional()?;
            Ok(m)
        })
    }

    fn memberships_of_thread(&self, thread: &ThreadId) -> Result<Vec<Membership>, DmregError> {
        self.pool.with_read(|conn| {
            let mut stmt =
                conn.prepare("SELECT thread_id, user_id FROM memberships WHERE thread_id = ?1")?;
            let rows = stmt.query_map(params![thread.as_str()], row_to_membership)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    fn thread_for_pair(&self, pair: &PairKey) -> Result<Option<ThreadId>, DmregError> {
        self.pool.with_read(|conn| {
            let id: Option<String> = conn
                .query_row(
                    "SELECT id FROM threads WHERE user_low = ?1 AND user_high = ?2",
                    params![pair.low().as_str(), pair.high().as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id.map(ThreadId::from))
        })
    }

    fn create_pair_thread(&self, pair: &PairKey) -> Result<Thread, DmregError> {
        self.pool.with_write(|conn| {
            let thread = Thread {
                id: ThreadId::generate(),
                created_at: time::now_epoch_z(),
            };
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let inserted = tx.execute(
                "INSERT INTO threads(id, user_low, user_high, created_at) VALUES(?1, ?2, ?3, ?4)",
                params![
                    thread.id.as_str(),
                    pair.low().as_str(),
                    pair.high().as_str(),
                    thread.created_at
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(DmregError::DuplicateThread(pair.to_string()));
                }
                Err(e) => return Err(e.into()),
            }

            for user in [pair.low(), pair.high()] {
                tx.execute(
                    "INSERT INTO memberships(thread_id, user_id) VALUES(?1, ?2)",
                    params![thread.id.as_str(), user.as_str()],
                )?;
            }

            tx.commit()?;
            Ok(thread)
        })
    }
}
