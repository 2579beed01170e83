//! Store abstraction for the registry's records.
//!
//! The registry logic never talks to SQLite directly. It talks to a
//! [`ThreadStore`], which exposes one typed method per index the registry
//! needs, plus a single transactional unit for pair creation:
//!
//! | Index | Method |
//! |---|---|
//! | username → user (unique) | [`ThreadStore::user_by_username`] |
//! | user → memberships | [`ThreadStore::memberships_of_user`] |
//! | (thread, user) → membership | [`ThreadStore::membership`] |
//! | thread → memberships | [`ThreadStore::memberships_of_thread`] |
//! | pair key → thread (unique) | [`ThreadStore::thread_for_pair`] |
//!
//! Two implementations ship: [`crate::core::sqlite_store::SqliteStore`] and
//! [`crate::core::memory_store::MemoryStore`].

use crate::core::error::DmregError;
use crate::core::time;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Fresh time-ordered id.
            pub fn generate() -> Self {
                Self(time::new_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

record_id!(
    /// Opaque identity of a user in the directory.
    UserId
);
record_id!(
    /// Opaque identity of a direct-message thread.
    ThreadId
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub image: Option<String>,
    pub created_at: String,
}

/// A thread is identity only. `created_at` is bookkeeping, not content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Membership {
    pub thread_id: ThreadId,
    pub user_id: UserId,
}

/// Canonical form of an unordered user pair: `low < high`.
///
/// `PairKey::new(a, b) == PairKey::new(b, a)`, and a pair of one user with
/// themself cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    low: UserId,
    high: UserId,
}

impl PairKey {
    pub fn new(a: &UserId, b: &UserId) -> Result<Self, DmregError> {
        if a == b {
            return Err(DmregError::InvalidTarget(format!(
                "cannot open a direct message with yourself ({a})"
            )));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self {
            low: low.clone(),
            high: high.clone(),
        })
    }

    pub fn low(&self) -> &UserId {
        &self.low
    }

    pub fn high(&self) -> &UserId {
        &self.high
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}

pub trait ThreadStore: Send + Sync {
    fn user(&self, id: &UserId) -> Result<Option<User>, DmregError>;

    fn user_by_username(&self, username: &str) -> Result<Option<User>, DmregError>;

    /// Add a user to the directory. `Conflict` if the username is taken.
    fn insert_user(&self, username: &str, image: Option<&str>) -> Result<User, DmregError>;

    fn thread(&self, id: &ThreadId) -> Result<Option<Thread>, DmregError>;

    fn all_threads(&self) -> Result<Vec<Thread>, DmregError>;

    fn memberships_of_user(&self, user: &UserId) -> Result<Vec<Membership>, DmregError>;

    fn membership(
        &self,
        thread: &ThreadId,
        user: &UserId,
    ) -> Result<Option<Membership>, DmregError>;

    fn memberships_of_thread(&self, thread: &ThreadId) -> Result<Vec<Membership>, DmregError>;

    fn thread_for_pair(&self, pair: &PairKey) -> Result<Option<ThreadId>, DmregError>;

    /// Insert a thread and both memberships as one atomic unit.
    ///
    /// Fails with `DuplicateThread` if a thread for `pair` already exists;
    /// in that case nothing was written.
    fn create_pair_thread(&self, pair: &PairKey) -> Result<Thread, DmregError>;
}

impl<T: ThreadStore + ?Sized> ThreadStore for Arc<T> {
    fn user(&self, id: &UserId) -> Result<Option<User>, DmregError> {
        (**self).user(id)
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, DmregError> {
        (**self).user_by_username(username)
    }

    fn insert_user(&self, username: &str, image: Option<&str>) -> Result<User, DmregError> {
        (**self).insert_user(username, image)
    }

    fn thread(&self, id: &ThreadId) -> Result<Option<Thread>, DmregError> {
        (**self).thread(id)
    }

    fn all_threads(&self) -> Result<Vec<Thread>, DmregError> {
        (**self).all_threads()
    }

    fn memberships_of_user(&self, user: &UserId) -> Result<Vec<Membership>, DmregError> {
        (**self).memberships_of_user(user)
    }

    fn membership(
        &self,
        thread: &ThreadId,
        user: &UserId,
    ) -> Result<Option<Membership>, DmregError> {
        (**self).membership(thread, user)
    }

    fn memberships_of_thread(&self, thread: &ThreadId) -> Result<Vec<Membership>, DmregError> {
        (**self).memberships_of_thread(thread)
    }

    fn thread_for_pair(&self, pair: &PairKey) -> Result<Option<ThreadId>, DmregError> {
        (**self).thread_for_pair(pair)
    }

    fn create_pair_thread(&self, pair: &PairKey) -> Result<Thread, DmregError> {
        (**self).create_pair_thread(pair)
    }
}
