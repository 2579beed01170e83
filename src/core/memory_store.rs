//! In-memory [`ThreadStore`] for tests and embedding.
//!
//! All tables sit behind one mutex. `create_pair_thread` checks the pair index
//! and applies the thread plus both memberships under a single lock
//! acquisition, which gives the same all-or-nothing, one-winner behavior as the
//! SQLite unique constraint.
//!
//! The `inject_*` methods write records without any invariant checks. They
//! exist to reproduce corrupted states (half-created threads, memberships
//! pointing at deleted users) that the registry has to report.

use crate::core::error::DmregError;
use crate::core::store::{Membership, PairKey, Thread, ThreadId, ThreadStore, User, UserId};
use crate::core::time;
use rustc_hash::FxHashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    users: FxHashMap<UserId, User>,
    usernames: FxHashMap<String, UserId>,
    threads: FxHashMap<ThreadId, Thread>,
    pairs: FxHashMap<PairKey, ThreadId>,
    memberships: Vec<Membership>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, DmregError> {
        self.tables
            .lock()
            .map_err(|_| DmregError::StoreUnavailable("memory store lock poisoned".to_string()))
    }

    /// Insert a thread row with arbitrary members, bypassing the pair index.
    pub fn inject_thread(&self, members: &[UserId]) -> Result<ThreadId, DmregError> {
        let mut t = self.lock()?;
        let thread = Thread {
            id: ThreadId::generate(),
            created_at: time::now_epoch_z(),
        };
        let id = thread.id.clone();
        t.threads.insert(id.clone(), thread);
        for user in members {
            t.memberships.push(Membership {
                thread_id: id.clone(),
                user_id: user.clone(),
            });
        }
        Ok(id)
    }

    /// Add a membership row for a thread that may or may not exist.
    pub fn inject_membership(&self, thread: &ThreadId, user: &UserId) -> Result<(), DmregError> {
        let mut t = self.lock()?;
        t.memberships.push(Membership {
            thread_id: thread.clone(),
            user_id: user.clone(),
        });
        Ok(())
    }

    /// Remove a user from the directory, leaving their memberships behind.
    pub fn inject_user_removal(&self, user: &UserId) -> Result<(), DmregError> {
        let mut t = self.lock()?;
        if let Some(removed) = t.users.remove(user) {
            t.usernames.remove(&removed.username);
        }
        Ok(())
    }

    /// Remove a thread row, leaving its memberships behind.
    pub fn inject_thread_removal(&self, thread: &ThreadId) -> Result<(), DmregError> {
        let mut t = self.lock()?;
        t.threads.remove(thread);
        t.pairs.retain(|_, id| *id != *thread);
        Ok(())
    }
}

impl ThreadStore for MemoryStore {
    fn user(&self, id: &UserId) -> Result<Option<User>, DmregError> {
        Ok(self.lock()?.users.get(id).cloned())
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, DmregError> {
        let t = self.lock()?;
        Ok(t.usernames
            .get(username)
            .and_then(|id| t.users.get(id))
            .cloned())
    }

    fn insert_user(&self, username: &str, image: Option<&str>) -> Result<User, DmregError> {
        let mut t = self.lock()?;
        if t.usernames.contains_key(username) {
            return Err(DmregError::Conflict(format!(
                "username {:?} is already taken",
                username
            )));
        }
        let user = User {
            id: UserId::generate(),
            username: username.to_string(),
            image: image.map(|s| s.to_string()),
            created_at: time::now_epoch_z(),
        };
        t.usernames.insert(user.username.clone(), user.id.clone());
        t.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn thread(&self, id: &ThreadId) -> Result<Option<Thread>, DmregError> {
        Ok(self.lock()?.threads.get(id).cloned())
    }

    fn all_threads(&self) -> Result<Vec<Thread>, DmregError> {
        let mut out: Vec<Thread> = self.lock()?.threads.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn memberships_of_user(&self, user: &UserId) -> Result<Vec<Membership>, DmregError> {
        Ok(self
            .lock()?
            .memberships
            .iter()
            .filter(|m| &m.user_id == user)
            .cloned()
            .collect())
    }

    fn membership(
        &self,
        thread: &ThreadId,
        user: &UserId,
    ) -> Result<Option<Membership>, DmregError> {
        Ok(self
            .lock()?
            .memberships
            .iter()
            .find(|m| &m.thread_id == thread && &m.user_id == user)
            .cloned())
    }

    fn memberships_of_thread(&self, thread: &ThreadId) -> Result<Vec<Membership>, DmregError> {
        Ok(self
            .lock()?
            .memberships
            .iter()
            .filter(|m| &m.thread_id == thread)
            .cloned()
            .collect())
    }

    fn thread_for_pair(&self, pair: &PairKey) -> Result<Option<ThreadId>, DmregError> {
        Ok(self.lock()?.pairs.get(pair).cloned())
    }

    fn create_pair_thread(&self, pair: &PairKey) -> Result<Thread, DmregError> {
        let mut t = self.lock()?;
        if t.pairs.contains_key(pair) {
            return Err(DmregError::DuplicateThread(pair.to_string()));
        }
        let thread = Thread {
            id: ThreadId::generate(),
            created_at: time::now_epoch_z(),
        };
        t.pairs.insert(pair.clone(), thread.id.clone());
        t.threads.insert(thread.id.clone(), thread.clone());
        for user in [pair.low(), pair.high()] {
            t.memberships.push(Membership {
                thread_id: thread.id.clone(),
                user_id: user.clone(),
            });
        }
        Ok(thread)
    }
}
