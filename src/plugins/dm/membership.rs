use crate::core::error::DmregError;
use crate::core::store::{ThreadId, ThreadStore, UserId};
use rustc_hash::FxHashSet;

/// Read-side view over membership records.
pub struct MembershipIndex<'a, S: ThreadStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ThreadStore + ?Sized> MembershipIndex<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Every thread `user` belongs to, as a point-in-time snapshot.
    pub fn threads_of(&self, user: &UserId) -> Result<FxHashSet<ThreadId>, DmregError> {
        Ok(self
            .store
            .memberships_of_user(user)?
            .into_iter()
            .map(|m| m.thread_id)
            .collect())
    }

    pub fn is_member(&self, thread: &ThreadId, user: &UserId) -> Result<bool, DmregError> {
        Ok(self.store.membership(thread, user)?.is_some())
    }

    /// The single participant of `thread` who is not `user`.
    ///
    /// Two-party threads only: anything other than exactly one other member
    /// is reported as `IntegrityViolation`.
    pub fn other_member(&self, thread: &ThreadId, user: &UserId) -> Result<UserId, DmregError> {
        let mut others: Vec<UserId> = self
            .store
            .memberships_of_thread(thread)?
            .into_iter()
            .map(|m| m.user_id)
            .filter(|u| u != user)
            .collect();

        if others.len() == 1 {
            return Ok(others.remove(0));
        }
        let err = DmregError::IntegrityViolation(format!(
            "thread {thread} has {} members other than {user}, expected exactly 1",
            others.len()
        ));
        tracing::error!(thread = %thread, user = %user, others = others.len(), "{err}");
        Err(err)
    }
}
