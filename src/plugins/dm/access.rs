use crate::core::error::DmregError;
use crate::core::store::{ThreadId, ThreadStore, UserId};
use crate::plugins::dm::membership::MembershipIndex;

/// The only access-control checkpoint: a caller resolves a thread only if
/// they hold a membership in it. Unknown thread ids are refused the same way,
/// so the guard never reveals whether a thread exists.
pub struct AccessGuard<'a, S: ThreadStore + ?Sized> {
    index: MembershipIndex<'a, S>,
}

impl<'a, S: ThreadStore + ?Sized> AccessGuard<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            index: MembershipIndex::new(store),
        }
    }

    pub fn authorize(&self, thread: &ThreadId, caller: &UserId) -> Result<(), DmregError> {
        if self.index.is_member(thread, caller)? {
            Ok(())
        } else {
            tracing::info!(thread = %thread, caller = %caller, "denied thread access");
            Err(DmregError::NotAMember(thread.to_string()))
        }
    }
}
