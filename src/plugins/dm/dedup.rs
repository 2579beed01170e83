//! Find-or-create for the one thread a pair of users shares.
//!
//! Reads are optimistic: look for a shared thread, and if there is none ask
//! the store to create one for the canonical [`PairKey`]. The store's pair
//! uniqueness guarantees at most one concurrent create succeeds. Losers get
//! `DuplicateThread` and resolve to the winner's thread instead.

use crate::core::error::DmregError;
use crate::core::store::{PairKey, ThreadId, ThreadStore, UserId};
use crate::plugins::dm::membership::MembershipIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Existing(ThreadId),
    Created(ThreadId),
}

impl Resolution {
    pub fn thread_id(&self) -> &ThreadId {
        match self {
            Resolution::Existing(id) | Resolution::Created(id) => id,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Resolution::Created(_))
    }
}

pub struct DedupResolver<'a, S: ThreadStore + ?Sized> {
    store: &'a S,
    index: MembershipIndex<'a, S>,
    max_retries: u32,
}

impl<'a, S: ThreadStore + ?Sized> DedupResolver<'a, S> {
    pub fn new(store: &'a S, max_retries: u32) -> Self {
        Self {
            store,
            index: MembershipIndex::new(store),
            max_retries,
        }
    }

    pub fn resolve_or_create(
        &self,
        caller: &UserId,
        target_username: &str,
    ) -> Result<Resolution, DmregError> {
        let target = self
            .store
            .user_by_username(target_username)?
            .ok_or_else(|| DmregError::UserNotFound(target_username.to_string()))?;
        let pair = PairKey::new(caller, &target.id)?;

        for attempt in 0..=self.max_retries {
            if let Some(existing) = self.shared_thread(caller, &target.id)? {
                return Ok(Resolution::Existing(existing));
            }
            match self.store.create_pair_thread(&pair) {
                Ok(thread) => {
                    tracing::info!(thread = %thread.id, pair = %pair, "created direct-message thread");
                    return Ok(Resolution::Created(thread.id));
                }
                Err(DmregError::DuplicateThread(_)) => {
                    tracing::debug!(pair = %pair, attempt, "lost creation race, resolving winner");
                    if let Some(winner) = self.store.thread_for_pair(&pair)? {
                        return Ok(Resolution::Existing(winner));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let err = DmregError::IntegrityViolation(format!(
            "pair {pair} reports an existing thread that stayed invisible after {} attempts",
            self.max_retries + 1
        ));
        tracing::error!(pair = %pair, "{err}");
        Err(err)
    }

    /// Intersection of both users' thread sets. More than one element means
    /// the dedup invariant is already broken; the lowest id is returned so
    /// resolution stays stable.
    fn shared_thread(&self, a: &UserId, b: &UserId) -> Result<Option<ThreadId>, DmregError> {
        let of_a = self.index.threads_of(a)?;
        let of_b = self.index.threads_of(b)?;
        let mut shared: Vec<ThreadId> = of_a.intersection(&of_b).cloned().collect();
        if shared.len() > 1 {
            shared.sort();
            tracing::error!(
                user_a = %a,
                user_b = %b,
                threads = shared.len(),
                "multiple threads for one user pair"
            );
        }
        Ok(shared.into_iter().next())
    }
}
