use crate::core::error::DmregError;
use crate::core::store::{ThreadId, ThreadStore, User, UserId};
use crate::plugins::dm::membership::MembershipIndex;
use serde::{Deserialize, Serialize};

/// Public profile fields of the participant on the other side of a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherUser {
    pub id: UserId,
    pub username: String,
    pub profile_image: Option<String>,
}

impl From<User> for OtherUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            profile_image: user.image,
        }
    }
}

/// What a caller sees for one of their threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    pub thread_id: ThreadId,
    pub created_at: String,
    pub other_user: OtherUser,
}

pub struct ThreadViewBuilder<'a, S: ThreadStore + ?Sized> {
    store: &'a S,
    index: MembershipIndex<'a, S>,
}

impl<'a, S: ThreadStore + ?Sized> ThreadViewBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            index: MembershipIndex::new(store),
        }
    }

    /// Assemble the view of `thread` from `caller`'s side. Does not check
    /// access; callers outside `list` go through `AccessGuard` first.
    pub fn build_view(&self, thread: &ThreadId, caller: &UserId) -> Result<ThreadView, DmregError> {
        let record = self
            .store
            .thread(thread)?
            .ok_or_else(|| DmregError::ThreadNotFound(thread.to_string()))?;

        let other_id = self.index.other_member(thread, caller)?;

        let other = match self.store.user(&other_id)? {
            Some(user) => user,
            None => {
                let err = DmregError::DanglingReference(format!(
                    "thread {thread} references missing user {other_id}"
                ));
                tracing::error!(thread = %thread, user = %other_id, "{err}");
                return Err(err);
            }
        };

        Ok(ThreadView {
            thread_id: record.id,
            created_at: record.created_at,
            other_user: other.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory_store::MemoryStore;
    use crate::core::store::PairKey;

    #[test]
    fn view_shows_the_other_side() {
        let store = MemoryStore::new();
        let a = store.insert_user("alice", Some("a.png")).unwrap().id;
        let b = store.insert_user("bob", Some("b.png")).unwrap().id;
        let t = store.create_pair_thread(&PairKey::new(&a, &b).unwrap()).unwrap().id;

        let builder = ThreadViewBuilder::new(&store);
        let from_a = builder.build_view(&t, &a).unwrap();
        assert_eq!(from_a.thread_id, t);
        assert_eq!(from_a.other_user.username, "bob");
        assert_eq!(from_a.other_user.profile_image.as_deref(), Some("b.png"));
        assert_eq!(builder.build_view(&t, &b).unwrap().other_user.id, a);
    }

    #[test]
    fn view_serializes_in_wire_shape() {
        let view = ThreadView {
            thread_id: ThreadId::from("T1"),
            created_at: "1Z".to_string(),
            other_user: OtherUser {
                id: UserId::from("U2"),
                username: "bob".to_string(),
                profile_image: None,
            },
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["threadId"], "T1");
        assert_eq!(json["otherUser"]["id"], "U2");
        assert_eq!(json["otherUser"]["username"], "bob");
        assert!(json["otherUser"]["profileImage"].is_null());
    }

    #[test]
    fn missing_thread_and_missing_user_are_distinct_errors() {
        let store = MemoryStore::new();
        let a = store.insert_user("alice", None).unwrap().id;
        let b = store.insert_user("bob", None).unwrap().id;
        let t = store.create_pair_thread(&PairKey::new(&a, &b).unwrap()).unwrap().id;
        let builder = ThreadViewBuilder::new(&store);

        assert!(matches!(
            builder.build_view(&ThreadId::from("nope"), &a),
            Err(DmregError::ThreadNotFound(_))
        ));

        store.inject_user_removal(&b).unwrap();
        assert!(matches!(
            builder.build_view(&t, &a),
            Err(DmregError::DanglingReference(_))
        ));
    }
}
