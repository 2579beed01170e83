use dmreg::core::error::DmregError;
use dmreg::core::memory_store::MemoryStore;
use dmreg::core::sqlite_store::SqliteStore;
use dmreg::core::store::{ThreadId, ThreadStore};
use dmreg::plugins::dm::ThreadRegistry;
use dmreg::plugins::dm::auth::{DirectoryAuth, Request};
use dmreg::plugins::dm::integrity::audit_integrity;
use dmreg::plugins::users::register_user;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

type Registry<S> = ThreadRegistry<Arc<S>, DirectoryAuth<Arc<S>>>;

fn seed<S: ThreadStore>(store: &S) {
    for name in ["alice", "bob", "carol"] {
        let image = format!("https://img.example/{name}.png");
        register_user(store, name, Some(image.as_str())).expect("seed user");
    }
}

fn memory_registry() -> Registry<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    seed(store.as_ref());
    ThreadRegistry::new(Arc::clone(&store), DirectoryAuth::new(store))
}

fn sqlite_registry() -> (TempDir, Registry<SqliteStore>) {
    let tmp = TempDir::new().expect("tempdir");
    let store = Arc::new(SqliteStore::open(&tmp.path().join("dmreg.db"), 5).expect("open sqlite"));
    seed(store.as_ref());
    (tmp, ThreadRegistry::new(Arc::clone(&store), DirectoryAuth::new(store)))
}

fn req(name: &str) -> Request {
    Request::as_user(name)
}

macro_rules! on_both_stores {
    ($name:ident) => {
        mod $name {
            #[test]
            fn memory() {
                super::$name(&super::memory_registry());
            }

            #[test]
            fn sqlite() {
                let (_tmp, reg) = super::sqlite_registry();
                super::$name(&reg);
            }
        }
    };
}

fn creation_is_idempotent<S: ThreadStore>(reg: &Registry<S>) {
    let first = reg.create_or_get_thread(&req("alice"), "bob").unwrap();
    let second = reg.create_or_get_thread(&req("alice"), "bob").unwrap();
    assert_eq!(first.thread_id, second.thread_id);
    assert_eq!(reg.store().all_threads().unwrap().len(), 1);
}
on_both_stores!(creation_is_idempotent);

fn creation_is_symmetric<S: ThreadStore>(reg: &Registry<S>) {
    let ab = reg.create_or_get_thread(&req("alice"), "bob").unwrap();
    let ba = reg.create_or_get_thread(&req("bob"), "alice").unwrap();
    assert_eq!(ab.thread_id, ba.thread_id);
    assert_eq!(ab.other_user.username, "bob");
    assert_eq!(ba.other_user.username, "alice");
}
on_both_stores!(creation_is_symmetric);

fn every_thread_has_two_distinct_members<S: ThreadStore>(reg: &Registry<S>) {
    reg.create_or_get_thread(&req("alice"), "bob").unwrap();
    reg.create_or_get_thread(&req("alice"), "carol").unwrap();
    reg.create_or_get_thread(&req("carol"), "bob").unwrap();
    reg.create_or_get_thread(&req("bob"), "carol").unwrap();

    let threads = reg.store().all_threads().unwrap();
    assert_eq!(threads.len(), 3);
    for t in threads {
        let members = reg.store().memberships_of_thread(&t.id).unwrap();
        assert_eq!(members.len(), 2, "thread {}", t.id);
        assert_ne!(members[0].user_id, members[1].user_id);
    }
    assert!(audit_integrity(reg.store()).unwrap().is_clean());
}
on_both_stores!(every_thread_has_two_distinct_members);

fn outsiders_cannot_get_a_thread<S: ThreadStore>(reg: &Registry<S>) {
    let view = reg.create_or_get_thread(&req("alice"), "bob").unwrap();

    let err = reg.get_thread(&req("carol"), &view.thread_id).unwrap_err();
    assert!(matches!(err, DmregError::NotAMember(_)), "{err:?}");

    let as_bob = reg.get_thread(&req("bob"), &view.thread_id).unwrap();
    assert_eq!(as_bob.other_user.username, "alice");
}
on_both_stores!(outsiders_cannot_get_a_thread);

fn list_is_complete_per_user<S: ThreadStore>(reg: &Registry<S>) {
    let ab = reg.create_or_get_thread(&req("alice"), "bob").unwrap();
    let ac = reg.create_or_get_thread(&req("alice"), "carol").unwrap();

    let for_alice: HashSet<ThreadId> = reg
        .list_threads(&req("alice"))
        .unwrap()
        .into_iter()
        .map(|v| v.thread_id)
        .collect();
    assert_eq!(for_alice, HashSet::from([ab.thread_id.clone(), ac.thread_id]));

    let for_bob = reg.list_threads(&req("bob")).unwrap();
    assert_eq!(for_bob.len(), 1);
    assert_eq!(for_bob[0].thread_id, ab.thread_id);
    assert_eq!(for_bob[0].other_user.username, "alice");
}
on_both_stores!(list_is_complete_per_user);

fn self_messaging_is_rejected<S: ThreadStore>(reg: &Registry<S>) {
    let err = reg.create_or_get_thread(&req("alice"), "alice").unwrap_err();
    assert!(matches!(err, DmregError::InvalidTarget(_)), "{err:?}");
    assert!(reg.store().all_threads().unwrap().is_empty());
}
on_both_stores!(self_messaging_is_rejected);

fn unknown_target_is_user_not_found<S: ThreadStore>(reg: &Registry<S>) {
    let err = reg.create_or_get_thread(&req("alice"), "dave").unwrap_err();
    assert!(matches!(err, DmregError::UserNotFound(_)), "{err:?}");
}
on_both_stores!(unknown_target_is_user_not_found);

fn every_entry_point_requires_a_session<S: ThreadStore>(reg: &Registry<S>) {
    let view = reg.create_or_get_thread(&req("alice"), "bob").unwrap();
    let anon = Request::anonymous();

    assert!(matches!(
        reg.list_threads(&anon),
        Err(DmregError::Unauthenticated(_))
    ));
    assert!(matches!(
        reg.get_thread(&anon, &view.thread_id),
        Err(DmregError::Unauthenticated(_))
    ));
    assert!(matches!(
        reg.create_or_get_thread(&req("mallory"), "bob"),
        Err(DmregError::Unauthenticated(_))
    ));
}
on_both_stores!(every_entry_point_requires_a_session);

fn alice_and_bob_scenario<S: ThreadStore>(reg: &Registry<S>) {
    let created = reg.create_or_get_thread(&req("alice"), "bob").unwrap();
    assert_eq!(created.other_user.username, "bob");
    assert_eq!(
        created.other_user.profile_image.as_deref(),
        Some("https://img.example/bob.png")
    );
    let t1 = created.thread_id;

    let bob_list = reg.list_threads(&req("bob")).unwrap();
    assert_eq!(bob_list.len(), 1);
    assert_eq!(bob_list[0].thread_id, t1);
    assert_eq!(bob_list[0].other_user.username, "alice");

    let again = reg.create_or_get_thread(&req("alice"), "bob").unwrap();
    assert_eq!(again.thread_id, t1);
}
on_both_stores!(alice_and_bob_scenario);

#[test]
fn dangling_member_surfaces_on_get_and_is_skipped_in_list() {
    let reg = memory_registry();
    let alice = reg.store().user_by_username("alice").unwrap().unwrap();
    let bob = reg.store().user_by_username("bob").unwrap().unwrap();
    let ab = reg.create_or_get_thread(&req("alice"), "bob").unwrap();
    let ac = reg.create_or_get_thread(&req("alice"), "carol").unwrap();

    reg.store().inject_user_removal(&bob.id).unwrap();

    let err = reg.get_for(&ab.thread_id, &alice.id).unwrap_err();
    assert!(matches!(err, DmregError::DanglingReference(_)), "{err:?}");

    let listed = reg.list_for(&alice.id).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].thread_id, ac.thread_id);
}

#[test]
fn membership_without_thread_row_is_thread_not_found() {
    let reg = memory_registry();
    let alice = reg.store().user_by_username("alice").unwrap().unwrap();
    let ab = reg.create_or_get_thread(&req("alice"), "bob").unwrap();
    reg.store().inject_thread_removal(&ab.thread_id).unwrap();

    let err = reg.get_for(&ab.thread_id, &alice.id).unwrap_err();
    assert!(matches!(err, DmregError::ThreadNotFound(_)), "{err:?}");
    assert!(reg.list_for(&alice.id).unwrap().is_empty());
}

#[test]
fn list_is_newest_first_and_stable() {
    let reg = memory_registry();
    reg.create_or_get_thread(&req("alice"), "bob").unwrap();
    reg.create_or_get_thread(&req("alice"), "carol").unwrap();

    let first = reg.list_threads(&req("alice")).unwrap();
    let second = reg.list_threads(&req("alice")).unwrap();
    assert_eq!(first, second);
    assert!(first[0].created_at >= first[1].created_at);
}
