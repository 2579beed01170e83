use dmreg::core::error::DmregError;
use dmreg::core::memory_store::MemoryStore;
use dmreg::core::sqlite_store::SqliteStore;
use dmreg::plugins::dm::auth::{DirectoryAuth, Request};
use dmreg::plugins::users::{lookup, register_user, whoami};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_user_lifecycle_on_sqlite() {
    let tmp = tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(&tmp.path().join("dmreg.db"), 5).unwrap());

    // 1. Register
    let alice = register_user(store.as_ref(), "alice", Some("https://img.example/a.png")).unwrap();
    assert!(ulid::Ulid::from_string(alice.id.as_str()).is_ok());

    // 2. Lookup exposes public profile fields only
    let profile = lookup(store.as_ref(), "alice").unwrap();
    assert_eq!(profile.id, alice.id);
    assert_eq!(
        profile.profile_image.as_deref(),
        Some("https://img.example/a.png")
    );

    // 3. Whoami resolves through the auth gate
    let auth = DirectoryAuth::new(Arc::clone(&store));
    let me = whoami(&auth, &Request::as_user("alice")).unwrap();
    assert_eq!(me, alice);
}

#[test]
fn test_duplicate_and_invalid_usernames() {
    let store = MemoryStore::new();
    register_user(&store, "alice", None).unwrap();

    assert!(matches!(
        register_user(&store, "alice", None),
        Err(DmregError::Conflict(_))
    ));
    assert!(matches!(
        register_user(&store, "no spaces", None),
        Err(DmregError::ValidationError(_))
    ));
}

#[test]
fn test_lookup_and_whoami_failures() {
    let store = Arc::new(MemoryStore::new());
    assert!(matches!(
        lookup(store.as_ref(), "ghost"),
        Err(DmregError::UserNotFound(_))
    ));

    let auth = DirectoryAuth::new(Arc::clone(&store));
    assert!(matches!(
        whoami(&auth, &Request::anonymous()),
        Err(DmregError::Unauthenticated(_))
    ));
}
