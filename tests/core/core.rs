use dmreg::core::broker::{self, DbBroker};
use dmreg::core::config::{self, ListPolicy};
use dmreg::core::db;
use dmreg::core::error::DmregError;
use dmreg::core::schemas;
use dmreg::core::store::{PairKey, ThreadStore};
use dmreg::{STORE_DIR, init_store, open_store};
use rusqlite::params;
use std::fs;
use tempfile::tempdir;

#[test]
fn init_store_creates_config_db_and_is_rerunnable() {
    let tmp = tempdir().expect("tempdir");
    let store_root = tmp.path().join(STORE_DIR);

    let cfg = init_store(&store_root).expect("init");
    assert!(store_root.join(config::CONFIG_FILE_NAME).exists());
    let db_path = db::registry_db_path(&store_root, &cfg.db_name);
    assert!(db_path.exists());

    fs::write(
        store_root.join(config::CONFIG_FILE_NAME),
        "list_policy = \"strict\"\n",
    )
    .expect("edit config");
    let cfg = init_store(&store_root).expect("re-init keeps edited config");
    assert_eq!(cfg.list_policy, ListPolicy::Strict);

    let conn = db::db_connect(&db_path, 5).expect("connect");
    assert_eq!(
        db::schema_version(&conn).expect("version"),
        Some(schemas::REGISTRY_SCHEMA_VERSION)
    );
}

#[test]
fn open_store_sees_writes_from_other_connections() {
    let tmp = tempdir().expect("tempdir");
    let store_root = tmp.path().join(STORE_DIR);
    init_store(&store_root).expect("init");

    let (_, first) = open_store(&store_root).expect("open first");
    let (_, second) = open_store(&store_root).expect("open second");

    let a = first.insert_user("alice", None).unwrap();
    let b = first.insert_user("bob", None).unwrap();
    let thread = first
        .create_pair_thread(&PairKey::new(&a.id, &b.id).unwrap())
        .unwrap();

    let pair = PairKey::new(&b.id, &a.id).unwrap();
    assert_eq!(second.thread_for_pair(&pair).unwrap(), Some(thread.id.clone()));
    assert!(second.membership(&thread.id, &b.id).unwrap().is_some());
    assert!(matches!(
        second.create_pair_thread(&pair),
        Err(DmregError::DuplicateThread(_))
    ));
}

#[test]
fn failed_pair_insert_leaves_no_partial_rows() {
    let tmp = tempdir().expect("tempdir");
    let store_root = tmp.path().join(STORE_DIR);
    init_store(&store_root).expect("init");
    let (cfg, store) = open_store(&store_root).expect("open");

    let a = store.insert_user("alice", None).unwrap();
    let b = store.insert_user("bob", None).unwrap();
    let pair = PairKey::new(&a.id, &b.id).unwrap();
    store.create_pair_thread(&pair).unwrap();
    let _ = store.create_pair_thread(&pair);
    let _ = store.create_pair_thread(&pair);

    let conn = db::db_connect(&db::registry_db_path(&store_root, &cfg.db_name), 5).unwrap();
    let threads: i64 = conn
        .query_row("SELECT COUNT(*) FROM threads", [], |row| row.get(0))
        .unwrap();
    let memberships: i64 = conn
        .query_row("SELECT COUNT(*) FROM memberships", [], |row| row.get(0))
        .unwrap();
    assert_eq!((threads, memberships), (1, 2));

    let orphan: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM memberships m
             LEFT JOIN threads t ON t.id = m.thread_id WHERE t.id IS NULL",
            params![],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphan, 0);
}

#[test]
fn broker_audit_log_accumulates_across_instances() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();

    let first = DbBroker::new(root, schemas::REGISTRY_DB_NAME);
    first
        .audited("alice", "dm.create", || Ok::<_, DmregError>(()))
        .unwrap();
    let second = DbBroker::new(root, schemas::REGISTRY_DB_NAME);
    let _ = second.audited("carol", "dm.get", || {
        Err::<(), _>(DmregError::NotAMember("T1".into()))
    });

    let events = broker::read_events(root).expect("read events");
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.db_id == schemas::REGISTRY_DB_NAME));
    assert_eq!(events[0].op, "dm.create");
    assert_eq!(events[1].status, "error");
    assert_eq!(events[1].code.as_deref(), Some("not_a_member"));
    assert_ne!(events[0].event_id, events[1].event_id);
}
