//! Save store backends.

use labsim_core::{
    engine::SimEngine,
    store::{MemorySaveStore, SaveStore, SqliteSaveStore},
    types::DATA,
};

fn exercise(store: &mut dyn SaveStore) {
    assert_eq!(store.get("slot").unwrap(), None);
    store.set("slot", "first").unwrap();
    assert_eq!(store.get("slot").unwrap().as_deref(), Some("first"));
    store.set("slot", "second").unwrap();
    assert_eq!(store.get("slot").unwrap().as_deref(), Some("second"));
    store.remove("slot").unwrap();
    assert_eq!(store.get("slot").unwrap(), None);
    store.remove("slot").unwrap();
}

/// get / set / overwrite / remove on sqlite.
#[test]
fn sqlite_store_basics() {
    let mut store = SqliteSaveStore::in_memory().expect("in-memory store");
    exercise(&mut store);
    store.set("b", "2").unwrap();
    store.set("a", "1").unwrap();
    assert_eq!(store.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
}

/// Migrations can run more than once.
#[test]
fn sqlite_migrate_is_idempotent() {
    let store = SqliteSaveStore::in_memory().expect("in-memory store");
    store.migrate().expect("second migration");
}

/// Same contract for the in-memory store.
#[test]
fn memory_store_basics() {
    let mut store = MemorySaveStore::new();
    exercise(&mut store);
    assert!(store.is_empty());
}

/// A full engine save survives a round trip through sqlite.
#[test]
fn engine_save_through_sqlite() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut store = SqliteSaveStore::in_memory().expect("in-memory store");
    let mut source = SimEngine::build_test().unwrap();
    for _ in 0..6 {
        source.click().unwrap();
    }
    source.save(&mut store).unwrap();
    assert_eq!(store.keys().unwrap(), vec![source.config().save_key.clone()]);

    let mut target = SimEngine::build_test().unwrap();
    assert!(target.load(&store).unwrap());
    assert_eq!(target.ledger().amount(DATA), source.ledger().amount(DATA));
    assert_eq!(target.combo().total_clicks(), 6);
    assert_eq!(target.run_id(), source.run_id());
}
