use store::Store;

#[tokio::test]
async fn schema_version_is_tracked() {
    let store = Store::in_memory().await.expect("in-memory store should open");
    let version = store::migrations::current_version(store.pool()).await.expect("version query should succeed");
    assert!(version >= 1, "schema version should be at least 1 after initialization");
}

#[tokio::test]
async fn migration_history_is_ordered_ascending() {
    let store = Store::in_memory().await.expect("in-memory store should open");
    let history = store::migrations::history(store.pool()).await.expect("history query should succeed");

    assert!(!history.is_empty());
    for window in history.windows(2) {
        assert!(window[1].version > window[0].version, "migrations should be strictly ascending");
    }
}

#[tokio::test]
async fn migration_history_has_description_and_timestamp() {
    let store = Store::in_memory().await.expect("in-memory store should open");
    let history = store::migrations::history(store.pool()).await.expect("history query should succeed");

    for record in history {
        assert!(!record.description.is_empty());
        assert!(record.applied_at.timestamp() > 0);
    }
}

#[tokio::test]
async fn reopening_an_already_migrated_store_is_a_no_op() {
    let store = Store::open(":memory:").await.expect("open should succeed");
    let version_before = store::migrations::current_version(store.pool()).await.unwrap();

    // A second `run` against the same pool must not re-apply version 1.
    store::migrations::run(store.pool()).await.expect("re-running migrations should be idempotent");
    let version_after = store::migrations::current_version(store.pool()).await.unwrap();

    assert_eq!(version_before, version_after);
}
