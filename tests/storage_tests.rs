/// Storage facade tests against the reference in-memory engine.

mod common;

use autocrud::{
    CrudError, DbStorage, Durability, FilterClause, FilterOp, ListQuery, MemoryDb, SortClause,
    Storage, Value,
};
use common::{named, widget_model};

fn storage(db: &MemoryDb) -> DbStorage {
    DbStorage::with_session(widget_model(), db.shared_session())
}

fn seed(storage: &DbStorage, names: &[&str]) {
    for name in names {
        storage
            .create(named(name), Durability::default())
            .unwrap();
    }
}

#[test]
fn test_get_missing_key_fails_not_found() {
    let db = MemoryDb::new();
    let storage = storage(&db);

    let err = storage.get(&Value::Integer(99)).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Widget with ID 99 does not exist");
}

#[test]
fn test_update_missing_key_fails_not_found() {
    let db = MemoryDb::new();
    let storage = storage(&db);

    let err = storage
        .update(&Value::Integer(99), named("x"), Durability::default())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_delete_missing_key_fails_not_found() {
    let db = MemoryDb::new();
    let storage = storage(&db);

    let err = storage
        .delete(&Value::Integer(99), Durability::default())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_create_commits_by_default() {
    let db = MemoryDb::new();
    let storage = storage(&db);

    let record = storage.create(named("a"), Durability::default()).unwrap();
    assert_eq!(record.get("id"), Some(&Value::Integer(1)));
    assert_eq!(db.row_count("widget").unwrap(), 1);
}

#[test]
fn test_flush_only_stays_inside_the_session() {
    let db = MemoryDb::new();
    let storage = storage(&db);

    let record = storage.create(named("a"), Durability::flush_only()).unwrap();
    assert_eq!(record.get("id"), Some(&Value::Integer(1)));

    // visible through this session's storage, not committed
    assert!(storage.get(&Value::Integer(1)).is_ok());
    assert_eq!(db.row_count("widget").unwrap(), 0);
}

#[test]
fn test_deferred_mutation_stays_pending() {
    let db = MemoryDb::new();
    let storage = storage(&db);

    let record = storage.create(named("a"), Durability::deferred()).unwrap();
    // no flush, no generated key yet
    assert!(record.get("id").is_none());
    assert!(storage.get(&Value::Integer(1)).is_err());
    assert_eq!(db.row_count("widget").unwrap(), 0);
}

#[test]
fn test_update_applies_assignments() {
    let db = MemoryDb::new();
    let storage = storage(&db);
    seed(&storage, &["a"]);

    let updated = storage
        .update(&Value::Integer(1), named("b"), Durability::default())
        .unwrap();
    assert_eq!(updated.get("name"), Some(&Value::Text("b".into())));
    assert_eq!(
        db.rows("widget").unwrap()[0].get("name"),
        Some(&Value::Text("b".into()))
    );
}

#[test]
fn test_delete_removes_the_record() {
    let db = MemoryDb::new();
    let storage = storage(&db);
    seed(&storage, &["a"]);

    storage
        .delete(&Value::Integer(1), Durability::default())
        .unwrap();
    assert!(storage.get(&Value::Integer(1)).unwrap_err().is_not_found());
    assert_eq!(db.row_count("widget").unwrap(), 0);
}

#[test]
fn test_list_windows_the_filtered_sorted_set() {
    let db = MemoryDb::new();
    let storage = storage(&db);
    seed(&storage, &["delta", "alpha", "echo", "bravo", "charlie"]);

    let ordered = ListQuery::new().with_order_by(vec![SortClause::asc("name")]);
    let full = storage.list(&ordered).unwrap();

    let window = storage
        .list(&ordered.clone().with_offset(1).with_limit(2))
        .unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(window[..], full[1..3]);
}

#[test]
fn test_offset_and_limit_apply_independently() {
    let db = MemoryDb::new();
    let storage = storage(&db);
    seed(&storage, &["a", "b", "c"]);

    let ordered = ListQuery::new().with_order_by(vec![SortClause::asc("id")]);
    assert_eq!(
        storage.list(&ordered.clone().with_offset(2)).unwrap().len(),
        1
    );
    assert_eq!(
        storage.list(&ordered.clone().with_limit(2)).unwrap().len(),
        2
    );
}

#[test]
fn test_count_matches_list_length() {
    let db = MemoryDb::new();
    let storage = storage(&db);
    seed(&storage, &["anvil", "anchor", "bolt"]);

    let filters = vec![FilterClause::new("name", FilterOp::Like, "an%")];
    let listed = storage
        .list(&ListQuery::new().with_filters(filters.clone()))
        .unwrap();
    let counted = storage.count(Some(&filters)).unwrap();
    assert_eq!(counted, listed.len() as u64);
    assert_eq!(counted, 2);

    // pagination never affects count
    assert_eq!(storage.count(None).unwrap(), 3);
}

#[test]
fn test_filters_apply_before_pagination() {
    let db = MemoryDb::new();
    let storage = storage(&db);
    seed(&storage, &["anvil", "bolt", "anchor", "axe"]);

    let query = ListQuery::new()
        .with_filters(vec![FilterClause::new("name", FilterOp::Like, "a%")])
        .with_order_by(vec![SortClause::asc("name")])
        .with_offset(1)
        .with_limit(2);
    let rows = storage.list(&query).unwrap();
    let names: Vec<_> = rows
        .iter()
        .map(|r| r.get("name").unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["anvil", "axe"]);
}

#[test]
fn test_detached_storage_is_unusable() {
    let storage = DbStorage::new(widget_model());
    let err = storage.get(&Value::Integer(1)).unwrap_err();
    assert!(matches!(err, CrudError::SessionDetached(_)));
}
