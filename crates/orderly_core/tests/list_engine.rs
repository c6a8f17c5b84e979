use orderly_core::db::{open_db, open_db_in_memory};
use orderly_core::{
    CommittedId, EditOutcome, EngineError, ItemId, ListEngine, OrderRepository,
    RecordRepository, SqliteOrderRepository, SqliteRecordRepository,
};
use rusqlite::Connection;
use std::collections::BTreeSet;

type SqliteEngine<'conn> = ListEngine<SqliteRecordRepository<'conn>, SqliteOrderRepository<'conn>>;

fn engine(conn: &Connection) -> SqliteEngine<'_> {
    ListEngine::new(
        SqliteRecordRepository::try_new(conn).unwrap(),
        SqliteOrderRepository::try_new(conn).unwrap(),
    )
    .unwrap()
}

fn committed(id: ItemId) -> CommittedId {
    id.committed().expect("created items have committed ids")
}

fn assert_invariant(engine: &SqliteEngine<'_>) {
    let ordered: BTreeSet<CommittedId> = engine
        .orders()
        .get()
        .unwrap()
        .unwrap_or_default()
        .into_iter()
        .collect();
    let recorded: BTreeSet<CommittedId> = engine
        .records()
        .list_ids()
        .unwrap()
        .into_iter()
        .filter_map(ItemId::committed)
        .collect();
    assert_eq!(ordered, recorded);
    assert!(engine.check_consistency().unwrap().is_consistent());
}

#[test]
fn milk_eggs_bread_scenario() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);

    let milk = committed(engine.create_item("Milk").unwrap().id);
    let eggs = committed(engine.create_item("Eggs").unwrap().id);
    let bread = committed(engine.create_item("Bread").unwrap().id);
    assert_eq!(engine.load().unwrap().texts(), vec!["Milk", "Eggs", "Bread"]);

    engine.reorder(&[bread, milk, eggs]).unwrap();
    assert_eq!(engine.load().unwrap().texts(), vec!["Bread", "Milk", "Eggs"]);

    engine
        .delete_item(ItemId::Committed(milk), &[bread, eggs])
        .unwrap();
    let snapshot = engine.load().unwrap();
    assert_eq!(snapshot.texts(), vec!["Bread", "Eggs"]);
    assert_eq!(snapshot.ids(), vec![bread, eggs]);
    assert_invariant(&engine);
}

#[test]
fn created_text_appears_exactly_once_and_draft_is_cleared() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);

    for text in ["", "a", "exactly twenty-five chars", "ünïcödé ok"] {
        engine.edit_item(ItemId::Draft, text).unwrap();
        engine.create_item(text).unwrap();

        let snapshot = engine.load().unwrap();
        let matches = snapshot
            .items
            .iter()
            .filter(|record| record.text == text)
            .count();
        assert_eq!(matches, 1, "text {text:?}");
        assert_eq!(snapshot.draft, "");
    }
    assert_invariant(&engine);
}

#[test]
fn too_long_text_mutates_neither_store() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let existing = engine.create_item("Existing").unwrap();
    engine.edit_item(ItemId::Draft, "half typed").unwrap();
    let before = engine.load().unwrap();
    let order_before = engine.orders().get().unwrap();

    let long = "z".repeat(26);
    assert!(matches!(
        engine.create_item(&long),
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine.edit_item(existing.id, &long),
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine.edit_item(ItemId::Draft, &long),
        Err(EngineError::Validation(_))
    ));

    assert_eq!(engine.load().unwrap(), before);
    assert_eq!(engine.orders().get().unwrap(), order_before);
}

#[test]
fn reorder_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let a = committed(engine.create_item("A").unwrap().id);
    let b = committed(engine.create_item("B").unwrap().id);

    engine.reorder(&[b, a]).unwrap();
    let once = engine.orders().get().unwrap();
    engine.reorder(&[b, a]).unwrap();

    assert_eq!(engine.orders().get().unwrap(), once);
    assert_eq!(once, Some(vec![b, a]));
}

#[test]
fn invariant_holds_across_mixed_structural_operations() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let mut visual: Vec<CommittedId> = Vec::new();

    for round in 0..12 {
        let id = committed(engine.create_item(format!("item {round}").as_str()).unwrap().id);
        visual.push(id);
        assert_invariant(&engine);

        if round % 3 == 2 {
            visual.rotate_left(1);
            engine.reorder(&visual).unwrap();
            assert_invariant(&engine);
        }
        if round % 4 == 3 {
            let removed = visual.remove(1);
            engine
                .delete_item(ItemId::Committed(removed), &visual)
                .unwrap();
            assert_invariant(&engine);
        }
    }

    assert_eq!(engine.load().unwrap().ids(), visual);
}

#[test]
fn deleted_item_is_gone_from_both_stores() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let keep = committed(engine.create_item("Keep").unwrap().id);
    let gone = engine.create_item("Gone").unwrap();

    engine.delete_item(gone.id, &[keep]).unwrap();

    assert_eq!(engine.records().get(gone.id).unwrap(), None);
    assert_eq!(engine.orders().get().unwrap(), Some(vec![keep]));
    assert!(engine.load().unwrap().items.iter().all(|r| r.id != gone.id));
}

#[test]
fn deleting_an_absent_item_is_not_an_error() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let keep = committed(engine.create_item("Keep").unwrap().id);

    engine
        .delete_item(ItemId::Committed(CommittedId::new(1).unwrap()), &[keep])
        .unwrap();
    engine.delete_item(ItemId::Draft, &[keep]).unwrap();

    assert_eq!(engine.load().unwrap().texts(), vec!["Keep"]);
}

#[test]
fn clear_all_empties_list_and_draft() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    engine.create_item("One").unwrap();
    engine.create_item("Two").unwrap();
    engine.edit_item(ItemId::Draft, "Three").unwrap();

    engine.clear_all().unwrap();

    let snapshot = engine.load().unwrap();
    assert!(snapshot.items.is_empty());
    assert_eq!(snapshot.draft, "");
    assert_eq!(engine.orders().get().unwrap(), None);
}

#[test]
fn edit_to_vanished_item_does_not_resurrect_it() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let item = engine.create_item("Short lived").unwrap();
    engine.delete_item(item.id, &[]).unwrap();

    assert_eq!(
        engine.edit_item(item.id, "late keystroke").unwrap(),
        EditOutcome::Skipped
    );
    assert!(engine.load().unwrap().items.is_empty());
    assert_invariant(&engine);
}

#[test]
fn list_and_draft_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orderly.db");

    let (first, second) = {
        let conn = open_db(&path).unwrap();
        let mut engine = engine(&conn);
        let first = committed(engine.create_item("First").unwrap().id);
        let second = committed(engine.create_item("Second").unwrap().id);
        engine.reorder(&[second, first]).unwrap();
        engine.edit_item(ItemId::Draft, "unsaved").unwrap();
        (first, second)
    };

    let conn = open_db(&path).unwrap();
    let mut engine = engine(&conn);
    let snapshot = engine.load().unwrap();
    assert_eq!(snapshot.ids(), vec![second, first]);
    assert_eq!(snapshot.draft, "unsaved");

    let third = committed(engine.create_item("Third").unwrap().id);
    assert!(third > first && third > second);
}

#[test]
fn engine_starts_over_unreadable_rows_and_clear_all_recovers() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO records (id, text) VALUES ('inputAreaItemId', 'legacy draft');
         INSERT INTO records (id, text) VALUES ('42', 'Stored');
         INSERT INTO item_order (id, sorted_list) VALUES ('sortedList', 'not json');",
    )
    .unwrap();
    let mut engine = engine(&conn);

    assert!(matches!(engine.load(), Err(EngineError::Storage(_))));

    engine.clear_all().unwrap();
    let created = committed(engine.create_item("Fresh").unwrap().id);
    assert!(created.get() > 42);
    assert_eq!(engine.load().unwrap().texts(), vec!["Fresh"]);
    assert_invariant(&engine);
}

#[test]
fn repair_rebuilds_an_undecodable_order_from_records() {
    let conn = open_db_in_memory().unwrap();
    let mut engine = engine(&conn);
    let first = committed(engine.create_item("First").unwrap().id);
    let second = committed(engine.create_item("Second").unwrap().id);
    conn.execute(
        "UPDATE item_order SET sorted_list = '[1, \"draft\"]' WHERE id = 'sortedList';",
        [],
    )
    .unwrap();
    assert!(engine.check_consistency().is_err());

    let report = engine.repair().unwrap();

    assert_eq!(report.orphan_ids, vec![first, second]);
    assert_eq!(engine.load().unwrap().texts(), vec!["First", "Second"]);
    assert_invariant(&engine);
}
