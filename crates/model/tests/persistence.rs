//! Integration tests for persistence and hydration.
//!
//! A model is saved through a store, reopened, and checked for the same
//! tables, classes and derivations. Caches are never persisted, so the
//! reopened model rebuilds its items lazily.

use futures::executor::block_on;
use reshape_model::{
    Class, ClassType, Error, FunctionRef, Model, ModelConfig, ModelEvent, Row, TableKind, Value,
};
use reshape_storage::{JournalEntry, JsonFileStore, JsonParser, MemoryStore, Store};
use std::cell::Cell;
use std::rc::Rc;
use tempfile::TempDir;

fn group_rows(values: &[i64]) -> Vec<Row> {
    values.iter().map(|g| Row::with("g", *g)).collect()
}

/// Builds a small model: a static node class, an aggregated node class over
/// it, and the edge class joining them.
fn populate(model: &Model) -> (u64, u64) {
    let people = model
        .add_static_table("people", group_rows(&[1, 1, 2]))
        .unwrap()
        .interpret_as_nodes()
        .unwrap();
    let groups = people.aggregate("g").unwrap().into_node().unwrap();
    groups.set_class_name(Some("groups".into())).unwrap();
    let groups_table = groups.table().unwrap();
    groups_table
        .reduce_attribute("size", FunctionRef::new("count"))
        .unwrap();
    people
        .table()
        .unwrap()
        .derive_attribute("label", FunctionRef::new("constant").with_param("p"))
        .unwrap();
    people.connect_to_node_class(&groups, Some("g"), None).unwrap();
    (people.class_id(), groups_table.id())
}

#[test]
fn test_snapshot_roundtrip_through_memory_store() {
    let model = Model::new(ModelConfig::new("saved"));
    let (people_id, groups_table_id) = populate(&model);
    let snapshot = model.snapshot();
    assert_eq!(snapshot.name, "saved");

    let reopened = Model::open(
        ModelConfig::new("saved"),
        Box::new(MemoryStore::with_snapshot(snapshot.clone())),
    )
    .unwrap();
    assert_eq!(reopened.table_count(), model.table_count());
    assert_eq!(reopened.class_count(), model.class_count());
    assert_eq!(reopened.snapshot(), snapshot);

    let people = reopened.class(people_id).unwrap().into_node().unwrap();
    assert_eq!(people.edge_class_ids().unwrap().len(), 1);
    assert!(reopened.find_class("groups").unwrap().is_some());

    let groups_table = reopened.table(groups_table_id).unwrap();
    assert!(matches!(
        groups_table.kind(),
        TableKind::Aggregated { attribute } if attribute == "g"
    ));
    let cache = block_on(groups_table.build_cache()).unwrap();
    assert_eq!(cache.len(), 2);
    assert_eq!(cache[0].get("size"), Value::Int64(2));

    let people_items = block_on(people.table().unwrap().build_cache()).unwrap();
    assert_eq!(people_items[0].get("label"), Value::from("p"));
}

#[test]
fn test_id_allocation_resumes_after_hydrate() {
    let model = Model::new(ModelConfig::new("ids"));
    populate(&model);
    let max_table = model.tables().iter().map(|t| t.id()).max().unwrap();
    let max_class = model.classes().iter().map(|c| c.class_id()).max().unwrap();

    let reopened = Model::open(
        ModelConfig::new("ids"),
        Box::new(MemoryStore::with_snapshot(model.snapshot())),
    )
    .unwrap();
    let class = reopened.add_static_table("later", vec![]).unwrap();
    assert!(class.table_id().unwrap() > max_table);
    assert!(class.class_id() > max_class);
}

#[test]
fn test_json_file_store_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.json");

    let model = Model::with_store(
        ModelConfig::new("on-disk"),
        Box::new(JsonFileStore::new(&path)),
    );
    let (people_id, _) = populate(&model);
    model.save().unwrap();
    assert!(path.exists());

    let reopened = Model::open(
        ModelConfig::new("on-disk"),
        Box::new(JsonFileStore::new(&path)),
    )
    .unwrap();
    assert_eq!(reopened.snapshot(), model.snapshot());
    assert_eq!(
        reopened.class(people_id).unwrap().class_type().unwrap(),
        ClassType::Node
    );
}

#[test]
fn test_open_without_saved_snapshot_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::new(dir.path().join("missing.json"));
    let model = Model::open(ModelConfig::new("fresh"), Box::new(store)).unwrap();
    assert_eq!(model.table_count(), 0);
    assert_eq!(model.class_count(), 0);
}

#[test]
fn test_corrupt_file_is_a_persistence_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.json");
    std::fs::write(&path, "{ not json").unwrap();
    let result = Model::open(ModelConfig::new("broken"), Box::new(JsonFileStore::new(&path)));
    assert!(matches!(result, Err(Error::Persistence { .. })));
}

#[test]
fn test_autosave_writes_after_changes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("auto.json");
    let model = Model::with_store(
        ModelConfig::new("auto").with_autosave(true),
        Box::new(JsonFileStore::new(&path)),
    );
    model.add_static_table("people", group_rows(&[1])).unwrap();

    let saved = JsonFileStore::new(&path).load().unwrap().unwrap();
    assert_eq!(saved.tables.len(), 1);
    assert_eq!(saved.classes.len(), 1);
}

#[test]
fn test_model_update_events() {
    let model = Model::new(ModelConfig::new("events"));
    let updates = Rc::new(Cell::new(0));
    let counter = updates.clone();
    let id = model.subscribe(move |event| {
        if *event == ModelEvent::Update {
            counter.set(counter.get() + 1);
        }
    });

    let class = model.add_static_table("people", vec![]).unwrap();
    let after_add = updates.get();
    assert!(after_add >= 2);
    class.annotate("k", Value::from(1)).unwrap();
    assert_eq!(updates.get(), after_add + 1);

    assert!(model.unsubscribe(id));
    class.delete_annotation("k").unwrap();
    assert_eq!(updates.get(), after_add + 1);
}

#[test]
fn test_journal_records_structure() {
    let model = Model::new(ModelConfig::new("journal").with_event_log(true));
    let class = model.add_static_table("people", group_rows(&[1])).unwrap();
    let table_id = class.table_id().unwrap();
    class.interpret_as_nodes().unwrap();

    let journal = model.journal();
    assert!(journal.contains(&JournalEntry::TableCreated {
        table_id,
        type_name: "StaticTable",
    }));
    assert!(journal.contains(&JournalEntry::ClassCreated {
        class_id: class.class_id(),
        table_id,
        type_name: "GenericClass",
    }));
    assert!(journal.contains(&JournalEntry::ClassReinterpreted {
        class_id: class.class_id(),
        type_name: "NodeClass",
    }));
    assert!(journal.contains(&JournalEntry::TableReset { table_id }));

    let quiet = Model::new(ModelConfig::new("quiet"));
    quiet.add_static_table("people", vec![]).unwrap();
    assert!(quiet.journal().is_empty());
}

#[test]
fn test_add_text_parses_json() {
    let model = Model::new(ModelConfig::new("text"));
    let class = model
        .add_text("people", r#"[{"g": 1}, {"g": 2}]"#, "json", &JsonParser)
        .unwrap();
    let table = class.table().unwrap();
    assert_eq!(block_on(table.count_rows()).unwrap(), 2);

    let keyed = model
        .add_text("lookup", r#"{"a": {"v": 1}}"#, "JSON", &JsonParser)
        .unwrap();
    let item = block_on(keyed.table().unwrap().get_item(&"a".into()))
        .unwrap()
        .unwrap();
    assert_eq!(item.get("v"), Value::Int64(1));

    assert!(matches!(
        model.add_text("x", "a,b", "csv", &JsonParser),
        Err(Error::Format { .. })
    ));
}
