//! Integration tests for table derivations.
//!
//! Covers the derived table variants end to end: aggregation, expansion,
//! facets, transposition and joins, plus memoization, naming and the
//! dependency bookkeeping that deletion relies on.

use futures::executor::block_on;
use futures::TryStreamExt;
use reshape_core::OrderedMap;
use reshape_index::Index;
use reshape_model::{
    Class, Error, FunctionRef, IterateOptions, ItemIndex, ItemRef, Model, ModelConfig, Row, Table,
    TableOptions, TableType, Value,
};
use std::rc::Rc;

fn model() -> Model {
    Model::new(ModelConfig::new("derivation"))
}

/// Creates a static table with no class wrapped around it.
fn static_table(model: &Model, name: &str, rows: Vec<Row>) -> Rc<Table> {
    model
        .create_table(TableOptions::static_rows(name, rows))
        .unwrap()
}

/// Creates a keyed static table with an empty row per key.
fn dict_table(model: &Model, name: &str, keys: &[&str]) -> Rc<Table> {
    let rows: OrderedMap<String, Row> = keys
        .iter()
        .map(|key| (key.to_string(), Row::with("key", *key)))
        .collect();
    model
        .create_table(TableOptions::static_dict(name, rows))
        .unwrap()
}

fn group_rows(values: &[i64]) -> Vec<Row> {
    values.iter().map(|g| Row::with("g", *g)).collect()
}

fn collect(table: &Rc<Table>) -> Vec<ItemRef> {
    block_on(table.iterate(IterateOptions::default()).try_collect()).unwrap()
}

fn indexes(items: &[ItemRef]) -> Vec<String> {
    items.iter().map(|item| item.index().to_string()).collect()
}

#[test]
fn test_expand_splits_on_delimiter() {
    let model = model();
    let parent = static_table(&model, "posts", vec![Row::with("tags", "a,b,c")]);
    let expanded = parent.expand("tags", ",").unwrap();

    let items = collect(&expanded);
    let tokens: Vec<Value> = items.iter().map(|item| item.get("tags")).collect();
    assert_eq!(
        tokens,
        vec![Value::from("a"), Value::from("b"), Value::from("c")]
    );

    let parent_item = block_on(parent.get_item(&ItemIndex::from(0usize)))
        .unwrap()
        .unwrap();
    for item in &items {
        assert!(item.is_connected_to(&parent_item));
        assert!(parent_item.is_connected_to(item));
    }
    assert_eq!(parent_item.connection_count(Some(expanded.id())), 3);
}

#[test]
fn test_expand_indexes_run_across_parents() {
    let model = model();
    let parent = static_table(
        &model,
        "posts",
        vec![Row::with("tags", "x;y"), Row::with("tags", "z")],
    );
    let expanded = parent.expand("tags", ";").unwrap();
    assert_eq!(indexes(&collect(&expanded)), vec!["0", "1", "2"]);
}

#[test]
fn test_expand_missing_attribute_yields_empty_token() {
    let model = model();
    let parent = static_table(&model, "posts", vec![Row::with("title", "untagged")]);
    let expanded = parent.expand("tags", ",").unwrap();
    let items = collect(&expanded);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get("tags"), Value::from(""));
}

#[test]
fn test_expand_rejects_empty_delimiter() {
    let model = model();
    let parent = static_table(&model, "posts", vec![]);
    assert!(matches!(
        parent.expand("tags", ""),
        Err(Error::Configuration { .. })
    ));
}

#[test]
fn test_aggregate_groups_by_value() {
    let model = model();
    let parent = static_table(&model, "people", group_rows(&[1, 1, 2]));
    let groups = parent.aggregate("g").unwrap();

    let items = collect(&groups);
    assert_eq!(indexes(&items), vec!["1", "2"]);
    assert_eq!(items[0].connection_count(Some(parent.id())), 2);
    assert_eq!(items[1].connection_count(Some(parent.id())), 1);
    assert_eq!(items[0].get("g"), Value::Int64(1));
}

#[test]
fn test_aggregate_reducers() {
    let model = model();
    let rows = vec![
        Row::with("g", "a").tap_insert("n", 2),
        Row::with("g", "a").tap_insert("n", 3),
        Row::with("g", "b").tap_insert("n", 5),
    ];
    let parent = static_table(&model, "people", rows);
    let groups = parent.aggregate("g").unwrap();
    groups
        .reduce_attribute("count", FunctionRef::new("count"))
        .unwrap();
    groups
        .reduce_attribute("total", FunctionRef::new("sum").with_param("n"))
        .unwrap();

    let cache = block_on(groups.build_cache()).unwrap();
    let a = &cache[&ItemIndex::from("a")];
    assert_eq!(a.get("count"), Value::Int64(2));
    assert_eq!(a.get("total"), Value::Int64(5));
    let b = &cache[&ItemIndex::from("b")];
    assert_eq!(b.get("count"), Value::Int64(1));
    assert_eq!(b.get("total"), Value::Int64(5));
}

#[test]
fn test_reduce_requires_aggregated_table() {
    let model = model();
    let parent = static_table(&model, "people", group_rows(&[1]));
    assert!(matches!(
        parent.reduce_attribute("count", FunctionRef::new("count")),
        Err(Error::Unsupported { .. })
    ));
}

#[test]
fn test_aggregate_filter_drops_group_from_cache() {
    let model = model();
    let parent = static_table(&model, "people", group_rows(&[1, 1, 2]));
    let groups = parent.aggregate("g").unwrap();
    groups
        .reduce_attribute("count", FunctionRef::new("count"))
        .unwrap();
    groups
        .add_filter(FunctionRef::new("equals").with_param(2), Some("count"))
        .unwrap();

    let cache = block_on(groups.build_cache()).unwrap();
    let kept: Vec<&ItemIndex> = cache.keys().collect();
    assert_eq!(kept, vec![&ItemIndex::from("1")]);
}

#[test]
fn test_aggregate_sum_past_i64_range() {
    let model = model();
    let rows = vec![
        Row::with("g", 1).tap_insert("n", i64::MAX),
        Row::with("g", 1).tap_insert("n", 1i64),
    ];
    let parent = static_table(&model, "big", rows);
    let groups = parent.aggregate("g").unwrap();
    groups
        .reduce_attribute("total", FunctionRef::new("sum").with_param("n"))
        .unwrap();

    let cache = block_on(groups.build_cache()).unwrap();
    assert_eq!(
        cache[&ItemIndex::from("1")].get("total"),
        Value::Float64(i64::MAX as f64 + 1.0)
    );
}

/// Counts groups of `[1, 1, 2]` and facets them on a count of 2.
fn counted_groups(model: &Model) -> Rc<Table> {
    let parent = static_table(model, "people", group_rows(&[1, 1, 2]));
    let groups = parent.aggregate("g").unwrap();
    groups
        .reduce_attribute("count", FunctionRef::new("count"))
        .unwrap();
    groups
}

#[test]
fn test_facet_over_aggregate_reads_reduced_rows() {
    let model = model();
    let groups = counted_groups(&model);
    let facet = groups.closed_facet("count", [2]).unwrap().remove(0);

    // The aggregate is not built yet when the facet starts reading it.
    assert!(!groups.is_cached());
    let cold = collect(&facet);
    assert_eq!(indexes(&cold), vec!["1"]);

    block_on(groups.build_cache()).unwrap();
    facet.reset();
    let warm = collect(&facet);
    assert_eq!(indexes(&warm), indexes(&cold));
}

#[test]
fn test_expand_over_aggregate_reads_reduced_rows() {
    let model = model();
    let groups = counted_groups(&model);
    let expanded = groups.expand("count", ",").unwrap();
    let tokens: Vec<Value> = collect(&expanded).iter().map(|item| item.get("count")).collect();
    assert_eq!(tokens, vec![Value::from("2"), Value::from("1")]);
}

#[test]
fn test_transpose_of_aggregate_reads_reduced_row() {
    let model = model();
    let groups = counted_groups(&model);
    let tables = groups.closed_transpose(["1"]).unwrap();
    let items = collect(&tables[0]);
    assert_eq!(indexes(&items), vec!["g", "count"]);
    assert_eq!(items[1].get("value"), Value::Int64(2));
}

#[test]
fn test_connect_joins_on_shared_index() {
    let model = model();
    let left = dict_table(&model, "left", &["a", "b", "c"]);
    let right = dict_table(&model, "right", &["a", "c"]);
    let joined = left.connect(&[right.clone()]).unwrap();

    let items = collect(&joined);
    assert_eq!(indexes(&items), vec!["a", "c"]);
    for item in &items {
        assert_eq!(item.connection_count(Some(left.id())), 1);
        assert_eq!(item.connection_count(Some(right.id())), 1);
    }
    assert_eq!(joined.table_type(), TableType::Connected);
}

#[test]
fn test_connect_memoized_by_parent_set() {
    let model = model();
    let left = dict_table(&model, "left", &["a"]);
    let right = dict_table(&model, "right", &["a"]);
    let first = left.connect(&[right.clone()]).unwrap();
    let second = right.connect(&[left.clone()]).unwrap();
    assert_eq!(first.id(), second.id());
    assert_eq!(first.name(), "left⨯right");

    let parents: Vec<_> = first
        .parent_tables()
        .unwrap()
        .iter()
        .map(|table| table.id())
        .collect();
    assert_eq!(parents, vec![left.id(), right.id()]);
    assert!(matches!(
        first.parent_table(),
        Err(Error::InvalidParent { count: 2, .. })
    ));
}

#[test]
fn test_derivations_are_memoized() {
    let model = model();
    let parent = static_table(&model, "people", group_rows(&[1, 2]));

    let groups = parent.aggregate("g").unwrap();
    assert_eq!(parent.aggregate("g").unwrap().id(), groups.id());
    assert_ne!(parent.aggregate("h").unwrap().id(), groups.id());

    let expanded = parent.expand("g", ",").unwrap();
    assert_eq!(parent.expand("g", ",").unwrap().id(), expanded.id());
    assert_ne!(parent.expand("g", ";").unwrap().id(), expanded.id());

    let facets = parent.closed_facet("g", [1, 2]).unwrap();
    let again = parent.closed_facet("g", [2]).unwrap();
    assert_eq!(again[0].id(), facets[1].id());

    assert_eq!(parent.derived_table_ids().len(), 6);
}

#[test]
fn test_closed_facet_partitions_rows() {
    let model = model();
    let rows = vec![
        Row::with("g", 1).tap_insert("name", "ada"),
        Row::with("g", 1).tap_insert("name", "bob"),
        Row::with("g", 2).tap_insert("name", "cy"),
    ];
    let parent = static_table(&model, "people", rows);
    let facets = parent.closed_facet("g", [1, 2]).unwrap();

    let first = collect(&facets[0]);
    assert_eq!(indexes(&first), vec!["0", "1"]);
    assert_eq!(first[1].get("name"), Value::from("bob"));
    assert_eq!(collect(&facets[1]).len(), 1);
    assert_eq!(facets[0].name(), "[1]");
}

#[test]
fn test_facet_matches_by_key_string() {
    let model = model();
    let parent = static_table(&model, "people", group_rows(&[7]));
    let facets = parent.closed_facet("g", ["7"]).unwrap();
    assert_eq!(collect(&facets[0]).len(), 1);
}

#[test]
fn test_open_facet_discovers_values() {
    let model = model();
    let parent = static_table(&model, "people", group_rows(&[3, 1, 3, 2]));
    let facets: Vec<Rc<Table>> =
        block_on(parent.open_facet("g", None).try_collect()).unwrap();
    let names: Vec<String> = facets.iter().map(|table| table.name()).collect();
    assert_eq!(names, vec!["[3]", "[1]", "[2]"]);

    let limited: Vec<Rc<Table>> =
        block_on(parent.open_facet("g", Some(1)).try_collect()).unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id(), facets[0].id());
}

#[test]
fn test_closed_transpose_reads_one_item() {
    let model = model();
    let mut nested = Row::new();
    nested.insert("c", 2);
    let mut row = Row::with("a", 1);
    row.insert("b", nested);
    let rows: OrderedMap<String, Row> = [("x".to_string(), row)].into_iter().collect();
    let parent = model
        .create_table(TableOptions::static_dict("source", rows))
        .unwrap();

    let tables = parent.closed_transpose(["x"]).unwrap();
    let items = collect(&tables[0]);
    assert_eq!(indexes(&items), vec!["a", "b"]);
    assert_eq!(items[0].get("value"), Value::Int64(1));
    assert_eq!(items[1].get("c"), Value::Int64(2));
    assert_eq!(tables[0].name(), "ᵀx");
}

#[test]
fn test_transpose_of_missing_item_is_empty() {
    let model = model();
    let parent = static_table(&model, "people", group_rows(&[1]));
    let tables = parent.closed_transpose(["9"]).unwrap();
    assert!(collect(&tables[0]).is_empty());
}

#[test]
fn test_open_transpose_one_table_per_item() {
    let model = model();
    let parent = static_table(&model, "people", group_rows(&[1, 2]));
    let tables: Vec<Rc<Table>> =
        block_on(parent.open_transpose(None).try_collect()).unwrap();
    let names: Vec<String> = tables.iter().map(|table| table.name()).collect();
    assert_eq!(names, vec!["ᵀ0", "ᵀ1"]);
}

#[test]
fn test_names_follow_derivation() {
    let model = model();
    let parent = static_table(&model, "people", group_rows(&[1]));
    let groups = parent.aggregate("g").unwrap();
    let expanded = groups.expand("g", ",").unwrap();
    assert_eq!(groups.name(), "people↦g");
    assert_eq!(expanded.name(), "people↦g↤g");

    groups.set_name(Some("groups".into())).unwrap();
    assert_eq!(expanded.name(), "groups↤g");
    groups.set_name(None).unwrap();
    assert_eq!(groups.custom_name(), None);
    assert_eq!(groups.name(), "people↦g");
}

#[test]
fn test_duplicate_attribute_copies_parent_value() {
    let model = model();
    let rows = vec![Row::with("name", "ada").tap_insert("tags", "x,y")];
    let parent = static_table(&model, "people", rows);
    let expanded = parent.expand("tags", ",").unwrap();
    expanded.duplicate_attribute(parent.id(), "name").unwrap();

    for item in collect(&expanded) {
        assert_eq!(item.get("people.name"), Value::from("ada"));
    }

    let groups = parent.aggregate("name").unwrap();
    assert!(matches!(
        groups.duplicate_attribute(parent.id(), "tags"),
        Err(Error::Unsupported { .. })
    ));
}

#[test]
fn test_attribute_details() {
    let model = model();
    let rows = vec![Row::with("name", "ada").tap_insert("secret", "x")];
    let parent = model
        .create_table(
            TableOptions::static_rows("people", rows).with_expected_attributes(["email"]),
        )
        .unwrap();
    parent
        .derive_attribute("label", FunctionRef::new("constant").with_param("hi"))
        .unwrap();
    parent.suppress_attribute("secret").unwrap();
    parent
        .add_filter(FunctionRef::new("non_empty"), Some("name"))
        .unwrap();

    let item = collect(&parent).remove(0);
    assert!(!item.row().contains("secret"));
    assert_eq!(item.get("label"), Value::from("hi"));

    let details = parent.attribute_details();
    let find = |name: &str| details.iter().find(|info| info.name == name).unwrap();
    assert!(find("email").expected);
    assert!(!find("email").observed);
    assert!(find("secret").observed);
    assert!(find("secret").suppressed);
    assert!(find("label").derived);
    assert!(find("name").filtered);
    assert!(parent.attributes().contains(&"label".to_string()));
}

#[test]
fn test_derive_attribute_requires_known_function() {
    let model = model();
    let parent = static_table(&model, "people", vec![]);
    assert!(matches!(
        parent.derive_attribute("x", FunctionRef::new("missing")),
        Err(Error::UnknownFunction { .. })
    ));
}

#[test]
fn test_index_filter() {
    let model = model();
    let parent = static_table(&model, "people", group_rows(&[5, 6, 7]));
    parent
        .add_filter(FunctionRef::new("equals").with_param(1), None)
        .unwrap();
    assert_eq!(indexes(&collect(&parent)), vec!["1"]);
    assert!(parent.index_details().filtered);

    parent.remove_filter(None).unwrap();
    assert_eq!(collect(&parent).len(), 3);
}

#[test]
fn test_index_on_attribute() {
    let model = model();
    let parent = static_table(&model, "people", group_rows(&[1, 2, 1]));
    let index = block_on(parent.index_on("g")).unwrap();
    assert_eq!(index.key_count(), 2);
    assert_eq!(
        index.get(&"1".to_string()),
        vec![ItemIndex::from(0usize), ItemIndex::from(2usize)]
    );
}

#[test]
fn test_shortest_path() {
    let model = model();
    let root = static_table(&model, "people", group_rows(&[1]));
    let groups = root.aggregate("g").unwrap();
    let expanded = root.expand("g", ",").unwrap();
    let other = static_table(&model, "other", vec![]);

    let ids = |path: Vec<Rc<Table>>| path.iter().map(|table| table.id()).collect::<Vec<_>>();
    assert_eq!(
        ids(root.shortest_path_to_table(&root).unwrap().unwrap()),
        vec![root.id()]
    );
    assert_eq!(
        ids(root.shortest_path_to_table(&expanded).unwrap().unwrap()),
        vec![expanded.id()]
    );
    assert_eq!(
        ids(groups.shortest_path_to_table(&expanded).unwrap().unwrap()),
        vec![root.id(), expanded.id()]
    );
    assert!(root.shortest_path_to_table(&other).unwrap().is_none());
}

#[test]
fn test_in_use_tables_cannot_be_deleted() {
    let model = model();
    let root = static_table(&model, "people", group_rows(&[1]));
    let groups = root.aggregate("g").unwrap();

    assert!(root.in_use().unwrap());
    assert!(matches!(root.delete(), Err(Error::InUse { .. })));

    groups.delete().unwrap();
    assert!(root.derived_table_ids().is_empty());
    assert!(!root.in_use().unwrap());
    root.delete().unwrap();
    assert!(matches!(
        model.table(root.id()),
        Err(Error::TableNotFound { .. })
    ));
}

#[test]
fn test_class_keeps_table_in_use() {
    let model = model();
    let class = model.add_static_table("people", group_rows(&[1])).unwrap();
    let table = class.table().unwrap();
    assert!(table.in_use().unwrap());
    assert!(model.table_is_referenced(table.id()));
}

#[test]
fn test_delete_all_unused_tables() {
    let model = model();
    let root = static_table(&model, "people", group_rows(&[1]));
    let groups = root.aggregate("g").unwrap();
    groups.expand("g", ",").unwrap();
    let kept = model.add_static_table("kept", group_rows(&[2])).unwrap();

    assert_eq!(model.delete_all_unused_tables().unwrap(), 3);
    assert_eq!(model.table_count(), 1);
    assert_eq!(model.tables()[0].id(), kept.table_id().unwrap());
}

#[test]
fn test_dependency_graph() {
    let model = model();
    let root = static_table(&model, "people", group_rows(&[1]));
    let groups = root.aggregate("g").unwrap();

    let graph = model.table_dependency_graph();
    assert_eq!(graph.tables.len(), 2);
    assert_eq!(graph.tables[1].type_name, "AggregatedTable");
    assert_eq!(graph.links, vec![(root.id(), groups.id())]);
}

/// Builder-style insert for compact row literals.
trait TapInsert {
    fn tap_insert(self, attribute: &str, value: impl Into<Value>) -> Self;
}

impl TapInsert for Row {
    fn tap_insert(mut self, attribute: &str, value: impl Into<Value>) -> Self {
        self.insert(attribute, value);
        self
    }
}
