//! Tables and the derivation DAG.
//!
//! A table is either static (backed by rows) or derived from one or more
//! parent tables. Only the parent holds the edge (its `derived_tables` set);
//! a table finds its own parents by scanning the model's registry.
//!
//! Every change to a table's attribute pipeline resets the table, and a reset
//! cascades to every table derived from it.

mod build;
mod options;
mod producer;

pub use build::{CacheMap, CancelToken, CurrentData, IterateOptions};
pub use options::{TableKind, TableOptions, TableType};

use crate::event::TableEvent;
use crate::model::{Model, ModelInner};
use build::{CacheState, PendingBuild};
use futures::future;
use futures::stream::LocalBoxStream;
use futures::{StreamExt, TryStreamExt};
use reshape_core::{
    Error, FunctionRef, ItemIndex, OrderedMap, OrderedSet, Result, TableId, Value,
};
use reshape_index::{HashIndex, Index};
use reshape_reactive::{Notifier, SubscriptionId};
use reshape_storage::JournalEntry;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::debug;

/// Attribute pipeline and DAG bookkeeping of one table.
#[derive(Clone, Debug, Default)]
pub(crate) struct TableState {
    pub(crate) custom_name: Option<String>,
    pub(crate) expected_attributes: OrderedSet<String>,
    pub(crate) observed_attributes: OrderedSet<String>,
    pub(crate) derived_attributes: OrderedMap<String, FunctionRef>,
    pub(crate) suppressed_attributes: OrderedSet<String>,
    pub(crate) suppress_index: bool,
    pub(crate) attribute_filters: OrderedMap<String, FunctionRef>,
    pub(crate) index_filter: Option<FunctionRef>,
    pub(crate) derived_tables: OrderedSet<TableId>,
    pub(crate) duplicated_attributes: Vec<(TableId, String)>,
    pub(crate) reduce_attributes: OrderedMap<String, FunctionRef>,
}

/// How one attribute participates in a table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
    pub expected: bool,
    pub observed: bool,
    pub derived: bool,
    pub suppressed: bool,
    pub filtered: bool,
}

/// Index display and filter flags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexInfo {
    pub suppressed: bool,
    pub filtered: bool,
}

/// A lazily evaluated table.
pub struct Table {
    id: TableId,
    kind: TableKind,
    model: Weak<ModelInner>,
    pub(crate) state: RefCell<TableState>,
    cache: RefCell<CacheState>,
    pending_build: RefCell<Option<(u64, PendingBuild)>>,
    tickets: Cell<u64>,
    pub(crate) events: Notifier<TableEvent>,
}

impl Table {
    pub(crate) fn new(id: TableId, kind: TableKind, model: Weak<ModelInner>, state: TableState) -> Rc<Self> {
        Rc::new(Self {
            id,
            kind,
            model,
            state: RefCell::new(state),
            cache: RefCell::new(CacheState::Empty),
            pending_build: RefCell::new(None),
            tickets: Cell::new(0),
            events: Notifier::new(),
        })
    }

    /// Returns the table id.
    #[inline]
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Returns the variant and its parameters.
    #[inline]
    pub fn kind(&self) -> &TableKind {
        &self.kind
    }

    pub fn table_type(&self) -> TableType {
        self.kind.table_type()
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.table_type().type_name()
    }

    /// Returns the owning model.
    pub fn model(&self) -> Result<Model> {
        self.model.upgrade().map(Model::from_inner).ok_or(Error::ModelDropped)
    }

    /// Listens for this table's reset/finish/filter/update notifications.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&TableEvent) + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // ---- naming ----

    /// Returns the display name: the custom name if set, else one built
    /// from the variant and its parents.
    pub fn name(&self) -> String {
        if let Some(name) = &self.state.borrow().custom_name {
            return name.clone();
        }
        match &self.kind {
            TableKind::Static { name, .. } | TableKind::StaticDict { name, .. } => name.clone(),
            TableKind::Aggregated { attribute } => format!("{}↦{}", self.parent_name(), attribute),
            TableKind::Expanded { attribute, .. } => format!("{}↤{}", self.parent_name(), attribute),
            TableKind::Faceted { value, .. } => format!("[{}]", value),
            TableKind::Transposed { index } => format!("ᵀ{}", index),
            TableKind::Connected => self
                .parent_tables()
                .map(|parents| {
                    parents
                        .iter()
                        .map(|parent| parent.name())
                        .collect::<Vec<_>>()
                        .join("⨯")
                })
                .unwrap_or_default(),
        }
    }

    /// Returns the custom name, if one was set.
    pub fn custom_name(&self) -> Option<String> {
        self.state.borrow().custom_name.clone()
    }

    /// Sets or clears the custom name.
    pub fn set_name(&self, name: Option<String>) -> Result<()> {
        self.state.borrow_mut().custom_name = name;
        self.model()?.touch();
        Ok(())
    }

    fn parent_name(&self) -> String {
        self.parent_tables()
            .ok()
            .and_then(|parents| parents.first().map(|parent| parent.name()))
            .unwrap_or_default()
    }

    // ---- attribute pipeline ----

    /// Computes `attribute` on every item with a registered derive function.
    pub fn derive_attribute(&self, attribute: impl Into<String>, function: FunctionRef) -> Result<()> {
        let model = self.model()?;
        model.functions().derive(&function.name)?;
        self.state
            .borrow_mut()
            .derived_attributes
            .insert(attribute.into(), function);
        self.changed(&model);
        Ok(())
    }

    /// Stops computing a derived attribute.
    pub fn remove_derived_attribute(&self, attribute: &str) -> Result<()> {
        let model = self.model()?;
        self.state.borrow_mut().derived_attributes.shift_remove(attribute);
        self.changed(&model);
        Ok(())
    }

    /// Removes `attribute` from finished rows.
    pub fn suppress_attribute(&self, attribute: impl Into<String>) -> Result<()> {
        let model = self.model()?;
        self.state
            .borrow_mut()
            .suppressed_attributes
            .insert(attribute.into());
        self.changed(&model);
        Ok(())
    }

    pub fn unsuppress_attribute(&self, attribute: &str) -> Result<()> {
        let model = self.model()?;
        self.state
            .borrow_mut()
            .suppressed_attributes
            .shift_remove(attribute);
        self.changed(&model);
        Ok(())
    }

    /// Hides or shows the index. Purely a display flag.
    pub fn suppress_index(&self, suppressed: bool) -> Result<()> {
        let model = self.model()?;
        self.state.borrow_mut().suppress_index = suppressed;
        self.changed(&model);
        Ok(())
    }

    /// Filters finished items by a registered filter function.
    ///
    /// With no attribute the filter receives the item index; otherwise it
    /// receives the attribute's value. One filter per attribute.
    pub fn add_filter(&self, function: FunctionRef, attribute: Option<&str>) -> Result<()> {
        let model = self.model()?;
        model.functions().filter(&function.name)?;
        {
            let mut state = self.state.borrow_mut();
            match attribute {
                Some(attribute) => {
                    state
                        .attribute_filters
                        .insert(attribute.to_string(), function);
                }
                None => state.index_filter = Some(function),
            }
        }
        self.changed(&model);
        Ok(())
    }

    /// Removes the index filter, or the filter on `attribute`.
    pub fn remove_filter(&self, attribute: Option<&str>) -> Result<()> {
        let model = self.model()?;
        {
            let mut state = self.state.borrow_mut();
            match attribute {
                Some(attribute) => {
                    state.attribute_filters.shift_remove(attribute);
                }
                None => state.index_filter = None,
            }
        }
        self.changed(&model);
        Ok(())
    }

    /// Copies `attribute` from the connected item of a parent table onto each
    /// row, as `<parent name>.<attribute>`.
    pub fn duplicate_attribute(&self, parent_id: TableId, attribute: impl Into<String>) -> Result<()> {
        if !self.table_type().supports_duplicates() {
            return Err(Error::unsupported(format!(
                "{} can't duplicate parent attributes",
                self.type_name()
            )));
        }
        let model = self.model()?;
        model.table(parent_id)?;
        self.state
            .borrow_mut()
            .duplicated_attributes
            .push((parent_id, attribute.into()));
        self.changed(&model);
        Ok(())
    }

    /// Folds every contributing parent item into `attribute` of the aggregate.
    pub fn reduce_attribute(&self, attribute: impl Into<String>, function: FunctionRef) -> Result<()> {
        if self.table_type() != TableType::Aggregated {
            return Err(Error::unsupported(format!(
                "{} can't reduce attributes",
                self.type_name()
            )));
        }
        let model = self.model()?;
        model.functions().reduce(&function.name)?;
        self.state
            .borrow_mut()
            .reduce_attributes
            .insert(attribute.into(), function);
        self.changed(&model);
        Ok(())
    }

    fn changed(&self, model: &Model) {
        self.reset();
        model.touch();
    }

    /// Returns every known attribute with its flags.
    ///
    /// Ordered by first mention across expected, observed, derived,
    /// suppressed and filtered attributes.
    pub fn attribute_details(&self) -> Vec<AttributeInfo> {
        let state = self.state.borrow();
        let mut details: OrderedMap<String, AttributeInfo> = OrderedMap::default();
        for name in &state.expected_attributes {
            attribute_entry(&mut details, name).expected = true;
        }
        for name in &state.observed_attributes {
            attribute_entry(&mut details, name).observed = true;
        }
        for name in state.derived_attributes.keys() {
            attribute_entry(&mut details, name).derived = true;
        }
        for name in &state.suppressed_attributes {
            attribute_entry(&mut details, name).suppressed = true;
        }
        for name in state.attribute_filters.keys() {
            attribute_entry(&mut details, name).filtered = true;
        }
        details.into_values().collect()
    }

    /// Returns the names from `attribute_details`.
    pub fn attributes(&self) -> Vec<String> {
        self.attribute_details()
            .into_iter()
            .map(|info| info.name)
            .collect()
    }

    pub fn index_details(&self) -> IndexInfo {
        let state = self.state.borrow();
        IndexInfo {
            suppressed: state.suppress_index,
            filtered: state.index_filter.is_some(),
        }
    }

    /// Builds a non-unique hash index of item indexes by attribute value.
    pub async fn index_on(self: &Rc<Self>, attribute: &str) -> Result<HashIndex<String>> {
        let cache = self.build_cache().await?;
        let mut index = HashIndex::new(false);
        for item in cache.values() {
            // Non-unique indexes never reject a key.
            let _ = index.add(item.get(attribute).to_key_string(), item.index().clone());
        }
        Ok(index)
    }

    // ---- DAG ----

    /// Ids of tables derived directly from this one.
    pub fn derived_table_ids(&self) -> Vec<TableId> {
        self.state.borrow().derived_tables.iter().copied().collect()
    }

    /// Tables derived directly from this one.
    pub fn derived_tables(&self) -> Vec<Rc<Table>> {
        let Ok(model) = self.model() else {
            return Vec::new();
        };
        self.derived_table_ids()
            .into_iter()
            .filter_map(|id| model.table(id).ok())
            .collect()
    }

    /// Tables listing this one as derived, in registry order.
    pub fn parent_tables(&self) -> Result<Vec<Rc<Table>>> {
        let model = self.model()?;
        Ok(model
            .tables()
            .into_iter()
            .filter(|table| table.state.borrow().derived_tables.contains(&self.id))
            .collect())
    }

    /// The single parent of a single-parent variant.
    pub fn parent_table(&self) -> Result<Rc<Table>> {
        let parents = self.parent_tables()?;
        <[Rc<Table>; 1]>::try_from(parents)
            .map(|[parent]| parent)
            .map_err(|parents| Error::invalid_parent(self.id, parents.len()))
    }

    /// True if any table derives from this one or any class uses it.
    pub fn in_use(&self) -> Result<bool> {
        if !self.state.borrow().derived_tables.is_empty() {
            return Ok(true);
        }
        Ok(self.model()?.table_is_referenced(self.id))
    }

    /// Removes the table from the DAG and the registry.
    pub fn delete(&self) -> Result<()> {
        if self.in_use()? {
            return Err(Error::in_use("table", self.id));
        }
        let model = self.model()?;
        for parent in self.parent_tables()? {
            parent.state.borrow_mut().derived_tables.shift_remove(&self.id);
        }
        self.drop_cache();
        model.remove_table(self.id);
        model.touch();
        Ok(())
    }

    /// Breadth-first search over derived and parent links.
    ///
    /// The path excludes this table and ends with `other`; a table's path
    /// to itself is just itself.
    pub fn shortest_path_to_table(&self, other: &Table) -> Result<Option<Vec<Rc<Table>>>> {
        let model = self.model()?;
        if self.id == other.id {
            return Ok(Some(vec![model.table(self.id)?]));
        }

        let mut previous: OrderedMap<TableId, Option<TableId>> = OrderedMap::default();
        previous.insert(self.id, None);
        let mut queue = VecDeque::from([self.id]);
        while let Some(current) = queue.pop_front() {
            if current == other.id {
                break;
            }
            let table = model.table(current)?;
            let mut neighbours = table.derived_table_ids();
            neighbours.extend(table.parent_tables()?.iter().map(|parent| parent.id));
            for next in neighbours {
                if !previous.contains_key(&next) {
                    previous.insert(next, Some(current));
                    queue.push_back(next);
                }
            }
        }

        if !previous.contains_key(&other.id) {
            return Ok(None);
        }
        let mut path = Vec::new();
        let mut current = other.id;
        while let Some(Some(before)) = previous.get(&current) {
            path.push(model.table(current)?);
            current = *before;
        }
        path.reverse();
        Ok(Some(path))
    }

    // ---- derivations ----

    fn derive_table(&self, kind: TableKind) -> Result<Rc<Table>> {
        if let Some(existing) = self
            .derived_tables()
            .into_iter()
            .find(|child| child.kind.same_derivation(&kind))
        {
            return Ok(existing);
        }
        let model = self.model()?;
        let table = model.register_table(kind, None, TableState::default());
        self.state.borrow_mut().derived_tables.insert(table.id);
        model.touch();
        Ok(table)
    }

    /// Groups items by the string value of `attribute`.
    pub fn aggregate(&self, attribute: impl Into<String>) -> Result<Rc<Table>> {
        self.derive_table(TableKind::Aggregated {
            attribute: attribute.into(),
        })
    }

    /// Splits `attribute` on `delimiter`, one item per token.
    pub fn expand(&self, attribute: impl Into<String>, delimiter: impl Into<String>) -> Result<Rc<Table>> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(Error::configuration("expand delimiter must not be empty"));
        }
        self.derive_table(TableKind::Expanded {
            attribute: attribute.into(),
            delimiter,
        })
    }

    fn facet(&self, attribute: &str, value: Value) -> Result<Rc<Table>> {
        self.derive_table(TableKind::Faceted {
            attribute: attribute.to_string(),
            value,
        })
    }

    /// One faceted table per listed value.
    pub fn closed_facet<I, V>(&self, attribute: &str, values: I) -> Result<Vec<Rc<Table>>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        values
            .into_iter()
            .map(|value| self.facet(attribute, value.into()))
            .collect()
    }

    /// Discovers facet values by iterating up to `limit` items, yielding one
    /// faceted table per distinct value.
    pub fn open_facet(self: &Rc<Self>, attribute: &str, limit: Option<usize>) -> LocalBoxStream<'static, Result<Rc<Table>>> {
        let table = self.clone();
        let attribute = attribute.to_string();
        let mut seen: OrderedSet<String> = OrderedSet::default();
        self.iterate(IterateOptions { limit, reset: false })
            .try_filter_map(move |item| {
                let value = item.get(&attribute);
                let result = if seen.insert(value.to_key_string()) {
                    table.facet(&attribute, value).map(Some)
                } else {
                    Ok(None)
                };
                future::ready(result)
            })
            .boxed_local()
    }

    fn transpose(&self, index: ItemIndex) -> Result<Rc<Table>> {
        self.derive_table(TableKind::Transposed { index })
    }

    /// One transposed table per listed item index.
    pub fn closed_transpose<I, X>(&self, indexes: I) -> Result<Vec<Rc<Table>>>
    where
        I: IntoIterator<Item = X>,
        X: Into<ItemIndex>,
    {
        indexes
            .into_iter()
            .map(|index| self.transpose(index.into()))
            .collect()
    }

    /// One transposed table per item, for up to `limit` items.
    pub fn open_transpose(self: &Rc<Self>, limit: Option<usize>) -> LocalBoxStream<'static, Result<Rc<Table>>> {
        let table = self.clone();
        self.iterate(IterateOptions { limit, reset: false })
            .and_then(move |item| future::ready(table.transpose(item.index().clone())))
            .boxed_local()
    }

    /// Joins this table with `others` on item index.
    ///
    /// Memoized by parent set: connecting the same tables again, in any
    /// order, returns the existing connected table.
    pub fn connect(&self, others: &[Rc<Table>]) -> Result<Rc<Table>> {
        let model = self.model()?;
        let wanted: OrderedSet<TableId> = std::iter::once(self.id)
            .chain(others.iter().map(|other| other.id))
            .collect();

        for child in self.derived_tables() {
            if !matches!(child.kind, TableKind::Connected) {
                continue;
            }
            let parents: OrderedSet<TableId> = child
                .parent_tables()?
                .iter()
                .map(|parent| parent.id)
                .collect();
            if parents.len() == wanted.len() && parents.iter().all(|id| wanted.contains(id)) {
                return Ok(child);
            }
        }

        let table = model.register_table(TableKind::Connected, None, TableState::default());
        for id in &wanted {
            model
                .table(*id)?
                .state
                .borrow_mut()
                .derived_tables
                .insert(table.id);
        }
        debug!(table_id = table.id, parents = wanted.len(), "connected tables");
        model.touch();
        Ok(table)
    }

    pub(crate) fn journal_created(&self, model: &Model) {
        model.record(JournalEntry::TableCreated {
            table_id: self.id,
            type_name: self.type_name(),
        });
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("type", &self.type_name())
            .field("derived_tables", &self.state.borrow().derived_tables)
            .finish()
    }
}

fn attribute_entry<'a>(details: &'a mut OrderedMap<String, AttributeInfo>, name: &str) -> &'a mut AttributeInfo {
    details
        .entry(name.to_string())
        .or_insert_with(|| AttributeInfo {
            name: name.to_string(),
            ..AttributeInfo::default()
        })
}
