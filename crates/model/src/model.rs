//! The model root: table and class registries, id allocation, persistence.
//!
//! `Model` is a cheap handle over shared state. Tables hold a weak reference
//! back to it, so dropping the last handle frees the whole model.

use crate::class::{Class, ClassHandle, ClassKind, ClassOptions, ClassSpec, ClassType, GenericClass};
use crate::config::ModelConfig;
use crate::event::ModelEvent;
use crate::function::FunctionRegistry;
use crate::table::{Table, TableKind, TableOptions, TableState};
use reshape_core::{
    ClassId, Error, IdAllocator, OrderedMap, Result, Row, StaticData, TableId,
};
use reshape_reactive::{Notifier, SubscriptionId};
use reshape_storage::{FormatParser, Journal, JournalEntry, MemoryStore, ModelSnapshot, Store};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

pub(crate) struct ModelInner {
    config: ModelConfig,
    ids: RefCell<IdAllocator>,
    tables: RefCell<OrderedMap<TableId, Rc<Table>>>,
    classes: RefCell<OrderedMap<ClassId, ClassSpec>>,
    functions: FunctionRegistry,
    store: Box<dyn Store>,
    journal: RefCell<Journal>,
    events: Notifier<ModelEvent>,
}

/// One table of the dependency graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSummary {
    pub table_id: TableId,
    pub name: String,
    pub type_name: &'static str,
}

/// Every table plus every parent-to-derived link.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    pub tables: Vec<TableSummary>,
    pub links: Vec<(TableId, TableId)>,
}

/// Handle to a model.
#[derive(Clone)]
pub struct Model {
    inner: Rc<ModelInner>,
}

impl Model {
    /// Creates an empty model backed by a `MemoryStore`.
    pub fn new(config: ModelConfig) -> Self {
        Self::with_store(config, Box::new(MemoryStore::new()))
    }

    /// Creates an empty model backed by `store`.
    pub fn with_store(config: ModelConfig, store: Box<dyn Store>) -> Self {
        Self {
            inner: Rc::new(ModelInner {
                config,
                ids: RefCell::new(IdAllocator::new()),
                tables: RefCell::new(OrderedMap::default()),
                classes: RefCell::new(OrderedMap::default()),
                functions: FunctionRegistry::new(),
                store,
                journal: RefCell::new(Journal::new()),
                events: Notifier::new(),
            }),
        }
    }

    /// Loads the model saved in `store`, or starts an empty one.
    ///
    /// Id allocation resumes past the largest persisted table and class ids.
    pub fn open(config: ModelConfig, store: Box<dyn Store>) -> Result<Self> {
        let snapshot = store.load()?;
        let model = Self::with_store(config, store);
        if let Some(snapshot) = snapshot {
            model.hydrate(&snapshot)?;
        }
        Ok(model)
    }

    pub(crate) fn from_inner(inner: Rc<ModelInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ModelInner> {
        Rc::downgrade(&self.inner)
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &ModelConfig {
        &self.inner.config
    }

    /// Returns the function registry.
    pub fn functions(&self) -> &FunctionRegistry {
        &self.inner.functions
    }

    /// Listens for model-level notifications.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ModelEvent) + 'static,
    {
        self.inner.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    // ---- tables ----

    /// Creates a table from an option bag.
    pub fn create_table(&self, options: TableOptions) -> Result<Rc<Table>> {
        let table_id = options.table_id;
        let state = TableState {
            expected_attributes: options.expected_attributes.iter().cloned().collect(),
            ..TableState::default()
        };
        let kind = options.into_kind()?;
        let table = self.register_table(kind, table_id, state);
        self.touch();
        Ok(table)
    }

    pub(crate) fn register_table(&self, kind: TableKind, table_id: Option<TableId>, state: TableState) -> Rc<Table> {
        let id = {
            let mut ids = self.inner.ids.borrow_mut();
            match table_id {
                Some(id) => {
                    ids.observe_table_id(id);
                    id
                }
                None => ids.next_table_id(),
            }
        };
        let table = Table::new(id, kind, self.downgrade(), state);
        self.inner.tables.borrow_mut().insert(id, table.clone());
        table.journal_created(self);
        debug!(table_id = id, table_type = table.type_name(), "table created");
        table
    }

    pub(crate) fn remove_table(&self, table_id: TableId) {
        self.inner.tables.borrow_mut().shift_remove(&table_id);
        self.record(JournalEntry::TableDeleted { table_id });
        debug!(table_id, "table deleted");
    }

    /// Looks a table up by id.
    pub fn table(&self, table_id: TableId) -> Result<Rc<Table>> {
        self.inner
            .tables
            .borrow()
            .get(&table_id)
            .cloned()
            .ok_or_else(|| Error::table_not_found(table_id))
    }

    /// Every table, in registry order.
    pub fn tables(&self) -> Vec<Rc<Table>> {
        self.inner.tables.borrow().values().cloned().collect()
    }

    pub fn table_count(&self) -> usize {
        self.inner.tables.borrow().len()
    }

    /// True if any class wraps `table_id` or routes an edge through it.
    pub fn table_is_referenced(&self, table_id: TableId) -> bool {
        self.inner
            .classes
            .borrow()
            .values()
            .any(|spec| spec.references_table(table_id))
    }

    /// Creates a static table from rows, wrapped in a generic class.
    pub fn add_static_table(&self, name: &str, rows: Vec<Row>) -> Result<GenericClass> {
        self.add_static_data(name, StaticData::Array(rows))
    }

    /// Creates a keyed static table, wrapped in a generic class.
    pub fn add_static_dict_table(&self, name: &str, rows: OrderedMap<String, Row>) -> Result<GenericClass> {
        self.add_static_data(name, StaticData::Dict(rows))
    }

    /// Parses `text` and loads it as a static table.
    pub fn add_text(&self, name: &str, text: &str, format: &str, parser: &dyn FormatParser) -> Result<GenericClass> {
        let data = parser.parse(text, format)?;
        self.add_static_data(name, data)
    }

    fn add_static_data(&self, name: &str, data: StaticData) -> Result<GenericClass> {
        let options = match data {
            StaticData::Array(rows) => TableOptions::static_rows(name, rows),
            StaticData::Dict(rows) => TableOptions::static_dict(name, rows),
        };
        let table = self.create_table(options)?;
        self.create_class(ClassOptions::new(ClassType::Generic).with_table_id(table.id()))?
            .into_generic()
    }

    /// Deletes every table that is not in use, newest first, so a chain of
    /// unused derivations goes away in one call. In-use tables are skipped.
    pub fn delete_all_unused_tables(&self) -> Result<usize> {
        let mut deleted = 0;
        for table in self.tables().into_iter().rev() {
            match table.delete() {
                Ok(()) => deleted += 1,
                Err(err) if err.is_in_use() => {
                    warn!(table_id = table.id(), "skipping in-use table");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(deleted)
    }

    /// Returns the parent-to-derived graph of every table.
    pub fn table_dependency_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for table in self.tables() {
            graph.tables.push(TableSummary {
                table_id: table.id(),
                name: table.name(),
                type_name: table.type_name(),
            });
            for child in table.derived_table_ids() {
                graph.links.push((table.id(), child));
            }
        }
        graph
    }

    // ---- classes ----

    /// Creates a class from an option bag.
    pub fn create_class(&self, options: ClassOptions) -> Result<ClassHandle> {
        let class_type = options
            .class_type
            .ok_or_else(|| Error::configuration("class type is required"))?;
        let table_id = options
            .table_id
            .ok_or_else(|| Error::configuration("class tableId is required"))?;
        self.table(table_id)?;

        let class_id = {
            let mut ids = self.inner.ids.borrow_mut();
            match options.class_id {
                Some(id) => {
                    ids.observe_class_id(id);
                    id
                }
                None => ids.next_class_id(),
            }
        };
        let kind = match class_type {
            ClassType::Generic => ClassKind::Generic,
            ClassType::Node => ClassKind::Node {
                edge_class_ids: options.edge_class_ids.into_iter().collect(),
            },
            ClassType::Edge => ClassKind::Edge(options.links),
        };
        let spec = ClassSpec {
            class_id,
            table_id,
            class_name: options.class_name,
            annotations: options.annotations,
            kind,
        };
        let handle = ClassHandle::from_kind(self.clone(), class_id, &spec.kind);
        self.inner.classes.borrow_mut().insert(class_id, spec);
        self.record(JournalEntry::ClassCreated {
            class_id,
            table_id,
            type_name: class_type.type_name(),
        });
        debug!(class_id, table_id, class_type = class_type.type_name(), "class created");
        self.touch();
        Ok(handle)
    }

    /// Looks a class up by id.
    pub fn class(&self, class_id: ClassId) -> Result<ClassHandle> {
        let spec = self.class_spec(class_id)?;
        Ok(ClassHandle::from_kind(self.clone(), class_id, &spec.kind))
    }

    /// Every class, in registry order.
    pub fn classes(&self) -> Vec<ClassHandle> {
        self.inner
            .classes
            .borrow()
            .iter()
            .map(|(id, spec)| ClassHandle::from_kind(self.clone(), *id, &spec.kind))
            .collect()
    }

    pub fn class_count(&self) -> usize {
        self.inner.classes.borrow().len()
    }

    pub fn has_class(&self, class_id: ClassId) -> bool {
        self.inner.classes.borrow().contains_key(&class_id)
    }

    /// Returns a copy of a class's registry spec.
    pub fn class_spec(&self, class_id: ClassId) -> Result<ClassSpec> {
        self.inner
            .classes
            .borrow()
            .get(&class_id)
            .cloned()
            .ok_or_else(|| Error::class_not_found(class_id))
    }

    /// First class whose display name is `name`.
    pub fn find_class(&self, name: &str) -> Result<Option<ClassHandle>> {
        for class in self.classes() {
            if class.class_name()? == name {
                return Ok(Some(class));
            }
        }
        Ok(None)
    }

    /// Deletes every class, unwiring edges as it goes.
    pub fn delete_all_classes(&self) -> Result<()> {
        for class in self.classes() {
            if self.has_class(class.class_id()) {
                class.delete()?;
            }
        }
        Ok(())
    }

    /// Applies `f` to a class's spec. No borrow of the registry is held
    /// once `f` returns.
    pub(crate) fn update_class<R>(&self, class_id: ClassId, f: impl FnOnce(&mut ClassSpec) -> Result<R>) -> Result<R> {
        let mut classes = self.inner.classes.borrow_mut();
        let spec = classes
            .get_mut(&class_id)
            .ok_or_else(|| Error::class_not_found(class_id))?;
        f(spec)
    }

    /// Swaps a class's variant in place, keeping its id, table, name and
    /// annotations. The class's table is reset.
    pub(crate) fn reinterpret_class(&self, class_id: ClassId, kind: ClassKind) -> Result<()> {
        let class_type = kind.class_type();
        let table_id = self.update_class(class_id, |spec| {
            spec.kind = kind;
            Ok(spec.table_id)
        })?;
        self.record(JournalEntry::ClassReinterpreted {
            class_id,
            type_name: class_type.type_name(),
        });
        debug!(class_id, class_type = class_type.type_name(), "class reinterpreted");
        if let Ok(table) = self.table(table_id) {
            table.reset();
        }
        self.touch();
        Ok(())
    }

    pub(crate) fn remove_class(&self, class_id: ClassId) -> Result<()> {
        self.inner
            .classes
            .borrow_mut()
            .shift_remove(&class_id)
            .ok_or_else(|| Error::class_not_found(class_id))?;
        self.record(JournalEntry::ClassDeleted { class_id });
        debug!(class_id, "class deleted");
        self.touch();
        Ok(())
    }

    // ---- persistence and bookkeeping ----

    /// Captures every table and class as plain records.
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            name: self.inner.config.name.clone(),
            tables: self.tables().iter().map(|table| table.to_record()).collect(),
            classes: self
                .inner
                .classes
                .borrow()
                .values()
                .map(ClassSpec::to_record)
                .collect(),
        }
    }

    /// Persists a snapshot through the model's store.
    pub fn save(&self) -> Result<()> {
        self.inner.store.save(&self.snapshot())?;
        Ok(())
    }

    fn hydrate(&self, snapshot: &ModelSnapshot) -> Result<()> {
        for record in &snapshot.tables {
            let (kind, state) = Table::from_record(record)?;
            let table = Table::new(record.table_id, kind, self.downgrade(), state);
            self.inner.tables.borrow_mut().insert(record.table_id, table);
        }
        for record in &snapshot.classes {
            let spec = ClassSpec::from_record(record);
            self.inner.classes.borrow_mut().insert(spec.class_id, spec);
        }
        *self.inner.ids.borrow_mut() = IdAllocator::seeded(
            snapshot.tables.iter().map(|table| table.table_id),
            snapshot.classes.iter().map(|class| class.class_id),
        );
        debug!(
            tables = snapshot.tables.len(),
            classes = snapshot.classes.len(),
            "model hydrated"
        );
        Ok(())
    }

    /// Returns the journal entries recorded so far.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.inner.journal.borrow().entries().to_vec()
    }

    pub(crate) fn record(&self, entry: JournalEntry) {
        if self.inner.config.event_log {
            self.inner.journal.borrow_mut().record(entry);
        }
    }

    /// Announces a structural change and autosaves when configured.
    pub(crate) fn touch(&self) {
        self.inner.events.emit(ModelEvent::Update);
        if self.inner.config.autosave {
            if let Err(err) = self.save() {
                warn!(error = %err, "autosave failed");
            }
        }
        self.inner.events.flush();
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.inner.config.name)
            .field("tables", &self.inner.tables.borrow().len())
            .field("classes", &self.inner.classes.borrow().len())
            .finish()
    }
}
