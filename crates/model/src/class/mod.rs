//! Classes: graph interpretations of tables.
//!
//! A class wraps exactly one table and gives it graph meaning: generic,
//! node, or edge. Class state lives in the model's class registry as a
//! `ClassSpec`; the handle types (`GenericClass`, `NodeClass`, `EdgeClass`)
//! are cheap (model, id) pairs that read and update that spec.
//!
//! Edge classes record, per side, the chain of intermediate table ids that
//! leads from the edge's table to the node's table. Walking the item
//! connections along that chain is how edges find their nodes.

mod edge;
mod generic;
mod node;

pub use edge::EdgeClass;
pub use generic::GenericClass;
pub use node::NodeClass;

use crate::model::Model;
use crate::table::Table;
use futures::stream::LocalBoxStream;
use futures::{future, StreamExt, TryStreamExt};
use reshape_core::{ClassId, Error, ItemIndex, OrderedMap, OrderedSet, Result, TableId, Value};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Type tag selecting a class variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClassType {
    Generic,
    Node,
    Edge,
}

impl ClassType {
    /// Returns the variant's type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            ClassType::Generic => "GenericClass",
            ClassType::Node => "NodeClass",
            ClassType::Edge => "EdgeClass",
        }
    }
}

/// One end of an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    /// Returns the other end.
    pub fn opposite(self) -> Side {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "source" => Ok(Side::Source),
            "target" => Ok(Side::Target),
            other => Err(Error::invalid_side(other)),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => f.write_str("source"),
            Side::Target => f.write_str("target"),
        }
    }
}

/// Wiring of an edge class to its node classes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeLinks {
    pub source_class_id: Option<ClassId>,
    /// Tables between the edge table and the source node table.
    pub source_table_ids: Vec<TableId>,
    pub target_class_id: Option<ClassId>,
    /// Tables between the edge table and the target node table.
    pub target_table_ids: Vec<TableId>,
    pub directed: bool,
    /// Set each time a directed edge has its ends swapped.
    pub swapped_direction: bool,
}

impl EdgeLinks {
    pub fn class_id(&self, side: Side) -> Option<ClassId> {
        match side {
            Side::Source => self.source_class_id,
            Side::Target => self.target_class_id,
        }
    }

    pub fn table_ids(&self, side: Side) -> &[TableId] {
        match side {
            Side::Source => &self.source_table_ids,
            Side::Target => &self.target_table_ids,
        }
    }

    pub(crate) fn set(&mut self, side: Side, class_id: Option<ClassId>, table_ids: Vec<TableId>) {
        match side {
            Side::Source => {
                self.source_class_id = class_id;
                self.source_table_ids = table_ids;
            }
            Side::Target => {
                self.target_class_id = class_id;
                self.target_table_ids = table_ids;
            }
        }
    }

    /// True if any side chain passes through `table_id`.
    pub fn uses_table(&self, table_id: TableId) -> bool {
        self.source_table_ids.contains(&table_id) || self.target_table_ids.contains(&table_id)
    }

    /// The side `class_id` sits on, preferring the source side.
    pub fn side_of(&self, class_id: ClassId) -> Option<Side> {
        if self.source_class_id == Some(class_id) {
            Some(Side::Source)
        } else if self.target_class_id == Some(class_id) {
            Some(Side::Target)
        } else {
            None
        }
    }
}

/// Variant-specific class state.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassKind {
    Generic,
    Node { edge_class_ids: OrderedSet<ClassId> },
    Edge(EdgeLinks),
}

impl ClassKind {
    pub fn class_type(&self) -> ClassType {
        match self {
            ClassKind::Generic => ClassType::Generic,
            ClassKind::Node { .. } => ClassType::Node,
            ClassKind::Edge(_) => ClassType::Edge,
        }
    }
}

/// A class as stored in the model registry.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassSpec {
    pub class_id: ClassId,
    pub table_id: TableId,
    pub class_name: Option<String>,
    pub annotations: OrderedMap<String, Value>,
    pub kind: ClassKind,
}

impl ClassSpec {
    /// True if the class's own table or any edge chain is `table_id`.
    pub fn references_table(&self, table_id: TableId) -> bool {
        self.table_id == table_id
            || matches!(&self.kind, ClassKind::Edge(links) if links.uses_table(table_id))
    }

    pub(crate) fn edge_links_mut(&mut self) -> Result<&mut EdgeLinks> {
        match &mut self.kind {
            ClassKind::Edge(links) => Ok(links),
            _ => Err(Error::ClassKind {
                id: self.class_id,
                expected: ClassType::Edge.type_name(),
            }),
        }
    }

    pub(crate) fn edge_class_ids_mut(&mut self) -> Result<&mut OrderedSet<ClassId>> {
        match &mut self.kind {
            ClassKind::Node { edge_class_ids } => Ok(edge_class_ids),
            _ => Err(Error::ClassKind {
                id: self.class_id,
                expected: ClassType::Node.type_name(),
            }),
        }
    }
}

/// Option bag accepted by `Model::create_class`.
#[derive(Clone, Debug, Default)]
pub struct ClassOptions {
    pub class_type: Option<ClassType>,
    /// Preset id, used when reinterpreting or hydrating.
    pub class_id: Option<ClassId>,
    pub table_id: Option<TableId>,
    pub class_name: Option<String>,
    pub annotations: OrderedMap<String, Value>,
    pub edge_class_ids: Vec<ClassId>,
    pub links: EdgeLinks,
}

impl ClassOptions {
    /// Creates options for a class of the given type.
    pub fn new(class_type: ClassType) -> Self {
        Self {
            class_type: Some(class_type),
            ..Self::default()
        }
    }

    /// Creates options for an edge class over `table_id`.
    pub fn edge(table_id: TableId, links: EdgeLinks) -> Self {
        Self::new(ClassType::Edge)
            .with_table_id(table_id)
            .with_links(links)
    }

    pub fn with_table_id(mut self, table_id: TableId) -> Self {
        self.table_id = Some(table_id);
        self
    }

    pub fn with_class_id(mut self, class_id: ClassId) -> Self {
        self.class_id = Some(class_id);
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_links(mut self, links: EdgeLinks) -> Self {
        self.links = links;
        self
    }

    pub fn with_edge_class_ids(mut self, ids: impl IntoIterator<Item = ClassId>) -> Self {
        self.edge_class_ids = ids.into_iter().collect();
        self
    }
}

/// Operations shared by every class variant.
pub trait Class {
    fn model(&self) -> &Model;

    fn class_id(&self) -> ClassId;

    /// Returns the registry spec.
    fn spec(&self) -> Result<ClassSpec> {
        self.model().class_spec(self.class_id())
    }

    fn class_type(&self) -> Result<ClassType> {
        Ok(self.spec()?.kind.class_type())
    }

    fn table_id(&self) -> Result<TableId> {
        Ok(self.spec()?.table_id)
    }

    /// Returns the wrapped table.
    fn table(&self) -> Result<Rc<Table>> {
        self.model().table(self.table_id()?)
    }

    /// Returns the custom name, or the table's name.
    fn class_name(&self) -> Result<String> {
        let spec = self.spec()?;
        match spec.class_name {
            Some(name) => Ok(name),
            None => Ok(self.model().table(spec.table_id)?.name()),
        }
    }

    fn has_custom_name(&self) -> Result<bool> {
        Ok(self.spec()?.class_name.is_some())
    }

    fn set_class_name(&self, name: Option<String>) -> Result<()> {
        self.model().update_class(self.class_id(), |spec| {
            spec.class_name = name;
            Ok(())
        })?;
        self.model().touch();
        Ok(())
    }

    fn annotations(&self) -> Result<OrderedMap<String, Value>> {
        Ok(self.spec()?.annotations)
    }

    fn annotate(&self, key: &str, value: Value) -> Result<()> {
        self.model().update_class(self.class_id(), |spec| {
            spec.annotations.insert(key.to_string(), value);
            Ok(())
        })?;
        self.model().touch();
        Ok(())
    }

    fn delete_annotation(&self, key: &str) -> Result<()> {
        self.model().update_class(self.class_id(), |spec| {
            spec.annotations.shift_remove(key);
            Ok(())
        })?;
        self.model().touch();
        Ok(())
    }

    /// Returns the class's table, or that table aggregated by `attribute`.
    fn get_hash_table(&self, attribute: Option<&str>) -> Result<Rc<Table>> {
        let table = self.table()?;
        match attribute {
            Some(attribute) => table.aggregate(attribute),
            None => Ok(table),
        }
    }

    /// Wraps a table derived from this class's table in a new class of the
    /// same type.
    fn derive_class(&self, table: &Rc<Table>) -> Result<ClassHandle> {
        self.model()
            .create_class(ClassOptions::new(self.class_type()?).with_table_id(table.id()))
    }

    fn aggregate(&self, attribute: &str) -> Result<ClassHandle> {
        let table = self.table()?.aggregate(attribute)?;
        self.derive_class(&table)
    }

    fn expand(&self, attribute: &str, delimiter: &str) -> Result<ClassHandle> {
        let table = self.table()?.expand(attribute, delimiter)?;
        self.derive_class(&table)
    }

    fn closed_facet(&self, attribute: &str, values: Vec<Value>) -> Result<Vec<ClassHandle>> {
        self.table()?
            .closed_facet(attribute, values)?
            .iter()
            .map(|table| self.derive_class(table))
            .collect()
    }

    fn open_facet(&self, attribute: &str, limit: Option<usize>) -> LocalBoxStream<'static, Result<ClassHandle>> {
        match (self.table(), self.class_type()) {
            (Ok(table), Ok(class_type)) => {
                let model = self.model().clone();
                table
                    .open_facet(attribute, limit)
                    .and_then(move |table| {
                        future::ready(model.create_class(ClassOptions::new(class_type).with_table_id(table.id())))
                    })
                    .boxed_local()
            }
            (Err(err), _) | (_, Err(err)) => futures::stream::once(future::ready(Err(err))).boxed_local(),
        }
    }

    fn closed_transpose(&self, indexes: Vec<ItemIndex>) -> Result<Vec<ClassHandle>> {
        self.table()?
            .closed_transpose(indexes)?
            .iter()
            .map(|table| self.derive_class(table))
            .collect()
    }

    fn open_transpose(&self, limit: Option<usize>) -> LocalBoxStream<'static, Result<ClassHandle>> {
        match (self.table(), self.class_type()) {
            (Ok(table), Ok(class_type)) => {
                let model = self.model().clone();
                table
                    .open_transpose(limit)
                    .and_then(move |table| {
                        future::ready(model.create_class(ClassOptions::new(class_type).with_table_id(table.id())))
                    })
                    .boxed_local()
            }
            (Err(err), _) | (_, Err(err)) => futures::stream::once(future::ready(Err(err))).boxed_local(),
        }
    }

    /// Joins this class's table with the tables of `others`.
    fn connect_to(&self, others: &[ClassHandle]) -> Result<ClassHandle> {
        let tables = others
            .iter()
            .map(|other| other.table())
            .collect::<Result<Vec<_>>>()?;
        let table = self.table()?.connect(&tables)?;
        self.derive_class(&table)
    }

    /// Removes the class from the registry, unwiring it first.
    fn delete(&self) -> Result<()>;

    fn interpret_as_generic(&self) -> Result<GenericClass>;

    fn interpret_as_nodes(&self) -> Result<NodeClass>;

    fn interpret_as_edges(&self) -> Result<EdgeClass>;
}

/// Any class, as returned by the model registry.
#[derive(Clone, Debug)]
pub enum ClassHandle {
    Generic(GenericClass),
    Node(NodeClass),
    Edge(EdgeClass),
}

impl ClassHandle {
    pub(crate) fn from_kind(model: Model, class_id: ClassId, kind: &ClassKind) -> Self {
        match kind {
            ClassKind::Generic => ClassHandle::Generic(GenericClass::new(model, class_id)),
            ClassKind::Node { .. } => ClassHandle::Node(NodeClass::new(model, class_id)),
            ClassKind::Edge(_) => ClassHandle::Edge(EdgeClass::new(model, class_id)),
        }
    }

    fn inner(&self) -> &dyn Class {
        match self {
            ClassHandle::Generic(class) => class,
            ClassHandle::Node(class) => class,
            ClassHandle::Edge(class) => class,
        }
    }

    pub fn as_node(&self) -> Option<&NodeClass> {
        match self {
            ClassHandle::Node(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&EdgeClass> {
        match self {
            ClassHandle::Edge(class) => Some(class),
            _ => None,
        }
    }

    pub fn into_generic(self) -> Result<GenericClass> {
        let id = self.class_id();
        match self {
            ClassHandle::Generic(class) => Ok(class),
            _ => Err(Error::ClassKind {
                id,
                expected: ClassType::Generic.type_name(),
            }),
        }
    }

    pub fn into_node(self) -> Result<NodeClass> {
        let id = self.class_id();
        match self {
            ClassHandle::Node(class) => Ok(class),
            _ => Err(Error::ClassKind {
                id,
                expected: ClassType::Node.type_name(),
            }),
        }
    }

    pub fn into_edge(self) -> Result<EdgeClass> {
        let id = self.class_id();
        match self {
            ClassHandle::Edge(class) => Ok(class),
            _ => Err(Error::ClassKind {
                id,
                expected: ClassType::Edge.type_name(),
            }),
        }
    }
}

impl Class for ClassHandle {
    fn model(&self) -> &Model {
        self.inner().model()
    }

    fn class_id(&self) -> ClassId {
        self.inner().class_id()
    }

    fn delete(&self) -> Result<()> {
        self.inner().delete()
    }

    fn interpret_as_generic(&self) -> Result<GenericClass> {
        self.inner().interpret_as_generic()
    }

    fn interpret_as_nodes(&self) -> Result<NodeClass> {
        self.inner().interpret_as_nodes()
    }

    fn interpret_as_edges(&self) -> Result<EdgeClass> {
        self.inner().interpret_as_edges()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parse() {
        assert_eq!("source".parse::<Side>().unwrap(), Side::Source);
        assert_eq!("target".parse::<Side>().unwrap(), Side::Target);
        assert!(matches!(
            "middle".parse::<Side>(),
            Err(Error::InvalidSide { side }) if side == "middle"
        ));
        assert_eq!(Side::Source.opposite(), Side::Target);
    }

    #[test]
    fn test_edge_links_sides() {
        let mut links = EdgeLinks::default();
        links.set(Side::Source, Some(3), vec![7, 8]);
        links.set(Side::Target, Some(4), vec![]);

        assert_eq!(links.class_id(Side::Source), Some(3));
        assert_eq!(links.table_ids(Side::Source), &[7, 8]);
        assert_eq!(links.side_of(4), Some(Side::Target));
        assert_eq!(links.side_of(9), None);
        assert!(links.uses_table(8));
        assert!(!links.uses_table(1));
    }

    #[test]
    fn test_spec_references_table() {
        let spec = ClassSpec {
            class_id: 1,
            table_id: 2,
            class_name: None,
            annotations: OrderedMap::default(),
            kind: ClassKind::Edge(EdgeLinks {
                source_table_ids: vec![5],
                ..EdgeLinks::default()
            }),
        };
        assert!(spec.references_table(2));
        assert!(spec.references_table(5));
        assert!(!spec.references_table(6));
    }
}
