//! Node classes.

use super::{Class, ClassKind, ClassOptions, EdgeClass, EdgeLinks, GenericClass, Side};
use crate::model::Model;
use crate::table::IterateOptions;
use crate::wrapper::NodeWrapper;
use futures::stream::{self, LocalBoxStream};
use futures::{future, StreamExt, TryStreamExt};
use reshape_core::{ClassId, Error, Result, TableId};
use std::slice;
use tracing::debug;

/// A class whose items are graph nodes.
#[derive(Clone, Debug)]
pub struct NodeClass {
    model: Model,
    class_id: ClassId,
}

impl NodeClass {
    pub(crate) fn new(model: Model, class_id: ClassId) -> Self {
        Self { model, class_id }
    }

    /// Ids of the edge classes attached to this node class.
    pub fn edge_class_ids(&self) -> Result<Vec<ClassId>> {
        match self.spec()?.kind {
            ClassKind::Node { edge_class_ids } => Ok(edge_class_ids.into_iter().collect()),
            _ => Err(Error::ClassKind {
                id: self.class_id,
                expected: "NodeClass",
            }),
        }
    }

    pub fn edge_classes(&self) -> Result<Vec<EdgeClass>> {
        self.edge_class_ids()?
            .into_iter()
            .map(|id| self.model.class(id)?.into_edge())
            .collect()
    }

    /// Creates an edge class joining this node class to `other`.
    ///
    /// Each side matches on its class's table, or on that table aggregated
    /// by the given attribute.
    pub fn connect_to_node_class(
        &self,
        other: &NodeClass,
        attribute: Option<&str>,
        other_attribute: Option<&str>,
    ) -> Result<EdgeClass> {
        let this_hash = self.get_hash_table(attribute)?;
        let other_hash = other.get_hash_table(other_attribute)?;
        let joined = this_hash.connect(slice::from_ref(&other_hash))?;

        let links = EdgeLinks {
            source_class_id: Some(self.class_id),
            source_table_ids: attribute.map(|_| vec![this_hash.id()]).unwrap_or_default(),
            target_class_id: Some(other.class_id),
            target_table_ids: other_attribute
                .map(|_| vec![other_hash.id()])
                .unwrap_or_default(),
            ..EdgeLinks::default()
        };
        let edge = self
            .model
            .create_class(ClassOptions::edge(joined.id(), links))?
            .into_edge()?;
        add_edge(&self.model, self.class_id, edge.class_id())?;
        add_edge(&self.model, other.class_id, edge.class_id())?;
        debug!(
            source = self.class_id,
            target = other.class_id,
            edge = edge.class_id(),
            "connected node classes"
        );
        self.model.touch();
        Ok(edge)
    }

    /// Attaches an existing edge class on the given side.
    pub fn connect_to_edge_class(
        &self,
        edge: &EdgeClass,
        side: Side,
        node_attribute: Option<&str>,
        edge_attribute: Option<&str>,
    ) -> Result<()> {
        edge.connect_to_node_class(self, side, node_attribute, edge_attribute)
    }

    /// Detaches every incident edge class.
    pub fn disconnect_all_edges(&self) -> Result<()> {
        for edge in self.edge_classes()? {
            let links = edge.links()?;
            if links.source_class_id == Some(self.class_id) {
                edge.disconnect_source()?;
            }
            if links.target_class_id == Some(self.class_id) {
                edge.disconnect_target()?;
            }
        }
        self.model.update_class(self.class_id, |spec| {
            spec.edge_class_ids_mut()?.clear();
            Ok(())
        })?;
        self.model.touch();
        Ok(())
    }

    /// Streams this class's items as node wrappers.
    pub fn nodes(&self, limit: Option<usize>) -> LocalBoxStream<'static, Result<NodeWrapper>> {
        match self.table() {
            Ok(table) => {
                let class = self.clone();
                table
                    .iterate(IterateOptions { limit, reset: false })
                    .map_ok(move |item| NodeWrapper::new(item, class.clone()))
                    .boxed_local()
            }
            Err(err) => stream::once(future::ready(Err(err))).boxed_local(),
        }
    }
}

impl Class for NodeClass {
    fn model(&self) -> &Model {
        &self.model
    }

    fn class_id(&self) -> ClassId {
        self.class_id
    }

    fn delete(&self) -> Result<()> {
        self.disconnect_all_edges()?;
        self.model.remove_class(self.class_id)
    }

    fn interpret_as_generic(&self) -> Result<GenericClass> {
        self.disconnect_all_edges()?;
        self.model.reinterpret_class(self.class_id, ClassKind::Generic)?;
        Ok(GenericClass::new(self.model.clone(), self.class_id))
    }

    fn interpret_as_nodes(&self) -> Result<NodeClass> {
        Ok(self.clone())
    }

    /// Turns this node class into an edge class between its neighbours.
    ///
    /// With one incident edge the result is a self-edge on the far node;
    /// with two it joins both far nodes, directed only when both old edges
    /// were directed through this node the same way. Any other count floats
    /// a disconnected edge. Old edge classes are deleted.
    fn interpret_as_edges(&self) -> Result<EdgeClass> {
        let id = self.class_id;
        let edges = self.edge_classes()?;
        let mut links = EdgeLinks::default();

        match edges.as_slice() {
            [edge] => {
                let old = edge.links()?;
                let (far, chain) = chain_through(&old, edge.table_id()?, id);
                links.source_class_id = far;
                links.target_class_id = far;
                links.source_table_ids = chain.clone();
                links.target_table_ids = chain;
                links.directed = old.directed;
                edge.delete()?;
            }
            [first, second] => {
                let mut pair = [
                    (first.links()?, first.table_id()?),
                    (second.links()?, second.table_id()?),
                ];
                let (a, b) = (&pair[0].0, &pair[1].0);
                let mut directed = false;
                if a.directed && b.directed {
                    if a.target_class_id == Some(id) && b.source_class_id == Some(id) {
                        directed = true;
                    } else if a.source_class_id == Some(id) && b.target_class_id == Some(id) {
                        directed = true;
                        pair.swap(0, 1);
                    }
                }
                let (source, source_chain) = chain_through(&pair[0].0, pair[0].1, id);
                let (target, target_chain) = chain_through(&pair[1].0, pair[1].1, id);
                links = EdgeLinks {
                    source_class_id: source,
                    source_table_ids: source_chain,
                    target_class_id: target,
                    target_table_ids: target_chain,
                    directed,
                    swapped_direction: false,
                };
                first.delete()?;
                second.delete()?;
            }
            _ => self.disconnect_all_edges()?,
        }

        self.model
            .reinterpret_class(id, ClassKind::Edge(links.clone()))?;
        let mut neighbours = vec![links.source_class_id, links.target_class_id];
        neighbours.dedup();
        for neighbour in neighbours.into_iter().flatten() {
            if neighbour != id {
                add_edge(&self.model, neighbour, id)?;
            }
        }
        debug!(class_id = id, old_edges = edges.len(), "node class reinterpreted as edges");
        self.model.touch();
        Ok(EdgeClass::new(self.model.clone(), id))
    }
}

/// Registers `edge_id` with a node class.
pub(crate) fn add_edge(model: &Model, node_id: ClassId, edge_id: ClassId) -> Result<()> {
    model.update_class(node_id, |spec| {
        spec.edge_class_ids_mut()?.insert(edge_id);
        Ok(())
    })
}

/// Walks an existing edge outward from `node_id`: back along the node's own
/// side chain, through the edge table, then out along the far side chain.
/// Returns the far node class and the table ids in walking order.
fn chain_through(links: &EdgeLinks, edge_table_id: TableId, node_id: ClassId) -> (Option<ClassId>, Vec<TableId>) {
    let near = if links.source_class_id == Some(node_id) {
        Side::Source
    } else {
        Side::Target
    };
    let far = near.opposite();
    let mut chain: Vec<TableId> = links.table_ids(near).iter().rev().copied().collect();
    chain.push(edge_table_id);
    chain.extend_from_slice(links.table_ids(far));
    (links.class_id(far), chain)
}
