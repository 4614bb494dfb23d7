//! Edge classes.

use super::node::add_edge;
use super::{Class, ClassKind, ClassOptions, EdgeLinks, GenericClass, NodeClass, Side};
use crate::model::Model;
use crate::table::{IterateOptions, Table};
use crate::wrapper::EdgeWrapper;
use futures::stream::{self, LocalBoxStream};
use futures::{future, StreamExt, TryStreamExt};
use reshape_core::{ClassId, Error, Result, TableId};
use std::rc::Rc;
use std::slice;
use tracing::debug;

/// A class whose items are graph edges.
#[derive(Clone, Debug)]
pub struct EdgeClass {
    model: Model,
    class_id: ClassId,
}

impl EdgeClass {
    pub(crate) fn new(model: Model, class_id: ClassId) -> Self {
        Self { model, class_id }
    }

    /// Returns the current wiring.
    pub fn links(&self) -> Result<EdgeLinks> {
        match self.spec()?.kind {
            ClassKind::Edge(links) => Ok(links),
            _ => Err(Error::ClassKind {
                id: self.class_id,
                expected: "EdgeClass",
            }),
        }
    }

    pub fn is_directed(&self) -> Result<bool> {
        Ok(self.links()?.directed)
    }

    pub fn source_class(&self) -> Result<Option<NodeClass>> {
        self.side_class(Side::Source)
    }

    pub fn target_class(&self) -> Result<Option<NodeClass>> {
        self.side_class(Side::Target)
    }

    fn side_class(&self, side: Side) -> Result<Option<NodeClass>> {
        match self.links()?.class_id(side) {
            Some(id) => Ok(Some(self.model.class(id)?.into_node()?)),
            None => Ok(None),
        }
    }

    pub fn connect_source(
        &self,
        node: &NodeClass,
        node_attribute: Option<&str>,
        edge_attribute: Option<&str>,
    ) -> Result<()> {
        self.connect_to_node_class(node, Side::Source, node_attribute, edge_attribute)
    }

    pub fn connect_target(
        &self,
        node: &NodeClass,
        node_attribute: Option<&str>,
        edge_attribute: Option<&str>,
    ) -> Result<()> {
        self.connect_to_node_class(node, Side::Target, node_attribute, edge_attribute)
    }

    /// Attaches `node` on `side`, replacing whatever was attached there.
    ///
    /// The edge's hash table is joined with the node's hash table; the side
    /// chain is the join table, preceded by the edge's aggregated table and
    /// followed by the node's aggregated table when attributes are given.
    pub fn connect_to_node_class(
        &self,
        node: &NodeClass,
        side: Side,
        node_attribute: Option<&str>,
        edge_attribute: Option<&str>,
    ) -> Result<()> {
        if self.links()?.class_id(side).is_some() {
            self.disconnect_side(side)?;
        }
        let edge_hash = self.get_hash_table(edge_attribute)?;
        let node_hash = node.get_hash_table(node_attribute)?;
        let joined = edge_hash.connect(slice::from_ref(&node_hash))?;

        let mut chain = vec![joined.id()];
        if edge_attribute.is_some() {
            chain.insert(0, edge_hash.id());
        }
        if node_attribute.is_some() {
            chain.push(node_hash.id());
        }

        let node_id = node.class_id();
        self.model.update_class(self.class_id, |spec| {
            spec.edge_links_mut()?.set(side, Some(node_id), chain);
            Ok(())
        })?;
        add_edge(&self.model, node_id, self.class_id)?;
        debug!(edge = self.class_id, node = node_id, %side, "connected edge class");
        self.model.touch();
        Ok(())
    }

    pub fn disconnect_source(&self) -> Result<()> {
        self.disconnect_side(Side::Source)
    }

    pub fn disconnect_target(&self) -> Result<()> {
        self.disconnect_side(Side::Target)
    }

    /// Clears one side on both ends of the link.
    fn disconnect_side(&self, side: Side) -> Result<()> {
        let links = self.links()?;
        if let Some(node_id) = links.class_id(side) {
            let still_attached = links.class_id(side.opposite()) == Some(node_id);
            if !still_attached && self.model.has_class(node_id) {
                self.model.update_class(node_id, |spec| {
                    if let ClassKind::Node { edge_class_ids } = &mut spec.kind {
                        edge_class_ids.shift_remove(&self.class_id);
                    }
                    Ok(())
                })?;
            }
        }
        self.model.update_class(self.class_id, |spec| {
            spec.edge_links_mut()?.set(side, None, Vec::new());
            Ok(())
        })?;
        self.model.touch();
        Ok(())
    }

    /// Changes direction without re-deriving any table.
    ///
    /// `Some(false)` makes the edge undirected. Otherwise an undirected edge
    /// becomes directed, and a directed edge has its ends swapped.
    pub fn toggle_direction(&self, directed: Option<bool>) -> Result<()> {
        self.model.update_class(self.class_id, |spec| {
            let links = spec.edge_links_mut()?;
            if directed == Some(false) {
                links.directed = false;
                links.swapped_direction = false;
            } else if !links.directed {
                links.directed = true;
            } else {
                std::mem::swap(&mut links.source_class_id, &mut links.target_class_id);
                std::mem::swap(&mut links.source_table_ids, &mut links.target_table_ids);
                links.swapped_direction = !links.swapped_direction;
            }
            Ok(())
        })?;
        self.model.touch();
        Ok(())
    }

    /// Streams this class's items as edge wrappers.
    pub fn edges(&self, limit: Option<usize>) -> LocalBoxStream<'static, Result<EdgeWrapper>> {
        match self.table() {
            Ok(table) => {
                let class = self.clone();
                table
                    .iterate(IterateOptions { limit, reset: false })
                    .map_ok(move |item| EdgeWrapper::new(item, class.clone()))
                    .boxed_local()
            }
            Err(err) => stream::once(future::ready(Err(err))).boxed_local(),
        }
    }

    /// Splits one side chain for `interpret_as_nodes`, creating a join when
    /// the chain is empty.
    fn split_side(&self, table: &Rc<Table>, chain: &[TableId], node_table: &Rc<Table>) -> Result<SplitChain> {
        if chain.is_empty() {
            let joined = table.connect(slice::from_ref(node_table))?;
            return Ok(SplitChain {
                edge_table_id: joined.id(),
                edge_table_ids: Vec::new(),
                node_table_ids: Vec::new(),
            });
        }
        let is_static = chain
            .iter()
            .map(|id| Ok(self.model.table(*id)?.table_type().is_static()))
            .collect::<Result<Vec<_>>>()?;
        let position = split_position(&is_static);
        Ok(SplitChain {
            edge_table_id: chain[position],
            edge_table_ids: chain[..position].iter().rev().copied().collect(),
            node_table_ids: chain[position + 1..].to_vec(),
        })
    }
}

/// One side chain cut in two around a new edge table.
struct SplitChain {
    edge_table_id: TableId,
    /// From the new edge table back toward the former edge table.
    edge_table_ids: Vec<TableId>,
    /// From the new edge table on toward the neighbour node table.
    node_table_ids: Vec<TableId>,
}

/// Picks where to cut a chain: the position closest to its centre, among
/// static tables when there are any. Ties go to the earlier position.
pub(crate) fn split_position(is_static: &[bool]) -> usize {
    let centre = (is_static.len() as f64 - 1.0) / 2.0;
    let any_static = is_static.iter().any(|s| *s);
    let mut best: Option<(usize, f64)> = None;
    for (position, stat) in is_static.iter().enumerate() {
        if any_static && !stat {
            continue;
        }
        let distance = (centre - position as f64).abs();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((position, distance));
        }
    }
    best.map(|(position, _)| position).unwrap_or(0)
}

impl Class for EdgeClass {
    fn model(&self) -> &Model {
        &self.model
    }

    fn class_id(&self) -> ClassId {
        self.class_id
    }

    fn delete(&self) -> Result<()> {
        self.disconnect_source()?;
        self.disconnect_target()?;
        self.model.remove_class(self.class_id)
    }

    fn interpret_as_generic(&self) -> Result<GenericClass> {
        self.disconnect_source()?;
        self.disconnect_target()?;
        self.model.reinterpret_class(self.class_id, ClassKind::Generic)?;
        Ok(GenericClass::new(self.model.clone(), self.class_id))
    }

    /// Turns this edge class into a node class, reconnecting each attached
    /// neighbour through a fresh edge class cut out of the old side chain.
    fn interpret_as_nodes(&self) -> Result<NodeClass> {
        let id = self.class_id;
        let links = self.links()?;
        let table = self.table()?;
        self.disconnect_source()?;
        self.disconnect_target()?;
        self.model.reinterpret_class(
            id,
            ClassKind::Node {
                edge_class_ids: Default::default(),
            },
        )?;

        if let Some(source_id) = links.source_class_id {
            let source_table = self.model.class(source_id)?.table()?;
            let split = self.split_side(&table, &links.source_table_ids, &source_table)?;
            let edge = self.model.create_class(ClassOptions::edge(
                split.edge_table_id,
                EdgeLinks {
                    source_class_id: Some(source_id),
                    source_table_ids: split.node_table_ids,
                    target_class_id: Some(id),
                    target_table_ids: split.edge_table_ids,
                    directed: links.directed,
                    swapped_direction: false,
                },
            ))?;
            add_edge(&self.model, source_id, edge.class_id())?;
            add_edge(&self.model, id, edge.class_id())?;
        }

        if let Some(target_id) = links.target_class_id {
            if links.source_class_id != Some(target_id) {
                let target_table = self.model.class(target_id)?.table()?;
                let split = self.split_side(&table, &links.target_table_ids, &target_table)?;
                let edge = self.model.create_class(ClassOptions::edge(
                    split.edge_table_id,
                    EdgeLinks {
                        source_class_id: Some(id),
                        source_table_ids: split.edge_table_ids,
                        target_class_id: Some(target_id),
                        target_table_ids: split.node_table_ids,
                        directed: links.directed,
                        swapped_direction: false,
                    },
                ))?;
                add_edge(&self.model, target_id, edge.class_id())?;
                add_edge(&self.model, id, edge.class_id())?;
            }
        }

        table.reset();
        debug!(class_id = id, "edge class reinterpreted as nodes");
        self.model.touch();
        Ok(NodeClass::new(self.model.clone(), id))
    }

    fn interpret_as_edges(&self) -> Result<EdgeClass> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_prefers_static_tables() {
        assert_eq!(split_position(&[false, false, true, false, false]), 2);
        assert_eq!(split_position(&[true, false, false, false, false]), 0);
        assert_eq!(split_position(&[false, false, false, false, true]), 4);
    }

    #[test]
    fn test_split_uses_chain_centre() {
        // Centre of a five-table chain is position 2.
        assert_eq!(split_position(&[false; 5]), 2);
        // An even chain has two positions equally close; the earlier wins.
        assert_eq!(split_position(&[false; 4]), 1);
        assert_eq!(split_position(&[false]), 0);
    }

    #[test]
    fn test_split_measures_from_centre_not_length() {
        let chain = [false, false, true, false, false, false, true];
        assert_eq!(split_position(&chain), 2);

        // Measuring distance from the chain length rather than its centre
        // favours the static table nearest the end, so a length-based rule
        // would cut at 6 instead.
        let by_length = chain
            .iter()
            .enumerate()
            .filter(|(_, stat)| **stat)
            .min_by_key(|(position, _)| chain.len().abs_diff(*position))
            .map(|(position, _)| position);
        assert_eq!(by_length, Some(6));
        assert_ne!(by_length, Some(split_position(&chain)));
    }

    #[test]
    fn test_split_ties_between_static_tables() {
        assert_eq!(split_position(&[true, false, true]), 0);
        assert_eq!(split_position(&[false, true, true, false]), 1);
    }
}
