//! Graph views over items.
//!
//! `NodeWrapper` and `EdgeWrapper` pair an item with the class that
//! interprets it. Finding an edge's nodes (or a node's edges) means walking
//! the item connections through the chain of intermediate tables recorded
//! on the edge class, after making sure each of those tables is cached.

use crate::class::{Class, EdgeClass, NodeClass, Side};
use crate::item::ItemRef;
use crate::model::Model;
use futures::future::try_join_all;
use futures::stream::{self, LocalBoxStream};
use futures::{StreamExt, TryFutureExt, TryStreamExt};
use reshape_core::{Error, Result, Row, TableId};
use std::cell::Ref;

/// Yields the items reachable from `item` by stepping through `table_ids`
/// in order, one connection hop per table. Each table is fully cached first.
pub fn iterate_across_connections(
    model: &Model,
    item: &ItemRef,
    table_ids: Vec<TableId>,
    limit: Option<usize>,
) -> LocalBoxStream<'static, Result<ItemRef>> {
    let reached = reachable(model.clone(), item.clone(), table_ids)
        .map_ok(|found| stream::iter(found.into_iter().map(Ok::<ItemRef, Error>)))
        .try_flatten_stream();
    match limit {
        Some(limit) => reached.take(limit).boxed_local(),
        None => reached.boxed_local(),
    }
}

async fn reachable(model: Model, item: ItemRef, table_ids: Vec<TableId>) -> Result<Vec<ItemRef>> {
    let tables = table_ids
        .iter()
        .map(|id| model.table(*id))
        .collect::<Result<Vec<_>>>()?;
    try_join_all(tables.iter().map(|table| table.build_cache())).await?;
    let mut found = Vec::new();
    walk(&item, &table_ids, &mut found);
    Ok(found)
}

fn walk(item: &ItemRef, table_ids: &[TableId], found: &mut Vec<ItemRef>) {
    let Some((next, rest)) = table_ids.split_first() else {
        return;
    };
    for connected in item.connected_items(*next) {
        if rest.is_empty() {
            found.push(connected);
        } else {
            walk(&connected, rest, found);
        }
    }
}

/// An item viewed as a graph node.
#[derive(Clone, Debug)]
pub struct NodeWrapper {
    item: ItemRef,
    class: NodeClass,
}

impl NodeWrapper {
    pub(crate) fn new(item: ItemRef, class: NodeClass) -> Self {
        Self { item, class }
    }

    pub fn item(&self) -> &ItemRef {
        &self.item
    }

    pub fn class(&self) -> &NodeClass {
        &self.class
    }

    pub fn row(&self) -> Ref<'_, Row> {
        self.item.row()
    }

    /// Streams the edges incident to this node, across every edge class.
    pub fn edges(&self, limit: Option<usize>) -> LocalBoxStream<'static, Result<EdgeWrapper>> {
        let edges = incident_edges(self.clone()).try_flatten_stream();
        match limit {
            Some(limit) => edges.take(limit).boxed_local(),
            None => edges.boxed_local(),
        }
    }
}

/// An item viewed as a graph edge.
#[derive(Clone, Debug)]
pub struct EdgeWrapper {
    item: ItemRef,
    class: EdgeClass,
}

impl EdgeWrapper {
    pub(crate) fn new(item: ItemRef, class: EdgeClass) -> Self {
        Self { item, class }
    }

    pub fn item(&self) -> &ItemRef {
        &self.item
    }

    pub fn class(&self) -> &EdgeClass {
        &self.class
    }

    pub fn row(&self) -> Ref<'_, Row> {
        self.item.row()
    }

    pub fn source_nodes(&self, limit: Option<usize>) -> LocalBoxStream<'static, Result<NodeWrapper>> {
        self.side_nodes(Side::Source, limit)
    }

    pub fn target_nodes(&self, limit: Option<usize>) -> LocalBoxStream<'static, Result<NodeWrapper>> {
        self.side_nodes(Side::Target, limit)
    }

    /// Source nodes followed by target nodes.
    pub fn nodes(&self, limit: Option<usize>) -> LocalBoxStream<'static, Result<NodeWrapper>> {
        let nodes = self
            .side_nodes(Side::Source, None)
            .chain(self.side_nodes(Side::Target, None));
        match limit {
            Some(limit) => nodes.take(limit).boxed_local(),
            None => nodes.boxed_local(),
        }
    }

    fn side_nodes(&self, side: Side, limit: Option<usize>) -> LocalBoxStream<'static, Result<NodeWrapper>> {
        side_node_stream(self.clone(), side, limit)
            .try_flatten_stream()
            .boxed_local()
    }
}

type EdgeStream = LocalBoxStream<'static, Result<EdgeWrapper>>;
type NodeStream = LocalBoxStream<'static, Result<NodeWrapper>>;

async fn incident_edges(node: NodeWrapper) -> Result<EdgeStream> {
    let model = node.class.model().clone();
    let node_id = node.class.class_id();
    let mut streams = Vec::new();
    for edge in node.class.edge_classes()? {
        let links = edge.links()?;
        let side = links.side_of(node_id).unwrap_or(Side::Source);
        let mut chain: Vec<TableId> = links.table_ids(side).iter().rev().copied().collect();
        chain.push(edge.table_id()?);
        streams.push(
            iterate_across_connections(&model, &node.item, chain, None)
                .map_ok(move |item| EdgeWrapper::new(item, edge.clone()))
                .boxed_local(),
        );
    }
    Ok(stream::iter(streams).flatten().boxed_local())
}

async fn side_node_stream(edge: EdgeWrapper, side: Side, limit: Option<usize>) -> Result<NodeStream> {
    let links = edge.class.links()?;
    let Some(node_id) = links.class_id(side) else {
        return Ok(stream::empty().boxed_local());
    };
    let model = edge.class.model().clone();
    let node = model.class(node_id)?.into_node()?;
    let mut chain = links.table_ids(side).to_vec();
    chain.push(node.table_id()?);
    Ok(iterate_across_connections(&model, &edge.item, chain, limit)
        .map_ok(move |item| NodeWrapper::new(item, node.clone()))
        .boxed_local())
}
