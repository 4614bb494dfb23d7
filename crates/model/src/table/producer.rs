//! Per-variant item producers.
//!
//! A producer is advanced one step at a time by whichever consumer holds the
//! build's producer lock. Each step yields at most one finished item.

use super::build::{Build, CacheMap, IterateOptions};
use super::options::{TableKind, TableType};
use super::Table;
use crate::event::TableEvent;
use crate::item::{Item, ItemRef};
use futures::stream::LocalBoxStream;
use futures::{stream, StreamExt};
use reshape_core::{ItemIndex, OrderedMap, Result, Row, Value};
use reshape_index::{HashIndex, Index};
use std::collections::VecDeque;
use std::rc::Rc;
use std::slice;

type ItemStream = LocalBoxStream<'static, Result<ItemRef>>;

/// Outcome of one producer step.
pub(crate) enum Step {
    /// A finished item that passed every filter.
    Yield(ItemRef),
    /// Progress was made but nothing new is visible (a rejected item or a
    /// merge into an existing aggregate).
    Skip,
    /// The producer is exhausted.
    Done,
    /// The build was cancelled while the step was waiting.
    Cancelled,
}

/// How one parent item turns into zero or more child items.
pub(crate) enum SpawnRule {
    Split { attribute: String, delimiter: String },
    Facet { attribute: String, value: Value },
}

impl SpawnRule {
    fn spawn(
        &self,
        table: &Rc<Table>,
        parent: &ItemRef,
        counter: &mut usize,
        pending: &mut VecDeque<ItemRef>,
    ) {
        match self {
            SpawnRule::Split {
                attribute,
                delimiter,
            } => {
                let text = match parent.get(attribute) {
                    Value::Null => String::new(),
                    Value::String(s) => s,
                    other => other.to_key_string(),
                };
                for token in text.split(delimiter.as_str()) {
                    let row = Row::with(attribute.clone(), token);
                    let item = Item::wrap(ItemIndex::from(*counter), table, row, slice::from_ref(parent));
                    *counter += 1;
                    pending.push_back(item);
                }
            }
            SpawnRule::Facet { attribute, value } => {
                if parent.get(attribute).to_key_string() == value.to_key_string() {
                    let row = parent.row().clone();
                    let item = Item::wrap(ItemIndex::from(*counter), table, row, slice::from_ref(parent));
                    *counter += 1;
                    pending.push_back(item);
                }
            }
        }
    }
}

pub(crate) struct Join {
    caches: Vec<Rc<CacheMap>>,
    keys: Vec<ItemIndex>,
    position: usize,
}

pub(crate) enum Producer {
    Rows {
        rows: Rc<Vec<Row>>,
        position: usize,
    },
    Keyed {
        rows: Rc<OrderedMap<String, Row>>,
        position: usize,
    },
    Spawning {
        rule: SpawnRule,
        feed: Option<ItemStream>,
        pending: VecDeque<ItemRef>,
        counter: usize,
    },
    Aggregating {
        attribute: String,
        feed: Option<ItemStream>,
        groups: HashIndex<String>,
    },
    Transposing {
        index: ItemIndex,
        pending: Option<VecDeque<ItemRef>>,
    },
    Joining {
        join: Option<Join>,
    },
}

impl Producer {
    /// Creates the producer for a table variant.
    pub(crate) fn for_kind(kind: &TableKind) -> Self {
        match kind {
            TableKind::Static { rows, .. } => Producer::Rows {
                rows: rows.clone(),
                position: 0,
            },
            TableKind::StaticDict { rows, .. } => Producer::Keyed {
                rows: rows.clone(),
                position: 0,
            },
            TableKind::Expanded {
                attribute,
                delimiter,
            } => Producer::spawning(SpawnRule::Split {
                attribute: attribute.clone(),
                delimiter: delimiter.clone(),
            }),
            TableKind::Faceted { attribute, value } => Producer::spawning(SpawnRule::Facet {
                attribute: attribute.clone(),
                value: value.clone(),
            }),
            TableKind::Aggregated { attribute } => Producer::Aggregating {
                attribute: attribute.clone(),
                feed: None,
                groups: HashIndex::new(true),
            },
            TableKind::Transposed { index } => Producer::Transposing {
                index: index.clone(),
                pending: None,
            },
            TableKind::Connected => Producer::Joining { join: None },
        }
    }

    fn spawning(rule: SpawnRule) -> Self {
        Producer::Spawning {
            rule,
            feed: None,
            pending: VecDeque::new(),
            counter: 0,
        }
    }

    /// Advances the producer by one step.
    pub(crate) async fn step(&mut self, table: &Rc<Table>, build: &Build) -> Result<Step> {
        match self {
            Producer::Rows { rows, position } => {
                let Some(row) = rows.get(*position).cloned() else {
                    return Ok(Step::Done);
                };
                let item = Item::wrap(ItemIndex::from(*position), table, row, &[]);
                *position += 1;
                finish(table, item).await
            }
            Producer::Keyed { rows, position } => {
                let Some((key, row)) = rows.get_index(*position) else {
                    return Ok(Step::Done);
                };
                let item = Item::wrap(ItemIndex::from(key.as_str()), table, row.clone(), &[]);
                *position += 1;
                finish(table, item).await
            }
            Producer::Spawning {
                rule,
                feed,
                pending,
                counter,
            } => loop {
                if let Some(item) = pending.pop_front() {
                    return finish(table, item).await;
                }
                let parent_item = match parent_feed(feed, table).await?.next().await {
                    None => return Ok(Step::Done),
                    Some(item) => item?,
                };
                if build.token.is_cancelled() {
                    return Ok(Step::Cancelled);
                }
                rule.spawn(table, &parent_item, counter, pending);
            },
            Producer::Aggregating {
                attribute,
                feed,
                groups,
            } => {
                let parent_item = match parent_feed(feed, table).await?.next().await {
                    None => {
                        finalize_aggregates(table, build).await?;
                        return Ok(Step::Done);
                    }
                    Some(item) => item?,
                };
                if build.token.is_cancelled() {
                    return Ok(Step::Cancelled);
                }

                let value = parent_item.get(attribute);
                let key = value.to_key_string();
                let existing = groups
                    .get_first(&key)
                    .and_then(|index| build.partial_get(index));
                if let Some(aggregate) = existing {
                    aggregate.connect_item(&parent_item);
                    table.update_item(&aggregate, &parent_item)?;
                    table.events.emit(TableEvent::Update {
                        table_id: table.id(),
                        index: aggregate.index().clone(),
                    });
                    return Ok(Step::Skip);
                }

                let row = Row::with(attribute.clone(), value);
                let aggregate = Item::wrap(
                    ItemIndex::from(key.clone()),
                    table,
                    row,
                    slice::from_ref(&parent_item),
                );
                table.update_item(&aggregate, &parent_item)?;
                groups.set(key, aggregate.index().clone());
                Ok(Step::Yield(aggregate))
            }
            Producer::Transposing { index, pending } => {
                if pending.is_none() {
                    let source = table.parent_table()?.get_item(index).await?;
                    if build.token.is_cancelled() {
                        return Ok(Step::Cancelled);
                    }
                    *pending = Some(transpose(table, source));
                }
                match pending.as_mut().and_then(VecDeque::pop_front) {
                    Some(item) => finish(table, item).await,
                    None => Ok(Step::Done),
                }
            }
            Producer::Joining { join } => {
                if join.is_none() {
                    let parents = table.parent_tables()?;
                    let mut caches = Vec::with_capacity(parents.len());
                    for parent in &parents {
                        caches.push(parent.build_cache().await?);
                        if build.token.is_cancelled() {
                            return Ok(Step::Cancelled);
                        }
                    }
                    let keys = match caches.split_first() {
                        Some((first, rest)) => first
                            .keys()
                            .filter(|key| rest.iter().all(|cache| cache.contains_key(*key)))
                            .cloned()
                            .collect(),
                        None => Vec::new(),
                    };
                    *join = Some(Join {
                        caches,
                        keys,
                        position: 0,
                    });
                }
                let Some(join) = join.as_mut() else {
                    return Ok(Step::Done);
                };
                let Some(index) = join.keys.get(join.position).cloned() else {
                    return Ok(Step::Done);
                };
                join.position += 1;
                let matched: Vec<ItemRef> = join
                    .caches
                    .iter()
                    .filter_map(|cache| cache.get(&index).cloned())
                    .collect();
                finish(table, Item::wrap(index, table, Row::new(), &matched)).await
            }
        }
    }
}

async fn finish(table: &Rc<Table>, item: ItemRef) -> Result<Step> {
    if table.finish_item(&item).await? {
        Ok(Step::Yield(item))
    } else {
        Ok(Step::Skip)
    }
}

/// Opens the parent stream on first use. Aggregates stay provisional until
/// their parent is exhausted, so an aggregated parent is read from its
/// complete cache instead.
async fn parent_feed<'a>(feed: &'a mut Option<ItemStream>, table: &Rc<Table>) -> Result<&'a mut ItemStream> {
    let stream = match feed.take() {
        Some(stream) => stream,
        None => {
            let parent = table.parent_table()?;
            if parent.table_type() == TableType::Aggregated {
                let cache = parent.build_cache().await?;
                let items: Vec<Result<ItemRef>> = cache.values().cloned().map(Ok).collect();
                stream::iter(items).boxed_local()
            } else {
                parent.iterate(IterateOptions::default())
            }
        }
    };
    Ok(feed.insert(stream))
}

/// One item per attribute of the source row; nested records become the row.
fn transpose(table: &Rc<Table>, source: Option<ItemRef>) -> VecDeque<ItemRef> {
    let Some(source) = source else {
        return VecDeque::new();
    };
    let entries: Vec<(String, Value)> = source
        .row()
        .iter()
        .map(|(attribute, value)| (attribute.to_string(), value.clone()))
        .collect();
    entries
        .into_iter()
        .map(|(attribute, value)| {
            let row = match value {
                Value::Record(row) => row,
                other => Row::with("value", other),
            };
            Item::wrap(ItemIndex::from(attribute), table, row, slice::from_ref(&source))
        })
        .collect()
}

/// Runs the finish phase over every provisional aggregate once the parent
/// is exhausted, dropping the rejected ones from the cache.
async fn finalize_aggregates(table: &Rc<Table>, build: &Build) -> Result<()> {
    for aggregate in build.partial_items() {
        if !table.finish_item(&aggregate).await? {
            build.reject(aggregate.index());
        }
        if build.token.is_cancelled() {
            break;
        }
    }
    Ok(())
}
