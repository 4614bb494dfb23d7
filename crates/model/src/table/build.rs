//! Lazy iteration and cache building.
//!
//! A table's cache moves through `Empty -> Building -> Complete`, and back to
//! `Empty` on reset or on a failed build. While building, every consumer
//! shares one `Build`: finished items are appended to the build's log, and
//! whichever consumer runs out of logged items takes the producer lock and
//! advances the producer by one step. A consumer that stops early leaves the
//! build in progress for the next consumer to resume.

use super::options::TableType;
use super::producer::{Producer, Step};
use super::Table;
use crate::event::TableEvent;
use crate::item::ItemRef;
use futures::future::{self, LocalBoxFuture, Shared};
use futures::lock::Mutex;
use futures::stream::{self, LocalBoxStream};
use futures::{FutureExt, StreamExt, TryStreamExt};
use reshape_core::{Error, FunctionRef, ItemIndex, OrderedMap, OrderedSet, Result, TableId, Value};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// Complete cache: finished items keyed by index, in finish order.
pub type CacheMap = OrderedMap<ItemIndex, ItemRef>;

/// In-flight `build_cache` future shared by concurrent callers.
pub(crate) type PendingBuild = Shared<LocalBoxFuture<'static, Result<Rc<CacheMap>>>>;

/// Cooperative cancellation flag for one build.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    /// Creates an uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the token cancelled.
    pub fn cancel(&self) {
        self.0.set(true);
    }

    /// Returns true once cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

pub(crate) enum CacheState {
    Empty,
    Building(Rc<Build>),
    Complete(Rc<CacheMap>),
}

/// One in-progress cache build.
pub(crate) struct Build {
    pub(crate) token: CancelToken,
    log: RefCell<Vec<ItemRef>>,
    partial: RefCell<CacheMap>,
    rejected: RefCell<OrderedSet<ItemIndex>>,
    producer: Mutex<Producer>,
    exhausted: Cell<bool>,
    failure: RefCell<Option<Error>>,
}

impl Build {
    fn new(producer: Producer) -> Rc<Self> {
        Rc::new(Self {
            token: CancelToken::new(),
            log: RefCell::new(Vec::new()),
            partial: RefCell::new(CacheMap::default()),
            rejected: RefCell::new(OrderedSet::default()),
            producer: Mutex::new(producer),
            exhausted: Cell::new(false),
            failure: RefCell::new(None),
        })
    }

    fn log_len(&self) -> usize {
        self.log.borrow().len()
    }

    fn log_get(&self, position: usize) -> Option<ItemRef> {
        self.log.borrow().get(position).cloned()
    }

    fn log_items(&self) -> Vec<ItemRef> {
        self.log.borrow().clone()
    }

    fn accept(&self, item: ItemRef) {
        self.partial
            .borrow_mut()
            .insert(item.index().clone(), item.clone());
        self.log.borrow_mut().push(item);
    }

    fn is_live(&self, item: &ItemRef) -> bool {
        !self.rejected.borrow().contains(item.index())
    }

    /// Drops a provisional item from the partial cache.
    pub(crate) fn reject(&self, index: &ItemIndex) {
        self.partial.borrow_mut().shift_remove(index);
        self.rejected.borrow_mut().insert(index.clone());
    }

    pub(crate) fn partial_get(&self, index: &ItemIndex) -> Option<ItemRef> {
        self.partial.borrow().get(index).cloned()
    }

    pub(crate) fn partial_items(&self) -> Vec<ItemRef> {
        self.partial.borrow().values().cloned().collect()
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted.get()
    }

    fn failure(&self) -> Option<Error> {
        self.failure.borrow().clone()
    }
}

/// Options for `Table::iterate`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IterateOptions {
    /// Stop after this many items. A limited iteration never completes the cache.
    pub limit: Option<usize>,
    /// Drop any existing cache before iterating.
    pub reset: bool,
}

impl IterateOptions {
    /// Iterates at most `limit` items.
    pub fn limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            reset: false,
        }
    }

    /// Forces a fresh build.
    pub fn reset() -> Self {
        Self {
            limit: None,
            reset: true,
        }
    }
}

/// Snapshot of whatever a table currently holds.
#[derive(Clone, Debug)]
pub struct CurrentData {
    /// True when `items` is the complete cache.
    pub complete: bool,
    pub items: Vec<ItemRef>,
}

enum Cursor {
    Replay(Rc<CacheMap>, usize),
    Follow(Rc<Build>, usize),
}

/// Attribute-pipeline configuration copied out of the table state, so no
/// borrow is held while derive functions run.
struct FinishPlan {
    duplicates: Vec<(TableId, String)>,
    derived: Vec<(String, FunctionRef)>,
    suppressed: Vec<String>,
    index_filter: Option<FunctionRef>,
    attribute_filters: Vec<(String, FunctionRef)>,
}

impl Table {
    /// Lazily yields this table's items.
    ///
    /// Replays the complete cache if there is one; otherwise joins (or
    /// starts) the table's cache build. The stream ends without error if a
    /// reset cancels the build it is reading.
    pub fn iterate(self: &Rc<Self>, options: IterateOptions) -> LocalBoxStream<'static, Result<ItemRef>> {
        stream::try_unfold((self.clone(), None, 0), move |(table, cursor, yielded)| {
            pull(table, cursor, yielded, options)
        })
        .boxed_local()
    }

    /// Builds (or joins the in-flight build of) the complete cache.
    ///
    /// Concurrent callers share one future. Fails with `Error::Cancelled`
    /// if a reset interrupts the build.
    pub fn build_cache(self: &Rc<Self>) -> LocalBoxFuture<'static, Result<Rc<CacheMap>>> {
        if let CacheState::Complete(map) = &*self.cache.borrow() {
            return future::ready(Ok(map.clone())).boxed_local();
        }
        if let Some((_, pending)) = &*self.pending_build.borrow() {
            return pending.clone().boxed_local();
        }

        let ticket = self.tickets.get() + 1;
        self.tickets.set(ticket);
        let weak = Rc::downgrade(self);
        let id = self.id;
        let pending = async move {
            let result = drain(&weak, id).await;
            if let Some(table) = weak.upgrade() {
                table.clear_pending(ticket);
            }
            result
        }
        .boxed_local()
        .shared();
        *self.pending_build.borrow_mut() = Some((ticket, pending.clone()));
        pending.boxed_local()
    }

    /// Drops the cache, cascading to every derived table.
    pub fn reset(&self) {
        self.drop_cache();
        self.events.emit(TableEvent::Reset { table_id: self.id });
        trace!(table_id = self.id, "table reset");
        if let Ok(model) = self.model() {
            model.record(reshape_storage::JournalEntry::TableReset { table_id: self.id });
            for child_id in self.derived_table_ids() {
                if let Ok(child) = model.table(child_id) {
                    child.reset();
                }
            }
        }
        self.events.flush();
    }

    /// Returns what the table currently holds without building anything.
    pub fn current_data(&self) -> CurrentData {
        match &*self.cache.borrow() {
            CacheState::Complete(map) => CurrentData {
                complete: true,
                items: map.values().cloned().collect(),
            },
            CacheState::Building(build) => CurrentData {
                complete: false,
                items: build.partial_items(),
            },
            CacheState::Empty => CurrentData {
                complete: false,
                items: Vec::new(),
            },
        }
    }

    /// True once the cache is complete.
    pub fn is_cached(&self) -> bool {
        matches!(&*self.cache.borrow(), CacheState::Complete(_))
    }

    /// True while a build is in progress.
    pub fn is_building(&self) -> bool {
        matches!(&*self.cache.borrow(), CacheState::Building(_))
    }

    /// Builds the cache and counts its items.
    pub async fn count_rows(self: &Rc<Self>) -> Result<usize> {
        Ok(self.build_cache().await?.len())
    }

    /// Looks an item up by index, iterating only as far as needed.
    pub async fn get_item(self: &Rc<Self>, index: &ItemIndex) -> Result<Option<ItemRef>> {
        if let CacheState::Complete(map) = &*self.cache.borrow() {
            return Ok(map.get(index).cloned());
        }
        if self.table_type() == TableType::Aggregated {
            return Ok(self.build_cache().await?.get(index).cloned());
        }
        let mut items = self.iterate(IterateOptions::default());
        while let Some(item) = items.try_next().await? {
            if item.index() == index {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    /// Runs the finish phase on one item.
    ///
    /// In order: duplicated parent attributes, derived attributes, observed
    /// bookkeeping, suppression, the index filter, then attribute filters
    /// (stopping at the first failure). Rejected items are disconnected.
    pub(crate) async fn finish_item(self: &Rc<Self>, item: &ItemRef) -> Result<bool> {
        let model = self.model()?;
        let plan = self.finish_plan();

        for (parent_id, attribute) in &plan.duplicates {
            let parent_name = model.table(*parent_id)?.name();
            let value = item
                .first_connected(*parent_id)
                .map(|parent| parent.get(attribute))
                .unwrap_or(Value::Null);
            item.row_mut()
                .insert(format!("{}.{}", parent_name, attribute), value);
        }

        for (attribute, function) in &plan.derived {
            let derive = model.functions().derive(&function.name)?;
            let value = derive(item.clone(), Rc::from(function.params.clone())).await?;
            item.row_mut().insert(attribute.clone(), value);
        }

        {
            let row = item.row();
            let mut state = self.state.borrow_mut();
            for attribute in row.keys() {
                if !state.observed_attributes.contains(attribute) {
                    state.observed_attributes.insert(attribute.to_string());
                }
            }
        }

        {
            let mut row = item.row_mut();
            for attribute in &plan.suppressed {
                row.remove(attribute);
            }
        }

        let mut keep = true;
        if let Some(function) = &plan.index_filter {
            let filter = model.functions().filter(&function.name)?;
            keep = filter(&item.index().to_value(), &function.params);
        }
        if keep {
            for (attribute, function) in &plan.attribute_filters {
                let filter = model.functions().filter(&function.name)?;
                if !filter(&item.get(attribute), &function.params) {
                    keep = false;
                    break;
                }
            }
        }

        let index = item.index().clone();
        if keep {
            self.events.emit(TableEvent::Finish {
                table_id: self.id,
                index,
            });
        } else {
            item.disconnect();
            self.events.emit(TableEvent::Filter {
                table_id: self.id,
                index,
            });
        }
        Ok(keep)
    }

    /// Folds a contributing item into an aggregate through the reduce functions.
    pub(crate) fn update_item(&self, aggregate: &ItemRef, incoming: &ItemRef) -> Result<()> {
        let model = self.model()?;
        let reducers: Vec<(String, FunctionRef)> = self
            .state
            .borrow()
            .reduce_attributes
            .iter()
            .map(|(a, f)| (a.clone(), f.clone()))
            .collect();
        for (attribute, function) in reducers {
            let reduce = model.functions().reduce(&function.name)?;
            let current = aggregate.get(&attribute);
            let next = reduce(&current, incoming, &function.params)?;
            aggregate.row_mut().insert(attribute, next);
        }
        Ok(())
    }

    fn finish_plan(&self) -> FinishPlan {
        let state = self.state.borrow();
        FinishPlan {
            duplicates: state.duplicated_attributes.clone(),
            derived: state
                .derived_attributes
                .iter()
                .map(|(a, f)| (a.clone(), f.clone()))
                .collect(),
            suppressed: state.suppressed_attributes.iter().cloned().collect(),
            index_filter: state.index_filter.clone(),
            attribute_filters: state
                .attribute_filters
                .iter()
                .map(|(a, f)| (a.clone(), f.clone()))
                .collect(),
        }
    }

    fn attach(&self) -> Cursor {
        let mut cache = self.cache.borrow_mut();
        match &*cache {
            CacheState::Complete(map) => Cursor::Replay(map.clone(), 0),
            CacheState::Building(build) => Cursor::Follow(build.clone(), 0),
            CacheState::Empty => {
                let build = Build::new(Producer::for_kind(&self.kind));
                debug!(table_id = self.id, table_type = self.kind.table_type().type_name(), "cache build started");
                *cache = CacheState::Building(build.clone());
                Cursor::Follow(build, 0)
            }
        }
    }

    async fn next_from(self: &Rc<Self>, cursor: Cursor) -> Result<Option<(ItemRef, Cursor)>> {
        match cursor {
            Cursor::Replay(map, position) => {
                let item = map.get_index(position).map(|(_, item)| item.clone());
                Ok(item.map(|item| (item, Cursor::Replay(map, position + 1))))
            }
            Cursor::Follow(build, mut position) => loop {
                if let Some(err) = build.failure() {
                    return Err(err);
                }
                if build.token.is_cancelled() {
                    return Ok(None);
                }
                if let Some(item) = build.log_get(position) {
                    position += 1;
                    if build.is_live(&item) {
                        return Ok(Some((item, Cursor::Follow(build, position))));
                    }
                    continue;
                }
                if build.is_exhausted() {
                    return Ok(None);
                }
                self.advance(&build, position).await?;
            },
        }
    }

    /// Advances the shared producer by one step, unless another consumer
    /// already did while this one waited for the lock.
    async fn advance(self: &Rc<Self>, build: &Rc<Build>, seen: usize) -> Result<()> {
        let mut producer = build.producer.lock().await;
        if build.token.is_cancelled() || build.is_exhausted() || build.log_len() > seen {
            return Ok(());
        }

        let step = producer.step(self, build).await;
        match step {
            Ok(Step::Yield(item)) => {
                if build.token.is_cancelled() {
                    item.disconnect();
                } else {
                    build.accept(item);
                }
            }
            Ok(Step::Skip) | Ok(Step::Cancelled) => {}
            Ok(Step::Done) => {
                build.exhausted.set(true);
                self.promote(build);
            }
            Err(err) => {
                if !build.token.is_cancelled() {
                    self.discard(build, err.clone());
                    self.events.flush();
                    return Err(err);
                }
            }
        }
        drop(producer);
        self.events.flush();
        Ok(())
    }

    fn promote(&self, build: &Rc<Build>) {
        if build.token.is_cancelled() {
            return;
        }
        let mut cache = self.cache.borrow_mut();
        if let CacheState::Building(current) = &*cache {
            if Rc::ptr_eq(current, build) {
                let map = std::mem::take(&mut *build.partial.borrow_mut());
                debug!(table_id = self.id, items = map.len(), "cache build complete");
                *cache = CacheState::Complete(Rc::new(map));
            }
        }
    }

    fn discard(&self, build: &Rc<Build>, err: Error) {
        warn!(table_id = self.id, error = %err, "cache build failed");
        *build.failure.borrow_mut() = Some(err);
        build.token.cancel();
        {
            let mut cache = self.cache.borrow_mut();
            if let CacheState::Building(current) = &*cache {
                if Rc::ptr_eq(current, build) {
                    *cache = CacheState::Empty;
                }
            }
        }
        for item in build.log_items() {
            item.disconnect();
        }
    }

    /// Empties the cache and cancels any build, without notifying anyone.
    pub(crate) fn drop_cache(&self) {
        let previous = std::mem::replace(&mut *self.cache.borrow_mut(), CacheState::Empty);
        self.pending_build.borrow_mut().take();
        match previous {
            CacheState::Building(build) => {
                build.token.cancel();
                debug!(table_id = self.id, "cache build aborted");
                for item in build.log_items() {
                    item.disconnect();
                }
            }
            CacheState::Complete(map) => {
                for item in map.values() {
                    item.disconnect();
                }
            }
            CacheState::Empty => {}
        }
    }

    fn clear_pending(&self, ticket: u64) {
        let mut pending = self.pending_build.borrow_mut();
        if matches!(&*pending, Some((current, _)) if *current == ticket) {
            *pending = None;
        }
    }
}

type PullState = (Rc<Table>, Option<Cursor>, usize);

async fn pull(
    table: Rc<Table>,
    cursor: Option<Cursor>,
    yielded: usize,
    options: IterateOptions,
) -> Result<Option<(ItemRef, PullState)>> {
    if options.limit.map_or(false, |limit| yielded >= limit) {
        return Ok(None);
    }
    let cursor = match cursor {
        Some(cursor) => cursor,
        None => {
            if options.reset {
                table.reset();
            }
            table.attach()
        }
    };
    match table.next_from(cursor).await? {
        Some((item, cursor)) => Ok(Some((item, (table, Some(cursor), yielded + 1)))),
        None => Ok(None),
    }
}

async fn drain(table: &Weak<Table>, id: TableId) -> Result<Rc<CacheMap>> {
    let table = table.upgrade().ok_or_else(|| Error::table_not_found(id))?;
    let mut items = table.iterate(IterateOptions::default());
    while items.try_next().await?.is_some() {}
    let complete = match &*table.cache.borrow() {
        CacheState::Complete(map) => Some(map.clone()),
        _ => None,
    };
    complete.ok_or(Error::Cancelled { table: id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let shared = token.clone();
        assert!(!token.is_cancelled());
        shared.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_iterate_options() {
        assert_eq!(IterateOptions::limit(3).limit, Some(3));
        assert!(IterateOptions::reset().reset);
        assert_eq!(IterateOptions::default(), IterateOptions { limit: None, reset: false });
    }
}
