//! Wrapped items.
//!
//! An `Item` is one row plus its index, created fresh whenever a table
//! builds its cache. Items in different tables are linked through a
//! connection map keyed by table id; every link is recorded on both ends.
//! Links are weak, so dropping a table's cache frees its items even while
//! items in other tables still list them.

use crate::table::Table;
use reshape_core::{ItemIndex, OrderedMap, Row, TableId, Value};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

/// Shared handle to a wrapped item.
pub type ItemRef = Rc<Item>;

/// One row yielded by a table.
pub struct Item {
    index: ItemIndex,
    table_id: TableId,
    table: Weak<Table>,
    row: RefCell<Row>,
    connected: RefCell<OrderedMap<TableId, Vec<Weak<Item>>>>,
}

impl Item {
    /// Wraps a row and connects it to `connect_to`.
    pub(crate) fn wrap(
        index: ItemIndex,
        table: &Rc<Table>,
        row: Row,
        connect_to: &[ItemRef],
    ) -> ItemRef {
        let item = Self::detached(index, table.id(), Rc::downgrade(table), row);
        for other in connect_to {
            item.connect_item(other);
        }
        item
    }

    /// Creates an item that belongs to no live table.
    pub fn detached(index: ItemIndex, table_id: TableId, table: Weak<Table>, row: Row) -> ItemRef {
        Rc::new(Self {
            index,
            table_id,
            table,
            row: RefCell::new(row),
            connected: RefCell::new(OrderedMap::default()),
        })
    }

    /// Returns the item's index within its table.
    #[inline]
    pub fn index(&self) -> &ItemIndex {
        &self.index
    }

    /// Returns the id of the table that produced the item.
    #[inline]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Returns the producing table, if it is still alive.
    pub fn table(&self) -> Option<Rc<Table>> {
        self.table.upgrade()
    }

    /// Borrows the row.
    pub fn row(&self) -> Ref<'_, Row> {
        self.row.borrow()
    }

    /// Mutably borrows the row.
    pub fn row_mut(&self) -> RefMut<'_, Row> {
        self.row.borrow_mut()
    }

    /// Returns a copy of one attribute, Null when absent.
    pub fn get(&self, attribute: &str) -> Value {
        self.row.borrow().get_or_null(attribute)
    }

    /// Connects two items in both directions. Connecting twice is a no-op.
    pub fn connect_item(self: &Rc<Self>, other: &ItemRef) {
        if Rc::ptr_eq(self, other) {
            return;
        }
        link(self, other);
        link(other, self);
    }

    /// Severs every link, removing this item from each partner's map too.
    pub fn disconnect(self: &Rc<Self>) {
        let links = std::mem::take(&mut *self.connected.borrow_mut());
        let me = Rc::downgrade(self);
        for partner in links.into_values().flatten() {
            let Some(partner) = partner.upgrade() else { continue };
            let mut map = partner.connected.borrow_mut();
            if let Some(list) = map.get_mut(&self.table_id) {
                list.retain(|w| !Weak::ptr_eq(w, &me));
                if list.is_empty() {
                    map.shift_remove(&self.table_id);
                }
            }
        }
    }

    /// Returns the live items connected from `table_id`, in connection order.
    pub fn connected_items(&self, table_id: TableId) -> Vec<ItemRef> {
        self.connected
            .borrow()
            .get(&table_id)
            .map(|list| list.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Returns the first live item connected from `table_id`.
    pub fn first_connected(&self, table_id: TableId) -> Option<ItemRef> {
        self.connected
            .borrow()
            .get(&table_id)
            .and_then(|list| list.iter().find_map(Weak::upgrade))
    }

    /// Returns the ids of tables with at least one live connection.
    pub fn connected_table_ids(&self) -> Vec<TableId> {
        self.connected
            .borrow()
            .iter()
            .filter(|(_, list)| list.iter().any(|w| w.strong_count() > 0))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Returns true if `other` is in this item's connection map.
    pub fn is_connected_to(&self, other: &ItemRef) -> bool {
        let target = Rc::downgrade(other);
        self.connected
            .borrow()
            .get(&other.table_id)
            .map(|list| list.iter().any(|w| Weak::ptr_eq(w, &target)))
            .unwrap_or(false)
    }

    /// Counts live connections, optionally restricted to one table.
    pub fn connection_count(&self, table_id: Option<TableId>) -> usize {
        let map = self.connected.borrow();
        let live = |list: &Vec<Weak<Item>>| list.iter().filter(|w| w.strong_count() > 0).count();
        match table_id {
            Some(id) => map.get(&id).map(live).unwrap_or(0),
            None => map.values().map(live).sum(),
        }
    }
}

fn link(from: &ItemRef, to: &ItemRef) {
    let weak = Rc::downgrade(to);
    let mut map = from.connected.borrow_mut();
    let list = map.entry(to.table_id).or_default();
    if !list.iter().any(|w| Weak::ptr_eq(w, &weak)) {
        list.push(weak);
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("table_id", &self.table_id)
            .field("index", &self.index)
            .field("row", &*self.row.borrow())
            .finish()
    }
}
