//! Identifiers for tables, classes and items.
//!
//! Table and class ids are allocated by an explicit `IdAllocator` owned by
//! the model, rather than process-wide counters.

use crate::value::Value;
use alloc::string::{String, ToString};
use core::fmt;

/// Unique identifier for a table.
pub type TableId = u64;

/// Unique identifier for a class.
pub type ClassId = u64;

/// Identifies an item within its table.
///
/// Source rows may be indexed by position or by key; both are compared by
/// their string form, so the array position `1` and the key `"1"` name the
/// same item when tables are joined.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemIndex(String);

impl ItemIndex {
    /// Creates an index from its string form.
    pub fn new(index: impl Into<String>) -> Self {
        Self(index.into())
    }

    /// Returns the string form.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric form, if the index is a position.
    pub fn as_number(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    /// Returns the index as a value, numeric when possible.
    pub fn to_value(&self) -> Value {
        match self.as_number() {
            Some(n) => Value::Int64(n),
            None => Value::String(self.0.clone()),
        }
    }
}

impl fmt::Display for ItemIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemIndex {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for ItemIndex {
    fn from(v: String) -> Self {
        Self(v)
    }
}

impl From<usize> for ItemIndex {
    fn from(v: usize) -> Self {
        Self(v.to_string())
    }
}

impl From<u64> for ItemIndex {
    fn from(v: u64) -> Self {
        Self(v.to_string())
    }
}

impl From<i64> for ItemIndex {
    fn from(v: i64) -> Self {
        Self(v.to_string())
    }
}

impl From<&Value> for ItemIndex {
    fn from(v: &Value) -> Self {
        Self(v.to_key_string())
    }
}

/// Monotonic allocator for table and class ids.
#[derive(Clone, Debug)]
pub struct IdAllocator {
    next_table_id: TableId,
    next_class_id: ClassId,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    /// Creates an allocator starting at id 1 for both tables and classes.
    pub fn new() -> Self {
        Self {
            next_table_id: 1,
            next_class_id: 1,
        }
    }

    /// Creates an allocator seeded past every id seen in persisted state.
    pub fn seeded<T, C>(table_ids: T, class_ids: C) -> Self
    where
        T: IntoIterator<Item = TableId>,
        C: IntoIterator<Item = ClassId>,
    {
        let mut allocator = Self::new();
        for id in table_ids {
            allocator.observe_table_id(id);
        }
        for id in class_ids {
            allocator.observe_class_id(id);
        }
        allocator
    }

    /// Allocates the next table id.
    pub fn next_table_id(&mut self) -> TableId {
        let id = self.next_table_id;
        self.next_table_id += 1;
        id
    }

    /// Allocates the next class id.
    pub fn next_class_id(&mut self) -> ClassId {
        let id = self.next_class_id;
        self.next_class_id += 1;
        id
    }

    /// Ensures future table ids are greater than `id`.
    pub fn observe_table_id(&mut self, id: TableId) {
        self.next_table_id = self.next_table_id.max(id + 1);
    }

    /// Ensures future class ids are greater than `id`.
    pub fn observe_class_id(&mut self, id: ClassId) {
        self.next_class_id = self.next_class_id.max(id + 1);
    }

    /// Returns the id the next table will receive.
    #[inline]
    pub fn peek_table_id(&self) -> TableId {
        self.next_table_id
    }

    /// Returns the id the next class will receive.
    #[inline]
    pub fn peek_class_id(&self) -> ClassId {
        self.next_class_id
    }
}
