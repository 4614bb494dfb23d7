//! Row structure for reshape.
//!
//! A `Row` is a plain attribute record: an insertion-ordered map from
//! attribute name to `Value`. Insertion order is significant, since tables
//! report observed attributes and transposed items in source order.

use crate::value::Value;
use alloc::string::String;
use hashbrown::hash_map::DefaultHashBuilder;
use indexmap::{IndexMap, IndexSet};

/// Insertion-ordered map used throughout the core types.
pub type OrderedMap<K, V> = IndexMap<K, V, DefaultHashBuilder>;

/// Insertion-ordered set used throughout the core types.
pub type OrderedSet<T> = IndexSet<T, DefaultHashBuilder>;

/// A record of attribute values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    attributes: OrderedMap<String, Value>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a row holding a single attribute.
    pub fn with(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut row = Self::new();
        row.insert(attribute, value);
        row
    }

    /// Gets the value of an attribute.
    #[inline]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    /// Gets the value of an attribute, treating a missing attribute as Null.
    pub fn get_or_null(&self, attribute: &str) -> Value {
        self.attributes.get(attribute).cloned().unwrap_or(Value::Null)
    }

    /// Gets a mutable reference to an attribute value.
    pub fn get_mut(&mut self, attribute: &str) -> Option<&mut Value> {
        self.attributes.get_mut(attribute)
    }

    /// Sets an attribute, returning the previous value if any.
    ///
    /// Overwriting keeps the attribute's original position.
    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attributes.insert(attribute.into(), value.into())
    }

    /// Removes an attribute, preserving the order of the remaining ones.
    pub fn remove(&mut self, attribute: &str) -> Option<Value> {
        self.attributes.shift_remove(attribute)
    }

    /// Returns true if the attribute is present.
    #[inline]
    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    /// Iterates attribute names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.attributes.keys().map(|k| k.as_str())
    }

    /// Iterates (name, value) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of attributes.
    #[inline]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if this row has no attributes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_row_new() {
        let row = Row::new();
        assert!(row.is_empty());
        assert_eq!(row.len(), 0);
    }

    #[test]
    fn test_row_get_value() {
        let row: Row = [("id", Value::from(1)), ("name", Value::from("Alice"))]
            .into_iter()
            .collect();
        assert_eq!(row.get("id"), Some(&Value::Int64(1)));
        assert_eq!(row.get("name"), Some(&Value::from("Alice")));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_or_null("missing"), Value::Null);
    }

    #[test]
    fn test_row_preserves_order() {
        let mut row = Row::new();
        row.insert("b", 1);
        row.insert("a", 2);
        row.insert("c", 3);
        row.insert("b", 4);
        assert_eq!(row.keys().collect::<Vec<_>>(), ["b", "a", "c"]);

        row.remove("a");
        assert_eq!(row.keys().collect::<Vec<_>>(), ["b", "c"]);
        assert_eq!(row.get("b"), Some(&Value::Int64(4)));
    }

    #[test]
    fn test_row_equality_ignores_order() {
        let a: Row = [("x", 1), ("y", 2)].into_iter().collect();
        let b: Row = [("y", 2), ("x", 1)].into_iter().collect();
        assert_eq!(a, b);
    }
}
