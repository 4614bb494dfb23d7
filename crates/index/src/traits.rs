//! Index trait definitions.

use alloc::vec::Vec;
use reshape_core::ItemIndex;

/// Core trait for index implementations.
pub trait Index<K> {
    /// Adds a key-item pair to the index.
    /// For unique indexes, this will fail if the key already exists.
    fn add(&mut self, key: K, value: ItemIndex) -> Result<(), IndexError>;

    /// Sets a key-item pair, replacing any existing items for the key.
    fn set(&mut self, key: K, value: ItemIndex);

    /// Gets all item indexes associated with a key.
    fn get(&self, key: &K) -> Vec<ItemIndex>;

    /// Removes a key (and optionally a specific item) from the index.
    /// If value is None, removes all items for the key.
    fn remove(&mut self, key: &K, value: Option<&ItemIndex>);

    /// Checks if the index contains the given key.
    fn contains_key(&self, key: &K) -> bool;

    /// Returns the number of entries in the index.
    fn len(&self) -> usize;

    /// Returns true if the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries from the index.
    fn clear(&mut self);
}

/// Error type for index operations.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexError {
    /// Attempted to insert a duplicate key in a unique index.
    DuplicateKey,
}

impl core::fmt::Display for IndexError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IndexError::DuplicateKey => write!(f, "Duplicate key in unique index"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_index_error_display() {
        assert_eq!(
            IndexError::DuplicateKey.to_string(),
            "Duplicate key in unique index"
        );
    }
}
