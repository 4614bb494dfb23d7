//! Hash index implementation.
//!
//! Maps a key (usually an attribute's stringified value) to the indexes of
//! the items carrying it.

use crate::stats::IndexStats;
use crate::traits::{Index, IndexError};
use alloc::vec::Vec;
use hashbrown::HashMap;
use reshape_core::ItemIndex;

/// A hash-based index for O(1) point queries.
///
/// Supports both unique indexes (one item per key, used for aggregation
/// groups) and non-unique indexes (many items per key).
#[derive(Debug)]
pub struct HashIndex<K> {
    /// The underlying map from keys to item indexes.
    map: HashMap<K, Vec<ItemIndex>>,
    /// Whether this is a unique index.
    unique: bool,
    /// Statistics for this index.
    stats: IndexStats,
}

impl<K: Eq + core::hash::Hash + Clone> HashIndex<K> {
    /// Creates a new hash index.
    pub fn new(unique: bool) -> Self {
        Self {
            map: HashMap::new(),
            unique,
            stats: IndexStats::new(),
        }
    }

    /// Returns whether this is a unique index.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Returns the statistics for this index.
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Returns the first item stored under `key`.
    pub fn get_first(&self, key: &K) -> Option<&ItemIndex> {
        self.map.get(key).and_then(|v| v.first())
    }

    /// Returns the number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.map.len()
    }

    /// Iterates over the distinct keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.map.keys()
    }

    /// Returns all item indexes in the index.
    pub fn get_all(&self) -> Vec<ItemIndex> {
        self.map.values().flatten().cloned().collect()
    }

    fn sync_key_count(&self) {
        self.stats.set_distinct_keys(self.map.len());
    }
}

impl<K: Eq + core::hash::Hash + Clone> Index<K> for HashIndex<K> {
    fn add(&mut self, key: K, value: ItemIndex) -> Result<(), IndexError> {
        if self.unique && self.map.contains_key(&key) {
            return Err(IndexError::DuplicateKey);
        }

        self.map.entry(key).or_insert_with(Vec::new).push(value);
        self.stats.add_entries(1);
        self.sync_key_count();
        Ok(())
    }

    fn set(&mut self, key: K, value: ItemIndex) {
        let old_count = self.map.get(&key).map(|v| v.len()).unwrap_or(0);
        self.map.insert(key, alloc::vec![value]);

        if old_count > 0 {
            self.stats.remove_entries(old_count);
        }
        self.stats.add_entries(1);
        self.sync_key_count();
    }

    fn get(&self, key: &K) -> Vec<ItemIndex> {
        self.map.get(key).cloned().unwrap_or_default()
    }

    fn remove(&mut self, key: &K, value: Option<&ItemIndex>) {
        match value {
            Some(v) => {
                if let Some(values) = self.map.get_mut(key) {
                    let original_len = values.len();
                    values.retain(|x| x != v);
                    let removed = original_len - values.len();
                    if removed > 0 {
                        self.stats.remove_entries(removed);
                    }
                    if values.is_empty() {
                        self.map.remove(key);
                    }
                }
            }
            None => {
                if let Some(values) = self.map.remove(key) {
                    self.stats.remove_entries(values.len());
                }
            }
        }
        self.sync_key_count();
    }

    fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    fn len(&self) -> usize {
        self.stats.total_entries()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn clear(&mut self) {
        self.map.clear();
        self.stats.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::vec;

    fn idx(i: usize) -> ItemIndex {
        ItemIndex::from(i)
    }

    #[test]
    fn test_hash_index_unique() {
        let mut index: HashIndex<i32> = HashIndex::new(true);

        assert!(index.add(1, idx(100)).is_ok());
        assert!(index.add(2, idx(200)).is_ok());
        assert!(index.add(1, idx(101)).is_err());

        assert_eq!(index.get(&1), vec![idx(100)]);
        assert_eq!(index.get(&3), Vec::<ItemIndex>::new());
        assert_eq!(index.get_first(&2), Some(&idx(200)));
    }

    #[test]
    fn test_hash_index_non_unique() {
        let mut index: HashIndex<String> = HashIndex::new(false);

        index.add("a".into(), idx(0)).unwrap();
        index.add("a".into(), idx(1)).unwrap();
        index.add("b".into(), idx(2)).unwrap();

        assert_eq!(index.get(&"a".into()), vec![idx(0), idx(1)]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.key_count(), 2);
        assert_eq!(index.stats().average_group_size(), 1.5);
    }

    #[test]
    fn test_hash_index_set() {
        let mut index: HashIndex<i32> = HashIndex::new(false);

        index.set(1, idx(100));
        index.set(1, idx(101));

        assert_eq!(index.get(&1), vec![idx(101)]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_hash_index_remove() {
        let mut index: HashIndex<i32> = HashIndex::new(false);

        index.add(1, idx(100)).unwrap();
        index.add(1, idx(101)).unwrap();
        index.add(2, idx(200)).unwrap();

        index.remove(&1, Some(&idx(100)));
        assert_eq!(index.get(&1), vec![idx(101)]);

        index.remove(&1, None);
        assert!(!index.contains_key(&1));
        assert_eq!(index.len(), 1);
        assert_eq!(index.stats().distinct_keys(), 1);
    }

    #[test]
    fn test_hash_index_clear() {
        let mut index: HashIndex<i32> = HashIndex::new(true);

        index.add(1, idx(100)).unwrap();
        index.add(2, idx(200)).unwrap();
        index.clear();

        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }
}
