//! Index statistics.

use core::sync::atomic::{AtomicUsize, Ordering};

/// Statistics for an index.
#[derive(Debug)]
pub struct IndexStats {
    /// Total number of indexed items.
    total_entries: AtomicUsize,
    /// Number of distinct keys.
    distinct_keys: AtomicUsize,
}

impl IndexStats {
    /// Creates a new empty stats instance.
    pub fn new() -> Self {
        Self {
            total_entries: AtomicUsize::new(0),
            distinct_keys: AtomicUsize::new(0),
        }
    }

    /// Returns the total number of indexed items.
    pub fn total_entries(&self) -> usize {
        self.total_entries.load(Ordering::Relaxed)
    }

    /// Returns the number of distinct keys.
    pub fn distinct_keys(&self) -> usize {
        self.distinct_keys.load(Ordering::Relaxed)
    }

    /// Increments the entry count by the given amount.
    pub fn add_entries(&self, count: usize) {
        self.total_entries.fetch_add(count, Ordering::Relaxed);
    }

    /// Decrements the entry count by the given amount.
    pub fn remove_entries(&self, count: usize) {
        self.total_entries.fetch_sub(count, Ordering::Relaxed);
    }

    /// Sets the distinct key count.
    pub fn set_distinct_keys(&self, count: usize) {
        self.distinct_keys.store(count, Ordering::Relaxed);
    }

    /// Average number of items per key.
    pub fn average_group_size(&self) -> f64 {
        let keys = self.distinct_keys();
        if keys == 0 {
            0.0
        } else {
            self.total_entries() as f64 / keys as f64
        }
    }

    /// Resets all counters to zero.
    pub fn clear(&self) {
        self.total_entries.store(0, Ordering::Relaxed);
        self.distinct_keys.store(0, Ordering::Relaxed);
    }
}

impl Default for IndexStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for IndexStats {
    fn clone(&self) -> Self {
        Self {
            total_entries: AtomicUsize::new(self.total_entries()),
            distinct_keys: AtomicUsize::new(self.distinct_keys()),
        }
    }
}
