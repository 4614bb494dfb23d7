//! Reshape Index - In-memory hash index for reshape tables.
//!
//! Tables build a `HashIndex` over their complete cache to look items up by
//! an attribute's stringified value; aggregation uses a unique index to find
//! the representative item of each group.
//!
//! # Example
//!
//! ```rust
//! use reshape_core::ItemIndex;
//! use reshape_index::{HashIndex, Index};
//!
//! let mut index: HashIndex<String> = HashIndex::new(false);
//! index.add("red".into(), ItemIndex::from(0usize)).unwrap();
//! index.add("red".into(), ItemIndex::from(2usize)).unwrap();
//! assert_eq!(index.get(&"red".into()).len(), 2);
//! ```

#![no_std]

extern crate alloc;

pub mod hash;
pub mod stats;
pub mod traits;

pub use hash::HashIndex;
pub use stats::IndexStats;
pub use traits::{Index, IndexError};
