//! Reshape Core - Core types for the reshape table-derivation engine.
//!
//! This crate provides the foundational types shared by every reshape crate:
//!
//! - `Value`: Attribute values (scalars, lists, nested records)
//! - `Row`: An insertion-ordered attribute record
//! - `ItemIndex`: Identifies an item within its table
//! - `IdAllocator`: Monotonic table/class id allocation
//! - `FunctionRef`: A named, persistable function reference
//! - `StaticData`: Raw rows supplied by the row-source collaborator
//! - `Error`: Error types for derivation and wiring operations
//!
//! # Example
//!
//! ```rust
//! use reshape_core::{ItemIndex, Row, Value};
//!
//! let row: Row = [("tags", "a,b,c")].into_iter().collect();
//! assert_eq!(row.get("tags"), Some(&Value::from("a,b,c")));
//!
//! // Positional and keyed indexes compare by string form.
//! assert_eq!(ItemIndex::from(1usize), ItemIndex::from("1"));
//! ```

#![no_std]

extern crate alloc;

mod error;
mod function;
mod ids;
mod row;
mod source;
mod value;

pub use error::{Error, Result};
pub use function::FunctionRef;
pub use ids::{ClassId, IdAllocator, ItemIndex, TableId};
pub use row::{OrderedMap, OrderedSet, Row};
pub use source::StaticData;
pub use value::Value;
