//! Reshape Storage - Persistence and format collaborators.
//!
//! This crate provides the plain-record side of a reshape model:
//!
//! - `TableRecord` / `ClassRecord` / `ModelSnapshot`: serde records for
//!   table and class specifications, with functions stored by name
//! - `Store`: Snapshot persistence, with `MemoryStore` and `JsonFileStore`
//! - `Journal`: An append-only log of structural model changes
//! - `FormatParser`: Turns a textual payload into raw rows (`JsonParser`)
//! - `json`: Conversion between `serde_json::Value` and reshape values
//!
//! # Example
//!
//! ```rust
//! use reshape_storage::{FormatParser, JsonParser, MemoryStore, ModelSnapshot, Store};
//!
//! let data = JsonParser.parse(r#"[{"g": 1}, {"g": 2}]"#, "json").unwrap();
//! assert_eq!(data.len(), 2);
//!
//! let store = MemoryStore::new();
//! store.save(&ModelSnapshot::new("demo")).unwrap();
//! assert_eq!(store.load().unwrap().unwrap().name, "demo");
//! ```

pub mod error;
pub mod format;
pub mod journal;
pub mod json;
pub mod record;
pub mod store;

pub use error::{Result, StorageError};
pub use format::{FormatParser, JsonParser};
pub use journal::{Journal, JournalEntry};
pub use record::{
    ClassKindRecord, ClassRecord, DuplicatedAttributeRecord, FunctionRecord, ModelSnapshot,
    TableKindRecord, TableRecord,
};
pub use store::{JsonFileStore, MemoryStore, Store};
