//! Reshape Model - Lazy table-derivation engine.
//!
//! This crate provides the engine of reshape:
//!
//! - `Table`: Static or derived (aggregated, expanded, faceted, transposed,
//!   connected) tables with lazy, cached, cooperatively shared iteration
//! - `Item`: Wrapped rows with bidirectional cross-table connections
//! - `GenericClass` / `NodeClass` / `EdgeClass`: Graph interpretations of
//!   tables, with node/edge wiring and reinterpretation
//! - `FunctionRegistry`: Named derive, filter and reduce functions
//! - `Model`: The registry root, id allocation, persistence and hydration
//!
//! # Example
//!
//! ```rust
//! use futures::executor::block_on;
//! use reshape_core::Row;
//! use reshape_model::{Class, Model, ModelConfig};
//!
//! let model = Model::new(ModelConfig::new("demo"));
//! let rows: Vec<Row> = [1, 1, 2].into_iter().map(|g| Row::with("g", g)).collect();
//! let people = model.add_static_table("people", rows).unwrap();
//!
//! let groups = people.table().unwrap().aggregate("g").unwrap();
//! assert_eq!(block_on(groups.count_rows()).unwrap(), 2);
//! ```

mod class;
mod config;
mod event;
mod function;
mod item;
mod model;
mod persist;
mod table;
mod wrapper;

pub use class::{
    Class, ClassHandle, ClassKind, ClassOptions, ClassSpec, ClassType, EdgeClass, EdgeLinks,
    GenericClass, NodeClass, Side,
};
pub use config::ModelConfig;
pub use event::{ModelEvent, TableEvent};
pub use function::{DeriveFn, FilterFn, FunctionRegistry, ReduceFn};
pub use item::{Item, ItemRef};
pub use model::{DependencyGraph, Model, TableSummary};
pub use table::{
    AttributeInfo, CacheMap, CancelToken, CurrentData, IndexInfo, IterateOptions, Table, TableKind,
    TableOptions, TableType,
};
pub use wrapper::{iterate_across_connections, EdgeWrapper, NodeWrapper};

pub use reshape_core::{Error, FunctionRef, ItemIndex, Result, Row, Value};
