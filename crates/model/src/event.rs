//! Notifications emitted by tables and models.

use reshape_core::{ItemIndex, TableId};

/// A table lifecycle notification.
#[derive(Clone, Debug, PartialEq)]
pub enum TableEvent {
    /// The table's cache was dropped.
    Reset { table_id: TableId },
    /// An item passed the finish phase.
    Finish { table_id: TableId, index: ItemIndex },
    /// An item was rejected by a filter and disconnected.
    Filter { table_id: TableId, index: ItemIndex },
    /// A provisional aggregate absorbed another contributing item.
    Update { table_id: TableId, index: ItemIndex },
}

impl TableEvent {
    /// Returns the emitting table.
    pub fn table_id(&self) -> TableId {
        match self {
            TableEvent::Reset { table_id }
            | TableEvent::Finish { table_id, .. }
            | TableEvent::Filter { table_id, .. }
            | TableEvent::Update { table_id, .. } => *table_id,
        }
    }

    /// Returns the item the event concerns, if any.
    pub fn index(&self) -> Option<&ItemIndex> {
        match self {
            TableEvent::Reset { .. } => None,
            TableEvent::Finish { index, .. }
            | TableEvent::Filter { index, .. }
            | TableEvent::Update { index, .. } => Some(index),
        }
    }
}

/// A model-level notification.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelEvent {
    /// The table/class structure or a class's wiring changed.
    Update,
}
