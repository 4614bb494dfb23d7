//! Plain records describing a persisted model.
//!
//! Function-valued fields are stored as a registered name plus literal
//! parameters and re-resolved against the model's function registry on load.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// A function reference: registered name plus JSON parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Json>,
}

/// A parent attribute copied onto derived rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DuplicatedAttributeRecord {
    pub parent_table_id: u64,
    pub attribute: String,
}

/// Per-variant table parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TableKindRecord {
    Static {
        name: String,
        rows: Vec<Json>,
    },
    StaticDict {
        name: String,
        rows: Map<String, Json>,
    },
    Aggregated {
        attribute: String,
    },
    Expanded {
        attribute: String,
        delimiter: String,
    },
    Faceted {
        attribute: String,
        value: Json,
    },
    Transposed {
        index: String,
    },
    Connected,
}

impl TableKindRecord {
    /// Returns the variant's type tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            TableKindRecord::Static { .. } => "StaticTable",
            TableKindRecord::StaticDict { .. } => "StaticDictTable",
            TableKindRecord::Aggregated { .. } => "AggregatedTable",
            TableKindRecord::Expanded { .. } => "ExpandedTable",
            TableKindRecord::Faceted { .. } => "FacetedTable",
            TableKindRecord::Transposed { .. } => "TransposedTable",
            TableKindRecord::Connected => "ConnectedTable",
        }
    }
}

/// A persisted table specification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub table_id: u64,
    pub kind: TableKindRecord,
    #[serde(default)]
    pub derived_tables: Vec<u64>,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub expected_attributes: Vec<String>,
    #[serde(default)]
    pub observed_attributes: Vec<String>,
    #[serde(default)]
    pub derived_attributes: Vec<(String, FunctionRecord)>,
    #[serde(default)]
    pub suppressed_attributes: Vec<String>,
    #[serde(default)]
    pub suppress_index: bool,
    #[serde(default)]
    pub attribute_filters: Vec<(String, FunctionRecord)>,
    #[serde(default)]
    pub index_filter: Option<FunctionRecord>,
    #[serde(default)]
    pub duplicated_attributes: Vec<DuplicatedAttributeRecord>,
    #[serde(default)]
    pub reduce_attributes: Vec<(String, FunctionRecord)>,
}

impl TableRecord {
    /// Creates a record with empty attribute bookkeeping.
    pub fn new(table_id: u64, kind: TableKindRecord) -> Self {
        Self {
            table_id,
            kind,
            derived_tables: Vec::new(),
            custom_name: None,
            expected_attributes: Vec::new(),
            observed_attributes: Vec::new(),
            derived_attributes: Vec::new(),
            suppressed_attributes: Vec::new(),
            suppress_index: false,
            attribute_filters: Vec::new(),
            index_filter: None,
            duplicated_attributes: Vec::new(),
            reduce_attributes: Vec::new(),
        }
    }
}

/// Per-variant class parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClassKindRecord {
    Generic,
    Node {
        #[serde(default)]
        edge_class_ids: Vec<u64>,
    },
    Edge {
        source_class_id: Option<u64>,
        #[serde(default)]
        source_table_ids: Vec<u64>,
        target_class_id: Option<u64>,
        #[serde(default)]
        target_table_ids: Vec<u64>,
        #[serde(default)]
        directed: bool,
    },
}

/// A persisted class specification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub class_id: u64,
    pub table_id: u64,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub annotations: Map<String, Json>,
    pub kind: ClassKindRecord,
}

/// Everything needed to hydrate a model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableRecord>,
    #[serde(default)]
    pub classes: Vec<ClassRecord>,
}

impl ModelSnapshot {
    /// Creates an empty snapshot.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Largest persisted table id.
    pub fn max_table_id(&self) -> Option<u64> {
        self.tables.iter().map(|t| t.table_id).max()
    }

    /// Largest persisted class id.
    pub fn max_class_id(&self) -> Option<u64> {
        self.classes.iter().map(|c| c.class_id).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_kind_tagged() {
        let kind = TableKindRecord::Expanded {
            attribute: "tags".into(),
            delimiter: ",".into(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json, json!({"type": "Expanded", "attribute": "tags", "delimiter": ","}));
        assert_eq!(kind.type_name(), "ExpandedTable");
    }

    #[test]
    fn test_table_record_defaults() {
        let record: TableRecord =
            serde_json::from_value(json!({"table_id": 4, "kind": {"type": "Connected"}})).unwrap();
        assert_eq!(record, TableRecord::new(4, TableKindRecord::Connected));
    }

    #[test]
    fn test_snapshot_max_ids() {
        let mut snapshot = ModelSnapshot::new("m");
        assert_eq!(snapshot.max_table_id(), None);
        snapshot.tables.push(TableRecord::new(3, TableKindRecord::Connected));
        snapshot.tables.push(TableRecord::new(9, TableKindRecord::Connected));
        snapshot.classes.push(ClassRecord {
            class_id: 2,
            table_id: 9,
            class_name: None,
            annotations: Map::new(),
            kind: ClassKindRecord::Generic,
        });
        assert_eq!(snapshot.max_table_id(), Some(9));
        assert_eq!(snapshot.max_class_id(), Some(2));
    }
}
