//! Conversion between live tables/classes and their persisted records.

use crate::class::{ClassKind, ClassSpec, EdgeLinks};
use crate::table::{Table, TableKind, TableState};
use reshape_core::{Error, FunctionRef, ItemIndex, OrderedMap, Result};
use reshape_storage::json::{row_from_json, row_to_json, value_from_json, value_to_json};
use reshape_storage::{
    ClassKindRecord, ClassRecord, DuplicatedAttributeRecord, FunctionRecord, TableKindRecord,
    TableRecord,
};
use std::rc::Rc;

fn function_to_record(function: &FunctionRef) -> FunctionRecord {
    FunctionRecord {
        name: function.name.clone(),
        params: function.params.iter().map(value_to_json).collect(),
    }
}

fn function_from_record(record: &FunctionRecord) -> FunctionRef {
    FunctionRef {
        name: record.name.clone(),
        params: record.params.iter().map(value_from_json).collect(),
    }
}

fn functions_to_records(functions: &OrderedMap<String, FunctionRef>) -> Vec<(String, FunctionRecord)> {
    functions
        .iter()
        .map(|(attribute, function)| (attribute.clone(), function_to_record(function)))
        .collect()
}

fn functions_from_records(records: &[(String, FunctionRecord)]) -> OrderedMap<String, FunctionRef> {
    records
        .iter()
        .map(|(attribute, record)| (attribute.clone(), function_from_record(record)))
        .collect()
}

impl TableKind {
    pub(crate) fn to_record(&self) -> TableKindRecord {
        match self {
            TableKind::Static { name, rows } => TableKindRecord::Static {
                name: name.clone(),
                rows: rows.iter().map(row_to_json).collect(),
            },
            TableKind::StaticDict { name, rows } => TableKindRecord::StaticDict {
                name: name.clone(),
                rows: rows
                    .iter()
                    .map(|(key, row)| (key.clone(), row_to_json(row)))
                    .collect(),
            },
            TableKind::Aggregated { attribute } => TableKindRecord::Aggregated {
                attribute: attribute.clone(),
            },
            TableKind::Expanded {
                attribute,
                delimiter,
            } => TableKindRecord::Expanded {
                attribute: attribute.clone(),
                delimiter: delimiter.clone(),
            },
            TableKind::Faceted { attribute, value } => TableKindRecord::Faceted {
                attribute: attribute.clone(),
                value: value_to_json(value),
            },
            TableKind::Transposed { index } => TableKindRecord::Transposed {
                index: index.as_str().to_string(),
            },
            TableKind::Connected => TableKindRecord::Connected,
        }
    }

    pub(crate) fn from_record(record: &TableKindRecord) -> Result<Self> {
        Ok(match record {
            TableKindRecord::Static { name, rows } => TableKind::Static {
                name: name.clone(),
                rows: Rc::new(rows.iter().map(row_from_json).collect()),
            },
            TableKindRecord::StaticDict { name, rows } => TableKind::StaticDict {
                name: name.clone(),
                rows: Rc::new(
                    rows.iter()
                        .map(|(key, row)| (key.clone(), row_from_json(row)))
                        .collect(),
                ),
            },
            TableKindRecord::Aggregated { attribute } => TableKind::Aggregated {
                attribute: attribute.clone(),
            },
            TableKindRecord::Expanded {
                attribute,
                delimiter,
            } => {
                if delimiter.is_empty() {
                    return Err(Error::configuration("expand delimiter must not be empty"));
                }
                TableKind::Expanded {
                    attribute: attribute.clone(),
                    delimiter: delimiter.clone(),
                }
            }
            TableKindRecord::Faceted { attribute, value } => TableKind::Faceted {
                attribute: attribute.clone(),
                value: value_from_json(value),
            },
            TableKindRecord::Transposed { index } => TableKind::Transposed {
                index: ItemIndex::new(index.clone()),
            },
            TableKindRecord::Connected => TableKind::Connected,
        })
    }
}

impl Table {
    /// Captures how the table is defined. Caches are never persisted.
    pub fn to_record(&self) -> TableRecord {
        let state = self.state.borrow();
        TableRecord {
            table_id: self.id(),
            kind: self.kind().to_record(),
            derived_tables: state.derived_tables.iter().copied().collect(),
            custom_name: state.custom_name.clone(),
            expected_attributes: state.expected_attributes.iter().cloned().collect(),
            observed_attributes: state.observed_attributes.iter().cloned().collect(),
            derived_attributes: functions_to_records(&state.derived_attributes),
            suppressed_attributes: state.suppressed_attributes.iter().cloned().collect(),
            suppress_index: state.suppress_index,
            attribute_filters: functions_to_records(&state.attribute_filters),
            index_filter: state.index_filter.as_ref().map(function_to_record),
            duplicated_attributes: state
                .duplicated_attributes
                .iter()
                .map(|(parent_table_id, attribute)| DuplicatedAttributeRecord {
                    parent_table_id: *parent_table_id,
                    attribute: attribute.clone(),
                })
                .collect(),
            reduce_attributes: functions_to_records(&state.reduce_attributes),
        }
    }

    pub(crate) fn from_record(record: &TableRecord) -> Result<(TableKind, TableState)> {
        let kind = TableKind::from_record(&record.kind)?;
        let state = TableState {
            custom_name: record.custom_name.clone(),
            expected_attributes: record.expected_attributes.iter().cloned().collect(),
            observed_attributes: record.observed_attributes.iter().cloned().collect(),
            derived_attributes: functions_from_records(&record.derived_attributes),
            suppressed_attributes: record.suppressed_attributes.iter().cloned().collect(),
            suppress_index: record.suppress_index,
            attribute_filters: functions_from_records(&record.attribute_filters),
            index_filter: record.index_filter.as_ref().map(function_from_record),
            derived_tables: record.derived_tables.iter().copied().collect(),
            duplicated_attributes: record
                .duplicated_attributes
                .iter()
                .map(|d| (d.parent_table_id, d.attribute.clone()))
                .collect(),
            reduce_attributes: functions_from_records(&record.reduce_attributes),
        };
        Ok((kind, state))
    }
}

impl ClassSpec {
    pub fn to_record(&self) -> ClassRecord {
        let kind = match &self.kind {
            ClassKind::Generic => ClassKindRecord::Generic,
            ClassKind::Node { edge_class_ids } => ClassKindRecord::Node {
                edge_class_ids: edge_class_ids.iter().copied().collect(),
            },
            ClassKind::Edge(links) => ClassKindRecord::Edge {
                source_class_id: links.source_class_id,
                source_table_ids: links.source_table_ids.clone(),
                target_class_id: links.target_class_id,
                target_table_ids: links.target_table_ids.clone(),
                directed: links.directed,
            },
        };
        ClassRecord {
            class_id: self.class_id,
            table_id: self.table_id,
            class_name: self.class_name.clone(),
            annotations: self
                .annotations
                .iter()
                .map(|(key, value)| (key.clone(), value_to_json(value)))
                .collect(),
            kind,
        }
    }

    pub fn from_record(record: &ClassRecord) -> Self {
        let kind = match &record.kind {
            ClassKindRecord::Generic => ClassKind::Generic,
            ClassKindRecord::Node { edge_class_ids } => ClassKind::Node {
                edge_class_ids: edge_class_ids.iter().copied().collect(),
            },
            ClassKindRecord::Edge {
                source_class_id,
                source_table_ids,
                target_class_id,
                target_table_ids,
                directed,
            } => ClassKind::Edge(EdgeLinks {
                source_class_id: *source_class_id,
                source_table_ids: source_table_ids.clone(),
                target_class_id: *target_class_id,
                target_table_ids: target_table_ids.clone(),
                directed: *directed,
                swapped_direction: false,
            }),
        };
        ClassSpec {
            class_id: record.class_id,
            table_id: record.table_id,
            class_name: record.class_name.clone(),
            annotations: record
                .annotations
                .iter()
                .map(|(key, value)| (key.clone(), value_from_json(value)))
                .collect(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reshape_core::{Row, Value};
    use serde_json::json;

    #[test]
    fn test_function_record_params() {
        let function = FunctionRef::new("concat").with_param("-").with_param(2);
        let record = function_to_record(&function);
        assert_eq!(record.params, vec![json!("-"), json!(2)]);
        assert_eq!(function_from_record(&record), function);
    }

    #[test]
    fn test_table_kind_record() {
        let kind = TableKind::Faceted {
            attribute: "g".into(),
            value: Value::Int64(1),
        };
        let record = kind.to_record();
        assert_eq!(record.type_name(), "FacetedTable");
        let back = TableKind::from_record(&record).unwrap();
        assert!(back.same_derivation(&kind));
    }

    #[test]
    fn test_static_rows_record() {
        let kind = TableKind::Static {
            name: "people".into(),
            rows: Rc::new(vec![Row::with("name", "ada")]),
        };
        match kind.to_record() {
            TableKindRecord::Static { name, rows } => {
                assert_eq!(name, "people");
                assert_eq!(rows, vec![json!({"name": "ada"})]);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        let record = TableKindRecord::Expanded {
            attribute: "tags".into(),
            delimiter: String::new(),
        };
        assert!(matches!(
            TableKind::from_record(&record),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_class_record() {
        let spec = ClassSpec {
            class_id: 4,
            table_id: 2,
            class_name: Some("links".into()),
            annotations: [("color".to_string(), Value::from("red"))].into_iter().collect(),
            kind: ClassKind::Edge(EdgeLinks {
                source_class_id: Some(1),
                source_table_ids: vec![7],
                directed: true,
                ..EdgeLinks::default()
            }),
        };
        let record = spec.to_record();
        assert_eq!(record.annotations.get("color"), Some(&json!("red")));
        assert_eq!(ClassSpec::from_record(&record), spec);
    }
}
