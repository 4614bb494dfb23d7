//! Table construction: type tags, per-variant payloads and the option bag.

use reshape_core::{Error, ItemIndex, OrderedMap, Result, Row, StaticData, TableId, Value};
use std::rc::Rc;

/// Type tag selecting a table variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableType {
    Static,
    StaticDict,
    Aggregated,
    Expanded,
    Faceted,
    Transposed,
    Connected,
}

impl TableType {
    /// Returns the variant's type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            TableType::Static => "StaticTable",
            TableType::StaticDict => "StaticDictTable",
            TableType::Aggregated => "AggregatedTable",
            TableType::Expanded => "ExpandedTable",
            TableType::Faceted => "FacetedTable",
            TableType::Transposed => "TransposedTable",
            TableType::Connected => "ConnectedTable",
        }
    }

    /// True for tables backed by in-memory rows.
    pub fn is_static(&self) -> bool {
        matches!(self, TableType::Static | TableType::StaticDict)
    }

    /// True for variants that read exactly one parent table.
    pub fn is_single_parent(&self) -> bool {
        matches!(
            self,
            TableType::Aggregated | TableType::Expanded | TableType::Faceted | TableType::Transposed
        )
    }

    /// True for variants that can copy parent attributes onto their rows.
    pub fn supports_duplicates(&self) -> bool {
        matches!(self, TableType::Expanded | TableType::Connected)
    }
}

/// A table variant together with its construction parameters.
#[derive(Clone, Debug)]
pub enum TableKind {
    Static {
        name: String,
        rows: Rc<Vec<Row>>,
    },
    StaticDict {
        name: String,
        rows: Rc<OrderedMap<String, Row>>,
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
        value: Value,
    },
    Transposed {
        index: ItemIndex,
    },
    Connected,
}

impl TableKind {
    /// Returns the type tag.
    pub fn table_type(&self) -> TableType {
        match self {
            TableKind::Static { .. } => TableType::Static,
            TableKind::StaticDict { .. } => TableType::StaticDict,
            TableKind::Aggregated { .. } => TableType::Aggregated,
            TableKind::Expanded { .. } => TableType::Expanded,
            TableKind::Faceted { .. } => TableType::Faceted,
            TableKind::Transposed { .. } => TableType::Transposed,
            TableKind::Connected => TableType::Connected,
        }
    }

    /// True if deriving `other` from the same parent would build the same table.
    ///
    /// Connected tables are matched by parent set instead, and static tables
    /// are never derived.
    pub fn same_derivation(&self, other: &TableKind) -> bool {
        match (self, other) {
            (TableKind::Aggregated { attribute: a }, TableKind::Aggregated { attribute: b }) => {
                a == b
            }
            (
                TableKind::Expanded {
                    attribute: a,
                    delimiter: da,
                },
                TableKind::Expanded {
                    attribute: b,
                    delimiter: db,
                },
            ) => a == b && da == db,
            (
                TableKind::Faceted {
                    attribute: a,
                    value: va,
                },
                TableKind::Faceted {
                    attribute: b,
                    value: vb,
                },
            ) => a == b && va.to_key_string() == vb.to_key_string(),
            (TableKind::Transposed { index: a }, TableKind::Transposed { index: b }) => a == b,
            _ => false,
        }
    }
}

/// Option bag accepted by `Model::create_table`.
///
/// Which fields are required depends on `table_type`; `into_kind` checks
/// them and reports a configuration error for anything missing.
#[derive(Clone, Debug, Default)]
pub struct TableOptions {
    pub table_type: Option<TableType>,
    /// Preset id, used when hydrating. Fresh tables get an allocated id.
    pub table_id: Option<TableId>,
    pub name: Option<String>,
    pub data: Option<StaticData>,
    pub attribute: Option<String>,
    pub delimiter: Option<String>,
    pub value: Option<Value>,
    pub index: Option<ItemIndex>,
    pub expected_attributes: Vec<String>,
}

impl TableOptions {
    /// Creates options for the given table type.
    pub fn new(table_type: TableType) -> Self {
        Self {
            table_type: Some(table_type),
            ..Self::default()
        }
    }

    /// Options for a position-indexed static table.
    pub fn static_rows(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self::new(TableType::Static)
            .with_name(name)
            .with_data(StaticData::Array(rows))
    }

    /// Options for a key-indexed static table.
    pub fn static_dict(name: impl Into<String>, rows: OrderedMap<String, Row>) -> Self {
        Self::new(TableType::StaticDict)
            .with_name(name)
            .with_data(StaticData::Dict(rows))
    }

    pub fn with_table_id(mut self, table_id: TableId) -> Self {
        self.table_id = Some(table_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_data(mut self, data: StaticData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_index(mut self, index: impl Into<ItemIndex>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_expected_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Validates the options into a variant payload.
    pub fn into_kind(self) -> Result<TableKind> {
        let table_type = self
            .table_type
            .ok_or_else(|| Error::configuration("table type is required"))?;
        let type_name = table_type.type_name();
        let attribute = |attribute: Option<String>| match attribute {
            Some(a) if !a.is_empty() => Ok(a),
            _ => Err(Error::configuration(format!("{} requires an attribute", type_name))),
        };

        match table_type {
            TableType::Static => match self.data {
                Some(StaticData::Array(rows)) => Ok(TableKind::Static {
                    name: self.name.unwrap_or_default(),
                    rows: Rc::new(rows),
                }),
                Some(StaticData::Dict(_)) => Err(Error::configuration(
                    "StaticTable requires array data; use StaticDictTable for keyed rows",
                )),
                None => Err(Error::configuration("StaticTable requires data")),
            },
            TableType::StaticDict => match self.data {
                Some(StaticData::Dict(rows)) => Ok(TableKind::StaticDict {
                    name: self.name.unwrap_or_default(),
                    rows: Rc::new(rows),
                }),
                Some(StaticData::Array(_)) => Err(Error::configuration(
                    "StaticDictTable requires keyed data; use StaticTable for arrays",
                )),
                None => Err(Error::configuration("StaticDictTable requires data")),
            },
            TableType::Aggregated => Ok(TableKind::Aggregated {
                attribute: attribute(self.attribute)?,
            }),
            TableType::Expanded => {
                let delimiter = self.delimiter.unwrap_or_else(|| ",".to_string());
                if delimiter.is_empty() {
                    return Err(Error::configuration("ExpandedTable delimiter must not be empty"));
                }
                Ok(TableKind::Expanded {
                    attribute: attribute(self.attribute)?,
                    delimiter,
                })
            }
            TableType::Faceted => {
                let attribute = attribute(self.attribute)?;
                let value = self
                    .value
                    .ok_or_else(|| Error::configuration("FacetedTable requires a value"))?;
                Ok(TableKind::Faceted { attribute, value })
            }
            TableType::Transposed => Ok(TableKind::Transposed {
                index: self
                    .index
                    .ok_or_else(|| Error::configuration("TransposedTable requires an index"))?,
            }),
            TableType::Connected => Ok(TableKind::Connected),
        }
    }
}
