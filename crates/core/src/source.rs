//! Raw row sources.
//!
//! Static tables are constructed from either an array of rows (indexed by
//! position) or a keyed record of rows (indexed by key).

use crate::row::{OrderedMap, Row};
use alloc::string::String;
use alloc::vec::Vec;

/// Raw rows handed over by the row-source collaborator.
#[derive(Clone, Debug, PartialEq)]
pub enum StaticData {
    /// Rows indexed by array position.
    Array(Vec<Row>),
    /// Rows indexed by key, in insertion order.
    Dict(OrderedMap<String, Row>),
}

impl StaticData {
    /// Returns the number of raw rows.
    pub fn len(&self) -> usize {
        match self {
            StaticData::Array(rows) => rows.len(),
            StaticData::Dict(rows) => rows.len(),
        }
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds keyed data from (key, row) pairs.
    pub fn dict<K, I>(rows: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Row)>,
    {
        StaticData::Dict(rows.into_iter().map(|(k, r)| (k.into(), r)).collect())
    }
}

impl From<Vec<Row>> for StaticData {
    fn from(rows: Vec<Row>) -> Self {
        StaticData::Array(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_static_data_len() {
        let data = StaticData::from(vec![Row::new(), Row::new()]);
        assert_eq!(data.len(), 2);

        let data = StaticData::dict([("a", Row::new())]);
        assert_eq!(data.len(), 1);
        assert!(!data.is_empty());
    }
}
