//! Format collaborator: textual payload to raw rows.

use crate::error::{Result, StorageError};
use crate::json::row_from_json;
use reshape_core::StaticData;
use serde_json::Value as Json;

/// Parses a textual payload into raw rows.
pub trait FormatParser {
    /// Parses `text` according to the `format` tag.
    fn parse(&self, text: &str, format: &str) -> Result<StaticData>;
}

/// Parses JSON payloads.
///
/// A top-level array yields position-indexed rows; a top-level object
/// yields key-indexed rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonParser;

impl FormatParser for JsonParser {
    fn parse(&self, text: &str, format: &str) -> Result<StaticData> {
        if !format.eq_ignore_ascii_case("json") {
            return Err(StorageError::unsupported_format(format));
        }
        match serde_json::from_str::<Json>(text)? {
            Json::Array(items) => Ok(StaticData::Array(items.iter().map(row_from_json).collect())),
            Json::Object(map) => Ok(StaticData::dict(
                map.iter().map(|(k, v)| (k.as_str(), row_from_json(v))),
            )),
            _ => Err(StorageError::invalid_data(
                "expected a top-level array or object",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reshape_core::Value;

    #[test]
    fn test_parse_array() {
        let data = JsonParser.parse(r#"[{"a": 1}, 2]"#, "json").unwrap();
        match data {
            StaticData::Array(rows) => {
                assert_eq!(rows[0].get("a"), Some(&Value::Int64(1)));
                assert_eq!(rows[1].get("value"), Some(&Value::Int64(2)));
            }
            _ => panic!("expected array data"),
        }
    }

    #[test]
    fn test_parse_object() {
        let data = JsonParser.parse(r#"{"b": {}, "a": {}}"#, "JSON").unwrap();
        assert!(matches!(data, StaticData::Dict(_)));
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn test_parse_rejects() {
        assert!(matches!(
            JsonParser.parse("[]", "csv"),
            Err(StorageError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            JsonParser.parse("3", "json"),
            Err(StorageError::InvalidData { .. })
        ));
        assert!(matches!(
            JsonParser.parse("{", "json"),
            Err(StorageError::Serialization { .. })
        ));
    }
}
