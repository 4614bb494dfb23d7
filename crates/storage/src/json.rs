//! Conversion between JSON and reshape values.

use reshape_core::{Row, Value};
use serde_json::{Map, Number, Value as Json};

/// Converts a JSON value into a reshape value.
///
/// Integers that fit in `i64` stay integral; every other number becomes a
/// float. Objects become nested records with their key order preserved as
/// parsed.
pub fn value_from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int64(i),
            None => Value::Float64(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(value_from_json).collect()),
        Json::Object(map) => Value::Record(row_from_object(map)),
    }
}

/// Converts a reshape value into JSON.
///
/// Non-finite floats have no JSON form and become `null`.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Int64(i) => Json::Number((*i).into()),
        Value::Float64(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Value::String(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Record(row) => Json::Object(row_to_object(row)),
    }
}

/// Converts a raw JSON entry into a row.
///
/// Objects map attribute-for-attribute; any other entry is stored under the
/// single attribute `value`.
pub fn row_from_json(json: &Json) -> Row {
    match json {
        Json::Object(map) => row_from_object(map),
        other => Row::with("value", value_from_json(other)),
    }
}

/// Converts a row into a JSON object.
pub fn row_to_json(row: &Row) -> Json {
    Json::Object(row_to_object(row))
}

fn row_from_object(map: &Map<String, Json>) -> Row {
    map.iter()
        .map(|(k, v)| (k.as_str(), value_from_json(v)))
        .collect()
}

fn row_to_object(row: &Row) -> Map<String, Json> {
    row.iter()
        .map(|(k, v)| (k.to_string(), value_to_json(v)))
        .collect()
}
