//! JSON utility functions

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::data::value::Value;

/// Raw cell text for a JSON row cell, `None` for null
///
/// Strings are taken verbatim; numbers and booleans use their JSON text, and
/// nested arrays or objects their compact JSON encoding.
pub fn json_to_cell(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// JSON document for a mapped row
pub fn document_to_json(document: BTreeMap<String, Value>) -> JsonValue {
    JsonValue::from(Value::Map(document))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_json_to_cell() {
        assert_eq!(json_to_cell(&JsonValue::Null), None);
        assert_eq!(json_to_cell(&json!("42")), Some("42".to_string()));
        assert_eq!(json_to_cell(&json!(42)), Some("42".to_string()));
        assert_eq!(json_to_cell(&json!(true)), Some("true".to_string()));
        assert_eq!(json_to_cell(&json!([1, 2])), Some("[1,2]".to_string()));
    }

    #[test]
    fn test_document_to_json() {
        let mut document = BTreeMap::new();
        document.insert("id".to_string(), Value::Int(1));
        document.insert("name".to_string(), Value::from("ada"));
        assert_eq!(document_to_json(document), json!({"id": 1, "name": "ada"}));
    }
}
