//! Dynamic values and semantic kinds
//!
//! Rows arrive from the storage driver as text. The mapper turns each cell
//! into a [`Value`] of the [`Kind`] declared for its column, then hands it to
//! the destination field or map entry.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Semantic scalar kind of a column or destination slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    #[default]
    String,
    Int,
    Uint,
    Float,
    Bool,
    Time,
    Bytes,
    /// Fully generic slot, accepts whatever the column produced
    Any,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Float => "float",
            Kind::Bool => "bool",
            Kind::Time => "time",
            Kind::Bytes => "bytes",
            Kind::Any => "any",
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, Kind::Any)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mapper value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    String(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Time(DateTime<Utc>),
    Bytes(Vec<u8>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Concrete kind of this value. `Null` and `Map` carry no scalar kind.
    pub fn kind(&self) -> Kind {
        match self {
            Value::String(_) => Kind::String,
            Value::Int(_) => Kind::Int,
            Value::Uint(_) => Kind::Uint,
            Value::Float(_) => Kind::Float,
            Value::Bool(_) => Kind::Bool,
            Value::Time(_) => Kind::Time,
            Value::Bytes(_) => Kind::Bytes,
            Value::Null | Value::Map(_) => Kind::Any,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Value> for JsonValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => JsonValue::Null,
            Value::String(s) => JsonValue::String(s),
            Value::Int(i) => JsonValue::from(i),
            Value::Uint(u) => JsonValue::from(u),
            // NaN and infinities have no JSON form
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Bool(b) => JsonValue::Bool(b),
            Value::Time(t) => JsonValue::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Bytes(b) => JsonValue::String(String::from_utf8_lossy(&b).into_owned()),
            Value::Map(m) => JsonValue::Object(
                m.into_iter()
                    .map(|(k, v)| (k, JsonValue::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_kind_serde() {
        let kind: Kind = serde_json::from_str(r#""uint""#).unwrap();
        assert_eq!(kind, Kind::Uint);
        assert_eq!(serde_json::to_string(&Kind::Time).unwrap(), r#""time""#);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(Kind::Float.to_string(), "float");
        assert_eq!(Kind::default(), Kind::String);
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::Int(1).kind(), Kind::Int);
        assert_eq!(Value::from("a").kind(), Kind::String);
        assert_eq!(Value::Null.kind(), Kind::Any);
        assert_eq!(Value::Map(BTreeMap::new()).kind(), Kind::Any);
    }

    #[test]
    fn test_value_to_json() {
        let mut map = BTreeMap::new();
        map.insert("age".to_string(), Value::Int(42));
        map.insert("name".to_string(), Value::from("ada"));
        map.insert("nan".to_string(), Value::Float(f64::NAN));
        assert_eq!(
            JsonValue::from(Value::Map(map)),
            json!({"age": 42, "name": "ada", "nan": null})
        );
    }

    #[test]
    fn test_time_to_json() {
        let t = Utc.with_ymd_and_hms(2014, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            JsonValue::from(Value::Time(t)),
            json!("2014-03-01T12:30:00Z")
        );
    }
}
