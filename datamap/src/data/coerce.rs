//! Textual value coercion
//!
//! Converts raw column text into typed [`Value`]s.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::value::{Kind, Value};

/// Failed textual conversion
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot convert {raw:?} to {kind}")]
pub struct CoerceError {
    pub raw: String,
    pub kind: Kind,
}

impl CoerceError {
    fn new(raw: &str, kind: Kind) -> Self {
        Self {
            raw: raw.to_string(),
            kind,
        }
    }
}

/// What to do when a column value cannot be converted to its declared kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionPolicy {
    /// Keep the textual form and carry on with the row
    #[default]
    Lenient,
    /// Fail the row being fetched
    Strict,
}

impl fmt::Display for CoercionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercionPolicy::Lenient => write!(f, "lenient"),
            CoercionPolicy::Strict => write!(f, "strict"),
        }
    }
}

/// Convert a raw textual value to `kind`
pub fn convert(raw: &str, kind: Kind) -> Result<Value, CoerceError> {
    match kind {
        Kind::String | Kind::Any => Ok(Value::String(raw.to_string())),
        Kind::Bytes => Ok(Value::Bytes(raw.as_bytes().to_vec())),
        Kind::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| CoerceError::new(raw, kind)),
        Kind::Uint => raw
            .trim()
            .parse::<u64>()
            .map(Value::Uint)
            .map_err(|_| CoerceError::new(raw, kind)),
        Kind::Float => raw
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| CoerceError::new(raw, kind)),
        Kind::Bool => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| CoerceError::new(raw, kind)),
        Kind::Time => parse_time(raw)
            .map(Value::Time)
            .ok_or_else(|| CoerceError::new(raw, kind)),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" | "yes" | "on" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse RFC 3339, SQL datetime (UTC assumed) or a bare date
fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_convert_int() {
        assert_eq!(convert("42", Kind::Int), Ok(Value::Int(42)));
        assert_eq!(convert(" -7 ", Kind::Int), Ok(Value::Int(-7)));
    }

    #[test]
    fn test_convert_int_invalid() {
        let err = convert("forty", Kind::Int).unwrap_err();
        assert_eq!(err.kind, Kind::Int);
        assert_eq!(err.to_string(), r#"cannot convert "forty" to int"#);
    }

    #[test]
    fn test_convert_uint_rejects_negative() {
        assert!(convert("-1", Kind::Uint).is_err());
        assert_eq!(convert("18", Kind::Uint), Ok(Value::Uint(18)));
    }

    #[test]
    fn test_convert_float() {
        assert_eq!(convert("1.5", Kind::Float), Ok(Value::Float(1.5)));
    }

    #[test]
    fn test_convert_bool() {
        assert_eq!(convert("t", Kind::Bool), Ok(Value::Bool(true)));
        assert_eq!(convert("0", Kind::Bool), Ok(Value::Bool(false)));
        assert!(convert("maybe", Kind::Bool).is_err());
    }

    #[test]
    fn test_convert_time_formats() {
        let expected = Utc.with_ymd_and_hms(2014, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            convert("2014-03-01T12:30:00Z", Kind::Time),
            Ok(Value::Time(expected))
        );
        assert_eq!(
            convert("2014-03-01 12:30:00", Kind::Time),
            Ok(Value::Time(expected))
        );
        assert_eq!(
            convert("2014-03-01", Kind::Time),
            Ok(Value::Time(Utc.with_ymd_and_hms(2014, 3, 1, 0, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_convert_string_and_any_keep_text() {
        assert_eq!(convert(" x ", Kind::String), Ok(Value::from(" x ")));
        assert_eq!(convert("42", Kind::Any), Ok(Value::from("42")));
    }

    #[test]
    fn test_policy_serde() {
        let policy: CoercionPolicy = serde_json::from_str(r#""strict""#).unwrap();
        assert_eq!(policy, CoercionPolicy::Strict);
        assert_eq!(CoercionPolicy::default(), CoercionPolicy::Lenient);
    }
}
