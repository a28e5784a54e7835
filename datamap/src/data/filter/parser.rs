//! Condition parsing
//!
//! Reads condition trees from JSON:
//!
//! - an array is a sequence
//! - `{"$and": [...]}` and `{"$or": [...]}` are groups
//! - any other object is an equality map; a value of the form
//!   `{"$func": "$in", "$args": [...]}` is a function call, anything else a literal

use serde_json::{Map, Value as JsonValue};

use crate::data::error::ConditionParseError;

use super::types::{Cond, CondValue, Condition, Func};

/// Maximum size of condition JSON in bytes (64KB)
pub const MAX_CONDITION_JSON_SIZE: usize = 64 * 1024;

/// Maximum nesting of groups and sequences
pub const MAX_CONDITION_DEPTH: usize = 32;

const AND_KEY: &str = "$and";
const OR_KEY: &str = "$or";
const FUNC_KEY: &str = "$func";
const ARGS_KEY: &str = "$args";

/// Parse the conditions of one query
///
/// A top-level array holds the query's conditions; a single object is one
/// condition.
pub fn parse_conditions(json_str: &str) -> Result<Vec<Condition>, ConditionParseError> {
    if json_str.len() > MAX_CONDITION_JSON_SIZE {
        return Err(ConditionParseError::TooLarge {
            max: MAX_CONDITION_JSON_SIZE,
        });
    }

    let value: JsonValue = serde_json::from_str(json_str)?;
    match value {
        JsonValue::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_node(item, &format!("$[{i}]"), 1))
            .collect(),
        other => Ok(vec![parse_node(&other, "$", 0)?]),
    }
}

fn parse_node(value: &JsonValue, path: &str, depth: usize) -> Result<Condition, ConditionParseError> {
    if depth > MAX_CONDITION_DEPTH {
        return Err(ConditionParseError::TooDeep {
            max: MAX_CONDITION_DEPTH,
        });
    }

    match value {
        JsonValue::Array(items) => Ok(Condition::Seq(parse_items(items, path, depth)?)),
        JsonValue::Object(map) => {
            if let Some(items) = group_items(map, AND_KEY, path)? {
                let path = format!("{path}.{AND_KEY}");
                return Ok(Condition::And(parse_items(items, &path, depth)?));
            }
            if let Some(items) = group_items(map, OR_KEY, path)? {
                let path = format!("{path}.{OR_KEY}");
                return Ok(Condition::Or(parse_items(items, &path, depth)?));
            }
            parse_cond(map, path).map(Condition::Cond)
        }
        other => Err(ConditionParseError::invalid(
            path,
            format!("expected an object or array, found {}", type_name(other)),
        )),
    }
}

fn parse_items(
    items: &[JsonValue],
    path: &str,
    depth: usize,
) -> Result<Vec<Condition>, ConditionParseError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_node(item, &format!("{path}[{i}]"), depth + 1))
        .collect()
}

/// Elements of a `$and`/`$or` group, `None` when `map` is not that group
fn group_items<'a>(
    map: &'a Map<String, JsonValue>,
    key: &str,
    path: &str,
) -> Result<Option<&'a [JsonValue]>, ConditionParseError> {
    let Some(value) = map.get(key) else {
        return Ok(None);
    };
    if map.len() > 1 {
        return Err(ConditionParseError::invalid(
            path,
            format!("{key} must be the only key of its object"),
        ));
    }
    match value {
        JsonValue::Array(items) => Ok(Some(items.as_slice())),
        other => Err(ConditionParseError::invalid(
            path,
            format!("{key} expects an array, found {}", type_name(other)),
        )),
    }
}

fn parse_cond(map: &Map<String, JsonValue>, path: &str) -> Result<Cond, ConditionParseError> {
    let mut cond = Cond::new();
    for (key, value) in map {
        let value = match value {
            JsonValue::Object(inner) if inner.contains_key(FUNC_KEY) => {
                CondValue::Func(parse_func(inner, &format!("{path}.{key}"))?)
            }
            other => CondValue::Literal(other.clone()),
        };
        cond.insert(key, value);
    }
    Ok(cond)
}

fn parse_func(map: &Map<String, JsonValue>, path: &str) -> Result<Func, ConditionParseError> {
    let name = match map.get(FUNC_KEY) {
        Some(JsonValue::String(name)) if !name.trim().is_empty() => name.trim(),
        _ => {
            return Err(ConditionParseError::invalid(
                path,
                format!("{FUNC_KEY} must be a non-empty string"),
            ));
        }
    };
    if let Some(extra) = map.keys().find(|k| *k != FUNC_KEY && *k != ARGS_KEY) {
        return Err(ConditionParseError::invalid(
            path,
            format!("unexpected key {extra:?} in function call"),
        ));
    }
    let args = map
        .get(ARGS_KEY)
        .cloned()
        .unwrap_or_else(|| JsonValue::Array(Vec::new()));
    Ok(Func::new(name, args))
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::data::filter::{TopLevel, compile_query};

    #[test]
    fn test_parse_single_object() {
        let conditions = parse_conditions(r#"{"age >": 30}"#).unwrap();
        assert_eq!(conditions.len(), 1);
        assert_eq!(
            conditions[0],
            Condition::Cond(Cond::new().with("age >", json!(30)))
        );
    }

    #[test]
    fn test_parse_top_level_array() {
        let conditions = parse_conditions(r#"[{"a": 1}, {"b": 2}]"#).unwrap();
        assert_eq!(conditions.len(), 2);
        let filter = compile_query(&conditions, TopLevel::Merge);
        assert_eq!(filter.as_json(), &json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_parse_groups() {
        let conditions =
            parse_conditions(r#"{"$or": [{"a": 1}, {"$and": [{"b >": 2}, [{"c": 3}]]}]}"#)
                .unwrap();
        let expected = Condition::or([
            Cond::new().with("a", json!(1)).into(),
            Condition::and([
                Cond::new().with("b >", json!(2)).into(),
                Condition::seq([Cond::new().with("c", json!(3)).into()]),
            ]),
        ]);
        assert_eq!(conditions, vec![expected]);
    }

    #[test]
    fn test_parse_function_call() {
        let conditions =
            parse_conditions(r#"{"tags": {"$func": "$in", "$args": ["x", "y"]}}"#).unwrap();
        assert_eq!(
            conditions[0],
            Condition::Cond(Cond::new().with("tags", Func::new("$in", json!(["x", "y"]))))
        );
    }

    #[test]
    fn test_parse_function_call_without_args() {
        let conditions = parse_conditions(r#"{"tags": {"$func": "$exists"}}"#).unwrap();
        assert_eq!(
            conditions[0],
            Condition::Cond(Cond::new().with("tags", Func::new("$exists", json!([]))))
        );
    }

    #[test]
    fn test_parse_object_literal_value() {
        let conditions = parse_conditions(r#"{"meta": {"k": "v"}}"#).unwrap();
        assert_eq!(
            conditions[0],
            Condition::Cond(Cond::new().with("meta", json!({"k": "v"})))
        );
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(matches!(
            parse_conditions("not json"),
            Err(ConditionParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_parse_rejects_scalar_condition() {
        let err = parse_conditions("[1]").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid condition at $[0]: expected an object or array, found number"
        );
    }

    #[test]
    fn test_parse_rejects_bad_groups() {
        assert!(parse_conditions(r#"{"$or": {"a": 1}}"#).is_err());
        assert!(parse_conditions(r#"{"$and": [], "a": 1}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_function_calls() {
        assert!(parse_conditions(r#"{"a": {"$func": 1}}"#).is_err());
        assert!(parse_conditions(r#"{"a": {"$func": "$in", "other": 1}}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_large_input() {
        let json = format!(r#"{{"a": "{}"}}"#, "x".repeat(MAX_CONDITION_JSON_SIZE));
        assert!(matches!(
            parse_conditions(&json),
            Err(ConditionParseError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_deep_nesting() {
        let depth = MAX_CONDITION_DEPTH + 2;
        let json = format!("{}{{}}{}", "[".repeat(depth), "]".repeat(depth));
        assert!(matches!(
            parse_conditions(&json),
            Err(ConditionParseError::TooDeep { .. })
        ));

        let ok = format!("{}{{}}{}", "[".repeat(8), "]".repeat(8));
        assert!(parse_conditions(&ok).is_ok());
    }
}
