//! Condition compilation
//!
//! Lowers condition trees into filter documents of the shape
//! `{"age": {"$gt": 30}}`, `{"$or": [...]}`.

use serde_json::{Map, Value as JsonValue};

use super::types::{CompiledFilter, Cond, CondValue, Condition, Operator, TopLevel};

/// Compile a single condition node
///
/// Returns `None` for an empty equality map and for a sequence whose elements
/// all compile to nothing. Groups always compile, `Or([])` to `{"$or": []}`.
pub fn compile(condition: &Condition) -> Option<JsonValue> {
    match condition {
        Condition::Cond(cond) => compile_cond(cond),
        Condition::Seq(items) => {
            let values = compile_list(items);
            (!values.is_empty()).then_some(JsonValue::Array(values))
        }
        Condition::Or(items) => group("$or", items),
        Condition::And(items) => group("$and", items),
    }
}

/// Compile the conditions of one query into a single filter
///
/// One compiled condition is returned as is and none yields the empty
/// filter. Several are combined according to `top_level`.
pub fn compile_query(conditions: &[Condition], top_level: TopLevel) -> CompiledFilter {
    let mut compiled = compile_list(conditions);

    let filter = match compiled.len() {
        0 => CompiledFilter::empty(),
        1 => CompiledFilter::new(compiled.remove(0)),
        _ => match top_level {
            TopLevel::Merge => CompiledFilter::new(merge(compiled)),
            TopLevel::And => {
                let mut map = Map::new();
                map.insert("$and".to_string(), JsonValue::Array(compiled));
                CompiledFilter::new(JsonValue::Object(map))
            }
        },
    };

    tracing::debug!(%top_level, filter = %filter, "Compiled query conditions");
    filter
}

/// Compile each node, splicing nested sequences into the list
fn compile_list(items: &[Condition]) -> Vec<JsonValue> {
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Condition::Seq(nested) => values.extend(compile_list(nested)),
            other => values.extend(compile(other)),
        }
    }
    values
}

/// Empty elements are dropped but the group itself is kept
fn group(key: &str, items: &[Condition]) -> Option<JsonValue> {
    let values = compile_list(items);
    let mut map = Map::new();
    map.insert(key.to_string(), JsonValue::Array(values));
    Some(JsonValue::Object(map))
}

fn compile_cond(cond: &Cond) -> Option<JsonValue> {
    if cond.is_empty() {
        return None;
    }

    let mut map = Map::new();
    for (key, value) in cond.entries() {
        let key = key.trim();
        let (column, operator) = match key.split_once(char::is_whitespace) {
            Some((column, token)) => (column, Some(Operator::parse(token.trim()))),
            None => (key, None),
        };

        let compiled = match (value, operator) {
            // Function calls carry their own operator
            (CondValue::Func(func), _) => single(&func.name, func.args.clone()),
            (CondValue::Literal(literal), None) => literal.clone(),
            (CondValue::Literal(literal), Some(op)) => single(op.as_str(), literal.clone()),
        };
        map.insert(column.to_string(), compiled);
    }

    Some(JsonValue::Object(map))
}

fn single(key: &str, value: JsonValue) -> JsonValue {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    JsonValue::Object(map)
}

/// Shallow-merge compiled documents, later keys overwrite earlier ones
fn merge(documents: Vec<JsonValue>) -> JsonValue {
    let mut merged = Map::new();
    for document in documents {
        match document {
            JsonValue::Object(map) => merged.extend(map),
            other => tracing::warn!(value = %other, "Skipping non-document condition in merge"),
        }
    }
    JsonValue::Object(merged)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::data::filter::types::Func;

    fn cond(key: &str, value: JsonValue) -> Condition {
        Cond::new().with(key, value).into()
    }

    #[test]
    fn test_compile_operator_clauses() {
        assert_eq!(compile(&cond("age >", json!(30))), Some(json!({"age": {"$gt": 30}})));
        assert_eq!(compile(&cond("age <=", json!(30))), Some(json!({"age": {"$lte": 30}})));
        assert_eq!(compile(&cond("age <", json!(1))), Some(json!({"age": {"$lt": 1}})));
        assert_eq!(compile(&cond("age >=", json!(1))), Some(json!({"age": {"$gte": 1}})));
    }

    #[test]
    fn test_compile_plain_equality() {
        assert_eq!(compile(&cond("name", json!("ada"))), Some(json!({"name": "ada"})));
    }

    #[test]
    fn test_compile_trims_key() {
        assert_eq!(
            compile(&cond("  age   > ", json!(30))),
            Some(json!({"age": {"$gt": 30}}))
        );
    }

    #[test]
    fn test_compile_unknown_operator_passes_through() {
        assert_eq!(
            compile(&cond("name $ne", json!("bob"))),
            Some(json!({"name": {"$ne": "bob"}}))
        );
    }

    #[test]
    fn test_compile_function_call_ignores_operator() {
        let condition: Condition = Cond::new()
            .with("tags >", Func::new("$in", json!(["a", "b"])))
            .into();
        assert_eq!(compile(&condition), Some(json!({"tags": {"$in": ["a", "b"]}})));
    }

    #[test]
    fn test_compile_or_group() {
        let condition = Condition::or([cond("a", json!(1)), cond("b", json!(2))]);
        assert_eq!(
            compile(&condition),
            Some(json!({"$or": [{"a": 1}, {"b": 2}]}))
        );
    }

    #[test]
    fn test_compile_and_group() {
        let condition = Condition::and([cond("a >", json!(1)), cond("a <", json!(5))]);
        assert_eq!(
            compile(&condition),
            Some(json!({"$and": [{"a": {"$gt": 1}}, {"a": {"$lt": 5}}]}))
        );
    }

    #[test]
    fn test_compile_nested_sequence_flattens() {
        let condition = Condition::or([
            cond("a", json!(1)),
            Condition::seq([cond("b", json!(2)), cond("c", json!(3))]),
        ]);
        assert_eq!(
            compile(&condition),
            Some(json!({"$or": [{"a": 1}, {"b": 2}, {"c": 3}]}))
        );
    }

    #[test]
    fn test_compile_empty_nodes() {
        assert_eq!(compile(&Cond::new().into()), None);
        assert_eq!(compile(&Condition::seq([Cond::new().into()])), None);
        assert_eq!(
            compile(&Condition::and([Cond::new().into(), cond("a", json!(1))])),
            Some(json!({"$and": [{"a": 1}]}))
        );
    }

    #[test]
    fn test_compile_empty_group_is_kept() {
        assert_eq!(compile(&Condition::or([])), Some(json!({"$or": []})));
        assert_eq!(compile(&Condition::and([])), Some(json!({"$and": []})));
        assert_eq!(
            compile(&Condition::or([Cond::new().into()])),
            Some(json!({"$or": []}))
        );

        let conditions = [cond("a", json!(1)), Condition::or([])];
        assert_eq!(
            compile_query(&conditions, TopLevel::Merge).into_json(),
            json!({"a": 1, "$or": []})
        );
        assert_eq!(
            compile_query(&conditions, TopLevel::And).into_json(),
            json!({"$and": [{"a": 1}, {"$or": []}]})
        );
    }

    #[test]
    fn test_compile_multi_entry_cond() {
        let condition: Condition = Cond::new()
            .with("name", json!("ada"))
            .with("age >", json!(30))
            .into();
        assert_eq!(
            compile(&condition),
            Some(json!({"name": "ada", "age": {"$gt": 30}}))
        );
    }

    #[test]
    fn test_compile_query_merges_top_level() {
        let filter = compile_query(&[cond("a", json!(1)), cond("b", json!(2))], TopLevel::Merge);
        assert_eq!(filter.as_json(), &json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_compile_query_merge_later_wins() {
        let filter = compile_query(
            &[cond("a", json!(1)), cond("a", json!(2))],
            TopLevel::Merge,
        );
        assert_eq!(filter.into_json(), json!({"a": 2}));
    }

    #[test]
    fn test_compile_query_and_mode() {
        let filter = compile_query(&[cond("a", json!(1)), cond("b", json!(2))], TopLevel::And);
        assert_eq!(filter.as_json(), &json!({"$and": [{"a": 1}, {"b": 2}]}));
    }

    #[test]
    fn test_compile_query_single_condition_unwrapped() {
        let or = Condition::or([cond("a", json!(1)), cond("b", json!(2))]);
        for top_level in [TopLevel::Merge, TopLevel::And] {
            let filter = compile_query(std::slice::from_ref(&or), top_level);
            assert_eq!(filter.as_json(), &json!({"$or": [{"a": 1}, {"b": 2}]}));
        }
    }

    #[test]
    fn test_compile_query_empty() {
        assert!(compile_query(&[], TopLevel::Merge).is_empty());
        assert!(compile_query(&[Cond::new().into()], TopLevel::And).is_empty());
    }

    #[test]
    fn test_compile_query_flattens_sequences() {
        let filter = compile_query(
            &[Condition::seq([cond("a", json!(1)), cond("b", json!(2))])],
            TopLevel::Merge,
        );
        assert_eq!(filter.as_json(), &json!({"a": 1, "b": 2}));
    }
}
