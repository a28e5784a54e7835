//! Condition tree types
//!
//! A query's filter is a tree of equality maps combined with `And`/`Or`
//! groups and plain sequences. Compiling lowers it to a document-store
//! filter document.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One node of a condition tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equality map, one clause per entry
    Cond(Cond),
    /// Every element must hold
    And(Vec<Condition>),
    /// At least one element must hold
    Or(Vec<Condition>),
    /// Independent conditions, flattened into the enclosing list
    Seq(Vec<Condition>),
}

impl Condition {
    pub fn and(items: impl IntoIterator<Item = Condition>) -> Self {
        Self::And(items.into_iter().collect())
    }

    pub fn or(items: impl IntoIterator<Item = Condition>) -> Self {
        Self::Or(items.into_iter().collect())
    }

    pub fn seq(items: impl IntoIterator<Item = Condition>) -> Self {
        Self::Seq(items.into_iter().collect())
    }
}

impl From<Cond> for Condition {
    fn from(cond: Cond) -> Self {
        Self::Cond(cond)
    }
}

/// Equality map keyed by `"column"` or `"column op"`
///
/// Entries keep insertion order. Inserting a key that is already present
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cond {
    entries: Vec<(String, CondValue)>,
}

impl Cond {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<CondValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<CondValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn entries(&self) -> &[(String, CondValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Right-hand side of a clause
#[derive(Debug, Clone, PartialEq)]
pub enum CondValue {
    Literal(JsonValue),
    Func(Func),
}

impl From<JsonValue> for CondValue {
    fn from(value: JsonValue) -> Self {
        Self::Literal(value)
    }
}

impl From<Func> for CondValue {
    fn from(func: Func) -> Self {
        Self::Func(func)
    }
}

/// Named backend function applied to a column, e.g. `$in`
#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub name: String,
    pub args: JsonValue,
}

impl Func {
    pub fn new(name: &str, args: JsonValue) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }
}

/// Comparison token following the column in a clause key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Gt,
    Lt,
    Lte,
    Gte,
    /// Passed through to the backend verbatim
    Other(String),
}

impl Operator {
    pub fn parse(token: &str) -> Self {
        match token {
            ">" => Self::Gt,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            ">=" => Self::Gte,
            other => Self::Other(other.to_string()),
        }
    }

    /// Backend operator name
    pub fn as_str(&self) -> &str {
        match self {
            Self::Gt => "$gt",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Gte => "$gte",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How several top-level conditions are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TopLevel {
    /// Shallow-merge into one document, later keys win
    ///
    /// Avoids an explicit top-level `$and`, which some query planners
    /// handle poorly.
    #[default]
    Merge,
    /// Wrap under `$and`
    And,
}

impl fmt::Display for TopLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => f.write_str("merge"),
            Self::And => f.write_str("and"),
        }
    }
}

/// Backend-native filter document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CompiledFilter(JsonValue);

impl CompiledFilter {
    pub fn new(value: JsonValue) -> Self {
        Self(value)
    }

    /// Filter with no constraints
    pub fn empty() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    pub fn is_empty(&self) -> bool {
        matches!(&self.0, JsonValue::Object(map) if map.is_empty())
    }

    pub fn as_json(&self) -> &JsonValue {
        &self.0
    }

    pub fn into_json(self) -> JsonValue {
        self.0
    }
}

impl Default for CompiledFilter {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
