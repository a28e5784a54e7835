//! Column type table
//!
//! Maps lowercase column names to the [`Kind`] their raw text is converted to.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::value::Kind;

/// Column name -> semantic kind, keyed by lowercase column name
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "BTreeMap<String, Kind>", into = "BTreeMap<String, Kind>")]
pub struct ColumnTypes {
    kinds: BTreeMap<String, Kind>,
}

impl ColumnTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, column: &str, kind: Kind) -> Self {
        self.insert(column, kind);
        self
    }

    pub fn insert(&mut self, column: &str, kind: Kind) {
        self.kinds.insert(column.to_lowercase(), kind);
    }

    /// Kind declared for `column`, `string` when absent
    pub fn kind_of(&self, column: &str) -> Kind {
        self.kinds
            .get(&column.to_lowercase())
            .copied()
            .unwrap_or_default()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.kinds.contains_key(&column.to_lowercase())
    }

    /// Columns and their kinds, in column name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Kind)> {
        self.kinds.iter().map(|(col, kind)| (col.as_str(), *kind))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Table column loosely matching `name`, or `name` itself
    ///
    /// `FirstName`, `first_name` and `firstname` all match a `first_name` column.
    pub fn column_like(&self, name: &str) -> String {
        let wanted = normalize_column(name);
        self.kinds
            .keys()
            .find(|col| normalize_column(col) == wanted)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

impl From<BTreeMap<String, Kind>> for ColumnTypes {
    fn from(kinds: BTreeMap<String, Kind>) -> Self {
        Self {
            kinds: kinds
                .into_iter()
                .map(|(col, kind)| (col.to_lowercase(), kind))
                .collect(),
        }
    }
}

impl From<ColumnTypes> for BTreeMap<String, Kind> {
    fn from(types: ColumnTypes) -> Self {
        types.kinds
    }
}

/// Lowercase and drop everything that is not a letter or digit
pub fn normalize_column(name: &str) -> String {
    static RE_EXCLUDE: OnceLock<Regex> = OnceLock::new();
    let re = RE_EXCLUDE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]").expect("Invalid regex"));
    re.replace_all(name, "").to_lowercase()
}
