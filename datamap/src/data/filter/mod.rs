//! Condition compiler
//!
//! Lowers condition trees into document-store filter documents.
//!
//! ## Usage
//!
//! ```
//! use datamap::data::filter::{TopLevel, compile_query, parse_conditions};
//!
//! let conditions = parse_conditions(r#"[{"age >": 30}, {"name": "ada"}]"#).unwrap();
//! let filter = compile_query(&conditions, TopLevel::Merge);
//! assert_eq!(filter.to_string(), r#"{"age":{"$gt":30},"name":"ada"}"#);
//! ```

mod builder;
mod parser;
mod types;

pub use builder::{compile, compile_query};
pub use parser::{MAX_CONDITION_DEPTH, MAX_CONDITION_JSON_SIZE, parse_conditions};
pub use types::{CompiledFilter, Cond, CondValue, Condition, Func, Operator, TopLevel};
