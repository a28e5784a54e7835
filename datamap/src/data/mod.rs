//! Data mapping layer
//!
//! Glue between row-oriented storage drivers and typed destinations:
//! - `value` - Dynamic values and semantic kinds
//! - `coerce` - Textual cell conversion
//! - `columns` - Column type tables
//! - `cursor` - Driver cursor abstraction and an in-memory cursor
//! - `record` - Record descriptors and the `record!` macro
//! - `mapper` - Row to record mapping and back
//! - `filter` - Condition trees and their compiler
//! - `error` - Error types for the data layer

pub mod coerce;
pub mod columns;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod mapper;
pub mod record;
pub mod value;

pub use coerce::{CoerceError, CoercionPolicy};
pub use columns::ColumnTypes;
pub use cursor::{BoxError, Cursor, MemoryCursor};
pub use error::{ConditionParseError, DataError};
pub use mapper::RecordMapper;
pub use record::{Describe, Element, Record};
pub use value::{Kind, Value};
