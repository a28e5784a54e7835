//! Row-to-record mapping and condition compilation for storage drivers
//!
//! - [`data::mapper::RecordMapper`] turns raw cursor rows into maps or
//!   [`record!`] structs, and records back into column/value lists
//! - [`data::filter`] compiles condition trees into filter documents

mod app;
pub mod core;
pub mod data;
pub mod utils;
