//! Unified error type for the data layer
//!
//! Destination-shape errors are raised before any row is read. Driver errors
//! pass through unchanged in [`DataError::Cursor`]. Condition parsing has its
//! own [`ConditionParseError`].

use thiserror::Error;

use super::cursor::BoxError;
use super::value::Kind;

/// Error type for record mapping operations
#[derive(Error, Debug)]
pub enum DataError {
    /// Destination is not a mutable reference
    #[error("Argument must be an address.")]
    ExpectingPointer,

    /// Destination for a multi-row fetch is not a growable sequence
    #[error("Argument must be a slice address.")]
    ExpectingSlicePointer,

    /// Destination sequence elements are neither maps nor records
    #[error("Argument must be a slice address of maps or structs.")]
    ExpectingSliceMapStruct,

    /// Value is neither a map nor a record
    #[error("Argument must be either a map or a struct.")]
    ExpectingMapOrStruct,

    /// Cursor exhausted without a driver error
    #[error("There are no more rows in this result set.")]
    NoMoreRows,

    /// Error reported by the storage driver's cursor
    #[error("Cursor error: {0}")]
    Cursor(#[source] BoxError),

    /// Column value did not convert to its declared kind (strict policy)
    #[error("Column {column}: cannot convert {raw:?} to {kind}")]
    Coercion {
        column: String,
        kind: Kind,
        raw: String,
    },
}

impl DataError {
    /// Create a coercion error
    pub fn coercion(column: &str, kind: Kind, raw: &str) -> Self {
        Self::Coercion {
            column: column.to_string(),
            kind,
            raw: raw.to_string(),
        }
    }
}

/// Error type for condition parsing
#[derive(Error, Debug)]
pub enum ConditionParseError {
    #[error("Condition JSON exceeds maximum size of {max} bytes")]
    TooLarge { max: usize },

    #[error("Invalid condition JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Conditions nested deeper than {max} levels")]
    TooDeep { max: usize },

    #[error("Invalid condition at {path}: {message}")]
    Invalid { path: String, message: String },
}

impl ConditionParseError {
    pub fn invalid(path: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl From<BoxError> for DataError {
    fn from(e: BoxError) -> Self {
        Self::Cursor(e)
    }
}
