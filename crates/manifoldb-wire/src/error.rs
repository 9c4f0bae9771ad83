//! Error types for the wire crate.

use thiserror::Error;

use crate::types::DataType;

/// Maximum length for value display in error messages.
const MAX_VALUE_DISPLAY_LEN: usize = 100;

/// Errors that can occur while building, slicing or decoding field data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WireError {
    /// An encoding or decoding error occurred.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Two columns could not be combined because their types differ.
    #[error("type mismatch on field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// The field being combined.
        field: String,
        /// The type of the receiving column.
        expected: DataType,
        /// The type of the incoming column.
        actual: DataType,
    },

    /// A column does not hold the same number of rows as its siblings.
    #[error("row count mismatch on field '{field}': expected {expected}, got {actual}")]
    RowCountMismatch {
        /// The offending field.
        field: String,
        /// The row count of the first column.
        expected: usize,
        /// The row count of the offending column.
        actual: usize,
    },

    /// A copy range is empty or starts past the end of the column.
    #[error("invalid range [{from}, {to}) for field '{field}' with {len} rows")]
    InvalidRange {
        /// The field being copied.
        field: String,
        /// Start of the range (inclusive).
        from: usize,
        /// End of the range (exclusive).
        to: usize,
        /// Number of rows in the column.
        len: usize,
    },

    /// A value is not acceptable for its column.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The data type cannot be used in this position.
    #[error("unsupported data type {0} for {1}")]
    Unsupported(DataType, &'static str),
}

impl WireError {
    /// Create an encoding error.
    #[must_use]
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Create an invalid value error, truncating long renderings.
    #[must_use]
    pub fn invalid_value(value: impl std::fmt::Display) -> Self {
        let value_str = value.to_string();
        let truncated = if value_str.len() > MAX_VALUE_DISPLAY_LEN {
            let mut end = MAX_VALUE_DISPLAY_LEN;
            while !value_str.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &value_str[..end])
        } else {
            value_str
        };
        Self::InvalidValue(truncated)
    }
}

/// A specialized `Result` type for wire operations.
pub type WireResult<T> = std::result::Result<T, WireError>;
