//! Codec Error Types

use thiserror::Error;

/// Errors while encoding or parsing records
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Destination buffer cannot hold anything
    #[error("record buffer has zero capacity")]
    NoCapacity,

    /// Formatter reported a failure
    #[error("record formatting failed")]
    Format,

    /// Wrong number of comma-separated fields
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    /// Field could not be parsed as a number
    #[error("invalid {field} value: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

impl From<std::fmt::Error> for CodecError {
    fn from(_: std::fmt::Error) -> Self {
        CodecError::Format
    }
}
