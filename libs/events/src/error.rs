//! Error types for event handling.

use thiserror::Error;

/// Errors that can occur when building events or reading their arguments.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EventError {
    /// A required field was not supplied to the builder.
    #[error("missing required event field: {0}")]
    MissingField(&'static str),

    /// An argument index past the end of the argument list.
    #[error("tried to get argument {index}, but only have {len} args")]
    ArgumentOutOfRange { index: usize, len: usize },

    /// An argument could not be converted to the requested type.
    #[error("argument {index} is not a valid {expected}: {message}")]
    ArgumentType {
        index: usize,
        expected: String,
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}
