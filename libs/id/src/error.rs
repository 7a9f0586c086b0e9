//! Error types for identity parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating identities.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty or blank.
    #[error("address cannot be empty")]
    Empty,

    /// The address is missing the `/` separator.
    #[error("address must be of the form \"{{kind}}/{{id:hex}}\", got \"{0}\"")]
    MissingSeparator(String),

    /// The identifier portion is not a valid 128-bit hex identifier.
    #[error("invalid identifier \"{value}\": {message}")]
    InvalidId { value: String, message: String },

    /// The address shape is invalid.
    #[error("invalid address format: {message}")]
    InvalidFormat { message: String },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }

    /// Returns true if the identifier segment failed to parse.
    pub fn is_id_error(&self) -> bool {
        matches!(self, IdError::InvalidId { .. })
    }
}
