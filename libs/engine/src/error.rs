//! Engine error types and their classification.

use std::fmt;

use chronicle_events::EventError;
use chronicle_id::{Address, IdError};
use chronicle_journal::{JournalError, SnapshotError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Phase;

/// A domain precondition refused a command before anything was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Rejection {
    message: String,
}

impl Rejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A handler body failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Dispatch registry errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{kind} has no method \"{name}\"")]
    UnknownType { kind: String, name: String },

    #[error("\"{name}\" expects {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid argument for \"{name}\": {source}")]
    Argument {
        name: String,
        #[source]
        source: EventError,
    },

    #[error("\"{name}\" rejected: {rejection}")]
    Rejected { name: String, rejection: Rejection },

    #[error("\"{name}\" failed: {source}")]
    Handler {
        name: String,
        #[source]
        source: HandlerError,
    },

    #[error("result of \"{name}\" could not be encoded: {source}")]
    Result {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DispatchError {
    /// Returns the rejection if a precondition refused the command.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected { rejection, .. } => Some(rejection),
            _ => None,
        }
    }
}

/// The caller-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed address or command shape.
    Format,
    /// A precondition refused the command; nothing changed.
    Rejected,
    /// No such actor kind or method.
    UnknownType,
    /// Wrong argument count or argument type.
    Arguments,
    /// Journal or snapshot storage failed.
    Storage,
    /// The actor's state can no longer be trusted; it resets on reactivation.
    Consistency,
    /// A second command entered an actor with one still in flight.
    Reentrancy,
    /// The actor cannot take commands right now.
    Unavailable,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Format => "format_error",
            Self::Rejected => "rejected",
            Self::UnknownType => "unknown_type",
            Self::Arguments => "invalid_arguments",
            Self::Storage => "storage_unavailable",
            Self::Consistency => "consistency_fault",
            Self::Reentrancy => "reentrancy",
            Self::Unavailable => "unavailable",
        }
    }

    /// Returns true if the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Consistency | Self::Unavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Actor engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Address(#[from] IdError),

    #[error("{address} is not a {expected} actor")]
    WrongKind {
        address: Address,
        expected: &'static str,
    },

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("state of {address} could not be encoded or decoded: {source}")]
    State {
        address: Address,
        #[source]
        source: serde_json::Error,
    },

    #[error("consistency fault on {address}: {message}")]
    Consistency { address: Address, message: String },

    #[error("reentrant command on {address}; another command is still in flight")]
    Reentrancy { address: Address },

    #[error("{address} is resetting and refuses commands until reactivated")]
    Resetting { address: Address },

    #[error("{address} cannot take commands while {phase}")]
    NotReady { address: Address, phase: Phase },
}

impl EngineError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Address(_) | Self::Event(_) => ErrorKind::Format,
            Self::WrongKind { .. } => ErrorKind::UnknownType,
            Self::Dispatch(err) => match err {
                DispatchError::UnknownType { .. } => ErrorKind::UnknownType,
                DispatchError::Arity { .. } | DispatchError::Argument { .. } => {
                    ErrorKind::Arguments
                }
                DispatchError::Rejected { .. } | DispatchError::Handler { .. } => {
                    ErrorKind::Rejected
                }
                DispatchError::Result { .. } => ErrorKind::Consistency,
            },
            Self::Journal(err) => match err {
                JournalError::Cancelled => ErrorKind::Unavailable,
                JournalError::Conflict { .. } => ErrorKind::Consistency,
                _ => ErrorKind::Storage,
            },
            Self::Snapshot(SnapshotError::Regression { .. }) => ErrorKind::Consistency,
            Self::Snapshot(_) => ErrorKind::Storage,
            Self::State { .. } | Self::Consistency { .. } => ErrorKind::Consistency,
            Self::Reentrancy { .. } => ErrorKind::Reentrancy,
            Self::Resetting { .. } | Self::NotReady { .. } => ErrorKind::Unavailable,
        }
    }

    /// Returns the rejection if a precondition refused the command.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Dispatch(err) => err.rejection(),
            _ => None,
        }
    }

    pub(crate) fn consistency(address: &Address, message: impl Into<String>) -> Self {
        Self::Consistency {
            address: address.clone(),
            message: message.into(),
        }
    }
}

/// Command ingress errors.
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("command has no \"to\" address")]
    MissingAddress,

    #[error("unknown actor kind \"{0}\"")]
    UnknownKind(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl IngressError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingAddress => ErrorKind::Format,
            Self::UnknownKind(_) => ErrorKind::UnknownType,
            Self::Engine(err) => err.kind(),
        }
    }
}

impl From<DispatchError> for IngressError {
    fn from(err: DispatchError) -> Self {
        Self::Engine(err.into())
    }
}
