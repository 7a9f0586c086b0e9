//! Journal and snapshot error types.

use chronicle_id::{Address, EventId};
use thiserror::Error;

/// Boxed error from a storage backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Journal operation errors.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Event ids start at 1.
    #[error("event id must be positive, got {0}")]
    InvalidEventId(EventId),

    /// An event addressed to another actor was handed to this journal.
    #[error("event for {event_to} cannot be appended to the journal of {address}")]
    Misaddressed { address: Address, event_to: Address },

    /// A different event is already stored under this id.
    #[error("event {id} already journaled for {address} with different content")]
    Conflict { address: Address, id: EventId },

    /// The read was cancelled before the journal was exhausted.
    #[error("journal read cancelled")]
    Cancelled,

    /// The storage backend failed.
    #[error("journal storage failure: {0}")]
    Backend(#[source] BoxError),

    /// A stored event could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl JournalError {
    /// Wraps a backend failure.
    pub fn backend(err: impl Into<BoxError>) -> Self {
        Self::Backend(err.into())
    }

    /// Returns true if the read was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if an append collided with a different stored event.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// Snapshot store errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The write would move the applied cursor backwards.
    #[error("snapshot for {address} would move from event {current} back to {proposed}")]
    Regression {
        address: Address,
        current: EventId,
        proposed: EventId,
    },

    /// The storage backend failed.
    #[error("snapshot storage failure: {0}")]
    Backend(#[source] BoxError),

    /// The snapshot blob could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SnapshotError {
    /// Wraps a backend failure.
    pub fn backend(err: impl Into<BoxError>) -> Self {
        Self::Backend(err.into())
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}
