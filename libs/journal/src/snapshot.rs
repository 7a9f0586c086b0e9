//! Snapshots of folded actor state.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_id::{Address, EventId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SnapshotError;

/// The persisted projection of an actor's state.
///
/// `last_applied_event_id` is the id of the last journal event folded into
/// `state`; replay resumes after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub last_applied_event_id: EventId,
    pub state: Value,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    /// Creates a snapshot stamped with the current time.
    pub fn new(last_applied_event_id: EventId, state: Value) -> Self {
        Self {
            last_applied_event_id,
            state,
            updated_at: Utc::now(),
        }
    }
}

/// Per-actor snapshot storage.
#[async_trait]
pub trait SnapshotStore: Send + Sync + fmt::Debug {
    /// Reads the snapshot for `address`, if one exists.
    async fn read(&self, address: &Address) -> Result<Option<Snapshot>, SnapshotError>;

    /// Writes the snapshot for `address`.
    ///
    /// Fails with [`SnapshotError::Regression`] if a stored snapshot has a
    /// higher `last_applied_event_id`.
    async fn write(&self, address: &Address, snapshot: &Snapshot) -> Result<(), SnapshotError>;

    /// Deletes the snapshot for `address`. Missing snapshots are fine.
    async fn clear(&self, address: &Address) -> Result<(), SnapshotError>;
}
