//! Ambient metadata carried by a command into the events it produces.

use chronicle_events::Event;
use chronicle_id::{CorrelationId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Cross-cutting metadata passed alongside a command.
///
/// Copied onto every event the command mints. A command without a
/// correlation id gets a fresh one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandContext {
    pub correlation_id: Option<CorrelationId>,
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
}

impl CommandContext {
    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn with_user_id(mut self, id: UserId) -> Self {
        self.user_id = Some(id);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Takes the metadata of an incoming wire command.
    pub fn from_event(event: &Event) -> Self {
        Self {
            correlation_id: Some(event.correlation_id),
            user_id: event.user_id,
            extras: event.extras.clone(),
        }
    }
}
