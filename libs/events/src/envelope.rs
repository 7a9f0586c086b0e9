//! The event envelope - the record written to and read from a journal.

use std::fmt;

use chrono::{DateTime, Utc};
use chronicle_id::{Address, CorrelationId, EventId, UserId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::EventError;

/// An immutable record of something that happened to an actor.
///
/// Also used as the command shape accepted by the ingress, where only
/// `to`, `type` and `args` are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The actor this event is addressed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,

    /// Per-actor monotonic identifier, starting at 1.
    #[serde(default)]
    pub id: EventId,

    /// The event (command) type name, e.g. `"add"`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Positional arguments, decoded by the handler for `event_type`.
    #[serde(default)]
    pub args: Vec<Value>,

    /// When the event was minted.
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,

    /// Correlation id of the request that produced the event.
    #[serde(rename = "cid", default)]
    pub correlation_id: CorrelationId,

    /// The user on whose behalf the event was produced.
    #[serde(rename = "uid", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// Opaque passthrough values.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,

    /// Top-level fields this version does not know about.
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl Event {
    /// Creates a new event builder.
    pub fn builder() -> EventBuilder {
        EventBuilder::new()
    }

    /// Number of positional arguments.
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Decodes argument `index` as `T`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, EventError> {
        let value = self.args.get(index).ok_or(EventError::ArgumentOutOfRange {
            index,
            len: self.args.len(),
        })?;
        decode_arg(index, value)
    }

    /// Decodes every argument as `T`.
    pub fn args_as<T: DeserializeOwned>(&self) -> Result<Vec<T>, EventError> {
        self.args
            .iter()
            .enumerate()
            .map(|(index, value)| decode_arg(index, value))
            .collect()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id: {}", self.id)?;
        if let Some(to) = &self.to {
            write!(f, ", To: {to}")?;
        }
        if !self.event_type.trim().is_empty() {
            write!(f, ", Type: {}", self.event_type)?;
        }
        if !self.args.is_empty() {
            let args = self
                .args
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, ", Args: {args}")?;
        }
        Ok(())
    }
}

/// Decodes one positional argument, naming the target type on failure.
pub fn decode_arg<T: DeserializeOwned>(index: usize, value: &Value) -> Result<T, EventError> {
    T::deserialize(value).map_err(|e| EventError::ArgumentType {
        index,
        expected: type_display_name::<T>(),
        message: e.to_string(),
    })
}

/// Short, path-free name of a Rust type: `Vec<String>` rather than
/// `alloc::vec::Vec<alloc::string::String>`.
pub fn type_display_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            segment.push(c);
            continue;
        }
        out.push_str(segment.rsplit("::").next().unwrap_or_default());
        segment.clear();
        out.push(c);
    }
    out.push_str(segment.rsplit("::").next().unwrap_or_default());
    out
}

/// Builder for constructing events.
#[derive(Debug, Default)]
pub struct EventBuilder {
    to: Option<Address>,
    id: EventId,
    event_type: Option<String>,
    args: Vec<Value>,
    time: Option<DateTime<Utc>>,
    correlation_id: Option<CorrelationId>,
    user_id: Option<UserId>,
    extras: Map<String, Value>,
}

impl EventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn user_id(mut self, id: UserId) -> Self {
        self.user_id = Some(id);
        self
    }

    pub fn extras(mut self, extras: Map<String, Value>) -> Self {
        self.extras = extras;
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Builds the event.
    ///
    /// Fails if no event type was supplied. Time defaults to now and the
    /// correlation id to a fresh one.
    pub fn build(self) -> Result<Event, EventError> {
        let event_type = self
            .event_type
            .filter(|t| !t.trim().is_empty())
            .ok_or(EventError::MissingField("type"))?;

        Ok(Event {
            to: self.to,
            id: self.id,
            event_type,
            args: self.args,
            time: self.time.unwrap_or_else(Utc::now),
            correlation_id: self.correlation_id.unwrap_or_default(),
            user_id: self.user_id,
            extras: self.extras,
            additional: Map::new(),
        })
    }
}
