//! Event ids and the typed identifiers carried on events.

use crate::define_id;

// =============================================================================
// Correlation and Users
// =============================================================================

define_id!(CorrelationId);
define_id!(UserId);

// =============================================================================
// Events
// =============================================================================

/// Event id is a per-actor monotonic integer starting at 1.
///
/// Zero is the "nothing applied yet" cursor; no stored event has id 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EventId(i64);

impl EventId {
    /// The cursor before the first event.
    pub const ZERO: Self = Self(0);

    /// The first id minted for an actor.
    pub const FIRST: Self = Self(1);

    /// The largest representable id, used to clear a whole journal.
    pub const MAX: Self = Self(i64::MAX);

    /// Creates a new EventId from an i64.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying i64 value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Returns the next id.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the previous id, saturating at zero.
    #[must_use]
    pub const fn prev(&self) -> Self {
        if self.0 > 0 {
            Self(self.0 - 1)
        } else {
            Self(0)
        }
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EventId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<EventId> for i64 {
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl serde::Serialize for EventId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for EventId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i64::deserialize(deserializer)?;
        Ok(Self(id))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_roundtrip() {
        let id = CorrelationId::new();
        let s = id.to_string();
        assert_eq!(s.len(), 32);
        let parsed: CorrelationId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_user_id_accepts_hyphenated() {
        let parsed = UserId::parse("00000000-0000-0000-0000-000000000001").unwrap();
        assert_eq!(parsed.to_string(), "00000000000000000000000000000001");
    }

    #[test]
    fn test_correlation_id_empty() {
        let result: Result<CorrelationId, _> = "".parse();
        assert!(matches!(result.unwrap_err(), crate::IdError::Empty));
    }

    #[test]
    fn test_correlation_id_invalid() {
        let result: Result<CorrelationId, _> = "not-hex".parse();
        assert!(result.unwrap_err().is_id_error());
    }

    #[test]
    fn test_user_id_json_roundtrip() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_event_id_roundtrip() {
        let id = EventId::new(12345);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "12345");
        let parsed: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_event_id_next_and_prev() {
        assert_eq!(EventId::ZERO.next(), EventId::FIRST);
        assert_eq!(EventId::FIRST.next().value(), 2);
        assert_eq!(EventId::FIRST.prev(), EventId::ZERO);
        assert_eq!(EventId::ZERO.prev(), EventId::ZERO);
    }
}
