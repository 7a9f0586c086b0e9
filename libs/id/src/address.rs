//! Actor addresses.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::IdError;

/// Suffixes stripped when deriving a kind from a type name.
const KIND_SUFFIXES: [&str; 2] = ["actor", "grain"];

/// The address of a single actor: its kind plus a 128-bit identifier.
///
/// The kind is stored lower-cased, so equality and hashing are
/// case-insensitive on the kind and exact on the id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    kind: String,
    id: Uuid,
}

impl Address {
    /// Creates an address, validating the kind.
    pub fn new(kind: impl AsRef<str>, id: Uuid) -> Result<Self, IdError> {
        let kind = Self::normalize_kind(kind.as_ref())?;
        Ok(Self { kind, id })
    }

    /// Creates an address with a fresh random id.
    pub fn random(kind: impl AsRef<str>) -> Result<Self, IdError> {
        Self::new(kind, Uuid::new_v4())
    }

    /// Returns the lower-cased actor kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the actor id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Parses an address from `{kind}/{id}`.
    ///
    /// The string is split on the first `/`. Both segments must be
    /// non-empty and the id must be a valid hex identifier.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.trim().is_empty() {
            return Err(IdError::Empty);
        }

        let Some((kind, id)) = s.split_once('/') else {
            return Err(IdError::MissingSeparator(s.to_string()));
        };

        if kind.is_empty() || id.is_empty() {
            return Err(IdError::InvalidFormat {
                message: format!("expected two non-empty segments, got \"{s}\""),
            });
        }

        let id = Uuid::parse_str(id).map_err(|e| IdError::InvalidId {
            value: id.to_string(),
            message: e.to_string(),
        })?;

        Self::new(kind, id)
    }

    /// Derives a kind from a type name.
    ///
    /// Interface-style names lose their leading `I`, then an `actor` or
    /// `grain` suffix is removed: `ILogCalcActor` becomes `logcalc`.
    pub fn kind_from_type_name(type_name: &str) -> String {
        let mut name = type_name;
        let mut chars = name.chars();
        if let (Some('I'), Some(next)) = (chars.next(), chars.next()) {
            if next.is_ascii_uppercase() {
                name = &name[1..];
            }
        }

        let mut kind = name.to_ascii_lowercase();
        for suffix in KIND_SUFFIXES {
            if kind.len() > suffix.len() && kind.ends_with(suffix) {
                kind.truncate(kind.len() - suffix.len());
                break;
            }
        }
        kind
    }

    fn normalize_kind(kind: &str) -> Result<String, IdError> {
        if kind.trim().is_empty() {
            return Err(IdError::InvalidFormat {
                message: "actor kind cannot be empty".to_string(),
            });
        }
        if kind.contains('/') || kind.chars().any(char::is_whitespace) {
            return Err(IdError::InvalidFormat {
                message: format!("actor kind \"{kind}\" contains '/' or whitespace"),
            });
        }
        Ok(kind.to_lowercase())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id.simple())
    }
}

impl FromStr for Address {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    const ID: &str = "6f1c1a2b3c4d4e5f8a9b0c1d2e3f4a5b";

    #[test]
    fn test_address_display_is_canonical() {
        let addr = Address::parse(&format!("Calculator/{ID}")).unwrap();
        assert_eq!(addr.to_string(), format!("calculator/{ID}"));
        assert_eq!(addr.kind(), "calculator");
    }

    #[test]
    fn test_address_kind_is_case_insensitive() {
        let a = Address::parse(&format!("CALCULATOR/{ID}")).unwrap();
        let b = Address::parse(&format!("calculator/{ID}")).unwrap();
        assert_eq!(a, b);

        let set: std::collections::HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_address_accepts_hyphenated_id() {
        let addr = Address::parse("calculator/6f1c1a2b-3c4d-4e5f-8a9b-0c1d2e3f4a5b").unwrap();
        assert_eq!(addr.to_string(), format!("calculator/{ID}"));
    }

    #[test]
    fn test_address_splits_on_first_separator() {
        let result = Address::parse(&format!("calculator/{ID}/extra"));
        assert!(matches!(result, Err(IdError::InvalidId { .. })));
    }

    #[rstest]
    #[case("", IdError::Empty)]
    #[case("   ", IdError::Empty)]
    #[case("calculator", IdError::MissingSeparator("calculator".to_string()))]
    fn test_address_rejects_shape(#[case] input: &str, #[case] expected: IdError) {
        assert_eq!(Address::parse(input).unwrap_err(), expected);
    }

    #[rstest]
    #[case("/6f1c1a2b3c4d4e5f8a9b0c1d2e3f4a5b")]
    #[case("calculator/")]
    #[case("/")]
    fn test_address_rejects_empty_segments(#[case] input: &str) {
        assert!(matches!(
            Address::parse(input),
            Err(IdError::InvalidFormat { .. })
        ));
    }

    #[rstest]
    #[case("calculator/xyz")]
    #[case("calculator/6f1c1a2b3c4d4e5f8a9b0c1d2e3f4a5")]
    #[case("calculator/6f1c1a2b3c4d4e5f8a9b0c1d2e3f4a5bb")]
    fn test_address_rejects_bad_id(#[case] input: &str) {
        assert!(Address::parse(input).unwrap_err().is_id_error());
    }

    #[test]
    fn test_address_new_rejects_empty_kind() {
        assert!(Address::new("", Uuid::new_v4()).is_err());
        assert!(Address::new("has space", Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_address_json_is_string() {
        let addr = Address::parse(&format!("calculator/{ID}")).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"calculator/{ID}\""));
        let parsed: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn test_address_json_rejects_malformed() {
        let result: Result<Address, _> = serde_json::from_str("\"calculator\"");
        assert!(result.is_err());
    }

    #[rstest]
    #[case("ILogCalcActor", "logcalc")]
    #[case("ICalculatorActor", "calculator")]
    #[case("CalculatorGrain", "calculator")]
    #[case("Inventory", "inventory")]
    #[case("Actor", "actor")]
    fn test_kind_from_type_name(#[case] type_name: &str, #[case] expected: &str) {
        assert_eq!(Address::kind_from_type_name(type_name), expected);
    }

    proptest! {
        #[test]
        fn prop_address_roundtrip(kind in "[a-zA-Z][a-zA-Z0-9_.-]{0,15}", raw in any::<u128>()) {
            let addr = Address::new(&kind, Uuid::from_u128(raw)).unwrap();
            let parsed = Address::parse(&addr.to_string()).unwrap();
            prop_assert_eq!(&parsed, &addr);
            prop_assert_eq!(parsed.kind(), kind.to_lowercase());
        }
    }
}
