//! Introspection of registered methods.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Signature of one method of an actor kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescription {
    pub name: String,
    pub args: Vec<ArgDescription>,
    pub returns: String,
    /// True for journaled events, false for read-only queries.
    pub journaled: bool,
    pub visible: bool,
}

impl fmt::Display for MethodDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self
            .args
            .iter()
            .map(|a| format!("{} {}", a.type_name, a.name))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} {}({})", self.returns, self.name, args)
    }
}

/// All methods of one actor kind, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorDescription {
    pub kind: String,
    pub methods: BTreeMap<String, MethodDescription>,
}

impl ActorDescription {
    /// Returns a copy without hidden methods.
    pub fn visible(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            methods: self
                .methods
                .iter()
                .filter(|(_, m)| m.visible)
                .map(|(name, m)| (name.clone(), m.clone()))
                .collect(),
        }
    }
}

impl fmt::Display for ActorDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for method in self.methods.values() {
            write!(f, "\n  {method}")?;
        }
        Ok(())
    }
}
