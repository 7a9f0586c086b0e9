//! # chronicle-id
//!
//! Identity types for journaled actors.
//!
//! ## Design Principles
//!
//! - An actor is addressed by `(kind, id)`; the kind is case-insensitive
//! - Every identity has one canonical string form with strict parsing
//! - Identities roundtrip through serialization (parse → format → parse)
//! - Event ids are plain monotonic integers scoped to one actor
//!
//! ## Address Format
//!
//! Addresses use the form `{kind}/{id}` where `id` is a 128-bit identifier
//! written as 32 lower-case hex characters:
//!
//! - `calculator/6f1c1a2b3c4d4e5f8a9b0c1d2e3f4a5b`
//! - `logcalc/00000000000000000000000000000001`

mod address;
mod error;
mod macros;
mod types;

pub use address::Address;
pub use error::IdError;
pub use types::*;

/// Re-export uuid for consumers that need raw identifier operations
pub use uuid::Uuid;
