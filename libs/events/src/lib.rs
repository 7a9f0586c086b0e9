//! # chronicle-events
//!
//! The event record shared by the journal, the dispatch registry and the
//! command ingress.
//!
//! ## Design Principles
//!
//! - Events are immutable records of something that happened to one actor
//! - Every event belongs to exactly one actor and carries a per-actor id
//! - Arguments are opaque JSON values until a handler decodes them
//! - Unknown wire fields survive a decode/encode cycle untouched
//!
//! ## Wire Shape
//!
//! ```json
//! {
//!   "to": "calculator/6f1c1a2b3c4d4e5f8a9b0c1d2e3f4a5b",
//!   "id": 3,
//!   "type": "multiply",
//!   "args": [2],
//!   "time": "2026-01-01T00:00:00Z",
//!   "cid": "0c8f3f9e2b7d4c4f9d7f3d0e6b8a1c2d",
//!   "uid": "00000000000000000000000000000001",
//!   "extras": {"source": "console"}
//! }
//! ```

mod envelope;
mod error;

pub use envelope::*;
pub use error::EventError;
