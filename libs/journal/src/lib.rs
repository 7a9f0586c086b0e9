//! # chronicle-journal
//!
//! Durable storage for journaled actors.
//!
//! Every actor identity owns one append-only [`Journal`] of events keyed by
//! event id, plus at most one [`Snapshot`] of its folded state. The journal is
//! the source of truth; a snapshot is only ever a shortcut for replay.
//!
//! ## Contract
//!
//! - `append` stores an event under a caller-minted id; re-appending the same
//!   event is a no-op so writes can be retried
//! - reads deliver events with `id > after` in strictly ascending order
//! - `clear(up_to)` removes every event with `id <= up_to` in one step
//! - storage failures are returned to the caller, never swallowed
//!
//! Paged reads and cooperative cancellation live in [`JournalExt`], so every
//! backend only implements the primitive page read.

mod error;
mod journal;
mod memory;
mod snapshot;

pub use error::{BoxError, JournalError, SnapshotError};
pub use journal::{
    is_cancelled, never_cancelled, CancelSignal, Journal, JournalExt, JournalProvider, PAGE_SIZE,
};
pub use memory::{MemoryJournal, MemoryJournalProvider, MemorySnapshotStore};
pub use snapshot::{Snapshot, SnapshotStore};
