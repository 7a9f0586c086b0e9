//! # chronicle-testing
//!
//! Shared fixtures for engine and service tests:
//!
//! - [`FaultyJournalProvider`] and [`FaultySnapshotStore`] wrap the in-memory
//!   backends and fail or stall on demand
//! - [`Ledger`] is a small actor kind with validated events and an apply
//!   step that can be armed to fail once
//! - [`Fixture`] wires them together

mod faults;
mod fixture;
mod ledger;

pub use faults::{FaultyJournal, FaultyJournalProvider, FaultySnapshotStore, HoldPoint, JournalFaults};
pub use fixture::{init_tracing, Fixture};
pub use ledger::{arm_apply_fault, Ledger, LedgerState};
