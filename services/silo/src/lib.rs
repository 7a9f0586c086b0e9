//! Chronicle silo library.
//!
//! The crate ships a `silo` binary; the library surface exists for
//! integration tests and for embedding the HTTP ingress elsewhere.

pub mod actors;
pub mod api;
pub mod config;
pub mod db;
pub mod passivation;
pub mod state;
