//! # chronicle-engine
//!
//! Event-sourced, single-writer actors.
//!
//! An actor kind declares its state and a [`DispatchRegistry`] of methods.
//! An [`ActorEngine`] runs one activation of one actor: it replays the
//! actor's journal over its last snapshot, then runs commands through
//! validate, write and apply. An [`ActorHost`] keeps one activation per
//! address of a kind, and an [`Ingress`] routes wire commands across kinds.
//!
//! ## Guarantees
//!
//! - Events of one actor are applied in strictly increasing id order, both
//!   during replay and live
//! - A rejected command leaves the journal and state untouched
//! - A failure after an event was written resets the actor: no snapshot is
//!   written and the next activation rebuilds from the journal
//! - A failed or cancelled replay never overwrites the snapshot

mod args;
mod context;
mod describe;
mod dispatch;
mod engine;
mod error;
mod host;
mod ingress;
mod kind;

pub use args::Arguments;
pub use context::CommandContext;
pub use describe::{ActorDescription, ArgDescription, MethodDescription};
pub use dispatch::{canonical_name, DispatchRegistry, RegistryBuilder};
pub use engine::{ActorEngine, Phase};
pub use error::{
    DispatchError, EngineError, ErrorKind, HandlerError, IngressError, Rejection,
};
pub use host::{ActorHost, HostConfig, DEFAULT_IDLE_TIMEOUT};
pub use ingress::{ActorGateway, Ingress};
pub use kind::ActorKind;
