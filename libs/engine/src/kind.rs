//! Actor kinds.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::DispatchRegistry;

/// A kind of journaled actor: its name, its state, and its methods.
///
/// The registry is built once and shared by every activation of the kind,
/// typically from a `static OnceLock`:
///
/// ```ignore
/// impl ActorKind for Counter {
///     const KIND: &'static str = "counter";
///     type State = CounterState;
///
///     fn registry() -> &'static DispatchRegistry<CounterState> {
///         static REGISTRY: OnceLock<DispatchRegistry<CounterState>> = OnceLock::new();
///         REGISTRY.get_or_init(|| {
///             DispatchRegistry::builder(Self::KIND)
///                 .event("increment", &[], |s: &mut CounterState, (): ()| {
///                     s.count += 1;
///                     Ok(s.count)
///                 })
///                 .build()
///         })
///     }
/// }
/// ```
pub trait ActorKind: Send + Sync + 'static {
    /// Lower-case kind name, the first segment of every address.
    const KIND: &'static str;

    /// In-memory state, folded from events and persisted in snapshots.
    type State: Default + Serialize + DeserializeOwned + Send + Sync + 'static;

    fn registry() -> &'static DispatchRegistry<Self::State>;
}
