//! In-process actor host.
//!
//! Gives every address of one actor kind a single activation, serialized
//! behind a per-address mutex. Actors activate on first use and deactivate
//! when their engine asks (after a reset), when told to, when idle past the
//! configured timeout, or at shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chronicle_events::Event;
use chronicle_id::{Address, EventId};
use chronicle_journal::{JournalProvider, SnapshotStore};
use serde_json::Value;
use tokio::sync::{watch, Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::{
    ActorDescription, ActorEngine, ActorGateway, ActorKind, CommandContext, DispatchError,
    EngineError, Phase,
};

/// Default idle time before an actor is passivated.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Actors unused for this long are deactivated by
    /// [`ActorHost::passivate_idle`].
    pub idle_timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

struct Slot<A: ActorKind> {
    engine: Option<ActorEngine<A>>,
    last_used: Instant,
}

type SlotRef<A> = Arc<Mutex<Slot<A>>>;

/// Hosts the actors of kind `A`.
pub struct ActorHost<A: ActorKind> {
    journals: Arc<dyn JournalProvider>,
    snapshots: Arc<dyn SnapshotStore>,
    config: HostConfig,
    slots: RwLock<HashMap<Address, SlotRef<A>>>,
    shutdown: watch::Sender<bool>,
}

impl<A: ActorKind> std::fmt::Debug for ActorHost<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorHost")
            .field("kind", &A::KIND)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<A: ActorKind> ActorHost<A> {
    pub fn new(
        journals: Arc<dyn JournalProvider>,
        snapshots: Arc<dyn SnapshotStore>,
        config: HostConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            journals,
            snapshots,
            config,
            slots: RwLock::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    async fn slot(&self, address: &Address) -> SlotRef<A> {
        if let Some(slot) = self.slots.read().await.get(address) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(address.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Slot {
                    engine: None,
                    last_used: Instant::now(),
                }))
            })
            .clone()
    }

    /// Locks the activation for `address`, activating it if needed.
    async fn acquire(&self, address: &Address) -> Result<OwnedMutexGuard<Slot<A>>, EngineError> {
        if address.kind() != A::KIND {
            return Err(EngineError::WrongKind {
                address: address.clone(),
                expected: A::KIND,
            });
        }
        let stopping = *self.shutdown.borrow();
        if stopping {
            return Err(EngineError::NotReady {
                address: address.clone(),
                phase: Phase::Inactive,
            });
        }

        let mut guard = self.slot(address).await.lock_owned().await;

        if guard
            .engine
            .as_ref()
            .is_some_and(ActorEngine::has_abandoned_command)
        {
            warn!(address = %address, "previous command was abandoned; reactivating");
            if let Some(engine) = guard.engine.take() {
                Self::finish(engine).await;
            }
        }

        if guard.engine.is_none() {
            let engine = ActorEngine::activate(
                address.clone(),
                self.journals.as_ref(),
                self.snapshots.clone(),
                &self.shutdown.subscribe(),
            )
            .await?;
            guard.engine = Some(engine);
        }

        guard.last_used = Instant::now();
        Ok(guard)
    }

    /// Deactivates the engine if it asked for it.
    async fn release(mut guard: OwnedMutexGuard<Slot<A>>) {
        let requested = guard
            .engine
            .as_ref()
            .is_some_and(ActorEngine::deactivation_requested);
        if requested {
            if let Some(engine) = guard.engine.take() {
                Self::finish(engine).await;
            }
        }
    }

    async fn finish(engine: ActorEngine<A>) {
        let address = engine.address().clone();
        if let Err(err) = engine.deactivate().await {
            warn!(address = %address, error = %err, "deactivation failed");
        }
    }

    fn engine<'g>(
        guard: &'g mut OwnedMutexGuard<Slot<A>>,
        address: &Address,
    ) -> Result<&'g mut ActorEngine<A>, EngineError> {
        guard.engine.as_mut().ok_or_else(|| EngineError::NotReady {
            address: address.clone(),
            phase: Phase::Inactive,
        })
    }

    /// Runs a command on the actor at `address`.
    pub async fn execute(
        &self,
        address: &Address,
        ctx: &CommandContext,
        event_type: &str,
        args: Vec<Value>,
    ) -> Result<Value, EngineError> {
        let mut guard = self.acquire(address).await?;
        let result = Self::engine(&mut guard, address)?
            .execute(ctx, event_type, args)
            .await;
        Self::release(guard).await;
        result
    }

    /// Reads the journaled history of the actor at `address`.
    pub async fn history(
        &self,
        address: &Address,
        after: EventId,
        max_results: i64,
    ) -> Result<Vec<Event>, EngineError> {
        let mut guard = self.acquire(address).await?;
        let result = Self::engine(&mut guard, address)?.history(after, max_results).await;
        Self::release(guard).await;
        result
    }

    /// Clears the snapshot and journal of the actor at `address`.
    pub async fn clear(&self, address: &Address) -> Result<(), EngineError> {
        let mut guard = self.acquire(address).await?;
        let result = Self::engine(&mut guard, address)?.clear().await;
        Self::release(guard).await;
        result
    }

    /// Runs `f` against the activated engine for `address`.
    pub async fn inspect<R>(
        &self,
        address: &Address,
        f: impl FnOnce(&ActorEngine<A>) -> R,
    ) -> Result<R, EngineError> {
        let mut guard = self.acquire(address).await?;
        let result = f(Self::engine(&mut guard, address)?);
        Self::release(guard).await;
        Ok(result)
    }

    /// Deactivates the actor at `address`. Returns false if it was not active.
    #[instrument(skip(self), fields(address = %address))]
    pub async fn deactivate(&self, address: &Address) -> Result<bool, EngineError> {
        let Some(slot) = self.slots.read().await.get(address).cloned() else {
            return Ok(false);
        };
        let engine = slot.lock().await.engine.take();
        drop(slot);
        self.prune().await;

        match engine {
            Some(engine) => {
                engine.deactivate().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deactivates every actor idle for at least the configured timeout.
    /// Busy actors are skipped. Returns the number deactivated.
    #[instrument(skip(self), fields(kind = A::KIND))]
    pub async fn passivate_idle(&self) -> usize {
        let slots: Vec<SlotRef<A>> = self.slots.read().await.values().cloned().collect();
        let mut passivated = 0;

        for slot in slots {
            let Ok(mut guard) = slot.try_lock() else {
                continue;
            };
            if guard.last_used.elapsed() < self.config.idle_timeout {
                continue;
            }
            if let Some(engine) = guard.engine.take() {
                Self::finish(engine).await;
                passivated += 1;
            }
        }

        self.prune().await;
        if passivated > 0 {
            info!(passivated, "passivated idle actors");
        }
        passivated
    }

    /// Cancels in-progress replays and deactivates every actor, persisting
    /// snapshots. Later calls fail until the host is rebuilt.
    #[instrument(skip(self), fields(kind = A::KIND))]
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let slots: Vec<SlotRef<A>> = self
            .slots
            .write()
            .await
            .drain()
            .map(|(_, slot)| slot)
            .collect();

        let mut deactivated = 0;
        for slot in slots {
            if let Some(engine) = slot.lock().await.engine.take() {
                Self::finish(engine).await;
                deactivated += 1;
            }
        }
        info!(deactivated, "actor host stopped");
    }

    /// Number of live activations.
    pub async fn active_count(&self) -> usize {
        let slots = self.slots.read().await;
        let mut active = 0;
        for slot in slots.values() {
            match slot.try_lock() {
                Ok(guard) if guard.engine.is_none() => {}
                _ => active += 1,
            }
        }
        active
    }

    /// Drops empty slots nobody else holds.
    async fn prune(&self) {
        let mut slots = self.slots.write().await;
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(guard) => guard.engine.is_some(),
                Err(_) => true,
            }
        });
        debug!(remaining = slots.len(), "pruned idle slots");
    }
}

#[async_trait]
impl<A: ActorKind> ActorGateway for ActorHost<A> {
    fn kind(&self) -> &'static str {
        A::KIND
    }

    fn describe(&self) -> ActorDescription {
        A::registry().describe()
    }

    fn check(&self, method: &str, arity: usize) -> Result<(), DispatchError> {
        A::registry().check(method, arity)
    }

    fn complete(&self, prefix: &str) -> Vec<String> {
        A::registry().complete(prefix)
    }

    async fn invoke(
        &self,
        address: &Address,
        ctx: &CommandContext,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, EngineError> {
        self.execute(address, ctx, method, args).await
    }

    async fn history(
        &self,
        address: &Address,
        after: EventId,
        max_results: i64,
    ) -> Result<Vec<Event>, EngineError> {
        ActorHost::history(self, address, after, max_results).await
    }

    async fn clear(&self, address: &Address) -> Result<(), EngineError> {
        ActorHost::clear(self, address).await
    }

    async fn passivate_idle(&self) -> usize {
        ActorHost::passivate_idle(self).await
    }

    async fn shutdown(&self) {
        ActorHost::shutdown(self).await
    }
}
