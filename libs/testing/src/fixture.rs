//! Test wiring.

use std::sync::Arc;

use chronicle_engine::{ActorEngine, ActorHost, ActorKind, EngineError, HostConfig};
use chronicle_id::Address;
use chronicle_journal::{never_cancelled, MemoryJournal, Snapshot};
use tracing_subscriber::EnvFilter;

use crate::{FaultyJournalProvider, FaultySnapshotStore};

/// Installs a test-friendly subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fault-injecting storage shared by engines and hosts under test.
#[derive(Debug, Clone, Default)]
pub struct Fixture {
    pub journals: Arc<FaultyJournalProvider>,
    pub snapshots: Arc<FaultySnapshotStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates one engine directly, without a host.
    pub async fn activate<A: ActorKind>(
        &self,
        address: &Address,
    ) -> Result<ActorEngine<A>, EngineError> {
        ActorEngine::activate(
            address.clone(),
            self.journals.as_ref(),
            self.snapshots.clone(),
            &never_cancelled(),
        )
        .await
    }

    pub fn host<A: ActorKind>(&self, config: HostConfig) -> ActorHost<A> {
        ActorHost::new(self.journals.clone(), self.snapshots.clone(), config)
    }

    /// The stored journal of `address`, bypassing fault injection.
    pub async fn journal(&self, address: &Address) -> Arc<MemoryJournal> {
        self.journals.memory().journal(address).await
    }

    /// The stored snapshot of `address`, bypassing fault injection.
    pub async fn snapshot(&self, address: &Address) -> Option<Snapshot> {
        self.snapshots.stored(address).await
    }
}
