//! Application state shared across request handlers.

use std::sync::Arc;

use chronicle_engine::{ActorHost, HostConfig, Ingress};
use chronicle_journal::{JournalProvider, SnapshotStore};

use crate::actors::Calculator;
use crate::db::Database;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    ingress: Ingress,
    db: Option<Database>,
}

impl AppState {
    pub fn new(ingress: Ingress, db: Option<Database>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { ingress, db }),
        }
    }

    /// Hosts every actor kind the silo knows over the given storage.
    pub fn with_storage(
        journals: Arc<dyn JournalProvider>,
        snapshots: Arc<dyn SnapshotStore>,
        host: HostConfig,
        db: Option<Database>,
    ) -> Self {
        let calculators = ActorHost::<Calculator>::new(journals, snapshots, host);
        let ingress = Ingress::new().with_gateway(Arc::new(calculators));
        Self::new(ingress, db)
    }

    pub fn ingress(&self) -> &Ingress {
        &self.inner.ingress
    }

    /// The database, when running on Postgres storage.
    pub fn db(&self) -> Option<&Database> {
        self.inner.db.as_ref()
    }
}
