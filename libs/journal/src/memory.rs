//! In-memory journal and snapshot storage.
//!
//! For tests and single-process deployments. Journals are shared per address
//! through the provider, so a re-activated actor sees what its previous
//! activation wrote.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use chronicle_events::Event;
use chronicle_id::{Address, EventId};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::{Journal, JournalError, JournalProvider, Snapshot, SnapshotError, SnapshotStore};

/// In-memory journal for one actor.
#[derive(Debug)]
pub struct MemoryJournal {
    address: Address,
    events: RwLock<BTreeMap<EventId, Event>>,
}

impl MemoryJournal {
    /// Creates an empty journal.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            events: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored events.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns true if no events are stored.
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Highest stored event id, or zero.
    pub async fn last_event_id(&self) -> EventId {
        self.events
            .read()
            .await
            .keys()
            .next_back()
            .copied()
            .unwrap_or(EventId::ZERO)
    }
}

#[async_trait]
impl Journal for MemoryJournal {
    fn address(&self) -> &Address {
        &self.address
    }

    #[instrument(skip(self, event), fields(address = %self.address, event_id = %event.id))]
    async fn append(&self, event: &Event) -> Result<(), JournalError> {
        if event.id < EventId::FIRST {
            return Err(JournalError::InvalidEventId(event.id));
        }
        if let Some(to) = &event.to {
            if *to != self.address {
                return Err(JournalError::Misaddressed {
                    address: self.address.clone(),
                    event_to: to.clone(),
                });
            }
        }

        let mut events = self.events.write().await;
        match events.get(&event.id) {
            Some(existing) if existing == event => {
                debug!("event already journaled, ignoring duplicate append");
                Ok(())
            }
            Some(_) => Err(JournalError::Conflict {
                address: self.address.clone(),
                id: event.id,
            }),
            None => {
                events.insert(event.id, event.clone());
                Ok(())
            }
        }
    }

    #[instrument(skip(self), fields(address = %self.address))]
    async fn read_batch(&self, after: EventId, limit: usize) -> Result<Vec<Event>, JournalError> {
        let events = self.events.read().await;
        Ok(events
            .range((Bound::Excluded(after), Bound::Unbounded))
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect())
    }

    #[instrument(skip(self), fields(address = %self.address))]
    async fn clear(&self, up_to: EventId) -> Result<(), JournalError> {
        let mut events = self.events.write().await;
        events.retain(|id, _| *id > up_to);
        Ok(())
    }
}

/// Hands out one shared [`MemoryJournal`] per address.
#[derive(Debug, Default, Clone)]
pub struct MemoryJournalProvider {
    journals: Arc<RwLock<HashMap<Address, Arc<MemoryJournal>>>>,
}

impl MemoryJournalProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the concrete journal for `address`, creating it if needed.
    pub async fn journal(&self, address: &Address) -> Arc<MemoryJournal> {
        if let Some(journal) = self.journals.read().await.get(address) {
            return journal.clone();
        }
        self.journals
            .write()
            .await
            .entry(address.clone())
            .or_insert_with(|| Arc::new(MemoryJournal::new(address.clone())))
            .clone()
    }

    /// Drops every journal.
    pub async fn reset(&self) {
        self.journals.write().await.clear();
    }
}

#[async_trait]
impl JournalProvider for MemoryJournalProvider {
    async fn open(&self, address: &Address) -> Result<Arc<dyn Journal>, JournalError> {
        let journal: Arc<dyn Journal> = self.journal(address).await;
        Ok(journal)
    }
}

/// In-memory snapshot store.
#[derive(Debug, Default, Clone)]
pub struct MemorySnapshotStore {
    snapshots: Arc<RwLock<HashMap<Address, Snapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    #[instrument(skip(self), fields(address = %address))]
    async fn read(&self, address: &Address) -> Result<Option<Snapshot>, SnapshotError> {
        Ok(self.snapshots.read().await.get(address).cloned())
    }

    #[instrument(skip(self, snapshot), fields(address = %address, last_applied = %snapshot.last_applied_event_id))]
    async fn write(&self, address: &Address, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let mut snapshots = self.snapshots.write().await;
        if let Some(current) = snapshots.get(address) {
            if current.last_applied_event_id > snapshot.last_applied_event_id {
                return Err(SnapshotError::Regression {
                    address: address.clone(),
                    current: current.last_applied_event_id,
                    proposed: snapshot.last_applied_event_id,
                });
            }
        }
        snapshots.insert(address.clone(), snapshot.clone());
        Ok(())
    }

    #[instrument(skip(self), fields(address = %address))]
    async fn clear(&self, address: &Address) -> Result<(), SnapshotError> {
        self.snapshots.write().await.remove(address);
        Ok(())
    }
}
