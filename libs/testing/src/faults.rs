//! Storage wrappers that fail or stall on demand.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chronicle_events::Event;
use chronicle_id::{Address, EventId};
use chronicle_journal::{
    Journal, JournalError, JournalProvider, MemoryJournal, MemoryJournalProvider,
    MemorySnapshotStore, Snapshot, SnapshotError, SnapshotStore,
};
use tokio::sync::watch;

/// Where a held append stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldPoint {
    /// Before the event reaches storage.
    BeforeWrite,
    /// After the event is stored, before the append returns.
    AfterWrite,
}

/// Fault switches shared by every journal of a [`FaultyJournalProvider`].
#[derive(Debug)]
pub struct JournalFaults {
    fail_appends: AtomicBool,
    fail_reads: AtomicBool,
    hold: watch::Sender<Option<HoldPoint>>,
    /// Index of the first page read that stalls.
    read_hold: watch::Sender<Option<usize>>,
    appends: AtomicUsize,
    reads: AtomicUsize,
}

impl Default for JournalFaults {
    fn default() -> Self {
        let (hold, _) = watch::channel(None);
        let (read_hold, _) = watch::channel(None);
        Self {
            fail_appends: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            hold,
            read_hold,
            appends: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }
}

impl JournalFaults {
    /// Makes every append fail with a backend error.
    pub fn fail_appends(&self, on: bool) {
        self.fail_appends.store(on, Ordering::SeqCst);
    }

    /// Makes every page read fail with a backend error.
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Stalls appends at `point` until [`JournalFaults::release_appends`].
    pub fn hold_appends(&self, point: HoldPoint) {
        self.hold.send_replace(Some(point));
    }

    pub fn release_appends(&self) {
        self.hold.send_replace(None);
    }

    /// Number of append calls seen, failed ones included.
    pub fn append_count(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    /// Lets the next `pages` page reads through, then stalls every later one
    /// until [`JournalFaults::release_reads`].
    pub fn hold_reads_after(&self, pages: usize) {
        let first_held = self.reads.load(Ordering::SeqCst) + pages;
        self.read_hold.send_replace(Some(first_held));
    }

    pub fn release_reads(&self) {
        self.read_hold.send_replace(None);
    }

    /// Number of page reads started, stalled ones included.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn wait_if_held(&self, point: HoldPoint) {
        let mut rx = self.hold.subscribe();
        let _ = rx.wait_for(|held| *held != Some(point)).await;
    }

    async fn wait_if_reads_held(&self, read: usize) {
        let mut rx = self.read_hold.subscribe();
        let _ = rx
            .wait_for(|held| !matches!(held, Some(first) if read >= *first))
            .await;
    }
}

/// A [`MemoryJournal`] behind [`JournalFaults`].
#[derive(Debug)]
pub struct FaultyJournal {
    inner: Arc<MemoryJournal>,
    faults: Arc<JournalFaults>,
}

#[async_trait]
impl Journal for FaultyJournal {
    fn address(&self) -> &Address {
        self.inner.address()
    }

    async fn append(&self, event: &Event) -> Result<(), JournalError> {
        self.faults.appends.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_appends.load(Ordering::SeqCst) {
            return Err(JournalError::backend("injected append failure"));
        }
        self.faults.wait_if_held(HoldPoint::BeforeWrite).await;
        self.inner.append(event).await?;
        self.faults.wait_if_held(HoldPoint::AfterWrite).await;
        Ok(())
    }

    async fn read_batch(&self, after: EventId, limit: usize) -> Result<Vec<Event>, JournalError> {
        if self.faults.fail_reads.load(Ordering::SeqCst) {
            return Err(JournalError::backend("injected read failure"));
        }
        let read = self.faults.reads.fetch_add(1, Ordering::SeqCst);
        self.faults.wait_if_reads_held(read).await;
        self.inner.read_batch(after, limit).await
    }

    async fn clear(&self, up_to: EventId) -> Result<(), JournalError> {
        self.inner.clear(up_to).await
    }
}

/// Journal provider over shared in-memory journals with injectable faults.
#[derive(Debug, Default)]
pub struct FaultyJournalProvider {
    memory: MemoryJournalProvider,
    faults: Arc<JournalFaults>,
}

impl FaultyJournalProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &JournalFaults {
        &self.faults
    }

    /// The underlying journals, bypassing fault injection.
    pub fn memory(&self) -> &MemoryJournalProvider {
        &self.memory
    }
}

#[async_trait]
impl JournalProvider for FaultyJournalProvider {
    async fn open(&self, address: &Address) -> Result<Arc<dyn Journal>, JournalError> {
        Ok(Arc::new(FaultyJournal {
            inner: self.memory.journal(address).await,
            faults: self.faults.clone(),
        }))
    }
}

/// Snapshot store with injectable failures and a write counter.
#[derive(Debug, Default)]
pub struct FaultySnapshotStore {
    inner: MemorySnapshotStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl FaultySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// The stored snapshot, ignoring injected read failures.
    pub async fn stored(&self, address: &Address) -> Option<Snapshot> {
        self.inner.read(address).await.ok().flatten()
    }
}

#[async_trait]
impl SnapshotStore for FaultySnapshotStore {
    async fn read(&self, address: &Address) -> Result<Option<Snapshot>, SnapshotError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SnapshotError::backend("injected snapshot read failure"));
        }
        self.inner.read(address).await
    }

    async fn write(&self, address: &Address, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SnapshotError::backend("injected snapshot write failure"));
        }
        self.inner.write(address, snapshot).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self, address: &Address) -> Result<(), SnapshotError> {
        self.inner.clear(address).await
    }
}
