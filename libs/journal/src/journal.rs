//! The journal contract and its paged read helpers.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chronicle_events::Event;
use chronicle_id::{Address, EventId};
use tokio::sync::watch;

use crate::JournalError;

/// Number of events fetched from storage per page.
pub const PAGE_SIZE: usize = 100;

/// Cooperative cancellation signal; `true` means stop.
pub type CancelSignal = watch::Receiver<bool>;

/// A signal that never fires.
pub fn never_cancelled() -> CancelSignal {
    let (_tx, rx) = watch::channel(false);
    rx
}

/// Returns true if cancellation has been requested.
pub fn is_cancelled(cancel: &CancelSignal) -> bool {
    *cancel.borrow()
}

/// Append-only event log of a single actor.
#[async_trait]
pub trait Journal: Send + Sync + fmt::Debug {
    /// The actor this journal belongs to.
    fn address(&self) -> &Address;

    /// Durably stores `event` under `event.id`.
    ///
    /// Appending an event identical to the stored one is a no-op. A
    /// different event under an existing id is a [`JournalError::Conflict`].
    async fn append(&self, event: &Event) -> Result<(), JournalError>;

    /// Returns up to `limit` events with `id > after`, ascending.
    async fn read_batch(&self, after: EventId, limit: usize) -> Result<Vec<Event>, JournalError>;

    /// Deletes every event with `id <= up_to` as a single atomic step.
    async fn clear(&self, up_to: EventId) -> Result<(), JournalError>;
}

/// Streaming reads built on [`Journal::read_batch`].
///
/// Both helpers return the id of the last event handed to the callback, or
/// `after` if nothing was delivered. Errors from the callback stop the read
/// and are returned as is.
#[async_trait]
pub trait JournalExt: Journal {
    /// Delivers every event with `id > after` to `on_each`, one at a time.
    ///
    /// Cancellation is checked before each page and before each event.
    async fn read_from<E, F>(
        &self,
        after: EventId,
        mut on_each: F,
        cancel: &CancelSignal,
    ) -> Result<EventId, E>
    where
        E: From<JournalError> + Send,
        F: FnMut(Event) -> Result<(), E> + Send,
    {
        let mut cursor = after;
        loop {
            if is_cancelled(cancel) {
                return Err(JournalError::Cancelled.into());
            }

            let page = self.read_batch(cursor, PAGE_SIZE).await?;
            let exhausted = page.len() < PAGE_SIZE;

            for event in page {
                if is_cancelled(cancel) {
                    return Err(JournalError::Cancelled.into());
                }
                let id = event.id;
                on_each(event)?;
                cursor = id;
            }

            if exhausted {
                return Ok(cursor);
            }
        }
    }

    /// Delivers events with `id > after` to `on_batch` in pages.
    ///
    /// Stops after `max_results` events when it is positive; otherwise reads
    /// to the end of the journal.
    async fn batch_read_from<E, F>(
        &self,
        after: EventId,
        mut on_batch: F,
        cancel: &CancelSignal,
        max_results: i64,
    ) -> Result<EventId, E>
    where
        E: From<JournalError> + Send,
        F: FnMut(Vec<Event>) -> Result<(), E> + Send,
    {
        let mut remaining = usize::try_from(max_results).ok().filter(|n| *n > 0);
        let mut cursor = after;
        loop {
            if is_cancelled(cancel) {
                return Err(JournalError::Cancelled.into());
            }

            let limit = remaining.map_or(PAGE_SIZE, |r| r.min(PAGE_SIZE));
            if limit == 0 {
                return Ok(cursor);
            }

            let page = self.read_batch(cursor, limit).await?;
            let Some(last) = page.last().map(|e| e.id) else {
                return Ok(cursor);
            };
            let exhausted = page.len() < limit;
            if let Some(r) = remaining.as_mut() {
                *r -= page.len();
            }

            on_batch(page)?;
            cursor = last;

            if exhausted {
                return Ok(cursor);
            }
        }
    }
}

impl<J: Journal + ?Sized> JournalExt for J {}

/// Opens journals by actor identity.
#[async_trait]
pub trait JournalProvider: Send + Sync + fmt::Debug {
    /// Opens, or creates, the journal for `address`.
    async fn open(&self, address: &Address) -> Result<Arc<dyn Journal>, JournalError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryJournal;

    fn address() -> Address {
        Address::parse("counter/6f1c1a2b3c4d4e5f8a9b0c1d2e3f4a5b").unwrap()
    }

    async fn journal_with(count: i64) -> MemoryJournal {
        let journal = MemoryJournal::new(address());
        for id in 1..=count {
            let event = Event::builder()
                .id(EventId::new(id))
                .event_type("tick")
                .build()
                .unwrap();
            journal.append(&event).await.unwrap();
        }
        journal
    }

    #[tokio::test]
    async fn test_read_from_pages_past_page_size() {
        let journal = journal_with(250).await;
        let mut seen = Vec::new();
        let cursor = journal
            .read_from::<JournalError, _>(
                EventId::new(10),
                |e| {
                    seen.push(e.id.value());
                    Ok(())
                },
                &never_cancelled(),
            )
            .await
            .unwrap();

        assert_eq!(cursor, EventId::new(250));
        assert_eq!(seen, (11..=250).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_read_from_empty_journal_returns_after() {
        let journal = journal_with(0).await;
        let cursor = journal
            .read_from::<JournalError, _>(EventId::new(4), |_| Ok(()), &never_cancelled())
            .await
            .unwrap();
        assert_eq!(cursor, EventId::new(4));
    }

    #[tokio::test]
    async fn test_read_from_stops_on_callback_error() {
        let journal = journal_with(5).await;
        let mut seen = 0;
        let result = journal
            .read_from(
                EventId::ZERO,
                |e| {
                    if e.id.value() == 3 {
                        return Err(JournalError::backend("stop"));
                    }
                    seen += 1;
                    Ok(())
                },
                &never_cancelled(),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(seen, 2);
    }

    #[tokio::test]
    async fn test_read_from_cancelled_mid_stream() {
        let journal = journal_with(10).await;
        let (tx, rx) = watch::channel(false);
        let mut seen = Vec::new();
        let result = journal
            .read_from::<JournalError, _>(
                EventId::ZERO,
                |e| {
                    seen.push(e.id.value());
                    if e.id.value() == 4 {
                        let _ = tx.send(true);
                    }
                    Ok(())
                },
                &rx,
            )
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_batch_read_from_respects_max_results() {
        let journal = journal_with(250).await;
        let mut batches = Vec::new();
        let cursor = journal
            .batch_read_from::<JournalError, _>(
                EventId::ZERO,
                |batch| {
                    batches.push(batch.len());
                    Ok(())
                },
                &never_cancelled(),
                130,
            )
            .await
            .unwrap();

        assert_eq!(batches, vec![100, 30]);
        assert_eq!(cursor, EventId::new(130));
    }

    #[tokio::test]
    async fn test_batch_read_from_unbounded_when_not_positive() {
        let journal = journal_with(120).await;
        for max in [0, -1] {
            let mut total = 0;
            journal
                .batch_read_from::<JournalError, _>(
                    EventId::ZERO,
                    |batch| {
                        total += batch.len();
                        Ok(())
                    },
                    &never_cancelled(),
                    max,
                )
                .await
                .unwrap();
            assert_eq!(total, 120);
        }
    }

    #[tokio::test]
    async fn test_batch_read_from_skips_callback_when_empty() {
        let journal = journal_with(3).await;
        let mut calls = 0;
        journal
            .batch_read_from::<JournalError, _>(
                EventId::new(3),
                |_| {
                    calls += 1;
                    Ok(())
                },
                &never_cancelled(),
                0,
            )
            .await
            .unwrap();
        assert_eq!(calls, 0);
    }
}
