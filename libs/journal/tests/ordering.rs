//! Ordering properties of the in-memory journal.

use std::collections::BTreeSet;

use chronicle_events::Event;
use chronicle_id::{Address, EventId};
use chronicle_journal::{never_cancelled, Journal, JournalError, JournalExt, MemoryJournal};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

async fn journal_with(ids: &BTreeSet<i64>) -> MemoryJournal {
    let address = Address::random("ledger").unwrap();
    let journal = MemoryJournal::new(address.clone());
    for id in ids {
        let event = Event::builder()
            .to(address.clone())
            .id(EventId::new(*id))
            .event_type("post")
            .arg(*id)
            .build()
            .unwrap();
        journal.append(&event).await.unwrap();
    }
    journal
}

async fn read_all(journal: &MemoryJournal, after: i64) -> Vec<i64> {
    let mut seen = Vec::new();
    journal
        .read_from::<JournalError, _>(
            EventId::new(after),
            |e| {
                seen.push(e.id.value());
                Ok(())
            },
            &never_cancelled(),
        )
        .await
        .unwrap();
    seen
}

proptest! {
    #[test]
    fn prop_read_from_returns_exactly_the_suffix(
        ids in prop::collection::btree_set(1i64..400, 0..300),
        after in 0i64..450,
    ) {
        let seen = runtime().block_on(async {
            let journal = journal_with(&ids).await;
            read_all(&journal, after).await
        });

        let expected: Vec<i64> = ids.iter().copied().filter(|id| *id > after).collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn prop_clear_then_read_keeps_only_later_events(
        ids in prop::collection::btree_set(1i64..400, 0..300),
        up_to in 0i64..450,
    ) {
        let seen = runtime().block_on(async {
            let journal = journal_with(&ids).await;
            journal.clear(EventId::new(up_to)).await.unwrap();
            read_all(&journal, 0).await
        });

        let expected: Vec<i64> = ids.iter().copied().filter(|id| *id > up_to).collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn prop_batch_read_never_exceeds_max_results(
        count in 0i64..260,
        max_results in -5i64..300,
    ) {
        let ids: BTreeSet<i64> = (1..=count).collect();
        let total = runtime().block_on(async {
            let journal = journal_with(&ids).await;
            let mut total = 0usize;
            journal
                .batch_read_from::<JournalError, _>(
                    EventId::ZERO,
                    |batch| {
                        assert!(!batch.is_empty() && batch.len() <= 100);
                        total += batch.len();
                        Ok(())
                    },
                    &never_cancelled(),
                    max_results,
                )
                .await
                .unwrap();
            total
        });

        let expected = if max_results > 0 {
            count.min(max_results) as usize
        } else {
            count as usize
        };
        prop_assert_eq!(total, expected);
    }
}
