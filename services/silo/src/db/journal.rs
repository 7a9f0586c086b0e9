//! Journal backend over the `journal_events` table.
//!
//! One row per event, keyed by `(address, event_id)`. The primary key is what
//! makes a second writer under the same id fail; the stored row is then
//! compared with the incoming event to tell a retried append from a conflict.

use std::sync::Arc;

use async_trait::async_trait;
use chronicle_events::Event;
use chronicle_id::{Address, EventId};
use chronicle_journal::{Journal, JournalError, JournalProvider};
use sqlx::{postgres::PgPool, Row};
use tracing::{debug, instrument};

use super::DbError;

/// The journal of one actor, stored in Postgres.
#[derive(Debug, Clone)]
pub struct PgJournal {
    pool: PgPool,
    address: Address,
}

impl PgJournal {
    pub fn new(pool: PgPool, address: Address) -> Self {
        Self { pool, address }
    }

    async fn stored(&self, id: EventId) -> Result<Option<Event>, JournalError> {
        let row = sqlx::query(
            r#"
            SELECT event
            FROM journal_events
            WHERE address = $1 AND event_id = $2
            "#,
        )
        .bind(self.address.to_string())
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?;

        match row {
            Some(row) => {
                let value: serde_json::Value = row.try_get("event").map_err(DbError::Query)?;
                Ok(Some(serde_json::from_value(value)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Journal for PgJournal {
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

        let payload = serde_json::to_value(event)?;
        let result = sqlx::query(
            r#"
            INSERT INTO journal_events (address, event_id, event_type, event, occurred_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(self.address.to_string())
        .bind(event.id.value())
        .bind(&event.event_type)
        .bind(&payload)
        .bind(event.time)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(ref db_err)) if db_err.code().as_deref() == Some("23505") => {
                match self.stored(event.id).await? {
                    Some(existing) if existing == *event => {
                        debug!("event already journaled, ignoring duplicate append");
                        Ok(())
                    }
                    _ => Err(JournalError::Conflict {
                        address: self.address.clone(),
                        id: event.id,
                    }),
                }
            }
            Err(e) => Err(DbError::Query(e).into()),
        }
    }

    #[instrument(skip(self), fields(address = %self.address))]
    async fn read_batch(&self, after: EventId, limit: usize) -> Result<Vec<Event>, JournalError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT event
            FROM journal_events
            WHERE address = $1 AND event_id > $2
            ORDER BY event_id ASC
            LIMIT $3
            "#,
        )
        .bind(self.address.to_string())
        .bind(after.value())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        rows.into_iter()
            .map(|row| -> Result<Event, JournalError> {
                let value: serde_json::Value = row.try_get("event").map_err(DbError::Query)?;
                Ok(serde_json::from_value(value)?)
            })
            .collect()
    }

    #[instrument(skip(self), fields(address = %self.address))]
    async fn clear(&self, up_to: EventId) -> Result<(), JournalError> {
        let result = sqlx::query(
            r#"
            DELETE FROM journal_events
            WHERE address = $1 AND event_id <= $2
            "#,
        )
        .bind(self.address.to_string())
        .bind(up_to.value())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        debug!(deleted = result.rows_affected(), "journal cleared");
        Ok(())
    }
}

/// Opens [`PgJournal`]s over a shared pool.
#[derive(Debug, Clone)]
pub struct PgJournalProvider {
    pool: PgPool,
}

impl PgJournalProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JournalProvider for PgJournalProvider {
    async fn open(&self, address: &Address) -> Result<Arc<dyn Journal>, JournalError> {
        Ok(Arc::new(PgJournal::new(self.pool.clone(), address.clone())))
    }
}
