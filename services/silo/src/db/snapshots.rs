//! Snapshot backend over the `actor_snapshots` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_id::{Address, EventId};
use chronicle_journal::{Snapshot, SnapshotError, SnapshotStore};
use sqlx::{postgres::PgPool, Row};
use tracing::instrument;

use super::DbError;

#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    #[instrument(skip(self), fields(address = %address))]
    async fn read(&self, address: &Address) -> Result<Option<Snapshot>, SnapshotError> {
        let row = sqlx::query(
            r#"
            SELECT last_applied_event_id, state, updated_at
            FROM actor_snapshots
            WHERE address = $1
            "#,
        )
        .bind(address.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let last_applied: i64 = row
            .try_get("last_applied_event_id")
            .map_err(DbError::Query)?;
        let state: serde_json::Value = row.try_get("state").map_err(DbError::Query)?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(DbError::Query)?;

        Ok(Some(Snapshot {
            last_applied_event_id: EventId::new(last_applied),
            state,
            updated_at,
        }))
    }

    /// Upserts the snapshot; the `WHERE` on the conflict arm keeps the cursor
    /// from moving backwards.
    #[instrument(skip(self, snapshot), fields(address = %address, last_applied = %snapshot.last_applied_event_id))]
    async fn write(&self, address: &Address, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let result = sqlx::query(
            r#"
            INSERT INTO actor_snapshots (address, last_applied_event_id, state, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (address) DO UPDATE
            SET last_applied_event_id = EXCLUDED.last_applied_event_id,
                state = EXCLUDED.state,
                updated_at = EXCLUDED.updated_at
            WHERE actor_snapshots.last_applied_event_id <= EXCLUDED.last_applied_event_id
            "#,
        )
        .bind(address.to_string())
        .bind(snapshot.last_applied_event_id.value())
        .bind(&snapshot.state)
        .bind(snapshot.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let current = self
            .read(address)
            .await?
            .map(|s| s.last_applied_event_id)
            .unwrap_or(EventId::ZERO);
        Err(SnapshotError::Regression {
            address: address.clone(),
            current,
            proposed: snapshot.last_applied_event_id,
        })
    }

    #[instrument(skip(self), fields(address = %address))]
    async fn clear(&self, address: &Address) -> Result<(), SnapshotError> {
        sqlx::query("DELETE FROM actor_snapshots WHERE address = $1")
            .bind(address.to_string())
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }
}
