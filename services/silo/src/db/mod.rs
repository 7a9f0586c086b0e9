//! Postgres-backed journals and snapshots.
//!
//! One pool serves both tables: `journal_events` holds every actor's events
//! keyed by `(address, event_id)`, `actor_snapshots` one row per actor.

mod error;
mod journal;
mod snapshots;

pub use error::DbError;
pub use journal::{PgJournal, PgJournalProvider};
pub use snapshots::PgSnapshotStore;

use std::path::PathBuf;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/chronicle";

/// Pool settings. `from_env` reads `DATABASE_URL`, `DB_MAX_CONNECTIONS`
/// and `DB_MIN_CONNECTIONS`.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl DbConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`, keeping defaults for missing or
    /// unparsable values.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let count = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: count("DB_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: count("DB_MIN_CONNECTIONS", defaults.min_connections),
            acquire_timeout: defaults.acquire_timeout,
        }
    }
}

/// Shared connection pool for the silo's storage backends.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to database"
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(DbError::Connect)?;
        Ok(Self { pool })
    }

    /// Round-trips a trivial query; used by `/healthz`.
    pub async fn health_check(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }

    /// Applies the journal schema. The migrations directory is looked up
    /// relative to the working directory first, then to this crate.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        let candidates = [
            PathBuf::from("migrations"),
            PathBuf::from("services/silo/migrations"),
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        ];

        let mut last_error = None;
        for dir in &candidates {
            let migrator = match Migrator::new(dir.clone()).await {
                Ok(migrator) => migrator,
                Err(err) => {
                    debug!(dir = %dir.display(), error = %err, "no migrations here");
                    last_error = Some(err);
                    continue;
                }
            };
            migrator.run(&self.pool).await.map_err(DbError::Migration)?;
            info!(dir = %dir.display(), "journal schema up to date");
            return Ok(());
        }

        Err(DbError::MigrationDirNotFound {
            tried: candidates
                .iter()
                .map(|dir| dir.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            last_error: last_error.map_or_else(|| "none".to_string(), |e| e.to_string()),
        })
    }

    pub fn journals(&self) -> PgJournalProvider {
        PgJournalProvider::new(self.pool.clone())
    }

    pub fn snapshots(&self) -> PgSnapshotStore {
        PgSnapshotStore::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use rstest::rstest;

    fn config(vars: &[(&str, &str)]) -> DbConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DbConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config(&[]);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
    }

    #[rstest]
    #[case("4", 4)]
    #[case(" 32 ", 32)]
    #[case("many", 10)]
    #[case("-1", 10)]
    fn test_max_connections(#[case] raw: &str, #[case] expected: u32) {
        assert_eq!(config(&[("DB_MAX_CONNECTIONS", raw)]).max_connections, expected);
    }

    #[test]
    fn test_database_url_from_env() {
        let config = config(&[("DATABASE_URL", "postgres://db:5432/silo")]);
        assert_eq!(config.database_url, "postgres://db:5432/silo");
    }
}
