//! Database error types.

use chronicle_journal::{JournalError, SnapshotError};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}. Run from repo root or services/silo.")]
    MigrationDirNotFound { tried: String, last_error: String },
}

impl From<DbError> for JournalError {
    fn from(err: DbError) -> Self {
        JournalError::backend(err)
    }
}

impl From<DbError> for SnapshotError {
    fn from(err: DbError) -> Self {
        SnapshotError::backend(err)
    }
}
