//! Store error types.

use thiserror::Error;

/// Errors raised by counter stores and document collections.
#[derive(Debug, Error)]
pub enum StoreError {
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
    #[error("migration directory not found; tried {tried}. Last error: {last_error}. Run from repo root or libs/store.")]
    MigrationDirNotFound { tried: String, last_error: String },

    /// An identity field value is already taken in the collection.
    #[error("duplicate {field} '{value}' in collection {collection}")]
    DuplicateKey {
        collection: String,
        field: &'static str,
        value: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An in-memory lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

impl StoreError {
    /// Returns true if this error is a uniqueness violation.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}
