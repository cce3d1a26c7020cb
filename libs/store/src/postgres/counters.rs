//! Sequence counters.
//!
//! Create-if-absent and increment happen in one statement, and Postgres
//! reports the post-increment value through `RETURNING`, so concurrent
//! callers never observe the same value for a kind.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use tutorhub_id::SequenceKind;

use crate::error::StoreError;
use crate::sequence::CounterStore;

/// Counter store backed by the `counters` table.
#[derive(Clone)]
pub struct PgCounterStore {
    pool: PgPool,
}

impl PgCounterStore {
    /// Create a new counter store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn increment(&self, kind: &SequenceKind) -> Result<Option<i64>, StoreError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO counters (kind, value)
            VALUES ($1, 1)
            ON CONFLICT (kind)
            DO UPDATE SET value = counters.value + 1
            RETURNING value
            "#,
        )
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Query)
    }

    async fn current(&self, kind: &SequenceKind) -> Result<Option<i64>, StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT value FROM counters WHERE kind = $1")
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Query)
    }
}
