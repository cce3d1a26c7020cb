//! Document collections stored in the shared `documents` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{
    postgres::{PgPool, PgRow},
    Postgres, QueryBuilder, Row,
};
use tracing::instrument;
use tutorhub_id::NumericId;

use super::map_unique_violation;
use crate::collection::DocumentCollection;
use crate::document::{Document, Lifecycle, NewDocument, Transition};
use crate::error::StoreError;
use crate::filter::{CandidateKey, Filter, Update};

const COLUMNS: &str = "storage_key, numeric_id, external_key, secondary_key, \
                       is_deleted, deleted_at, created_at, fields";

/// A row from the documents table.
#[derive(Debug, Clone)]
struct DocumentRow {
    storage_key: String,
    numeric_id: Option<i64>,
    external_key: Option<String>,
    secondary_key: Option<String>,
    is_deleted: Option<bool>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    fields: Value,
}

impl<'r> sqlx::FromRow<'r, PgRow> for DocumentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            storage_key: row.try_get("storage_key")?,
            numeric_id: row.try_get("numeric_id")?,
            external_key: row.try_get("external_key")?,
            secondary_key: row.try_get("secondary_key")?,
            is_deleted: row.try_get("is_deleted")?,
            deleted_at: row.try_get("deleted_at")?,
            created_at: row.try_get("created_at")?,
            fields: row.try_get("fields")?,
        })
    }
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        let fields = match row.fields {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        Self {
            storage_key: row.storage_key,
            numeric_id: row.numeric_id.map(NumericId::new),
            external_key: row.external_key,
            secondary_key: row.secondary_key,
            lifecycle: Lifecycle::from_parts(row.is_deleted, row.deleted_at),
            created_at: row.created_at,
            fields,
        }
    }
}

/// A named collection backed by Postgres.
#[derive(Clone)]
pub struct PgCollection {
    pool: PgPool,
    name: String,
}

impl PgCollection {
    /// Create a handle to the named collection.
    pub fn new(pool: PgPool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
        }
    }
}

fn push_clause(qb: &mut QueryBuilder<'_, Postgres>, key: &CandidateKey) {
    match key {
        CandidateKey::ExternalKey(key) => {
            qb.push("external_key = ").push_bind(key.clone());
        }
        CandidateKey::NumericId(id) => {
            qb.push("numeric_id = ").push_bind(id.value());
        }
        CandidateKey::SecondaryKey(key) => {
            qb.push("secondary_key = ").push_bind(key.clone());
        }
        CandidateKey::NativeId(key) => {
            qb.push("storage_key = ").push_bind(key.clone());
        }
    }
}

fn push_where(qb: &mut QueryBuilder<'_, Postgres>, collection: &str, filter: &Filter) {
    qb.push(" WHERE collection = ").push_bind(collection.to_string());
    match filter {
        Filter::All => {}
        Filter::Active => {
            qb.push(" AND is_deleted IS NOT TRUE");
        }
        Filter::AnyOf(keys) => {
            qb.push(" AND (");
            for (idx, key) in keys.iter().enumerate() {
                if idx > 0 {
                    qb.push(" OR ");
                }
                push_clause(qb, key);
            }
            qb.push(")");
        }
        Filter::Field { name, value } => {
            qb.push(" AND fields -> ")
                .push_bind(name.clone())
                .push(" = ")
                .push_bind(value.clone());
        }
    }
}

/// Orders matches by the first clause they satisfy, then by age.
fn push_order(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    qb.push(" ORDER BY ");
    if let Filter::AnyOf(keys) = filter {
        if keys.len() > 1 {
            qb.push("CASE");
            for (rank, key) in keys.iter().enumerate() {
                qb.push(" WHEN ");
                push_clause(qb, key);
                qb.push(format!(" THEN {rank}"));
            }
            qb.push(" END, ");
        }
    }
    qb.push("created_at, storage_key");
}

/// Builds the `SET` list of an update.
///
/// Toggles are evaluated against the row being updated.
fn push_assignments(qb: &mut QueryBuilder<'_, Postgres>, update: &Update) {
    qb.push("fields = ");
    for _ in &update.toggle {
        qb.push("jsonb_set(");
    }
    qb.push("(fields || ")
        .push_bind(Value::Object(update.set.clone()))
        .push(")");
    for field in &update.toggle {
        qb.push(", ARRAY[")
            .push_bind(field.clone())
            .push("]::text[], to_jsonb(NOT COALESCE(fields -> ")
            .push_bind(field.clone())
            .push(" = 'true'::jsonb, false)))");
    }

    match update.transition {
        Some(Transition::Delete { at }) => {
            qb.push(", is_deleted = TRUE, deleted_at = ").push_bind(at);
        }
        Some(Transition::Restore) => {
            qb.push(", is_deleted = FALSE, deleted_at = NULL");
        }
        None => {}
    }
}

fn is_empty_match(filter: &Filter) -> bool {
    matches!(filter, Filter::AnyOf(keys) if keys.is_empty())
}

#[async_trait]
impl DocumentCollection for PgCollection {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(collection = %self.name))]
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError> {
        if is_empty_match(filter) {
            return Ok(None);
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM documents"));
        push_where(&mut qb, &self.name, filter);
        push_order(&mut qb, filter);
        qb.push(" LIMIT 1");

        let row = qb
            .build_query_as::<DocumentRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        Ok(row.map(Document::from))
    }

    #[instrument(skip(self), fields(collection = %self.name))]
    async fn find(&self, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        if is_empty_match(filter) {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM documents"));
        push_where(&mut qb, &self.name, filter);
        qb.push(" ORDER BY created_at, storage_key");

        let rows = qb
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        Ok(rows.into_iter().map(Document::from).collect())
    }

    #[instrument(skip(self, doc), fields(collection = %self.name, storage_key = %doc.storage_key))]
    async fn insert_one(&self, doc: NewDocument) -> Result<Document, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO documents (
                collection,
                storage_key,
                numeric_id,
                external_key,
                secondary_key,
                fields
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(&self.name)
            .bind(&doc.storage_key)
            .bind(doc.numeric_id.map(|id| id.value()))
            .bind(&doc.external_key)
            .bind(&doc.secondary_key)
            .bind(Value::Object(doc.fields.clone()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                map_unique_violation(e, &self.name, |constraint| match constraint {
                    "documents_numeric_id_key" => (
                        "numeric_id",
                        doc.numeric_id.map(|id| id.to_string()).unwrap_or_default(),
                    ),
                    "documents_external_key_key" => {
                        ("external_key", doc.external_key.clone().unwrap_or_default())
                    }
                    "documents_secondary_key_key" => (
                        "secondary_key",
                        doc.secondary_key.clone().unwrap_or_default(),
                    ),
                    _ => ("storage_key", doc.storage_key.clone()),
                })
            })?;

        Ok(row.into())
    }

    #[instrument(skip(self, update), fields(collection = %self.name))]
    async fn update_one(
        &self,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>, StoreError> {
        if is_empty_match(filter) {
            return Ok(None);
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE documents SET ");
        push_assignments(&mut qb, update);
        qb.push(" WHERE collection = ")
            .push_bind(self.name.clone())
            .push(" AND storage_key = (SELECT storage_key FROM documents");
        push_where(&mut qb, &self.name, filter);
        push_order(&mut qb, filter);
        qb.push(format!(" LIMIT 1) RETURNING {COLUMNS}"));

        let row = qb
            .build_query_as::<DocumentRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        Ok(row.map(Document::from))
    }
}
