use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tutorhub_id::SequenceKind;

use crate::collection::DocumentCollection;
use crate::document::{Document, NewDocument};
use crate::error::StoreError;
use crate::filter::{Filter, Update};
use crate::sequence::CounterStore;

/// In-memory counter store
///
/// Increments happen under a single mutex, so the post-increment value is
/// always reported.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    counters: Arc<Mutex<HashMap<SequenceKind, i64>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, kind: &SequenceKind) -> Result<Option<i64>, StoreError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        let value = counters.entry(kind.clone()).or_insert(0);
        *value += 1;
        Ok(Some(*value))
    }

    async fn current(&self, kind: &SequenceKind) -> Result<Option<i64>, StoreError> {
        let counters = self
            .counters
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        Ok(counters.get(kind).copied())
    }
}

/// In-memory document collection
///
/// Documents are kept in insertion order. Identity uniqueness is enforced
/// per column on insert, mirroring the Postgres unique indexes.
#[derive(Clone)]
pub struct MemoryCollection {
    name: String,
    docs: Arc<RwLock<Vec<Document>>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Index of the best-ranked match, earliest insert first on ties.
    fn position(docs: &[Document], filter: &Filter) -> Option<usize> {
        docs.iter()
            .enumerate()
            .filter_map(|(idx, doc)| filter.rank(doc).map(|rank| (rank, idx)))
            .min()
            .map(|(_, idx)| idx)
    }

    fn duplicate(&self, field: &'static str, value: impl ToString) -> StoreError {
        StoreError::DuplicateKey {
            collection: self.name.clone(),
            field,
            value: value.to_string(),
        }
    }
}

/// Empty alternate keys never collide, matching the partial unique indexes.
fn same_alternate_key(stored: &Option<String>, new: &Option<String>) -> bool {
    match (stored.as_deref(), new.as_deref()) {
        (Some(a), Some(b)) => !b.is_empty() && a == b,
        _ => false,
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let docs = self
            .docs
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        Ok(Self::position(&docs, filter).map(|idx| docs[idx].clone()))
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let docs = self
            .docs
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        Ok(docs
            .iter()
            .filter(|doc| filter.rank(doc).is_some())
            .cloned()
            .collect())
    }

    async fn insert_one(&self, new: NewDocument) -> Result<Document, StoreError> {
        let mut docs = self
            .docs
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        for doc in docs.iter() {
            if doc.storage_key == new.storage_key {
                return Err(self.duplicate("storage_key", &new.storage_key));
            }
            if let (Some(a), Some(b)) = (doc.numeric_id, new.numeric_id) {
                if a == b {
                    return Err(self.duplicate("numeric_id", b));
                }
            }
            if same_alternate_key(&doc.external_key, &new.external_key) {
                return Err(
                    self.duplicate("external_key", new.external_key.as_deref().unwrap_or_default())
                );
            }
            if same_alternate_key(&doc.secondary_key, &new.secondary_key) {
                return Err(
                    self.duplicate("secondary_key", new.secondary_key.as_deref().unwrap_or_default())
                );
            }
        }

        let doc = Document {
            storage_key: new.storage_key,
            numeric_id: new.numeric_id,
            external_key: new.external_key,
            secondary_key: new.secondary_key,
            lifecycle: Default::default(),
            created_at: Utc::now(),
            fields: new.fields,
        };
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn update_one(
        &self,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>, StoreError> {
        let mut docs = self
            .docs
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        let Some(idx) = Self::position(&docs, filter) else {
            return Ok(None);
        };
        let doc = &mut docs[idx];
        update.apply_to(doc);
        Ok(Some(doc.clone()))
    }
}
