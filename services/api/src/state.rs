//! Application state shared across request handlers.

use std::sync::Arc;

use tutorhub_store::{
    CounterStore, Database, DocumentCollection, FallbackPolicy, MemoryCollection,
    MemoryCounterStore, SequenceAllocator, StoreError,
};

pub const JOBS: &str = "jobs";
pub const TUTORS: &str = "tutors";

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    jobs: Arc<dyn DocumentCollection>,
    tutors: Arc<dyn DocumentCollection>,
    sequences: SequenceAllocator,
    /// None for the in-memory backend.
    db: Option<Database>,
}

impl AppState {
    /// State backed by process-local collections and counters.
    pub fn in_memory(fallback: FallbackPolicy) -> Self {
        Self::in_memory_with_counters(Arc::new(MemoryCounterStore::new()), fallback)
    }

    /// Process-local collections with ids drawn from `counters`.
    pub fn in_memory_with_counters(
        counters: Arc<dyn CounterStore>,
        fallback: FallbackPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                jobs: Arc::new(MemoryCollection::new(JOBS)),
                tutors: Arc::new(MemoryCollection::new(TUTORS)),
                sequences: SequenceAllocator::new(counters, fallback),
                db: None,
            }),
        }
    }

    /// State backed by Postgres.
    pub fn postgres(db: Database, fallback: FallbackPolicy) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                jobs: Arc::new(db.collection(JOBS)),
                tutors: Arc::new(db.collection(TUTORS)),
                sequences: SequenceAllocator::new(Arc::new(db.counter_store()), fallback),
                db: Some(db),
            }),
        }
    }

    pub fn jobs(&self) -> &dyn DocumentCollection {
        self.inner.jobs.as_ref()
    }

    pub fn tutors(&self) -> &dyn DocumentCollection {
        self.inner.tutors.as_ref()
    }

    pub fn sequences(&self) -> &SequenceAllocator {
        &self.inner.sequences
    }

    /// Name of the storage backend, for health reporting.
    pub fn backend(&self) -> &'static str {
        if self.inner.db.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }

    /// Checks that the storage backend is reachable.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        match &self.inner.db {
            Some(db) => db.health_check().await,
            None => Ok(()),
        }
    }
}
