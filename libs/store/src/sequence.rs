//! Per-kind numeric sequence allocation.
//!
//! All coordination is delegated to the backing [`CounterStore`]: the
//! allocator never performs a read-modify-write of its own. Values are unique
//! and strictly increasing per kind but not dense; a caller that times out
//! after the increment committed simply loses that value.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};
use tutorhub_id::{NumericId, SequenceKind};

use crate::error::StoreError;

/// Persistent per-kind counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically creates the counter at 0 if absent, increments it by one,
    /// and returns the post-increment value.
    ///
    /// Returns `Ok(None)` if the backend applied the increment but did not
    /// report the resulting value.
    async fn increment(&self, kind: &SequenceKind) -> Result<Option<i64>, StoreError>;

    /// Reads the current counter value without modifying it.
    async fn current(&self, kind: &SequenceKind) -> Result<Option<i64>, StoreError>;
}

/// Sequence allocation errors.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// No counter value could be obtained; the caller must not persist an
    /// entity without an id.
    #[error("failed to allocate a {kind} value")]
    AllocationFailed { kind: SequenceKind },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What to do when the counter store applies an increment without reporting
/// the new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Read the counter back in a second round trip.
    ///
    /// Not safe under concurrency: a concurrent increment between the two
    /// round trips makes two callers observe the same value.
    #[default]
    ReadAfterIncrement,
    /// Fail with `AllocationFailed`.
    Strict,
}

impl std::str::FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-after-increment" => Ok(Self::ReadAfterIncrement),
            "strict" => Ok(Self::Strict),
            other => Err(format!(
                "unknown sequence fallback policy '{other}' (expected 'read-after-increment' or 'strict')"
            )),
        }
    }
}

/// Issues unique, increasing numeric ids per [`SequenceKind`].
#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn CounterStore>,
    fallback: FallbackPolicy,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn CounterStore>, fallback: FallbackPolicy) -> Self {
        Self { store, fallback }
    }

    /// Returns the next value for `kind`. The first value of a new kind is 1.
    pub async fn next_value(&self, kind: &SequenceKind) -> Result<NumericId, SequenceError> {
        if let Some(value) = self.store.increment(kind).await? {
            debug!(kind = %kind, value, "Allocated sequence value");
            return Ok(NumericId::new(value));
        }

        match self.fallback {
            FallbackPolicy::Strict => {
                warn!(kind = %kind, "Counter store reported no value after increment");
                Err(SequenceError::AllocationFailed { kind: kind.clone() })
            }
            FallbackPolicy::ReadAfterIncrement => {
                warn!(kind = %kind, "Counter store reported no value, reading counter back");
                match self.store.current(kind).await? {
                    Some(value) => Ok(NumericId::new(value)),
                    None => Err(SequenceError::AllocationFailed { kind: kind.clone() }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicI64, Ordering};

    use super::*;
    use crate::memory::MemoryCounterStore;

    /// Applies increments but never reports the value.
    struct SilentCounterStore {
        value: AtomicI64,
        persisted: bool,
    }

    #[async_trait]
    impl CounterStore for SilentCounterStore {
        async fn increment(&self, _kind: &SequenceKind) -> Result<Option<i64>, StoreError> {
            self.value.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn current(&self, _kind: &SequenceKind) -> Result<Option<i64>, StoreError> {
            Ok(self
                .persisted
                .then(|| self.value.load(Ordering::SeqCst)))
        }
    }

    fn silent(persisted: bool) -> Arc<dyn CounterStore> {
        Arc::new(SilentCounterStore {
            value: AtomicI64::new(0),
            persisted,
        })
    }

    fn allocator() -> SequenceAllocator {
        SequenceAllocator::new(Arc::new(MemoryCounterStore::new()), FallbackPolicy::Strict)
    }

    #[tokio::test]
    async fn test_first_value_is_one() {
        let allocator = allocator();
        let kind = SequenceKind::new("neverSeenKind").unwrap();
        assert_eq!(allocator.next_value(&kind).await.unwrap().value(), 1);
    }

    #[tokio::test]
    async fn test_values_strictly_increase() {
        let allocator = allocator();
        let mut last = 0;
        for _ in 0..20 {
            let value = allocator.next_value(&SequenceKind::JOB).await.unwrap().value();
            assert!(value > last);
            last = value;
        }
        assert_eq!(last, 20);
    }

    #[tokio::test]
    async fn test_kinds_are_independent() {
        let allocator = allocator();
        let a = SequenceKind::new("a").unwrap();
        let b = SequenceKind::new("b").unwrap();

        assert_eq!(allocator.next_value(&a).await.unwrap().value(), 1);
        assert_eq!(allocator.next_value(&b).await.unwrap().value(), 1);
        assert_eq!(allocator.next_value(&a).await.unwrap().value(), 2);
        assert_eq!(allocator.next_value(&a).await.unwrap().value(), 3);
        assert_eq!(allocator.next_value(&b).await.unwrap().value(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocation_is_unique() {
        let allocator = allocator();
        let mut handles = Vec::new();
        for _ in 0..64 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                allocator.next_value(&SequenceKind::TUTOR).await.unwrap().value()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()));
        }
        assert_eq!(seen, (1..=64).collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn test_strict_policy_fails_without_reported_value() {
        let allocator = SequenceAllocator::new(silent(true), FallbackPolicy::Strict);
        let err = allocator.next_value(&SequenceKind::JOB).await.unwrap_err();
        assert!(matches!(err, SequenceError::AllocationFailed { .. }));
    }

    #[tokio::test]
    async fn test_read_after_increment_uses_current_value() {
        let allocator = SequenceAllocator::new(silent(true), FallbackPolicy::ReadAfterIncrement);
        assert_eq!(allocator.next_value(&SequenceKind::JOB).await.unwrap().value(), 1);
        assert_eq!(allocator.next_value(&SequenceKind::JOB).await.unwrap().value(), 2);
    }

    #[tokio::test]
    async fn test_read_after_increment_fails_when_counter_missing() {
        let allocator = SequenceAllocator::new(silent(false), FallbackPolicy::ReadAfterIncrement);
        let err = allocator.next_value(&SequenceKind::JOB).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to allocate a jobId value");
    }

    #[test]
    fn test_fallback_policy_from_str() {
        assert_eq!(
            "strict".parse::<FallbackPolicy>(),
            Ok(FallbackPolicy::Strict)
        );
        assert_eq!(
            "read-after-increment".parse::<FallbackPolicy>(),
            Ok(FallbackPolicy::ReadAfterIncrement)
        );
        assert!("sometimes".parse::<FallbackPolicy>().is_err());
    }
}
