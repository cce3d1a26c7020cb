//! # tutorhub-store
//!
//! Identity core for tutorhub's document collections:
//!
//! - [`SequenceAllocator`] hands out strictly increasing numeric ids per
//!   [`SequenceKind`](tutorhub_id::SequenceKind) on top of an atomic
//!   [`CounterStore`].
//! - [`locator::resolve`] maps an identifier of unknown shape (storage key,
//!   numeric id, legacy alternate key) to one stored [`Document`].
//!
//! Both are backed by pluggable stores: [`memory`] for tests and local runs,
//! [`postgres`] for deployments.

pub mod collection;
pub mod document;
pub mod error;
pub mod filter;
pub mod locator;
pub mod memory;
pub mod postgres;
pub mod sequence;

pub use collection::DocumentCollection;
pub use document::{Document, Lifecycle, NewDocument, Transition};
pub use error::StoreError;
pub use filter::{CandidateKey, Filter, Update};
pub use locator::LocateError;
pub use memory::{MemoryCollection, MemoryCounterStore};
pub use postgres::{Database, DbConfig, PgCollection, PgCounterStore};
pub use sequence::{CounterStore, FallbackPolicy, SequenceAllocator, SequenceError};
