//! Resolution of loosely shaped identifiers to stored documents.
//!
//! Route handlers receive identifiers that may be a storage key, a numeric
//! id rendered as text, or a legacy alternate key. [`resolve`] tries every
//! applicable interpretation in a single query and returns the first match.

use thiserror::Error;
use tracing::debug;
use tutorhub_id::NativeKey;

use crate::collection::DocumentCollection;
use crate::document::Document;
use crate::error::StoreError;
use crate::filter::{CandidateKey, Filter};

/// Lookup errors.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("no document matches '{raw_id}'")]
    NotFound { raw_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LocateError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LocateError::NotFound { .. })
    }
}

/// Builds the disjunctive lookup filter for `raw_id`.
///
/// Returns None when `raw_id` admits no interpretation (it is empty).
pub fn lookup_filter<K: NativeKey>(raw_id: &str) -> Option<Filter> {
    let keys = CandidateKey::extract::<K>(raw_id);
    (!keys.is_empty()).then_some(Filter::AnyOf(keys))
}

/// Resolves `raw_id` to one document of `collection`, whose native keys are
/// of type `K`.
///
/// Soft-deleted documents are returned like any other.
pub async fn resolve<K: NativeKey>(
    collection: &dyn DocumentCollection,
    raw_id: &str,
) -> Result<Document, LocateError> {
    let not_found = || LocateError::NotFound {
        raw_id: raw_id.to_string(),
    };

    let Some(filter) = lookup_filter::<K>(raw_id) else {
        debug!(collection = collection.name(), "Empty identifier, skipping lookup");
        return Err(not_found());
    };

    match collection.find_one(&filter).await? {
        Some(doc) => Ok(doc),
        None => {
            debug!(collection = collection.name(), raw_id, "No document matched identifier");
            Err(not_found())
        }
    }
}
