//! Document collection abstraction.

use async_trait::async_trait;

use crate::document::{Document, NewDocument};
use crate::error::StoreError;
use crate::filter::{Filter, Update};

/// A named collection of documents in a schemaless store.
///
/// When several documents satisfy an [`Filter::AnyOf`], backends return the
/// one matching the earliest key in the list, then the oldest insert.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;

    /// Returns the first document matching `filter`.
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError>;

    /// Returns every document matching `filter`, oldest first.
    async fn find(&self, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    /// Inserts a document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateKey` if any identity value is taken.
    async fn insert_one(&self, doc: NewDocument) -> Result<Document, StoreError>;

    /// Applies `update` to the first document matching `filter`.
    ///
    /// Returns the updated document, or None if nothing matched.
    async fn update_one(
        &self,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>, StoreError>;
}
