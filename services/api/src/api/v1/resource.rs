//! Operations shared by the entity routes.
//!
//! Every `{id}` path segment is resolved through the locator, and every
//! mutation targets the located document by its storage key.

use serde_json::{Map, Value};
use tutorhub_id::{NativeKey, SequenceKind};
use tutorhub_store::{
    locator, Document, DocumentCollection, Filter, LocateError, NewDocument, SequenceAllocator,
    Update,
};

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;

/// An entity type exposed over HTTP.
pub struct Entity {
    /// Singular name used in error codes ("job" -> `job_not_found`).
    pub name: &'static str,
    pub kind: SequenceKind,
}

impl Entity {
    pub async fn list(
        &self,
        collection: &dyn DocumentCollection,
        filter: &Filter,
        ctx: &RequestContext,
    ) -> Result<Vec<Document>, ApiError> {
        collection.find(filter).await.map_err(|e| {
            tracing::error!(error = %e, request_id = %ctx.request_id, entity = self.name, "Failed to list documents");
            ApiError::store(e).with_request_id(ctx.request_id.clone())
        })
    }

    /// Returns true if any document matches `filter`.
    pub async fn exists(
        &self,
        collection: &dyn DocumentCollection,
        filter: &Filter,
        ctx: &RequestContext,
    ) -> Result<bool, ApiError> {
        let found = collection.find_one(filter).await.map_err(|e| {
            tracing::error!(error = %e, request_id = %ctx.request_id, entity = self.name, "Failed to query documents");
            ApiError::store(e).with_request_id(ctx.request_id.clone())
        })?;
        Ok(found.is_some())
    }

    pub async fn locate<K: NativeKey>(
        &self,
        collection: &dyn DocumentCollection,
        raw_id: &str,
        ctx: &RequestContext,
    ) -> Result<Document, ApiError> {
        locator::resolve::<K>(collection, raw_id)
            .await
            .map_err(|e| self.locate_error(e, ctx))
    }

    /// Allocates a numeric id and a fresh storage key, then persists `body`.
    ///
    /// Nothing is written if allocation fails.
    pub async fn create<K: NativeKey>(
        &self,
        collection: &dyn DocumentCollection,
        sequences: &SequenceAllocator,
        body: Map<String, Value>,
        ctx: &RequestContext,
    ) -> Result<Document, ApiError> {
        let numeric_id = sequences.next_value(&self.kind).await.map_err(|e| {
            tracing::error!(error = %e, request_id = %ctx.request_id, kind = %self.kind, "Failed to allocate id");
            ApiError::sequence(e).with_request_id(ctx.request_id.clone())
        })?;

        let doc = NewDocument::from_body(K::generate().to_string(), body).with_numeric_id(numeric_id);
        let created = collection.insert_one(doc).await.map_err(|e| {
            if !e.is_duplicate() {
                tracing::error!(error = %e, request_id = %ctx.request_id, entity = self.name, "Failed to insert document");
            }
            ApiError::store(e).with_request_id(ctx.request_id.clone())
        })?;

        tracing::info!(
            request_id = %ctx.request_id,
            collection = collection.name(),
            storage_key = %created.storage_key,
            numeric_id = %numeric_id,
            "Created document"
        );
        Ok(created)
    }

    /// Resolves `raw_id` and applies `update` to that document.
    pub async fn update<K: NativeKey>(
        &self,
        collection: &dyn DocumentCollection,
        raw_id: &str,
        update: &Update,
        ctx: &RequestContext,
    ) -> Result<Document, ApiError> {
        let doc = self.locate::<K>(collection, raw_id, ctx).await?;
        self.update_located(collection, &doc, update, ctx).await
    }

    async fn update_located(
        &self,
        collection: &dyn DocumentCollection,
        doc: &Document,
        update: &Update,
        ctx: &RequestContext,
    ) -> Result<Document, ApiError> {
        let updated = collection
            .update_one(&doc.target(), update)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, request_id = %ctx.request_id, entity = self.name, "Failed to update document");
                ApiError::store(e).with_request_id(ctx.request_id.clone())
            })?;

        match updated {
            Some(doc) => {
                tracing::debug!(
                    request_id = %ctx.request_id,
                    collection = collection.name(),
                    storage_key = %doc.storage_key,
                    "Updated document"
                );
                Ok(doc)
            }
            // Storage keys never change, so this only happens if the row vanished
            None => Err(self.locate_error(
                LocateError::NotFound {
                    raw_id: doc.storage_key.clone(),
                },
                ctx,
            )),
        }
    }

    fn locate_error(&self, err: LocateError, ctx: &RequestContext) -> ApiError {
        if !err.is_not_found() {
            tracing::error!(error = %err, request_id = %ctx.request_id, entity = self.name, "Failed to locate document");
        }
        ApiError::locate(err, self.name).with_request_id(ctx.request_id.clone())
    }
}
