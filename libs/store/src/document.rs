//! Stored entity documents and their soft-delete lifecycle.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tutorhub_id::NumericId;

use crate::filter::Filter;

/// JSON field names that carry identity or lifecycle state.
///
/// These are owned by the store and are never taken from free-form bodies.
pub const RESERVED_FIELDS: &[&str] = &[
    "_id",
    "id",
    "externalKey",
    "documentId",
    "isDeleted",
    "deletedAt",
    "createdAt",
];

/// Soft-delete state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Active,
    /// `deleted_at` may be missing on records flagged by older writers.
    Deleted { deleted_at: Option<DateTime<Utc>> },
}

/// A lifecycle transition applied by an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Delete { at: DateTime<Utc> },
    Restore,
}

impl Lifecycle {
    /// Rebuilds the state from the stored flag/timestamp pair.
    ///
    /// An absent flag is the same as `false`.
    pub fn from_parts(is_deleted: Option<bool>, deleted_at: Option<DateTime<Utc>>) -> Self {
        if is_deleted.unwrap_or(false) {
            Lifecycle::Deleted { deleted_at }
        } else {
            Lifecycle::Active
        }
    }

    /// Returns the state after `transition`.
    #[must_use]
    pub fn apply(self, transition: Transition) -> Self {
        match transition {
            Transition::Delete { at } => Lifecycle::Deleted {
                deleted_at: Some(at),
            },
            Transition::Restore => Lifecycle::Active,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Lifecycle::Deleted { .. })
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Deleted { deleted_at } => *deleted_at,
        }
    }
}

/// A stored entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Native identity, unique within the collection.
    pub storage_key: String,
    pub numeric_id: Option<NumericId>,
    pub external_key: Option<String>,
    pub secondary_key: Option<String>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

impl Document {
    /// Exact filter for this document, used to target mutations after a
    /// lookup by a looser identifier.
    pub fn target(&self) -> Filter {
        Filter::storage_key(self.storage_key.clone())
    }

    /// Returns a boolean body field, treating absent or non-boolean as false.
    pub fn flag(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Renders the document as a flat JSON object.
    pub fn to_json(&self) -> Value {
        let mut out = self.fields.clone();
        out.insert("_id".into(), Value::String(self.storage_key.clone()));
        if let Some(id) = self.numeric_id {
            out.insert("id".into(), Value::from(id.value()));
        }
        if let Some(key) = &self.external_key {
            out.insert("externalKey".into(), Value::String(key.clone()));
        }
        if let Some(key) = &self.secondary_key {
            out.insert("documentId".into(), Value::String(key.clone()));
        }
        out.insert("isDeleted".into(), Value::Bool(self.lifecycle.is_deleted()));
        if let Some(at) = self.lifecycle.deleted_at() {
            out.insert("deletedAt".into(), Value::String(at.to_rfc3339()));
        }
        out.insert(
            "createdAt".into(),
            Value::String(self.created_at.to_rfc3339()),
        );
        Value::Object(out)
    }
}

/// Input for inserting a new document.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub storage_key: String,
    pub numeric_id: Option<NumericId>,
    pub external_key: Option<String>,
    pub secondary_key: Option<String>,
    pub fields: Map<String, Value>,
}

impl NewDocument {
    /// Builds a document from a request body.
    ///
    /// Non-empty string `externalKey` and `documentId` members become the
    /// alternate keys; all reserved members are dropped from the stored fields.
    pub fn from_body(storage_key: String, mut body: Map<String, Value>) -> Self {
        let external_key = take_string(&mut body, "externalKey");
        let secondary_key = take_string(&mut body, "documentId");
        strip_reserved(&mut body);
        Self {
            storage_key,
            numeric_id: None,
            external_key,
            secondary_key,
            fields: body,
        }
    }

    #[must_use]
    pub fn with_numeric_id(mut self, id: NumericId) -> Self {
        self.numeric_id = Some(id);
        self
    }
}

/// Removes reserved members from a free-form body.
pub fn strip_reserved(body: &mut Map<String, Value>) {
    for field in RESERVED_FIELDS {
        body.remove(*field);
    }
}

fn take_string(body: &mut Map<String, Value>, field: &str) -> Option<String> {
    match body.remove(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_lifecycle_transitions() {
        let at = Utc::now();
        let deleted = Lifecycle::Active.apply(Transition::Delete { at });
        assert!(deleted.is_deleted());
        assert_eq!(deleted.deleted_at(), Some(at));

        let restored = deleted.apply(Transition::Restore);
        assert_eq!(restored, Lifecycle::Active);
        assert_eq!(restored.deleted_at(), None);
    }

    #[test]
    fn test_lifecycle_absent_flag_is_active() {
        assert_eq!(Lifecycle::from_parts(None, None), Lifecycle::Active);
        assert_eq!(Lifecycle::from_parts(Some(false), None), Lifecycle::Active);
        assert!(Lifecycle::from_parts(Some(true), None).is_deleted());
    }

    #[test]
    fn test_from_body_lifts_alternate_keys() {
        let doc = NewDocument::from_body(
            "tut_x".to_string(),
            body(json!({
                "name": "Rahim",
                "externalKey": "legacy-7",
                "documentId": "doc-7",
                "_id": "spoofed",
                "id": 999,
                "isDeleted": true
            })),
        );

        assert_eq!(doc.external_key.as_deref(), Some("legacy-7"));
        assert_eq!(doc.secondary_key.as_deref(), Some("doc-7"));
        assert_eq!(doc.fields.len(), 1);
        assert_eq!(doc.fields["name"], "Rahim");
    }

    #[test]
    fn test_from_body_ignores_non_string_keys() {
        let doc = NewDocument::from_body("k".into(), body(json!({ "documentId": 5 })));
        assert_eq!(doc.secondary_key, None);
        assert!(doc.fields.is_empty());
    }

    #[test]
    fn test_from_body_treats_empty_keys_as_absent() {
        let doc = NewDocument::from_body(
            "k".into(),
            body(json!({ "externalKey": "", "documentId": "", "subject": "math" })),
        );
        assert_eq!(doc.external_key, None);
        assert_eq!(doc.secondary_key, None);
        assert_eq!(doc.fields.len(), 1);
    }

    #[test]
    fn test_to_json_flattens_identity() {
        let at = Utc::now();
        let doc = Document {
            storage_key: "job_1".into(),
            numeric_id: Some(NumericId::new(3)),
            external_key: None,
            secondary_key: Some("d".into()),
            lifecycle: Lifecycle::Deleted {
                deleted_at: Some(at),
            },
            created_at: at,
            fields: body(json!({ "subject": "math" })),
        };

        let json = doc.to_json();
        assert_eq!(json["_id"], "job_1");
        assert_eq!(json["id"], 3);
        assert_eq!(json["documentId"], "d");
        assert_eq!(json["isDeleted"], true);
        assert_eq!(json["subject"], "math");
        assert!(json.get("externalKey").is_none());
        assert!(json["deletedAt"].is_string());
    }
}
