//! Query filters and updates understood by every collection backend.

use chrono::Utc;
use serde_json::{Map, Value};
use tutorhub_id::{NativeKey, NumericId};

use crate::document::{strip_reserved, Document, Transition};

/// One interpretation of a caller-supplied identifier.
///
/// Each variant matches exactly one identity column by literal equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateKey {
    ExternalKey(String),
    NumericId(NumericId),
    SecondaryKey(String),
    NativeId(String),
}

impl CandidateKey {
    /// Extracts the candidate keys for `raw_id`, in precedence order.
    ///
    /// An empty identifier has no candidates. Numeric and native-key
    /// interpretations are only produced when `raw_id` parses as such.
    pub fn extract<K: NativeKey>(raw_id: &str) -> Vec<CandidateKey> {
        if raw_id.is_empty() {
            return Vec::new();
        }

        let mut keys = Vec::with_capacity(4);
        keys.push(CandidateKey::ExternalKey(raw_id.to_string()));
        if let Ok(id) = NumericId::parse(raw_id) {
            keys.push(CandidateKey::NumericId(id));
        }
        keys.push(CandidateKey::SecondaryKey(raw_id.to_string()));
        if K::is_valid(raw_id) {
            keys.push(CandidateKey::NativeId(raw_id.to_string()));
        }
        keys
    }

    /// Returns true if `doc` carries this identity.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            CandidateKey::ExternalKey(key) => doc.external_key.as_deref() == Some(key.as_str()),
            CandidateKey::NumericId(id) => doc.numeric_id == Some(*id),
            CandidateKey::SecondaryKey(key) => {
                doc.secondary_key.as_deref() == Some(key.as_str())
            }
            CandidateKey::NativeId(key) => doc.storage_key == *key,
        }
    }
}

/// Document selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every document in the collection.
    All,
    /// Documents whose delete flag is false or absent.
    Active,
    /// Documents matching any of the keys; an empty list matches nothing.
    AnyOf(Vec<CandidateKey>),
    /// Documents whose body field `name` equals `value`.
    Field { name: String, value: Value },
}

impl Filter {
    /// Exact match on the native identity.
    pub fn storage_key(key: impl Into<String>) -> Self {
        Filter::AnyOf(vec![CandidateKey::NativeId(key.into())])
    }

    /// Exact match on a body field.
    pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Field {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns the rank of the first clause `doc` satisfies, or None.
    ///
    /// Lower ranks win when several documents match.
    pub fn rank(&self, doc: &Document) -> Option<usize> {
        match self {
            Filter::All => Some(0),
            Filter::Active => (!doc.lifecycle.is_deleted()).then_some(0),
            Filter::AnyOf(keys) => keys.iter().position(|key| key.matches(doc)),
            Filter::Field { name, value } => (doc.fields.get(name) == Some(value)).then_some(0),
        }
    }
}

/// A partial update applied to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// Body fields merged into the document (top-level replace).
    pub set: Map<String, Value>,
    /// Boolean body fields negated in place; absent or non-boolean counts as
    /// false.
    pub toggle: Vec<String>,
    pub transition: Option<Transition>,
}

impl Update {
    /// Merges caller-supplied fields, dropping reserved members.
    pub fn set_fields(mut fields: Map<String, Value>) -> Self {
        strip_reserved(&mut fields);
        Self {
            set: fields,
            ..Default::default()
        }
    }

    /// Sets a single body field.
    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set.insert(field.to_string(), value.into());
        self
    }

    /// Negates the boolean `field` against its stored value.
    #[must_use]
    pub fn toggle(mut self, field: &str) -> Self {
        self.toggle.push(field.to_string());
        self
    }

    /// Sets `field` to the current time.
    #[must_use]
    pub fn touch(self, field: &str) -> Self {
        self.with(field, Utc::now().to_rfc3339())
    }

    /// Soft-deletes the document now.
    pub fn soft_delete() -> Self {
        Self {
            transition: Some(Transition::Delete { at: Utc::now() }),
            ..Default::default()
        }
    }

    /// Clears the soft-delete flag and timestamp.
    pub fn restore() -> Self {
        Self {
            transition: Some(Transition::Restore),
            ..Default::default()
        }
    }

    /// Applies the update to `doc` in place.
    ///
    /// Toggled fields are negated against the value stored before the update.
    pub fn apply_to(&self, doc: &mut Document) {
        let flipped: Vec<(String, bool)> = self
            .toggle
            .iter()
            .map(|field| (field.clone(), !doc.flag(field)))
            .collect();
        for (field, value) in &self.set {
            doc.fields.insert(field.clone(), value.clone());
        }
        for (field, value) in flipped {
            doc.fields.insert(field, Value::Bool(value));
        }
        if let Some(transition) = self.transition {
            doc.lifecycle = doc.lifecycle.apply(transition);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use tutorhub_id::TutorKey;

    fn kinds(keys: &[CandidateKey]) -> Vec<&'static str> {
        keys.iter()
            .map(|key| match key {
                CandidateKey::ExternalKey(_) => "external",
                CandidateKey::NumericId(_) => "numeric",
                CandidateKey::SecondaryKey(_) => "secondary",
                CandidateKey::NativeId(_) => "native",
            })
            .collect()
    }

    #[rstest]
    #[case::numeric("42", vec!["external", "numeric", "secondary"])]
    #[case::negative("-3", vec!["external", "numeric", "secondary"])]
    #[case::text("rahim-bio", vec!["external", "secondary"])]
    #[case::fraction("4.2", vec!["external", "secondary"])]
    #[case::whitespace(" 42", vec!["external", "secondary"])]
    #[case::wrong_prefix("job_01HV4Z2WQXKJNM8GPQY6VBKC3D", vec!["external", "secondary"])]
    #[case::native("tut_01HV4Z2WQXKJNM8GPQY6VBKC3D", vec!["external", "secondary", "native"])]
    fn test_candidate_extraction(#[case] raw: &str, #[case] expected: Vec<&'static str>) {
        let keys = CandidateKey::extract::<TutorKey>(raw);
        assert_eq!(kinds(&keys), expected);
    }

    #[test]
    fn test_empty_identifier_has_no_candidates() {
        assert!(CandidateKey::extract::<TutorKey>("").is_empty());
    }

    #[test]
    fn test_update_strips_reserved_fields() {
        let fields = serde_json::json!({ "_id": "x", "isDeleted": true, "bio": "hi" });
        let update = Update::set_fields(fields.as_object().cloned().unwrap());
        assert_eq!(update.set.len(), 1);
        assert!(update.set.contains_key("bio"));
    }

    #[test]
    fn test_toggle_negates_stored_flag() {
        let mut doc = Document {
            storage_key: "tut_a".into(),
            numeric_id: None,
            external_key: None,
            secondary_key: None,
            lifecycle: Default::default(),
            created_at: Utc::now(),
            fields: Map::new(),
        };

        Update::default().toggle("isPremium").apply_to(&mut doc);
        assert_eq!(doc.fields["isPremium"], true);
        Update::default().toggle("isPremium").apply_to(&mut doc);
        assert_eq!(doc.fields["isPremium"], false);

        doc.fields.insert("isVerified".into(), Value::from("yes"));
        Update::default().toggle("isVerified").apply_to(&mut doc);
        assert_eq!(doc.fields["isVerified"], true);
    }

    #[test]
    fn test_field_filter_matches_exact_value() {
        let doc = Document {
            storage_key: "tut_a".into(),
            numeric_id: None,
            external_key: None,
            secondary_key: None,
            lifecycle: Default::default(),
            created_at: Utc::now(),
            fields: serde_json::json!({ "email": "a@example.com" })
                .as_object()
                .cloned()
                .unwrap(),
        };

        assert_eq!(Filter::field("email", "a@example.com").rank(&doc), Some(0));
        assert_eq!(Filter::field("email", "A@example.com").rank(&doc), None);
        assert_eq!(Filter::field("phone", "a@example.com").rank(&doc), None);
    }

    proptest! {
        #[test]
        fn non_integers_never_yield_numeric_candidates(raw in "[^0-9+-].*") {
            let keys = CandidateKey::extract::<TutorKey>(&raw);
            prop_assert!(!keys.iter().any(|k| matches!(k, CandidateKey::NumericId(_))));
        }

        #[test]
        fn integers_yield_exactly_one_numeric_candidate(n in any::<i64>()) {
            let keys = CandidateKey::extract::<TutorKey>(&n.to_string());
            let numeric: Vec<_> = keys
                .iter()
                .filter_map(|k| match k {
                    CandidateKey::NumericId(id) => Some(id.value()),
                    _ => None,
                })
                .collect();
            prop_assert_eq!(numeric, vec![n]);
        }

        #[test]
        fn candidates_never_carry_empty_strings(raw in ".*") {
            for key in CandidateKey::extract::<TutorKey>(&raw) {
                match key {
                    CandidateKey::ExternalKey(s)
                    | CandidateKey::SecondaryKey(s)
                    | CandidateKey::NativeId(s) => prop_assert!(!s.is_empty()),
                    CandidateKey::NumericId(_) => {}
                }
            }
        }
    }
}
