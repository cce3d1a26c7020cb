//! Typed identity definitions for tutorhub collections.

use std::borrow::Cow;

use crate::{define_key, IdError};

/// A native storage identity with a canonical, strictly parsed string form.
///
/// Implemented by every key type generated with [`define_key!`].
pub trait NativeKey: Sized + std::fmt::Display {
    /// The collection prefix of the canonical string form.
    const PREFIX: &'static str;

    /// Generates a fresh key.
    fn generate() -> Self;

    /// Parses the canonical string form.
    fn parse_native(s: &str) -> Result<Self, IdError>;

    /// Returns true if `s` is a syntactically valid key of this type.
    fn is_valid(s: &str) -> bool {
        Self::parse_native(s).is_ok()
    }
}

// =============================================================================
// Storage keys
// =============================================================================

define_key!(JobKey, "job");
define_key!(TutorKey, "tut");

// =============================================================================
// Requests
// =============================================================================

define_key!(RequestId, "req");

// =============================================================================
// Numeric ID
// =============================================================================

/// Human-facing sequence number issued by the sequence allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NumericId(i64);

impl NumericId {
    /// Creates a new NumericId from an i64.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying i64 value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Parses a base-10 integer.
    ///
    /// No coercion is applied: empty strings, fractions, exponents and
    /// surrounding whitespace are all rejected.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| IdError::InvalidNumber(s.to_string()))
    }
}

impl std::fmt::Display for NumericId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NumericId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for NumericId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NumericId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i64::deserialize(deserializer)?;
        Ok(Self(id))
    }
}

// =============================================================================
// Sequence Kind
// =============================================================================

/// Name of an independent numeric sequence (one counter record per kind).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceKind(Cow<'static, str>);

impl SequenceKind {
    /// Sequence for job numeric ids.
    pub const JOB: Self = Self(Cow::Borrowed("jobId"));

    /// Sequence for tutor numeric ids.
    pub const TUTOR: Self = Self(Cow::Borrowed("tutorId"));

    /// Creates a sequence kind, rejecting empty names.
    pub fn new(kind: impl Into<String>) -> Result<Self, IdError> {
        let kind = kind.into();
        if kind.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(Cow::Owned(kind)))
    }

    /// Returns the sequence name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_job_key_roundtrip() {
        let key = JobKey::new();
        let parsed: JobKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
        assert!(key.to_string().starts_with("job_"));
    }

    #[test]
    fn test_tutor_key_rejects_job_prefix() {
        let job = JobKey::new().to_string();
        let result = TutorKey::parse(&job);
        assert!(matches!(
            result,
            Err(IdError::InvalidPrefix {
                expected: "tut",
                ..
            })
        ));
    }

    #[test]
    fn test_key_missing_separator() {
        let result: Result<TutorKey, _> = "tut01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(result, Err(IdError::MissingSeparator)));
    }

    #[test]
    fn test_key_empty() {
        assert_eq!(JobKey::parse(""), Err(IdError::Empty));
    }

    #[test]
    fn test_key_invalid_ulid() {
        assert!(matches!(
            JobKey::parse("job_invalid"),
            Err(IdError::InvalidUlid(_))
        ));
    }

    #[test]
    fn test_native_key_is_valid() {
        let key = TutorKey::new().to_string();
        assert!(TutorKey::is_valid(&key));
        assert!(!TutorKey::is_valid("42"));
        assert!(!JobKey::is_valid(&key));
    }

    #[test]
    fn test_key_json_roundtrip() {
        let key = TutorKey::new();
        let json = serde_json::to_string(&key).unwrap();
        let parsed: TutorKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn test_numeric_id_parse_is_strict() {
        assert_eq!(NumericId::parse("17").unwrap().value(), 17);
        assert_eq!(NumericId::parse(""), Err(IdError::Empty));
        assert!(NumericId::parse("1.5").is_err());
        assert!(NumericId::parse("1e3").is_err());
        assert!(NumericId::parse(" 7").is_err());
        assert!(NumericId::parse("abc").is_err());
    }

    #[test]
    fn test_numeric_id_json_is_plain_integer() {
        let json = serde_json::to_string(&NumericId::new(12)).unwrap();
        assert_eq!(json, "12");
    }

    #[test]
    fn test_sequence_kind_constants() {
        assert_eq!(SequenceKind::JOB.as_str(), "jobId");
        assert_eq!(SequenceKind::TUTOR.as_str(), "tutorId");
        assert_eq!(SequenceKind::new("jobId").unwrap(), SequenceKind::JOB);
    }

    #[test]
    fn test_sequence_kind_rejects_empty() {
        assert_eq!(SequenceKind::new(""), Err(IdError::Empty));
    }

    #[test]
    fn test_all_key_prefixes_unique() {
        let prefixes = [JobKey::PREFIX, TutorKey::PREFIX, RequestId::PREFIX];
        let unique: std::collections::HashSet<_> = prefixes.iter().collect();
        assert_eq!(prefixes.len(), unique.len(), "Duplicate key prefixes found!");
    }

    proptest! {
        #[test]
        fn numeric_id_accepts_every_i64(n in any::<i64>()) {
            prop_assert_eq!(NumericId::parse(&n.to_string()).unwrap().value(), n);
        }

        #[test]
        fn job_key_never_panics_on_garbage(s in ".*") {
            let _ = JobKey::parse(&s);
        }
    }
}
