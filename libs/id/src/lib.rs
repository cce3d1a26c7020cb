//! # tutorhub-id
//!
//! Identity types for tutorhub collections.
//!
//! Every stored entity carries up to three kinds of identity:
//!
//! - a **storage key**: the native, immutable identity assigned at insert,
//!   rendered as `{prefix}_{ulid}` (e.g. `job_01HV4Z2WQXKJNM8GPQY6VBKC3D`)
//! - a **numeric id**: a human-facing sequence number issued per
//!   [`SequenceKind`] (e.g. tutor `42`)
//! - optional legacy alternate keys, which are plain strings and have no
//!   type here
//!
//! Storage keys parse strictly. A string that is not a valid key for a given
//! collection is reported as an [`IdError`] so that callers can decide to
//! skip it rather than fail.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
