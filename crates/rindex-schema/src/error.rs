//! Error types for the schema crate.

use crate::validate::Violation;

/// An entity did not match its collection's schema.
///
/// Carries every violation found, each with a dotted field path rooted at the
/// collection name (e.g. `todos.desc`).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid entity for '{root}': {}", join_violations(.violations))]
pub struct ValidationError {
    pub root: String,
    pub violations: Vec<Violation>,
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors converting between entities and flat hashes.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A stored field could not be decoded as the type its schema declares.
    #[error("malformed field '{field}': {reason}")]
    Malformed { field: String, reason: String },

    /// A stored timestamp is not a decimal millisecond count.
    #[error("malformed timestamp '{field}': {reason}")]
    Timestamp { field: String, reason: String },

    /// A field value could not be serialized.
    #[error("cannot encode field '{field}': {reason}")]
    Encode { field: String, reason: String },
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
