//! Error types for the index crate.

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Indexing keys must be non-empty.
    #[error("indexing key must not be empty")]
    EmptyQueryKey,

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] rindex_store::StoreError),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
