/// Errors from key-value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key holds a different kind of container than the operation needs.
    #[error("wrong type for key '{key}': expected {expected}")]
    WrongType { key: String, expected: &'static str },

    /// Transport or backend failure (connection loss, server error, ...).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn wrong_type(key: &str, expected: &'static str) -> Self {
        Self::WrongType {
            key: key.to_string(),
            expected,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
