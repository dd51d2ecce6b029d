use rindex_index::IndexError;
use rindex_types::EntityId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    /// The entity does not match the collection schema. Nothing was written.
    #[error(transparent)]
    Validation(#[from] rindex_schema::ValidationError),

    /// The id would collide with one of the collection's bookkeeping keys.
    #[error("entity id is reserved: {0}")]
    ReservedId(EntityId),

    #[error("indexing key must not be empty")]
    EmptyIndexingKey,

    /// A stored entity could not be decoded (or a new one encoded).
    #[error("codec error: {0}")]
    Codec(#[from] rindex_schema::CodecError),

    /// Store transport or backend failure, propagated unchanged.
    #[error("store error: {0}")]
    Store(#[from] rindex_store::StoreError),
}

impl From<IndexError> for RepoError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::EmptyQueryKey => Self::EmptyIndexingKey,
            IndexError::Store(e) => Self::Store(e),
        }
    }
}

impl RepoError {
    /// Returns `true` for schema violations.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
