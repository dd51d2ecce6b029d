//! Entity repository for rindex.
//!
//! A [`Repository`] stores the entities of one collection in a key-value
//! store and answers predicate queries, memoizing each query's result ids
//! under a caller-chosen *indexing key*.
//!
//! # Caching policy
//!
//! Cached results are **never** invalidated by writes. A valid cache entry
//! stays authoritative until [`Repository::invalidate`] or
//! [`Repository::invalidate_all`] is called, so results may omit entities
//! written after the first query. Entities deleted since then are pruned from
//! results as they are discovered.
//!
//! # Self-healing
//!
//! Any read that resolves an indexed id to a missing hash removes that id
//! from the primary index (and from the cache entry it came from). Pruning
//! failures are logged, never surfaced.

pub mod config;
pub mod error;
pub mod methods;
pub mod repository;
pub mod stats;

pub use config::{RepositoryConfig, SetOptions};
pub use error::{RepoError, RepoResult};
pub use methods::{Collection, MethodsContext};
pub use repository::Repository;
pub use stats::RepositoryStats;

// Re-export key types
pub use rindex_index::{KeyLayout, PrimaryIndex, QueryCache};
pub use rindex_schema::{FieldType, Schema, ValidationError};
pub use rindex_store::{InMemoryKvStore, KeyValueStore, StoreError};
pub use rindex_types::{Entity, EntityId, Timestamp};
