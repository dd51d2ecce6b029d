//! Key-value store adapter for rindex.
//!
//! rindex keeps all of its state in an external schemaless key-value store
//! offering Redis-style hash, list and set primitives. This crate defines the
//! capability surface the upper layers rely on and ships an in-memory backend.
//!
//! # Storage Backends
//!
//! All backends implement the [`KeyValueStore`] trait:
//!
//! - [`InMemoryKvStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Absent keys read as empty containers, never as errors.
//! 2. A container that becomes empty disappears, as in Redis.
//! 3. Using a key as the wrong container type is [`StoreError::WrongType`].
//! 4. Backend failures are propagated unchanged; nothing here retries.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryKvStore;
pub use traits::{HashFields, KeyValueStore};
