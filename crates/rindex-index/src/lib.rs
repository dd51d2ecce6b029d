//! Indexes for rindex collections.
//!
//! Both structures live entirely in the key-value store, never in process
//! memory, so every process sharing a store sees the same state.
//!
//! # Key Types
//!
//! - [`PrimaryIndex`] -- ordered list of every live entity id in a collection
//! - [`QueryCache`] -- per indexing key: cached id list, validity flag, and a
//!   registry of every key ever populated
//! - [`KeyLayout`] -- the store keys a collection occupies
//!
//! Neither index is updated transactionally with entity writes. Stale ids are
//! tolerated and pruned lazily by readers.

pub mod cache;
pub mod error;
pub mod keys;
pub mod primary;

pub use cache::QueryCache;
pub use error::{IndexError, IndexResult};
pub use keys::KeyLayout;
pub use primary::PrimaryIndex;
