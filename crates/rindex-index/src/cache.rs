//! Cached predicate-query results, keyed by caller-chosen indexing keys.
//!
//! For each indexing key the cache holds an ordered id list and a validity
//! flag. Every key ever populated is also recorded in a registry so that all
//! cached queries can be invalidated in bulk. Nothing here invalidates on its
//! own: a valid entry stays authoritative until [`QueryCache::invalidate`]
//! or [`QueryCache::invalidate_all`] is called.

use std::sync::Arc;

use rindex_store::KeyValueStore;
use rindex_types::EntityId;
use tracing::debug;

use crate::error::{IndexError, IndexResult};
use crate::keys::KeyLayout;

const VALID: &str = "1";
const INVALID: &str = "0";

/// Secondary index cache of one collection.
#[derive(Clone)]
pub struct QueryCache {
    layout: KeyLayout,
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("collection", &self.layout.collection())
            .finish()
    }
}

fn require_key(indexing_key: &str) -> IndexResult<()> {
    if indexing_key.is_empty() {
        return Err(IndexError::EmptyQueryKey);
    }
    Ok(())
}

impl QueryCache {
    pub fn new(layout: KeyLayout, store: Arc<dyn KeyValueStore>) -> Self {
        Self { layout, store }
    }

    pub fn collection(&self) -> &str {
        self.layout.collection()
    }

    /// Append ids to the cached list of `indexing_key`.
    ///
    /// No deduplication: two populations of the same key racing each other
    /// can leave duplicate ids behind. Readers deduplicate.
    pub async fn add_ids(&self, indexing_key: &str, ids: &[EntityId]) -> IndexResult<()> {
        require_key(indexing_key)?;
        let key = self.layout.query_ids(indexing_key);
        for id in ids {
            self.store.list_push_right(&key, id.as_str()).await?;
        }
        Ok(())
    }

    /// Mark the cached list of `indexing_key` valid or invalid.
    pub async fn set_query_state(&self, indexing_key: &str, valid: bool) -> IndexResult<()> {
        require_key(indexing_key)?;
        let state = if valid { VALID } else { INVALID };
        self.store
            .hash_set_field(&self.layout.query_state(), indexing_key, state)
            .await?;
        Ok(())
    }

    /// Whether the cached list of `indexing_key` is authoritative.
    /// Unknown keys are invalid.
    pub async fn get_query_state(&self, indexing_key: &str) -> IndexResult<bool> {
        require_key(indexing_key)?;
        let states = self.store.hash_get_all(&self.layout.query_state()).await?;
        Ok(states.get(indexing_key).map(String::as_str) == Some(VALID))
    }

    /// The cached ids of `indexing_key`, duplicates included. Empty if unknown.
    pub async fn get_indexes(&self, indexing_key: &str) -> IndexResult<Vec<EntityId>> {
        require_key(indexing_key)?;
        let raw = self
            .store
            .list_range(&self.layout.query_ids(indexing_key), 0, -1)
            .await?;
        Ok(raw.into_iter().map(EntityId::from).collect())
    }

    /// Record `indexing_key` in the registry. Idempotent.
    pub async fn add_query_key(&self, indexing_key: &str) -> IndexResult<()> {
        require_key(indexing_key)?;
        self.store
            .set_add(&self.layout.query_keys(), indexing_key)
            .await?;
        Ok(())
    }

    /// Every indexing key ever populated, in lexicographic order.
    pub async fn query_keys(&self) -> IndexResult<Vec<String>> {
        Ok(self.store.set_members(&self.layout.query_keys()).await?)
    }

    /// Drop a stale id from the cached list of `indexing_key`.
    pub async fn remove_id(&self, indexing_key: &str, id: &EntityId) -> IndexResult<u64> {
        require_key(indexing_key)?;
        Ok(self
            .store
            .list_remove_value(&self.layout.query_ids(indexing_key), 0, id.as_str())
            .await?)
    }

    /// Clear the cached ids of `indexing_key` and mark it invalid.
    /// The key stays in the registry.
    pub async fn invalidate(&self, indexing_key: &str) -> IndexResult<()> {
        require_key(indexing_key)?;
        self.set_query_state(indexing_key, false).await?;
        self.store
            .delete_key(&self.layout.query_ids(indexing_key))
            .await?;
        debug!(
            collection = %self.layout.collection(),
            indexing_key,
            "query cache invalidated"
        );
        Ok(())
    }

    /// Invalidate every registered key. Returns how many keys were touched.
    pub async fn invalidate_all(&self) -> IndexResult<usize> {
        let keys = self.query_keys().await?;
        for key in &keys {
            self.invalidate(key).await?;
        }
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rindex_store::InMemoryKvStore;

    fn cache() -> QueryCache {
        let store = Arc::new(InMemoryKvStore::new());
        QueryCache::new(KeyLayout::new("todos"), store)
    }

    fn ids(raw: &[&str]) -> Vec<EntityId> {
        raw.iter().map(|s| EntityId::new(*s)).collect()
    }

    #[tokio::test]
    async fn unknown_key_is_invalid_and_empty() {
        let cache = cache();
        assert!(!cache.get_query_state("done=false").await.unwrap());
        assert!(cache.get_indexes("done=false").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_ids_appends_in_order_without_dedup() {
        let cache = cache();
        cache.add_ids("k", &ids(&["a", "b"])).await.unwrap();
        cache.add_ids("k", &ids(&["a"])).await.unwrap();
        assert_eq!(cache.get_indexes("k").await.unwrap(), ids(&["a", "b", "a"]));
    }

    #[tokio::test]
    async fn query_state_round_trip() {
        let cache = cache();
        cache.set_query_state("k", true).await.unwrap();
        assert!(cache.get_query_state("k").await.unwrap());
        cache.set_query_state("k", false).await.unwrap();
        assert!(!cache.get_query_state("k").await.unwrap());
    }

    #[tokio::test]
    async fn query_keys_registry_is_a_set() {
        let cache = cache();
        cache.add_query_key("b").await.unwrap();
        cache.add_query_key("a").await.unwrap();
        cache.add_query_key("b").await.unwrap();
        assert_eq!(cache.query_keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn remove_id_prunes_every_copy() {
        let cache = cache();
        cache.add_ids("k", &ids(&["a", "b", "a"])).await.unwrap();
        assert_eq!(cache.remove_id("k", &EntityId::new("a")).await.unwrap(), 2);
        assert_eq!(cache.get_indexes("k").await.unwrap(), ids(&["b"]));
    }

    #[tokio::test]
    async fn invalidate_clears_ids_but_keeps_registry() {
        let cache = cache();
        cache.add_ids("k", &ids(&["a"])).await.unwrap();
        cache.set_query_state("k", true).await.unwrap();
        cache.add_query_key("k").await.unwrap();

        cache.invalidate("k").await.unwrap();
        assert!(!cache.get_query_state("k").await.unwrap());
        assert!(cache.get_indexes("k").await.unwrap().is_empty());
        assert_eq!(cache.query_keys().await.unwrap(), vec!["k"]);
    }

    #[tokio::test]
    async fn invalidate_all_touches_every_registered_key() {
        let cache = cache();
        for key in ["k1", "k2"] {
            cache.add_ids(key, &ids(&["a"])).await.unwrap();
            cache.set_query_state(key, true).await.unwrap();
            cache.add_query_key(key).await.unwrap();
        }
        assert_eq!(cache.invalidate_all().await.unwrap(), 2);
        assert!(!cache.get_query_state("k1").await.unwrap());
        assert!(!cache.get_query_state("k2").await.unwrap());
    }

    #[tokio::test]
    async fn empty_indexing_key_is_rejected() {
        let cache = cache();
        assert!(matches!(
            cache.get_query_state("").await,
            Err(IndexError::EmptyQueryKey)
        ));
        assert!(cache.add_ids("", &ids(&["a"])).await.is_err());
    }
}
