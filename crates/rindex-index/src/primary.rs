use std::sync::Arc;

use rindex_store::KeyValueStore;
use rindex_types::EntityId;

use crate::error::IndexResult;
use crate::keys::KeyLayout;

/// Ordered enumeration of every live entity id in a collection.
///
/// New ids are pushed at the head, so enumeration yields newest first. The
/// list may transiently hold ids whose hash is gone; readers prune them.
#[derive(Clone)]
pub struct PrimaryIndex {
    key: String,
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for PrimaryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryIndex").field("key", &self.key).finish()
    }
}

impl PrimaryIndex {
    pub fn new(layout: &KeyLayout, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            key: layout.primary_index(),
            store,
        }
    }

    /// Record a new id at the head of the index.
    pub async fn add(&self, id: &EntityId) -> IndexResult<()> {
        if id.is_empty() {
            return Ok(());
        }
        self.store.list_push_left(&self.key, id.as_str()).await?;
        Ok(())
    }

    /// Remove every occurrence of `id`. Returns how many were removed.
    pub async fn remove(&self, id: &EntityId) -> IndexResult<u64> {
        Ok(self.store.list_remove_value(&self.key, 0, id.as_str()).await?)
    }

    /// All ids in index order.
    pub async fn ids(&self) -> IndexResult<Vec<EntityId>> {
        let raw = self.store.list_range(&self.key, 0, -1).await?;
        Ok(raw.into_iter().map(EntityId::from).collect())
    }

    /// Number of ids in the index, stale ones included.
    pub async fn len(&self) -> IndexResult<u64> {
        Ok(self.store.list_length(&self.key).await?)
    }

    pub async fn is_empty(&self) -> IndexResult<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rindex_store::InMemoryKvStore;

    fn index() -> (Arc<InMemoryKvStore>, PrimaryIndex) {
        let store = Arc::new(InMemoryKvStore::new());
        let index = PrimaryIndex::new(&KeyLayout::new("todos"), store.clone());
        (store, index)
    }

    #[tokio::test]
    async fn add_enumerates_newest_first() {
        let (_, index) = index();
        index.add(&EntityId::new("a")).await.unwrap();
        index.add(&EntityId::new("b")).await.unwrap();
        assert_eq!(
            index.ids().await.unwrap(),
            vec![EntityId::new("b"), EntityId::new("a")]
        );
        assert_eq!(index.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_ids_are_ignored() {
        let (store, index) = index();
        index.add(&EntityId::new("")).await.unwrap();
        assert!(index.is_empty().await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn remove_drops_all_occurrences() {
        let (_, index) = index();
        let a = EntityId::new("a");
        index.add(&a).await.unwrap();
        index.add(&EntityId::new("b")).await.unwrap();
        index.add(&a).await.unwrap();
        assert_eq!(index.remove(&a).await.unwrap(), 2);
        assert_eq!(index.ids().await.unwrap(), vec![EntityId::new("b")]);
        assert_eq!(index.remove(&a).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn lives_under_collection_key() {
        let (store, index) = index();
        index.add(&EntityId::new("a")).await.unwrap();
        assert_eq!(store.keys(), vec!["todos:indexes"]);
    }
}
