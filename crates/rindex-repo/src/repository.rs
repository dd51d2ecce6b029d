use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use rindex_index::{KeyLayout, PrimaryIndex, QueryCache};
use rindex_schema::{EntityCodec, Schema};
use rindex_store::KeyValueStore;
use rindex_types::{Entity, EntityId, Timestamp};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, warn};

use crate::config::{RepositoryConfig, SetOptions};
use crate::error::{RepoError, RepoResult};
use crate::methods::{Collection, MethodsContext};
use crate::stats::{RepositoryStats, StatsRecorder};

/// Outcome of consulting the query cache.
enum CacheLookup<T> {
    Hit(T),
    Miss,
}

/// Entity repository of one collection.
///
/// Every store round-trip of a call is issued sequentially; nothing fans out.
/// Concurrent calls on the same collection may interleave between round-trips.
pub struct Repository {
    config: RepositoryConfig,
    layout: KeyLayout,
    store: Arc<dyn KeyValueStore>,
    primary: PrimaryIndex,
    cache: QueryCache,
    stats: StatsRecorder,
    population_locks: PopulationLocks,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name())
            .field("collection", &self.collection())
            .field("strict_population", &self.config.strict_population)
            .finish()
    }
}

impl Repository {
    pub fn new(config: RepositoryConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let layout = KeyLayout::new(config.collection.clone());
        let primary = PrimaryIndex::new(&layout, Arc::clone(&store));
        let cache = QueryCache::new(layout.clone(), Arc::clone(&store));
        Self {
            config,
            layout,
            store,
            primary,
            cache,
            stats: StatsRecorder::default(),
            population_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Bind domain-specific query methods to this repository.
    ///
    /// `factory` receives the repository, its store, its query cache and its
    /// names, and returns whatever method set the domain needs.
    pub fn with_methods<M, F>(self, factory: F) -> Collection<M>
    where
        F: FnOnce(MethodsContext) -> M,
    {
        let repository = Arc::new(self);
        let context = MethodsContext {
            repository: Arc::clone(&repository),
            store: Arc::clone(&repository.store),
            indexing: repository.cache.clone(),
            collection: repository.collection().to_string(),
            name: repository.name().to_string(),
        };
        Collection::new(Arc::clone(&repository), factory(context))
    }

    // ---- Accessors ----

    pub fn name(&self) -> &str {
        self.config.display_name()
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    pub fn schema(&self) -> &Schema {
        &self.config.schema
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn indexing(&self) -> &QueryCache {
        &self.cache
    }

    pub fn primary_index(&self) -> &PrimaryIndex {
        &self.primary
    }

    pub fn stats(&self) -> RepositoryStats {
        self.stats.snapshot()
    }

    fn codec(&self) -> EntityCodec<'_> {
        EntityCodec::new(&self.config.schema)
    }

    // ---- Reads ----

    /// Read one entity. An empty hash means the entity does not exist.
    pub async fn find_by_id(&self, id: &EntityId) -> RepoResult<Option<Entity>> {
        let hash = self.store.hash_get_all(&self.layout.entity(id)).await?;
        if hash.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.codec().decode(id, &hash)?))
    }

    /// Every live entity, in primary index order (newest first).
    ///
    /// Indexed ids whose hash is gone are skipped and pruned from the index.
    pub async fn find_all(&self) -> RepoResult<Vec<Entity>> {
        let ids = self.primary.ids().await?;
        self.resolve_all(&ids).await
    }

    /// The entities with the given ids, in caller order. Missing ids are
    /// silently dropped (and pruned from the primary index).
    pub async fn find_all_by_id(&self, ids: &[EntityId]) -> RepoResult<Vec<Entity>> {
        self.resolve_all(ids).await
    }

    /// All entities matching `predicate`, memoized under `indexing_key`.
    ///
    /// The first call for a key scans the whole collection and caches the
    /// matching ids; later calls resolve the cached ids without scanning,
    /// even if matching entities were written in between.
    pub async fn find<P>(&self, indexing_key: &str, predicate: P) -> RepoResult<Vec<Entity>>
    where
        P: Fn(&Entity) -> bool + Send + Sync,
    {
        if let CacheLookup::Hit(entities) = self.cached_all(indexing_key).await? {
            return Ok(entities);
        }

        let guard = self.population_guard(indexing_key).await;
        if guard.is_some() {
            if let CacheLookup::Hit(entities) = self.cached_all(indexing_key).await? {
                return Ok(entities);
            }
        }

        self.stats.cache_miss();
        let matches = self.scan(&predicate, false).await?;
        let ids: Vec<EntityId> = matches.iter().filter_map(|e| e.id().cloned()).collect();
        self.populate(indexing_key, &ids).await?;
        debug!(
            repository = %self.name(),
            indexing_key,
            matches = ids.len(),
            "query cache populated"
        );
        Ok(matches)
    }

    /// The first entity matching `predicate`, memoized under `indexing_key`.
    ///
    /// A valid cache entry is answered from its first id only; a valid but
    /// empty entry yields `None`. On a miss, only a match is cached.
    pub async fn find_one<P>(&self, indexing_key: &str, predicate: P) -> RepoResult<Option<Entity>>
    where
        P: Fn(&Entity) -> bool + Send + Sync,
    {
        if let CacheLookup::Hit(found) = self.cached_first(indexing_key).await? {
            return Ok(found);
        }

        let guard = self.population_guard(indexing_key).await;
        if guard.is_some() {
            if let CacheLookup::Hit(found) = self.cached_first(indexing_key).await? {
                return Ok(found);
            }
        }

        self.stats.cache_miss();
        let found = self.scan(&predicate, true).await?.into_iter().next();
        if let Some(id) = found.as_ref().and_then(Entity::id) {
            self.populate(indexing_key, std::slice::from_ref(id)).await?;
        }
        Ok(found)
    }

    /// Cached entities of `indexing_key`, or `None` if the cache entry is not
    /// valid. Never scans.
    pub async fn find_by_indexing_key(&self, indexing_key: &str) -> RepoResult<Option<Vec<Entity>>> {
        Ok(match self.cached_all(indexing_key).await? {
            CacheLookup::Hit(entities) => Some(entities),
            CacheLookup::Miss => None,
        })
    }

    /// First cached entity of `indexing_key`, or `None` if the cache entry is
    /// not valid or empty. Never scans.
    pub async fn find_one_by_indexing_key(&self, indexing_key: &str) -> RepoResult<Option<Entity>> {
        Ok(match self.cached_first(indexing_key).await? {
            CacheLookup::Hit(found) => found,
            CacheLookup::Miss => None,
        })
    }

    /// Number of ids in the primary index. May overcount until stale ids
    /// are pruned by a read.
    pub async fn count(&self) -> RepoResult<u64> {
        Ok(self.primary.len().await?)
    }

    // ---- Writes ----

    /// Create or fully overwrite an entity, stamping its timestamps.
    pub async fn set(&self, entity: Entity) -> RepoResult<Entity> {
        self.set_with(entity, SetOptions::default()).await
    }

    /// Create or fully overwrite an entity.
    ///
    /// An id is minted if absent. Top-level `null` fields are dropped, so the
    /// returned entity matches what a later read yields. The entity is
    /// validated before anything is written; a violation aborts with no
    /// mutation. New ids are added to the
    /// primary index. Fields absent from `entity` are removed from the stored
    /// hash. Cached queries are left untouched.
    ///
    /// Unless `options.manual_timestamps` is set, `updatedAt` becomes now and
    /// `createdAt` becomes now for new entities and keeps its stored value
    /// for existing ones.
    pub async fn set_with(&self, mut entity: Entity, options: SetOptions) -> RepoResult<Entity> {
        let id = entity.ensure_id().clone();
        if KeyLayout::is_reserved_id(&id) {
            return Err(RepoError::ReservedId(id));
        }
        entity.remove_nulls();
        if let Err(err) = self.config.schema.check(entity.fields(), self.collection()) {
            error!(repository = %self.name(), id = %id, error = %err, "entity rejected by schema");
            return Err(err.into());
        }

        let key = self.layout.entity(&id);
        let existing = self.store.hash_get_all(&key).await?;
        let is_new = existing.is_empty();

        if !options.manual_timestamps {
            let now = Timestamp::now();
            let created_at = existing
                .get(Entity::CREATED_AT_FIELD)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(now);
            entity.set_timestamps(created_at, now);
        }
        let hash = self.codec().encode(&entity)?;

        if is_new {
            self.primary.add(&id).await?;
        }
        let stale: Vec<String> = existing
            .keys()
            .filter(|field| !hash.contains_key(*field))
            .cloned()
            .collect();
        if !stale.is_empty() {
            self.store.hash_delete_fields(&key, &stale).await?;
        }
        self.store.hash_set_fields(&key, &hash).await?;

        debug!(repository = %self.name(), id = %id, is_new, "entity written");
        Ok(entity)
    }

    /// `set` each entity in order. Not atomic: on failure at item k, items
    /// before k stay written and the error is returned.
    pub async fn set_many(&self, entities: Vec<Entity>) -> RepoResult<Vec<Entity>> {
        self.set_many_with(entities, SetOptions::default()).await
    }

    pub async fn set_many_with(
        &self,
        entities: Vec<Entity>,
        options: SetOptions,
    ) -> RepoResult<Vec<Entity>> {
        let mut written = Vec::with_capacity(entities.len());
        for entity in entities {
            written.push(self.set_with(entity, options).await?);
        }
        Ok(written)
    }

    /// Delete an entity. Returns `false` if it did not exist.
    ///
    /// Cached queries referencing the id stay as they are; the id is pruned
    /// from them when next read.
    pub async fn delete_by_id(&self, id: &EntityId) -> RepoResult<bool> {
        let key = self.layout.entity(id);
        let hash = self.store.hash_get_all(&key).await?;
        if hash.is_empty() {
            return Ok(false);
        }
        self.primary.remove(id).await?;
        let fields: Vec<String> = hash.into_keys().collect();
        self.store.hash_delete_fields(&key, &fields).await?;
        debug!(repository = %self.name(), id = %id, "entity deleted");
        Ok(true)
    }

    /// `delete_by_id` each id in order. Not atomic. Returns how many
    /// entities existed and were deleted.
    pub async fn delete_all_by_id(&self, ids: &[EntityId]) -> RepoResult<usize> {
        let mut deleted = 0;
        for id in ids {
            if self.delete_by_id(id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    // ---- Cache control ----

    /// Drop the cached result of `indexing_key`; the next query rescans.
    pub async fn invalidate(&self, indexing_key: &str) -> RepoResult<()> {
        Ok(self.cache.invalidate(indexing_key).await?)
    }

    /// Drop every cached result of this collection. Returns how many
    /// indexing keys were invalidated.
    pub async fn invalidate_all(&self) -> RepoResult<usize> {
        Ok(self.cache.invalidate_all().await?)
    }

    // ---- Internals ----

    async fn resolve_all(&self, ids: &[EntityId]) -> RepoResult<Vec<Entity>> {
        let mut entities = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.resolve_or_prune(id).await? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    async fn resolve_or_prune(&self, id: &EntityId) -> RepoResult<Option<Entity>> {
        let found = self.find_by_id(id).await?;
        if found.is_none() {
            self.prune_primary(id).await;
        }
        Ok(found)
    }

    async fn prune_primary(&self, id: &EntityId) {
        match self.primary.remove(id).await {
            Ok(0) => {}
            Ok(n) => {
                self.stats.pruned(n);
                debug!(repository = %self.name(), id = %id, "pruned stale id from primary index");
            }
            Err(err) => {
                warn!(repository = %self.name(), id = %id, error = %err, "failed to prune primary index");
            }
        }
    }

    async fn prune_cached(&self, indexing_key: &str, id: &EntityId) {
        match self.cache.remove_id(indexing_key, id).await {
            Ok(0) => {}
            Ok(n) => {
                self.stats.pruned(n);
                debug!(repository = %self.name(), indexing_key, id = %id, "pruned stale id from query cache");
            }
            Err(err) => {
                warn!(repository = %self.name(), indexing_key, id = %id, error = %err, "failed to prune query cache");
            }
        }
    }

    async fn cached_all(&self, indexing_key: &str) -> RepoResult<CacheLookup<Vec<Entity>>> {
        if !self.cache.get_query_state(indexing_key).await? {
            return Ok(CacheLookup::Miss);
        }
        self.stats.cache_hit();
        let ids = dedup_ids(self.cache.get_indexes(indexing_key).await?);
        let mut entities = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.find_by_id(id).await? {
                Some(entity) => entities.push(entity),
                None => {
                    self.prune_cached(indexing_key, id).await;
                    self.prune_primary(id).await;
                }
            }
        }
        Ok(CacheLookup::Hit(entities))
    }

    /// A cached first id that no longer resolves is pruned and the entry
    /// invalidated, so the caller falls through to a fresh scan.
    async fn cached_first(&self, indexing_key: &str) -> RepoResult<CacheLookup<Option<Entity>>> {
        if !self.cache.get_query_state(indexing_key).await? {
            return Ok(CacheLookup::Miss);
        }
        let Some(first) = self.cache.get_indexes(indexing_key).await?.into_iter().next() else {
            self.stats.cache_hit();
            return Ok(CacheLookup::Hit(None));
        };
        match self.find_by_id(&first).await? {
            Some(entity) => {
                self.stats.cache_hit();
                Ok(CacheLookup::Hit(Some(entity)))
            }
            None => {
                self.prune_cached(indexing_key, &first).await;
                self.prune_primary(&first).await;
                self.cache.invalidate(indexing_key).await?;
                Ok(CacheLookup::Miss)
            }
        }
    }

    async fn scan<P>(&self, predicate: &P, first_only: bool) -> RepoResult<Vec<Entity>>
    where
        P: Fn(&Entity) -> bool + Send + Sync,
    {
        self.stats.full_scan();
        let ids = self.primary.ids().await?;
        debug!(repository = %self.name(), candidates = ids.len(), "full scan");
        let mut matches = Vec::new();
        for id in &ids {
            let Some(entity) = self.resolve_or_prune(id).await? else {
                continue;
            };
            if predicate(&entity) {
                matches.push(entity);
                if first_only {
                    break;
                }
            }
        }
        Ok(matches)
    }

    async fn populate(&self, indexing_key: &str, ids: &[EntityId]) -> RepoResult<()> {
        self.cache.add_ids(indexing_key, ids).await?;
        self.cache.set_query_state(indexing_key, true).await?;
        self.cache.add_query_key(indexing_key).await?;
        Ok(())
    }

    /// Under strict population, hold the per-key lock for the rest of a
    /// cache miss. `None` otherwise.
    async fn population_guard(&self, indexing_key: &str) -> Option<PopulationGuard<'_>> {
        if !self.config.strict_population {
            return None;
        }
        let lock = {
            let mut locks = self
                .population_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(indexing_key.to_string()).or_default())
        };
        Some(PopulationGuard {
            locks: &self.population_locks,
            key: indexing_key.to_string(),
            guard: Some(lock.lock_owned().await),
        })
    }
}

type PopulationLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Held per-key population lock. On drop, the key's entry is removed from
/// the lock map once no other caller holds or awaits it.
struct PopulationGuard<'a> {
    locks: &'a PopulationLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PopulationGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

/// Keep the first occurrence of every id.
fn dedup_ids(ids: Vec<EntityId>) -> Vec<EntityId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rindex_schema::FieldType;
    use rindex_store::InMemoryKvStore;
    use serde_json::json;

    fn todos(store: Arc<InMemoryKvStore>) -> Repository {
        let schema = Schema::new()
            .required("desc", FieldType::String)
            .required("done", FieldType::Boolean);
        Repository::new(RepositoryConfig::new("todos", schema), store)
    }

    fn todo(desc: &str, done: bool) -> Entity {
        Entity::new().with_field("desc", desc).with_field("done", done)
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let ids = ["b", "a", "b", "c", "a"].map(EntityId::new).to_vec();
        assert_eq!(dedup_ids(ids), ["b", "a", "c"].map(EntityId::new).to_vec());
    }

    #[tokio::test]
    async fn set_assigns_id_and_stamps() {
        let repo = todos(Arc::new(InMemoryKvStore::new()));
        let saved = repo.set(todo("a", false)).await.unwrap();
        let id = saved.id().expect("id assigned");
        assert!(!saved.created_at().is_zero());
        assert_eq!(saved.created_at(), saved.updated_at());
        assert!(repo.find_by_id(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_keeps_created_at_and_drops_removed_fields() {
        let store = Arc::new(InMemoryKvStore::new());
        let repo = todos(store.clone());
        let first = repo
            .set_with(
                todo("a", false)
                    .with_id("t1")
                    .with_field("note", "temp")
                    .with_timestamps(Timestamp::from_millis(5), Timestamp::from_millis(5)),
                SetOptions::manual_timestamps(),
            )
            .await
            .unwrap();
        assert_eq!(first.created_at(), Timestamp::from_millis(5));

        let second = repo.set(todo("a", true).with_id("t1")).await.unwrap();
        assert_eq!(second.created_at(), Timestamp::from_millis(5));
        assert!(second.updated_at() > Timestamp::from_millis(5));

        let stored = repo.find_by_id(&EntityId::new("t1")).await.unwrap().unwrap();
        assert_eq!(stored.get("done"), Some(&json!(true)));
        assert!(stored.get("note").is_none());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reserved_ids_are_rejected_before_writing() {
        let store = Arc::new(InMemoryKvStore::new());
        let repo = todos(store.clone());
        let err = repo.set(todo("a", false).with_id("indexes")).await.unwrap_err();
        assert!(matches!(err, RepoError::ReservedId(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn empty_indexing_key_is_an_error() {
        let repo = todos(Arc::new(InMemoryKvStore::new()));
        let err = repo.find("", |_| true).await.unwrap_err();
        assert!(matches!(err, RepoError::EmptyIndexingKey));
    }

    #[tokio::test]
    async fn find_one_caches_only_matches() {
        let repo = todos(Arc::new(InMemoryKvStore::new()));
        repo.set(todo("a", false)).await.unwrap();

        assert!(repo.find_one("done", |e| e.get_bool("done") == Some(true)).await.unwrap().is_none());
        assert!(!repo.indexing().get_query_state("done").await.unwrap());

        let open = repo
            .find_one("open", |e| e.get_bool("done") == Some(false))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            repo.find_one_by_indexing_key("open").await.unwrap().unwrap().id(),
            open.id()
        );
        assert_eq!(repo.stats().full_scans, 2);
    }

    #[tokio::test]
    async fn find_one_on_valid_empty_entry_returns_none_without_scanning() {
        let repo = todos(Arc::new(InMemoryKvStore::new()));
        repo.set(todo("a", true)).await.unwrap();
        assert!(repo.find("open", |e| e.get_bool("done") == Some(false)).await.unwrap().is_empty());
        let scans = repo.stats().full_scans;

        let found = repo.find_one("open", |_| true).await.unwrap();
        assert!(found.is_none());
        assert_eq!(repo.stats().full_scans, scans);
    }

    #[tokio::test]
    async fn find_one_rescans_when_cached_id_is_gone() {
        let repo = todos(Arc::new(InMemoryKvStore::new()));
        let a = repo.set(todo("a", false)).await.unwrap();
        let b = repo.set(todo("b", false)).await.unwrap();
        let open = |e: &Entity| e.get_bool("done") == Some(false);

        let first = repo.find_one("open", open).await.unwrap().unwrap();
        repo.delete_by_id(first.id().unwrap()).await.unwrap();

        let second = repo.find_one("open", open).await.unwrap().unwrap();
        assert_ne!(second.id(), first.id());
        assert!([a.id(), b.id()].contains(&second.id()));
        assert_eq!(repo.stats().full_scans, 2);
    }

    #[tokio::test]
    async fn cached_find_deduplicates_ids() {
        let repo = todos(Arc::new(InMemoryKvStore::new()));
        let a = repo.set(todo("a", false)).await.unwrap();
        let id = a.id().unwrap().clone();
        repo.indexing()
            .add_ids("dup", &[id.clone(), id.clone()])
            .await
            .unwrap();
        repo.indexing().set_query_state("dup", true).await.unwrap();

        let found = repo.find("dup", |_| true).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), Some(&id));
    }

    #[tokio::test]
    async fn debug_format() {
        let repo = todos(Arc::new(InMemoryKvStore::new()));
        let debug = format!("{repo:?}");
        assert!(debug.contains("Repository"));
        assert!(debug.contains("todos"));
    }

    #[tokio::test]
    async fn strict_population_locks_are_released_after_use() {
        let store = Arc::new(InMemoryKvStore::new());
        let schema = todos(store.clone()).config().schema.clone();
        let repo = Repository::new(
            RepositoryConfig::new("todos", schema).with_strict_population(true),
            store,
        );
        repo.set(todo("a", false)).await.unwrap();

        for key in ["open", "done", "open"] {
            repo.find(key, |e| e.get_bool("done") == Some(false)).await.unwrap();
        }
        repo.find_one("first", |_| true).await.unwrap();
        assert!(repo.population_locks.lock().unwrap().is_empty());
    }
}
