#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rindex_repo::{Entity, FieldType, Repository, RepositoryConfig, Schema};
use rindex_store::{HashFields, InMemoryKvStore, KeyValueStore, StoreError, StoreResult};

/// In-memory store that can inject failures and yield between operations.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryKvStore,
    fail_writes_to: Mutex<Option<String>>,
    fail_reads: AtomicBool,
    yield_between_ops: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write touching a key that contains `fragment`.
    pub fn fail_writes_to(&self, fragment: &str) {
        *self.fail_writes_to.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Yield to the scheduler before each operation so concurrent callers
    /// interleave between round-trips.
    pub fn yield_between_ops(&self, enabled: bool) {
        self.yield_between_ops.store(enabled, Ordering::SeqCst);
    }

    async fn before_write(&self, key: &str) -> StoreResult<()> {
        self.pause().await;
        let fragment = self.fail_writes_to.lock().unwrap().clone();
        match fragment {
            Some(f) if key.contains(&f) => Err(StoreError::Backend("connection reset".into())),
            _ => Ok(()),
        }
    }

    async fn before_read(&self) -> StoreResult<()> {
        self.pause().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        Ok(())
    }

    async fn pause(&self) {
        if self.yield_between_ops.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn hash_set_field(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        self.before_write(key).await?;
        self.inner.hash_set_field(key, field, value).await
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashFields> {
        self.before_read().await?;
        self.inner.hash_get_all(key).await
    }

    async fn hash_delete_fields(&self, key: &str, fields: &[String]) -> StoreResult<u64> {
        self.before_write(key).await?;
        self.inner.hash_delete_fields(key, fields).await
    }

    async fn list_push_left(&self, key: &str, value: &str) -> StoreResult<u64> {
        self.before_write(key).await?;
        self.inner.list_push_left(key, value).await
    }

    async fn list_push_right(&self, key: &str, value: &str) -> StoreResult<u64> {
        self.before_write(key).await?;
        self.inner.list_push_right(key, value).await
    }

    async fn list_remove_value(&self, key: &str, count: i64, value: &str) -> StoreResult<u64> {
        self.before_write(key).await?;
        self.inner.list_remove_value(key, count, value).await
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        self.before_read().await?;
        self.inner.list_range(key, start, stop).await
    }

    async fn list_length(&self, key: &str) -> StoreResult<u64> {
        self.before_read().await?;
        self.inner.list_length(key).await
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.before_write(key).await?;
        self.inner.set_add(key, member).await
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        self.before_read().await?;
        self.inner.set_members(key).await
    }

    async fn delete_key(&self, key: &str) -> StoreResult<bool> {
        self.before_write(key).await?;
        self.inner.delete_key(key).await
    }
}

pub fn todo_schema() -> Schema {
    Schema::new()
        .required("desc", FieldType::String)
        .required("done", FieldType::Boolean)
}

pub fn todo(desc: &str, done: bool) -> Entity {
    Entity::new().with_field("desc", desc).with_field("done", done)
}

pub fn is_open(entity: &Entity) -> bool {
    entity.get_bool("done") == Some(false)
}

pub fn todos_on(store: Arc<dyn KeyValueStore>) -> Repository {
    Repository::new(RepositoryConfig::new("todos", todo_schema()), store)
}

pub fn todos() -> (Arc<InMemoryKvStore>, Repository) {
    let store = Arc::new(InMemoryKvStore::new());
    let repo = todos_on(store.clone());
    (store, repo)
}
