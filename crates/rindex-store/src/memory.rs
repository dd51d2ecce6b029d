use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::traits::{HashFields, KeyValueStore};

/// A value held under one key.
#[derive(Clone, Debug, PartialEq, Eq)]
enum StoredValue {
    Hash(HashFields),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
}

impl StoredValue {
    fn is_empty(&self) -> bool {
        match self {
            Self::Hash(h) => h.is_empty(),
            Self::List(l) => l.is_empty(),
            Self::Set(s) => s.is_empty(),
        }
    }
}

/// In-memory, HashMap-based key-value store.
///
/// Intended for tests and embedding. All keys live behind a `RwLock`;
/// every trait call takes the lock once, so each call is atomic on its own.
pub struct InMemoryKvStore {
    keys: RwLock<HashMap<String, StoredValue>>,
}

impl InMemoryKvStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.keys.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return a sorted list of all keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .keys
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Remove all keys.
    pub fn clear(&self) {
        if let Ok(mut map) = self.keys.write() {
            map.clear();
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, StoredValue>>> {
        self.keys
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, StoredValue>>> {
        self.keys
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }

    /// Run `f` against the list at `key`, creating it if absent, and drop the
    /// key if the list ends up empty.
    fn with_list<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut VecDeque<String>) -> T,
    ) -> StoreResult<T> {
        let mut map = self.write()?;
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| StoredValue::List(VecDeque::new()));
        let StoredValue::List(list) = &mut *entry else {
            return Err(StoreError::wrong_type(key, "list"));
        };
        let out = f(list);
        if entry.is_empty() {
            map.remove(key);
        }
        Ok(out)
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a Redis-style inclusive range against a list of `len` elements.
fn normalize_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn hash_set_field(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        let mut map = self.write()?;
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| StoredValue::Hash(HashFields::new()));
        let StoredValue::Hash(hash) = entry else {
            return Err(StoreError::wrong_type(key, "hash"));
        };
        Ok(hash.insert(field.to_string(), value.to_string()).is_none())
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashFields> {
        match self.read()?.get(key) {
            None => Ok(HashFields::new()),
            Some(StoredValue::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(StoreError::wrong_type(key, "hash")),
        }
    }

    async fn hash_delete_fields(&self, key: &str, fields: &[String]) -> StoreResult<u64> {
        let mut map = self.write()?;
        let removed = match map.get_mut(key) {
            None => return Ok(0),
            Some(StoredValue::Hash(hash)) => {
                fields.iter().filter(|f| hash.remove(*f).is_some()).count() as u64
            }
            Some(_) => return Err(StoreError::wrong_type(key, "hash")),
        };
        if map.get(key).is_some_and(StoredValue::is_empty) {
            map.remove(key);
        }
        Ok(removed)
    }

    async fn list_push_left(&self, key: &str, value: &str) -> StoreResult<u64> {
        self.with_list(key, |list| {
            list.push_front(value.to_string());
            list.len() as u64
        })
    }

    async fn list_push_right(&self, key: &str, value: &str) -> StoreResult<u64> {
        self.with_list(key, |list| {
            list.push_back(value.to_string());
            list.len() as u64
        })
    }

    async fn list_remove_value(&self, key: &str, count: i64, value: &str) -> StoreResult<u64> {
        if !self.read()?.contains_key(key) {
            return Ok(0);
        }
        self.with_list(key, |list| {
            let limit = if count == 0 {
                usize::MAX
            } else {
                count.unsigned_abs() as usize
            };
            let mut removed = 0usize;
            if count >= 0 {
                let mut i = 0;
                while i < list.len() && removed < limit {
                    if list[i] == value {
                        list.remove(i);
                        removed += 1;
                    } else {
                        i += 1;
                    }
                }
            } else {
                let mut i = list.len();
                while i > 0 && removed < limit {
                    i -= 1;
                    if list[i] == value {
                        list.remove(i);
                        removed += 1;
                    }
                }
            }
            removed as u64
        })
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        match self.read()?.get(key) {
            None => Ok(Vec::new()),
            Some(StoredValue::List(list)) => Ok(normalize_range(list.len(), start, stop)
                .map(|(s, e)| list.range(s..=e).cloned().collect())
                .unwrap_or_default()),
            Some(_) => Err(StoreError::wrong_type(key, "list")),
        }
    }

    async fn list_length(&self, key: &str) -> StoreResult<u64> {
        match self.read()?.get(key) {
            None => Ok(0),
            Some(StoredValue::List(list)) => Ok(list.len() as u64),
            Some(_) => Err(StoreError::wrong_type(key, "list")),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut map = self.write()?;
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| StoredValue::Set(BTreeSet::new()));
        let StoredValue::Set(set) = entry else {
            return Err(StoreError::wrong_type(key, "set"));
        };
        Ok(set.insert(member.to_string()))
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        match self.read()?.get(key) {
            None => Ok(Vec::new()),
            Some(StoredValue::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(StoreError::wrong_type(key, "set")),
        }
    }

    async fn delete_key(&self, key: &str) -> StoreResult<bool> {
        Ok(self.write()?.remove(key).is_some())
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKvStore")
            .field("key_count", &self.len())
            .finish()
    }
}
