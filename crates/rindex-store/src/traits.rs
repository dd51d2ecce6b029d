use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Field map of a single hash key.
pub type HashFields = BTreeMap<String, String>;

/// Schemaless key-value store with hash, list and set primitives.
///
/// All implementations must follow Redis semantics:
/// - Reading an absent key yields an empty hash/list/set.
/// - Removing the last element of a container removes the key.
/// - List indexes are zero-based, inclusive, and negative indexes count from
///   the tail (`-1` is the last element).
/// - Touching a key as the wrong container type fails with `WrongType`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Set one field of a hash. Returns `true` if the field was new.
    async fn hash_set_field(&self, key: &str, field: &str, value: &str) -> StoreResult<bool>;

    /// Read every field of a hash. Absent keys yield an empty map.
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashFields>;

    /// Delete fields of a hash. Returns the number of fields removed.
    async fn hash_delete_fields(&self, key: &str, fields: &[String]) -> StoreResult<u64>;

    /// Prepend a value to a list. Returns the new list length.
    async fn list_push_left(&self, key: &str, value: &str) -> StoreResult<u64>;

    /// Append a value to a list. Returns the new list length.
    async fn list_push_right(&self, key: &str, value: &str) -> StoreResult<u64>;

    /// Remove occurrences of `value` from a list.
    ///
    /// `count > 0` removes up to `count` matches from the head, `count < 0`
    /// up to `|count|` matches from the tail, `count == 0` removes all.
    /// Returns the number of elements removed.
    async fn list_remove_value(&self, key: &str, count: i64, value: &str) -> StoreResult<u64>;

    /// Read the inclusive range `[start, stop]` of a list.
    async fn list_range(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>>;

    /// Length of a list. Absent keys have length zero.
    async fn list_length(&self, key: &str) -> StoreResult<u64>;

    /// Add a member to a set. Returns `true` if it was not already present.
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// All members of a set, in lexicographic order.
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Delete a key of any type. Returns `true` if it existed.
    async fn delete_key(&self, key: &str) -> StoreResult<bool>;

    /// Set several hash fields.
    ///
    /// Default implementation calls `hash_set_field()` for each field.
    /// Backends may override to use a single round-trip.
    async fn hash_set_fields(&self, key: &str, fields: &HashFields) -> StoreResult<()> {
        for (field, value) in fields {
            self.hash_set_field(key, field, value).await?;
        }
        Ok(())
    }
}
