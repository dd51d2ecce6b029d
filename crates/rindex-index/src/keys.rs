use rindex_types::EntityId;

/// Store key layout of one collection.
///
/// | Key                         | Type | Contents                        |
/// |-----------------------------|------|---------------------------------|
/// | `{collection}:{id}`         | hash | entity fields                   |
/// | `{collection}:indexes`      | list | primary index, newest first     |
/// | `{collection}:query:{key}`  | list | cached ids for an indexing key  |
/// | `{collection}:query-state`  | hash | indexing key -> `"1"` / `"0"`   |
/// | `{collection}:query-keys`   | set  | every indexing key ever cached  |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    collection: String,
}

impl KeyLayout {
    const PRIMARY: &'static str = "indexes";
    const QUERY_PREFIX: &'static str = "query:";
    const QUERY_STATE: &'static str = "query-state";
    const QUERY_KEYS: &'static str = "query-keys";

    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn entity(&self, id: &EntityId) -> String {
        format!("{}:{}", self.collection, id)
    }

    pub fn primary_index(&self) -> String {
        format!("{}:{}", self.collection, Self::PRIMARY)
    }

    pub fn query_ids(&self, indexing_key: &str) -> String {
        format!("{}:{}{}", self.collection, Self::QUERY_PREFIX, indexing_key)
    }

    pub fn query_state(&self) -> String {
        format!("{}:{}", self.collection, Self::QUERY_STATE)
    }

    pub fn query_keys(&self) -> String {
        format!("{}:{}", self.collection, Self::QUERY_KEYS)
    }

    /// Returns `true` if an entity with this id would land on one of the
    /// collection's bookkeeping keys.
    pub fn is_reserved_id(id: &EntityId) -> bool {
        let id = id.as_str();
        id == Self::PRIMARY
            || id == Self::QUERY_STATE
            || id == Self::QUERY_KEYS
            || id.starts_with(Self::QUERY_PREFIX)
    }
}
