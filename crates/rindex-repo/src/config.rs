use rindex_schema::Schema;
use serde::{Deserialize, Serialize};

/// Configuration of one repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Name used in logs. Defaults to the collection name when empty.
    #[serde(default)]
    pub name: String,
    /// Collection name; prefixes every store key of the repository.
    pub collection: String,
    /// Schema every written entity must satisfy.
    #[serde(default)]
    pub schema: Schema,
    /// Serialize cache population per indexing key within this process.
    ///
    /// When set, concurrent cold queries on the same key scan once instead of
    /// racing and appending duplicate ids. Does not coordinate across
    /// processes.
    #[serde(default)]
    pub strict_population: bool,
}

impl RepositoryConfig {
    pub fn new(collection: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: String::new(),
            collection: collection.into(),
            schema,
            strict_population: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_strict_population(mut self, strict: bool) -> Self {
        self.strict_population = strict;
        self
    }

    /// The effective log name.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.collection
        } else {
            &self.name
        }
    }
}

/// Per-call options for [`Repository::set_with`](crate::Repository::set_with).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Keep the caller's `createdAt`/`updatedAt` instead of stamping them.
    pub manual_timestamps: bool,
}

impl SetOptions {
    pub fn manual_timestamps() -> Self {
        Self {
            manual_timestamps: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rindex_schema::FieldType;

    #[test]
    fn display_name_falls_back_to_collection() {
        let config = RepositoryConfig::new("todos", Schema::new());
        assert_eq!(config.display_name(), "todos");
        assert_eq!(config.with_name("Todo repo").display_name(), "Todo repo");
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: RepositoryConfig = serde_json::from_value(serde_json::json!({
            "collection": "todos",
            "schema": {"desc": {"type": "string", "required": true}}
        }))
        .unwrap();
        assert_eq!(config.collection, "todos");
        assert!(config.name.is_empty());
        assert!(!config.strict_population);
        assert_eq!(
            config.schema,
            Schema::new().required("desc", FieldType::String)
        );
    }

    #[test]
    fn default_set_options_stamp_automatically() {
        assert!(!SetOptions::default().manual_timestamps);
        assert!(SetOptions::manual_timestamps().manual_timestamps);
    }
}
