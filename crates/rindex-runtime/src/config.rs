use std::collections::BTreeSet;
use std::path::Path;

use rindex_repo::RepositoryConfig;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::{RuntimeError, RuntimeResult};

/// Top-level runtime configuration, usually read from a TOML file:
///
/// ```toml
/// name = "todo-service"
/// log_level = "debug"
///
/// [[collections]]
/// collection = "todos"
/// strict_population = true
///
/// [collections.schema]
/// desc = { type = "string", required = true }
/// done = { type = "boolean", required = true }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub collections: Vec<RepositoryConfig>,
}

fn default_name() -> String {
    "rindex".into()
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            collections: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> RuntimeResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    pub fn with_collection(mut self, collection: RepositoryConfig) -> Self {
        self.collections.push(collection);
        self
    }

    /// The configured log level.
    pub fn level(&self) -> RuntimeResult<Level> {
        self.log_level
            .parse()
            .map_err(|_| RuntimeError::Config(format!("unknown log level '{}'", self.log_level)))
    }

    /// Collection names must be non-empty and repository names unique.
    pub fn validate(&self) -> RuntimeResult<()> {
        self.level()?;
        let mut seen = BTreeSet::new();
        for collection in &self.collections {
            if collection.collection.trim().is_empty() {
                return Err(RuntimeError::Config("collection name must not be empty".into()));
            }
            if !seen.insert(collection.display_name()) {
                return Err(RuntimeError::DuplicateCollection(
                    collection.display_name().to_string(),
                ));
            }
        }
        Ok(())
    }
}
