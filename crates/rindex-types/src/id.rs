use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::temporal::Timestamp;

/// Opaque identifier of an entity within a collection.
///
/// Caller-supplied ids are taken verbatim. Generated ids are the hex BLAKE3
/// digest of the current wall-clock milliseconds followed by 8 random bytes,
/// so two ids minted in the same millisecond still differ with overwhelming
/// probability. Uniqueness is probabilistic, not guaranteed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh id from the current time and 8 random bytes.
    pub fn generate() -> Self {
        Self::generate_at(Timestamp::now())
    }

    /// Mint an id using an explicit time component.
    pub fn generate_at(at: Timestamp) -> Self {
        let mut salt = [0u8; 8];
        rand::Rng::fill(&mut rand::thread_rng(), &mut salt);
        let mut hasher = blake3::Hasher::new();
        hasher.update(at.as_millis().to_string().as_bytes());
        hasher.update(hex::encode(salt).as_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty id, which is treated as "no id".
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the id and return the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl FromStr for EntityId {
    type Err = TypeError;

    /// Parse a caller-supplied id. Empty or whitespace-bearing ids are
    /// rejected since they cannot be embedded in store keys.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(TypeError::InvalidId("empty id".into()));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidId(format!("id contains whitespace: {s:?}")));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
