//! The [`Entity`] record: a field map with an id and creation/update stamps.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::id::EntityId;
use crate::temporal::Timestamp;

/// Free-form entity fields, excluding the id and the timestamps.
pub type Fields = serde_json::Map<String, Value>;

/// A uniquely identified structured record.
///
/// The id is `None` until the entity is first written; once assigned it is
/// never changed. Serializes flat, with `id`, `createdAt` and `updatedAt`
/// alongside the free-form fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<EntityId>,
    #[serde(default)]
    created_at: Timestamp,
    #[serde(default)]
    updated_at: Timestamp,
    #[serde(flatten)]
    fields: Fields,
}

impl Entity {
    /// Name of the id field in the flat representation.
    pub const ID_FIELD: &'static str = "id";
    /// Name of the creation stamp in the flat representation.
    pub const CREATED_AT_FIELD: &'static str = "createdAt";
    /// Name of the update stamp in the flat representation.
    pub const UPDATED_AT_FIELD: &'static str = "updatedAt";

    /// Create an empty entity without an id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity from a field map.
    pub fn from_fields(fields: Fields) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Builder: set the id.
    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder: set a field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Builder: set both timestamps.
    pub fn with_timestamps(mut self, created_at: Timestamp, updated_at: Timestamp) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Convert any serde model into an entity. `id`, `createdAt` and
    /// `updatedAt` keys of the model are lifted out of the field map.
    pub fn from_model<T: Serialize>(model: &T) -> Result<Self, TypeError> {
        let value =
            serde_json::to_value(model).map_err(|e| TypeError::Serialization(e.to_string()))?;
        if !value.is_object() {
            return Err(TypeError::Serialization(
                "model must serialize to a JSON object".into(),
            ));
        }
        serde_json::from_value(value).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Convert this entity into a serde model.
    pub fn to_model<T: DeserializeOwned>(&self) -> Result<T, TypeError> {
        let value =
            serde_json::to_value(self).map_err(|e| TypeError::Serialization(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// The id, if one has been assigned.
    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref().filter(|id| !id.is_empty())
    }

    /// Return the id, minting one first if the entity has none.
    pub fn ensure_id(&mut self) -> &EntityId {
        if self.id.as_ref().is_some_and(EntityId::is_empty) {
            self.id = None;
        }
        self.id.get_or_insert_with(EntityId::generate)
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Overwrite both timestamps.
    pub fn set_timestamps(&mut self, created_at: Timestamp, updated_at: Timestamp) {
        self.created_at = created_at;
        self.updated_at = updated_at;
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Look up a string field.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Look up a boolean field.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Insert or replace a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Drop every top-level field whose value is `null`. Returns how many
    /// were dropped.
    pub fn remove_nulls(&mut self) -> usize {
        let before = self.fields.len();
        self.fields.retain(|_, value| !value.is_null());
        before - self.fields.len()
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// Compare id and fields, ignoring the timestamps.
    pub fn same_content(&self, other: &Self) -> bool {
        self.id() == other.id() && self.fields == other.fields
    }
}
