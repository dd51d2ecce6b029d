//! Conversion between [`Entity`] and the flat string hash kept in the store.
//!
//! Every entity field becomes one hash field. Fields the schema declares as
//! strings are stored raw; every other value is stored as JSON text so it can
//! be decoded unambiguously. Timestamps are stored as decimal milliseconds.
//! The id is never stored: it is part of the hash key.

use std::collections::BTreeMap;

use rindex_types::{Entity, EntityId, Fields, Timestamp};
use serde_json::Value;

use crate::error::{CodecError, CodecResult};
use crate::schema::{FieldType, Schema};

/// Flat field map as stored in a hash.
pub type FlatHash = BTreeMap<String, String>;

/// Schema-driven entity codec.
#[derive(Clone, Copy, Debug)]
pub struct EntityCodec<'a> {
    schema: &'a Schema,
}

impl<'a> EntityCodec<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Flatten an entity into hash fields. `null` fields are omitted.
    pub fn encode(&self, entity: &Entity) -> CodecResult<FlatHash> {
        let mut hash = FlatHash::new();
        for (name, value) in entity.fields() {
            if crate::is_managed_field(name) || value.is_null() {
                continue;
            }
            hash.insert(name.clone(), self.encode_value(name, value)?);
        }
        hash.insert(
            Entity::CREATED_AT_FIELD.to_string(),
            entity.created_at().to_string(),
        );
        hash.insert(
            Entity::UPDATED_AT_FIELD.to_string(),
            entity.updated_at().to_string(),
        );
        Ok(hash)
    }

    /// Rebuild an entity from hash fields and inject `id`.
    ///
    /// Missing timestamps decode as zero. Values of fields unknown to the
    /// schema are parsed as JSON when possible and kept as strings otherwise.
    pub fn decode(&self, id: &EntityId, hash: &FlatHash) -> CodecResult<Entity> {
        let created_at = decode_timestamp(hash, Entity::CREATED_AT_FIELD)?;
        let updated_at = decode_timestamp(hash, Entity::UPDATED_AT_FIELD)?;

        let mut fields = Fields::new();
        for (name, raw) in hash {
            if crate::is_managed_field(name) {
                continue;
            }
            fields.insert(name.clone(), self.decode_value(name, raw)?);
        }

        Ok(Entity::from_fields(fields)
            .with_id(id.clone())
            .with_timestamps(created_at, updated_at))
    }

    fn declared_string(&self, name: &str) -> bool {
        matches!(
            self.schema.field(name).map(|spec| &spec.field_type),
            Some(FieldType::String)
        )
    }

    fn encode_value(&self, name: &str, value: &Value) -> CodecResult<String> {
        match value {
            Value::String(s) if self.declared_string(name) => Ok(s.clone()),
            other => serde_json::to_string(other).map_err(|e| CodecError::Encode {
                field: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn decode_value(&self, name: &str, raw: &str) -> CodecResult<Value> {
        if self.declared_string(name) {
            return Ok(Value::String(raw.to_string()));
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Ok(value),
            Err(_) if self.schema.field(name).is_none() => Ok(Value::String(raw.to_string())),
            Err(e) => Err(CodecError::Malformed {
                field: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

fn decode_timestamp(hash: &FlatHash, field: &str) -> CodecResult<Timestamp> {
    match hash.get(field) {
        None => Ok(Timestamp::zero()),
        Some(raw) => raw.parse().map_err(|e: rindex_types::TypeError| CodecError::Timestamp {
            field: field.to_string(),
            reason: e.to_string(),
        }),
    }
}
