//! Entity schemas for rindex.
//!
//! A [`Schema`] names the fields an entity of a collection must carry and
//! their types. It drives two things:
//!
//! - [`validate`] -- structural check of an entity before it is written
//! - [`EntityCodec`] -- conversion between [`Entity`](rindex_types::Entity)
//!   and the flat string hash stored in the key-value store
//!
//! The managed fields `id`, `createdAt` and `updatedAt` are owned by the
//! repository and are never validated or encoded as ordinary fields.

pub mod codec;
pub mod error;
pub mod schema;
pub mod validate;

pub use codec::{EntityCodec, FlatHash};
pub use error::{CodecError, CodecResult, ValidationError};
pub use schema::{FieldSpec, FieldType, Schema};
pub use validate::{validate, Violation, ViolationKind};

/// Field names managed by the repository rather than by the schema.
pub const MANAGED_FIELDS: [&str; 3] = [
    rindex_types::Entity::ID_FIELD,
    rindex_types::Entity::CREATED_AT_FIELD,
    rindex_types::Entity::UPDATED_AT_FIELD,
];

/// Returns `true` if `name` is one of the repository-managed fields.
pub fn is_managed_field(name: &str) -> bool {
    MANAGED_FIELDS.contains(&name)
}
