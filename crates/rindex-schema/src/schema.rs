use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The declared type of a field.
///
/// Serialized internally tagged, so a schema reads naturally in JSON or TOML:
/// `{"type": "array", "items": {"type": "string"}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// A nested object with its own schema.
    Object { fields: Schema },
    /// A homogeneous array.
    Array { items: Box<FieldType> },
}

impl FieldType {
    /// Shorthand for an array of `items`.
    pub fn array(items: FieldType) -> Self {
        Self::Array {
            items: Box::new(items),
        }
    }

    /// Shorthand for a nested object.
    pub fn object(fields: Schema) -> Self {
        Self::Object { fields }
    }

    /// Human-readable type name used in violation messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object { .. } => "object",
            Self::Array { .. } => "array",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declaration of one schema field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(flatten)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
        }
    }

    pub fn optional(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
        }
    }
}

/// The set of fields an entity of a collection must carry.
///
/// Fields not named by the schema are allowed and stored as-is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, FieldSpec>,
}

impl Schema {
    /// An empty schema, which accepts any entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: declare a required field.
    pub fn required(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), FieldSpec::required(field_type));
        self
    }

    /// Builder: declare an optional field.
    pub fn optional(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), FieldSpec::optional(field_type));
        self
    }

    /// Look up a field declaration.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Iterate over declared fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
