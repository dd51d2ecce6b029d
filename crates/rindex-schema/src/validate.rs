use std::fmt;

use rindex_types::Fields;
use serde_json::Value;

use crate::error::ValidationError;
use crate::schema::{FieldType, Schema};

/// A single schema violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path to the offending value, rooted at the collection name.
    pub path: String,
    pub kind: ViolationKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// A required field is absent or `null`.
    Missing,
    /// A value has the wrong JSON type.
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "{}: missing required field", self.path),
            ViolationKind::TypeMismatch { expected, found } => {
                write!(f, "{}: expected {expected}, found {found}", self.path)
            }
        }
    }
}

/// Check `fields` against `schema`, collecting every violation.
///
/// `root` prefixes every reported path. Returns an empty list when the
/// fields conform. Top-level managed fields are skipped.
pub fn validate(fields: &Fields, schema: &Schema, root: &str) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_object(fields, schema, root, true, &mut violations);
    violations
}

impl Schema {
    /// Validate `fields`, failing with every violation found.
    pub fn check(&self, fields: &Fields, root: &str) -> Result<(), ValidationError> {
        let violations = validate(fields, self, root);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                root: root.to_string(),
                violations,
            })
        }
    }
}

fn check_object(
    fields: &Fields,
    schema: &Schema,
    path: &str,
    top_level: bool,
    out: &mut Vec<Violation>,
) {
    for (name, spec) in schema.fields() {
        if top_level && crate::is_managed_field(name) {
            continue;
        }
        let field_path = format!("{path}.{name}");
        match fields.get(name) {
            None | Some(Value::Null) => {
                if spec.required {
                    out.push(Violation {
                        path: field_path,
                        kind: ViolationKind::Missing,
                    });
                }
            }
            Some(value) => check_value(value, &spec.field_type, &field_path, out),
        }
    }
}

fn check_value(value: &Value, expected: &FieldType, path: &str, out: &mut Vec<Violation>) {
    match (expected, value) {
        (FieldType::String, Value::String(_))
        | (FieldType::Number, Value::Number(_))
        | (FieldType::Boolean, Value::Bool(_)) => {}
        (FieldType::Object { fields }, Value::Object(map)) => {
            check_object(map, fields, path, false, out);
        }
        (FieldType::Array { items }, Value::Array(values)) => {
            for (i, item) in values.iter().enumerate() {
                check_value(item, items, &format!("{path}[{i}]"), out);
            }
        }
        _ => out.push(Violation {
            path: path.to_string(),
            kind: ViolationKind::TypeMismatch {
                expected: expected.name(),
                found: json_type_name(value),
            },
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fields must be an object"),
        }
    }

    fn todo_schema() -> Schema {
        Schema::new()
            .required("desc", FieldType::String)
            .required("done", FieldType::Boolean)
    }

    #[test]
    fn conforming_entity_passes() {
        let f = fields(json!({"desc": "a", "done": false}));
        assert!(validate(&f, &todo_schema(), "todos").is_empty());
        assert!(todo_schema().check(&f, "todos").is_ok());
    }

    #[test]
    fn extra_fields_are_allowed() {
        let f = fields(json!({"desc": "a", "done": true, "priority": 3}));
        assert!(validate(&f, &todo_schema(), "todos").is_empty());
    }

    #[test]
    fn missing_required_field() {
        let f = fields(json!({"desc": "a"}));
        let v = validate(&f, &todo_schema(), "todos");
        assert_eq!(
            v,
            vec![Violation {
                path: "todos.done".into(),
                kind: ViolationKind::Missing,
            }]
        );
    }

    #[test]
    fn null_counts_as_missing() {
        let f = fields(json!({"desc": null, "done": true}));
        let v = validate(&f, &todo_schema(), "todos");
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].kind, ViolationKind::Missing);
    }

    #[test]
    fn optional_field_may_be_absent_but_not_mistyped() {
        let schema = todo_schema().optional("due", FieldType::Number);
        let ok = fields(json!({"desc": "a", "done": true}));
        assert!(validate(&ok, &schema, "todos").is_empty());

        let bad = fields(json!({"desc": "a", "done": true, "due": "tomorrow"}));
        let v = validate(&bad, &schema, "todos");
        assert_eq!(v[0].to_string(), "todos.due: expected number, found string");
    }

    #[test]
    fn nested_paths_are_reported() {
        let schema = Schema::new()
            .required(
                "owner",
                FieldType::object(Schema::new().required("name", FieldType::String)),
            )
            .required("tags", FieldType::array(FieldType::String));
        let f = fields(json!({"owner": {"name": 7}, "tags": ["a", "b", 3]}));
        let paths: Vec<String> = validate(&f, &schema, "todos")
            .into_iter()
            .map(|v| v.path)
            .collect();
        assert_eq!(paths, vec!["todos.owner.name", "todos.tags[2]"]);
    }

    #[test]
    fn managed_fields_are_skipped_at_top_level() {
        let schema = todo_schema().required("createdAt", FieldType::Number);
        let f = fields(json!({"desc": "a", "done": false}));
        assert!(validate(&f, &schema, "todos").is_empty());
    }

    #[test]
    fn validation_error_lists_every_violation() {
        let f = fields(json!({"done": "no"}));
        let err = todo_schema().check(&f, "todos").unwrap_err();
        assert_eq!(err.violations.len(), 2);
        assert_eq!(
            err.to_string(),
            "invalid entity for 'todos': todos.desc: missing required field; \
             todos.done: expected boolean, found string"
        );
    }
}
