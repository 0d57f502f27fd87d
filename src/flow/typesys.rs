// SPDX-License-Identifier: MIT

//! Dynamic type system for declarative type strings.
//!
//! Type strings like `list[string]` or `dict[string, integer]` are resolved
//! once, at validation time, into a closed [`TypeDescriptor`] tree. Everything
//! downstream (state model, output contracts, response validation) works on
//! descriptors, never on raw strings.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::InvalidTypeError;
use crate::flow::suggest::nearest_match;

/// Primitive kinds supported by the declarative schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    String,
    Integer,
    Float,
    Boolean,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Float => "float",
            Primitive::Boolean => "boolean",
        }
    }
}

/// Key kinds allowed for `dict[K,V]`. JSON object keys are strings on the
/// wire, so integer keys are accepted but serialized as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DictKey {
    String,
    Integer,
}

/// A named field of an `object` descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectField {
    pub name: String,
    pub ty: TypeDescriptor,
    pub required: bool,
}

/// Closed, recursively resolvable representation of a declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    List(Box<TypeDescriptor>),
    Dict {
        key: DictKey,
        value: Box<TypeDescriptor>,
    },
    /// An object with declared fields. An empty field list means the object
    /// shape is unconstrained (bare `object` in the document).
    Object(Vec<ObjectField>),
}

/// Keywords recognised at the head of a type string, used for suggestions.
const KNOWN_NAMES: &[&str] = &[
    "string", "integer", "float", "boolean", "list", "dict", "object",
];

/// Parse a declarative type string into a descriptor.
///
/// Pure function; unknown names fail with a near-miss suggestion when the
/// input is within edit distance 2 of a known keyword.
pub fn parse_type(input: &str) -> Result<TypeDescriptor, InvalidTypeError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(InvalidTypeError::Malformed {
            given: input.to_string(),
            detail: "empty type string".to_string(),
        });
    }

    match input {
        "string" | "str" => return Ok(TypeDescriptor::Primitive(Primitive::String)),
        "integer" | "int" => return Ok(TypeDescriptor::Primitive(Primitive::Integer)),
        "float" => return Ok(TypeDescriptor::Primitive(Primitive::Float)),
        "boolean" | "bool" => return Ok(TypeDescriptor::Primitive(Primitive::Boolean)),
        "object" => return Ok(TypeDescriptor::Object(Vec::new())),
        _ => {}
    }

    if let Some(inner) = parameterized(input, "list")? {
        let item = parse_type(inner).map_err(|e| nest(input, e))?;
        return Ok(TypeDescriptor::List(Box::new(item)));
    }

    if let Some(inner) = parameterized(input, "dict")? {
        let (key_str, value_str) = split_top_level(inner).ok_or_else(|| {
            InvalidTypeError::Malformed {
                given: input.to_string(),
                detail: "dict takes exactly two parameters: dict[K,V]".to_string(),
            }
        })?;
        let key = match parse_type(key_str.trim()).map_err(|e| nest(input, e))? {
            TypeDescriptor::Primitive(Primitive::String) => DictKey::String,
            TypeDescriptor::Primitive(Primitive::Integer) => DictKey::Integer,
            other => {
                return Err(InvalidTypeError::Malformed {
                    given: input.to_string(),
                    detail: format!(
                        "dict keys must be string or integer, got '{}'",
                        other.display_name()
                    ),
                })
            }
        };
        let value = parse_type(value_str.trim()).map_err(|e| nest(input, e))?;
        return Ok(TypeDescriptor::Dict {
            key,
            value: Box::new(value),
        });
    }

    // Unmatched bracket with an unknown head, e.g. "lst[string]".
    let head = input.split('[').next().unwrap_or(input).trim();
    match nearest_match(head, KNOWN_NAMES.iter().copied()) {
        Some(suggestion) => Err(InvalidTypeError::UnknownWithSuggestion {
            given: input.to_string(),
            suggestion,
        }),
        None => Err(InvalidTypeError::Unknown {
            given: input.to_string(),
        }),
    }
}

/// If `input` is `head[...]`, return the bracketed parameter text.
fn parameterized<'a>(input: &'a str, head: &str) -> Result<Option<&'a str>, InvalidTypeError> {
    let Some(rest) = input.strip_prefix(head) else {
        return Ok(None);
    };
    let rest = rest.trim_start();
    if !rest.starts_with('[') {
        return Ok(None);
    }
    if !rest.ends_with(']') {
        return Err(InvalidTypeError::Malformed {
            given: input.to_string(),
            detail: "missing closing ']'".to_string(),
        });
    }
    Ok(Some(&rest[1..rest.len() - 1]))
}

/// Split `K,V` at the first comma outside nested brackets.
fn split_top_level(input: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some((&input[..i], &input[i + 1..])),
            _ => {}
        }
    }
    None
}

/// Re-attribute an inner parse failure to the full type string.
fn nest(outer: &str, inner: InvalidTypeError) -> InvalidTypeError {
    InvalidTypeError::Malformed {
        given: outer.to_string(),
        detail: inner.to_string(),
    }
}

impl TypeDescriptor {
    /// Human-readable name used in error messages.
    pub fn display_name(&self) -> String {
        match self {
            TypeDescriptor::Primitive(p) => p.name().to_string(),
            TypeDescriptor::List(item) => format!("list[{}]", item.display_name()),
            TypeDescriptor::Dict { key, value } => {
                let key = match key {
                    DictKey::String => "string",
                    DictKey::Integer => "integer",
                };
                format!("dict[{}, {}]", key, value.display_name())
            }
            TypeDescriptor::Object(_) => "object".to_string(),
        }
    }

    /// Render the descriptor as a JSON Schema fragment. This is the mapping
    /// table from descriptors to the structured-output contract handed to
    /// model backends.
    pub fn json_schema(&self) -> Value {
        match self {
            TypeDescriptor::Primitive(Primitive::String) => json!({ "type": "string" }),
            TypeDescriptor::Primitive(Primitive::Integer) => json!({ "type": "integer" }),
            TypeDescriptor::Primitive(Primitive::Float) => json!({ "type": "number" }),
            TypeDescriptor::Primitive(Primitive::Boolean) => json!({ "type": "boolean" }),
            TypeDescriptor::List(item) => json!({
                "type": "array",
                "items": item.json_schema(),
            }),
            TypeDescriptor::Dict { value, .. } => json!({
                "type": "object",
                "additionalProperties": value.json_schema(),
            }),
            TypeDescriptor::Object(fields) => {
                if fields.is_empty() {
                    return json!({ "type": "object" });
                }
                let mut properties = Map::new();
                let mut required = Vec::new();
                for field in fields {
                    properties.insert(field.name.clone(), field.ty.json_schema());
                    if field.required {
                        required.push(Value::String(field.name.clone()));
                    }
                }
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": false,
                })
            }
        }
    }

    /// Strictly check a runtime value against this descriptor. No implicit
    /// widening: an integer field rejects `1.5`, a float field accepts `1`.
    pub fn validate_value(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (TypeDescriptor::Primitive(Primitive::String), Value::String(_)) => Ok(()),
            (TypeDescriptor::Primitive(Primitive::Boolean), Value::Bool(_)) => Ok(()),
            (TypeDescriptor::Primitive(Primitive::Integer), Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Ok(())
                } else {
                    Err(format!("expected integer, got non-integral number {}", n))
                }
            }
            (TypeDescriptor::Primitive(Primitive::Float), Value::Number(_)) => Ok(()),
            (TypeDescriptor::List(item), Value::Array(items)) => {
                for (i, element) in items.iter().enumerate() {
                    item.validate_value(element)
                        .map_err(|detail| format!("at index {}: {}", i, detail))?;
                }
                Ok(())
            }
            (TypeDescriptor::Dict { value: val_ty, .. }, Value::Object(entries)) => {
                for (key, entry) in entries {
                    val_ty
                        .validate_value(entry)
                        .map_err(|detail| format!("at key '{}': {}", key, detail))?;
                }
                Ok(())
            }
            (TypeDescriptor::Object(fields), Value::Object(entries)) => {
                for field in fields {
                    match entries.get(&field.name) {
                        Some(entry) => field
                            .ty
                            .validate_value(entry)
                            .map_err(|detail| format!("in field '{}': {}", field.name, detail))?,
                        None if field.required => {
                            return Err(format!("missing required field '{}'", field.name))
                        }
                        None => {}
                    }
                }
                if !fields.is_empty() {
                    for key in entries.keys() {
                        if !fields.iter().any(|f| &f.name == key) {
                            return Err(format!("unexpected field '{}'", key));
                        }
                    }
                }
                Ok(())
            }
            (expected, got) => Err(format!(
                "expected {}, got {}",
                expected.display_name(),
                json_kind(got)
            )),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
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

    #[test]
    fn test_parse_primitives() {
        assert_eq!(
            parse_type("string").unwrap(),
            TypeDescriptor::Primitive(Primitive::String)
        );
        assert_eq!(
            parse_type("integer").unwrap(),
            TypeDescriptor::Primitive(Primitive::Integer)
        );
        assert_eq!(
            parse_type("float").unwrap(),
            TypeDescriptor::Primitive(Primitive::Float)
        );
        assert_eq!(
            parse_type("boolean").unwrap(),
            TypeDescriptor::Primitive(Primitive::Boolean)
        );
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(parse_type("str").unwrap(), parse_type("string").unwrap());
        assert_eq!(parse_type("int").unwrap(), parse_type("integer").unwrap());
        assert_eq!(parse_type("bool").unwrap(), parse_type("boolean").unwrap());
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_type("list[string]").unwrap(),
            TypeDescriptor::List(Box::new(TypeDescriptor::Primitive(Primitive::String)))
        );
    }

    #[test]
    fn test_parse_nested_list() {
        let ty = parse_type("list[list[integer]]").unwrap();
        assert_eq!(ty.display_name(), "list[list[integer]]");
    }

    #[test]
    fn test_parse_dict() {
        let ty = parse_type("dict[string, float]").unwrap();
        assert_eq!(
            ty,
            TypeDescriptor::Dict {
                key: DictKey::String,
                value: Box::new(TypeDescriptor::Primitive(Primitive::Float)),
            }
        );
    }

    #[test]
    fn test_parse_dict_nested_value() {
        let ty = parse_type("dict[string, list[string]]").unwrap();
        assert_eq!(ty.display_name(), "dict[string, list[string]]");
    }

    #[test]
    fn test_parse_object() {
        assert_eq!(parse_type("object").unwrap(), TypeDescriptor::Object(vec![]));
    }

    #[test]
    fn test_unknown_type_with_suggestion() {
        let err = parse_type("strng").unwrap_err();
        match err {
            InvalidTypeError::UnknownWithSuggestion { given, suggestion } => {
                assert_eq!(given, "strng");
                assert_eq!(suggestion, "string");
            }
            other => panic!("expected suggestion, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_without_suggestion() {
        let err = parse_type("quaternion").unwrap_err();
        assert!(matches!(err, InvalidTypeError::Unknown { .. }));
    }

    #[test]
    fn test_dict_rejects_bad_key() {
        let err = parse_type("dict[float, string]").unwrap_err();
        assert!(err.to_string().contains("dict keys"));
    }

    #[test]
    fn test_dict_requires_two_params() {
        let err = parse_type("dict[string]").unwrap_err();
        assert!(err.to_string().contains("two parameters"));
    }

    #[test]
    fn test_missing_bracket() {
        let err = parse_type("list[string").unwrap_err();
        assert!(err.to_string().contains("']'"));
    }

    #[test]
    fn test_validate_integer_rejects_float() {
        let ty = parse_type("integer").unwrap();
        assert!(ty.validate_value(&json!(3)).is_ok());
        assert!(ty.validate_value(&json!(3.5)).is_err());
        assert!(ty.validate_value(&json!("3")).is_err());
    }

    #[test]
    fn test_validate_float_accepts_integral_number() {
        let ty = parse_type("float").unwrap();
        assert!(ty.validate_value(&json!(3)).is_ok());
        assert!(ty.validate_value(&json!(3.5)).is_ok());
    }

    #[test]
    fn test_validate_list_elements() {
        let ty = parse_type("list[string]").unwrap();
        assert!(ty.validate_value(&json!(["a", "b"])).is_ok());
        let err = ty.validate_value(&json!(["a", 1])).unwrap_err();
        assert!(err.contains("index 1"));
    }

    #[test]
    fn test_validate_object_fields() {
        let ty = TypeDescriptor::Object(vec![
            ObjectField {
                name: "title".to_string(),
                ty: TypeDescriptor::Primitive(Primitive::String),
                required: true,
            },
            ObjectField {
                name: "score".to_string(),
                ty: TypeDescriptor::Primitive(Primitive::Float),
                required: false,
            },
        ]);

        assert!(ty.validate_value(&json!({"title": "x"})).is_ok());
        assert!(ty.validate_value(&json!({"title": "x", "score": 0.5})).is_ok());
        assert!(ty.validate_value(&json!({"score": 0.5})).is_err());
        assert!(ty
            .validate_value(&json!({"title": "x", "extra": 1}))
            .is_err());
    }

    #[test]
    fn test_bare_object_accepts_any_shape() {
        let ty = parse_type("object").unwrap();
        assert!(ty.validate_value(&json!({"anything": [1, 2]})).is_ok());
        assert!(ty.validate_value(&json!("not an object")).is_err());
    }

    #[test]
    fn test_json_schema_rendering() {
        let ty = parse_type("list[integer]").unwrap();
        assert_eq!(
            ty.json_schema(),
            json!({"type": "array", "items": {"type": "integer"}})
        );

        let ty = parse_type("dict[string, boolean]").unwrap();
        assert_eq!(
            ty.json_schema(),
            json!({"type": "object", "additionalProperties": {"type": "boolean"}})
        );
    }
}
