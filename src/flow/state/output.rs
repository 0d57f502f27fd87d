// SPDX-License-Identifier: MIT

//! Per-node structured-output contracts.
//!
//! An [`OutputType`] describes the exact shape a backend must return for one
//! node. It is rendered as JSON Schema for the request and used to strictly
//! validate the response afterwards; a response that fails validation is a
//! node execution failure, never a silent coercion.

use serde_json::{json, Map, Value};

use crate::flow::definition::{FieldSchema, NodeDefinition};

#[derive(Debug, Clone)]
pub struct OutputType {
    node_id: String,
    fields: Vec<FieldSchema>,
    schema: Value,
}

impl OutputType {
    /// Pure, deterministic mapping from a node's declared output schema.
    pub fn build(output_schema: &[FieldSchema], node_id: &str) -> OutputType {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in output_schema {
            let mut fragment = field.ty.json_schema();
            if let (Value::Object(obj), Some(description)) =
                (&mut fragment, &field.description)
            {
                obj.insert("description".to_string(), json!(description));
            }
            properties.insert(field.name.clone(), fragment);
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }

        let schema = json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        });

        OutputType {
            node_id: node_id.to_string(),
            fields: output_schema.to_vec(),
            schema,
        }
    }

    pub fn for_node(node: &NodeDefinition) -> OutputType {
        Self::build(&node.output_schema, &node.id)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// The JSON Schema handed to the backend as its response contract.
    pub fn json_schema(&self) -> &Value {
        &self.schema
    }

    /// Strictly validate a raw backend response.
    ///
    /// Returns the response fields with declared defaults filled in for
    /// absent optional fields. Missing required fields, unknown fields and
    /// type mismatches are all errors.
    pub fn validate(&self, raw: &Value) -> Result<Map<String, Value>, String> {
        let Value::Object(entries) = raw else {
            return Err(format!("expected a JSON object, got {}", raw));
        };

        let mut out = Map::new();
        for field in &self.fields {
            match entries.get(&field.name) {
                Some(value) => {
                    field
                        .ty
                        .validate_value(value)
                        .map_err(|detail| format!("field '{}': {}", field.name, detail))?;
                    out.insert(field.name.clone(), value.clone());
                }
                None if field.required => {
                    return Err(format!("missing required field '{}'", field.name));
                }
                None => {
                    if let Some(default) = &field.default {
                        out.insert(field.name.clone(), default.clone());
                    }
                }
            }
        }

        for key in entries.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                return Err(format!("unexpected field '{}'", key));
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::typesys::parse_type;
    use serde_json::json;

    fn field(name: &str, ty: &str, required: bool, default: Option<Value>) -> FieldSchema {
        FieldSchema {
            name: name.to_string(),
            ty: parse_type(ty).unwrap(),
            required,
            default,
            description: None,
        }
    }

    fn output_type() -> OutputType {
        OutputType::build(
            &[
                field("summary", "string", true, None),
                field("confidence", "float", false, Some(json!(0.5))),
            ],
            "analyze",
        )
    }

    #[test]
    fn test_json_schema_shape() {
        let ty = output_type();
        let schema = ty.json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["summary"]["type"], "string");
        assert_eq!(schema["required"], json!(["summary"]));
        assert_eq!(schema["additionalProperties"], json!(false));
    }

    #[test]
    fn test_validate_accepts_conforming_response() {
        let out = output_type()
            .validate(&json!({"summary": "ok", "confidence": 0.9}))
            .unwrap();
        assert_eq!(out["summary"], json!("ok"));
        assert_eq!(out["confidence"], json!(0.9));
    }

    #[test]
    fn test_validate_fills_optional_default() {
        let out = output_type().validate(&json!({"summary": "ok"})).unwrap();
        assert_eq!(out["confidence"], json!(0.5));
    }

    #[test]
    fn test_validate_rejects_missing_required() {
        let err = output_type().validate(&json!({"confidence": 0.9})).unwrap_err();
        assert!(err.contains("missing required field 'summary'"));
    }

    #[test]
    fn test_validate_rejects_unknown_field() {
        let err = output_type()
            .validate(&json!({"summary": "ok", "extra": true}))
            .unwrap_err();
        assert!(err.contains("unexpected field 'extra'"));
    }

    #[test]
    fn test_validate_rejects_type_mismatch() {
        let err = output_type().validate(&json!({"summary": 42})).unwrap_err();
        assert!(err.contains("field 'summary'"));
    }

    #[test]
    fn test_validate_rejects_non_object() {
        let err = output_type().validate(&json!("just a string")).unwrap_err();
        assert!(err.contains("expected a JSON object"));
    }
}
