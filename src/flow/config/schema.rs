// SPDX-License-Identifier: MIT

//! Structural schema validation: raw document in, [`WorkflowDefinition`] out.
//!
//! Fails fast with a path-qualified [`ConfigValidationError`] such as
//! `nodes[2].output_schema.fields[0].type: unknown type 'strng'`. Semantic
//! checks that need the whole definition (edge references, reachability,
//! placeholder resolution) live in [`crate::flow::validate`].

use std::collections::HashSet;

use crate::error::ConfigValidationError;
use crate::flow::condition;
use crate::flow::config::types::{
    RawDocument, RawEdge, RawFieldSchema, RawMemorySpec, RawNode, RawStateField,
};
use crate::flow::definition::{
    EdgeDefinition, Endpoint, FieldSchema, FlowMeta, MemorySpec, NodeDefinition, NodeKind,
    OnErrorPolicy, Route, StateField, StateSchema, WorkflowConfig, WorkflowDefinition,
    SUPPORTED_SCHEMA_VERSIONS,
};
use crate::flow::typesys::{parse_type, ObjectField, TypeDescriptor};

/// Validate the document structure and produce a definition.
///
/// The result is structurally sound but not yet cross-reference validated.
pub fn validate_schema(doc: &RawDocument) -> Result<WorkflowDefinition, ConfigValidationError> {
    let schema_version = required_str(doc.schema_version.as_deref(), "schema_version")?;
    if !SUPPORTED_SCHEMA_VERSIONS.contains(&schema_version) {
        return Err(ConfigValidationError::new(
            "schema_version",
            format!(
                "unrecognized schema version '{}' (supported: {})",
                schema_version,
                SUPPORTED_SCHEMA_VERSIONS.join(", ")
            ),
        ));
    }

    let raw_flow = doc
        .flow
        .as_ref()
        .ok_or_else(|| missing_section("flow"))?;
    let flow = FlowMeta {
        name: required_str(raw_flow.name.as_deref(), "flow.name")?.to_string(),
        description: raw_flow.description.clone(),
    };

    let raw_state = doc
        .state
        .as_ref()
        .ok_or_else(|| missing_section("state"))?;
    let state = build_state_schema(raw_state.fields.as_deref().unwrap_or_default())?;

    let raw_nodes = doc
        .nodes
        .as_ref()
        .ok_or_else(|| missing_section("nodes"))?;
    if raw_nodes.is_empty() {
        return Err(ConfigValidationError::new(
            "nodes",
            "at least one node is required",
        ));
    }

    let mut nodes = Vec::with_capacity(raw_nodes.len());
    let mut seen_ids = HashSet::new();
    for (i, raw) in raw_nodes.iter().enumerate() {
        let node = build_node(raw, i)?;
        if !seen_ids.insert(node.id.clone()) {
            return Err(ConfigValidationError::new(
                format!("nodes[{}].id", i),
                format!("duplicate node id '{}'", node.id),
            ));
        }
        nodes.push(node);
    }

    let raw_edges = doc
        .edges
        .as_ref()
        .ok_or_else(|| missing_section("edges"))?;
    if raw_edges.is_empty() {
        return Err(ConfigValidationError::new(
            "edges",
            "at least one edge is required",
        ));
    }
    let mut edges = Vec::with_capacity(raw_edges.len());
    for (i, raw) in raw_edges.iter().enumerate() {
        edges.push(build_edge(raw, i)?);
    }

    let config = match &doc.config {
        Some(raw) => WorkflowConfig {
            default_model: raw.default_model.clone(),
            retry_count: raw.retry_count,
            run_timeout_secs: raw.run_timeout_secs,
            node_timeout_secs: raw.node_timeout_secs,
            model_parameters: raw.model_parameters.clone(),
        },
        None => WorkflowConfig::default(),
    };

    Ok(WorkflowDefinition {
        schema_version: schema_version.to_string(),
        flow,
        state,
        nodes,
        edges,
        config,
    })
}

fn missing_section(name: &str) -> ConfigValidationError {
    ConfigValidationError::new(name, "required section is missing")
}

fn required_str<'a>(value: Option<&'a str>, path: &str) -> Result<&'a str, ConfigValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigValidationError::new(path, "required value is missing")),
    }
}

fn build_state_schema(fields: &[RawStateField]) -> Result<StateSchema, ConfigValidationError> {
    let mut out = Vec::with_capacity(fields.len());
    let mut seen = HashSet::new();
    for (i, raw) in fields.iter().enumerate() {
        let path = format!("state.fields[{}]", i);
        let name = required_str(raw.name.as_deref(), &format!("{}.name", path))?;
        if !seen.insert(name.to_string()) {
            return Err(ConfigValidationError::new(
                format!("{}.name", path),
                format!("duplicate state field '{}'", name),
            ));
        }
        let ty_str = required_str(raw.ty.as_deref(), &format!("{}.type", path))?;
        let ty = parse_type(ty_str)
            .map_err(|e| ConfigValidationError::new(format!("{}.type", path), e.to_string()))?;

        let required = raw.required.unwrap_or(false);
        if required && raw.default.is_some() {
            return Err(ConfigValidationError::new(
                format!("{}.default", path),
                format!("required field '{}' must not declare a default", name),
            ));
        }
        if let Some(default) = &raw.default {
            ty.validate_value(default).map_err(|detail| {
                ConfigValidationError::new(
                    format!("{}.default", path),
                    format!("default does not match declared type: {}", detail),
                )
            })?;
        }

        out.push(StateField {
            name: name.to_string(),
            ty,
            required,
            default: raw.default.clone(),
            description: raw.description.clone(),
        });
    }
    Ok(StateSchema { fields: out })
}

fn build_node(raw: &RawNode, index: usize) -> Result<NodeDefinition, ConfigValidationError> {
    let path = format!("nodes[{}]", index);
    let id = required_str(raw.id.as_deref(), &format!("{}.id", path))?;

    let kind = match raw.kind.as_deref() {
        None | Some("llm") => NodeKind::Llm,
        Some("code") => NodeKind::Code,
        Some(other) => {
            return Err(ConfigValidationError::new(
                format!("{}.kind", path),
                format!("unknown node kind '{}' (expected 'llm' or 'code')", other),
            ))
        }
    };

    let prompt = required_str(raw.prompt.as_deref(), &format!("{}.prompt", path))?;
    if kind == NodeKind::Code && raw.code.as_deref().map_or(true, |c| c.trim().is_empty()) {
        return Err(ConfigValidationError::new(
            format!("{}.code", path),
            "code nodes must declare a non-empty 'code' section",
        ));
    }

    let outputs = raw.outputs.clone().unwrap_or_default();
    for (i, name) in outputs.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(ConfigValidationError::new(
                format!("{}.outputs[{}]", path, i),
                "output names must be non-empty",
            ));
        }
    }

    let raw_schema = raw.output_schema.as_ref().ok_or_else(|| {
        ConfigValidationError::new(format!("{}.output_schema", path), "required value is missing")
    })?;
    let schema_fields = raw_schema.fields.as_deref().unwrap_or_default();
    if schema_fields.is_empty() {
        return Err(ConfigValidationError::new(
            format!("{}.output_schema.fields", path),
            "output schema must declare at least one field",
        ));
    }
    let output_schema = build_field_schemas(
        schema_fields,
        &format!("{}.output_schema.fields", path),
    )?;

    let on_error = parse_on_error(raw.on_error.as_deref(), &format!("{}.on_error", path))?;
    let memory = raw
        .memory
        .as_ref()
        .map(|m| build_memory(m, &format!("{}.memory", path)))
        .transpose()?;

    Ok(NodeDefinition {
        id: id.to_string(),
        kind,
        prompt: prompt.to_string(),
        code: raw.code.clone(),
        outputs,
        output_schema,
        tools: raw.tools.clone().unwrap_or_default(),
        model: raw.model.clone(),
        timeout_secs: raw.timeout_secs,
        on_error,
        memory,
    })
}

fn build_field_schemas(
    fields: &[RawFieldSchema],
    path: &str,
) -> Result<Vec<FieldSchema>, ConfigValidationError> {
    let mut out = Vec::with_capacity(fields.len());
    let mut seen = HashSet::new();
    for (i, raw) in fields.iter().enumerate() {
        let field_path = format!("{}[{}]", path, i);
        let name = required_str(raw.name.as_deref(), &format!("{}.name", field_path))?;
        if !seen.insert(name.to_string()) {
            return Err(ConfigValidationError::new(
                format!("{}.name", field_path),
                format!("duplicate field '{}'", name),
            ));
        }
        let ty = build_field_type(raw, &field_path)?;
        // Output fields are required unless explicitly relaxed.
        let required = raw.required.unwrap_or(true);
        if let Some(default) = &raw.default {
            ty.validate_value(default).map_err(|detail| {
                ConfigValidationError::new(
                    format!("{}.default", field_path),
                    format!("default does not match declared type: {}", detail),
                )
            })?;
        }
        out.push(FieldSchema {
            name: name.to_string(),
            ty,
            required,
            default: raw.default.clone(),
            description: raw.description.clone(),
        });
    }
    Ok(out)
}

/// Resolve a field's type: a plain type string, or an `object` with its own
/// nested field list.
fn build_field_type(
    raw: &RawFieldSchema,
    path: &str,
) -> Result<TypeDescriptor, ConfigValidationError> {
    match (&raw.ty, &raw.fields) {
        (Some(ty_str), None) => parse_type(ty_str)
            .map_err(|e| ConfigValidationError::new(format!("{}.type", path), e.to_string())),
        (ty, Some(nested)) => {
            if let Some(ty_str) = ty {
                if ty_str != "object" {
                    return Err(ConfigValidationError::new(
                        format!("{}.type", path),
                        format!("nested fields require type 'object', got '{}'", ty_str),
                    ));
                }
            }
            let nested_fields = build_field_schemas(nested, &format!("{}.fields", path))?;
            Ok(TypeDescriptor::Object(
                nested_fields
                    .into_iter()
                    .map(|f| ObjectField {
                        name: f.name,
                        ty: f.ty,
                        required: f.required,
                    })
                    .collect(),
            ))
        }
        (None, None) => Err(ConfigValidationError::new(
            format!("{}.type", path),
            "required value is missing",
        )),
    }
}

fn parse_on_error(
    raw: Option<&str>,
    path: &str,
) -> Result<OnErrorPolicy, ConfigValidationError> {
    match raw {
        None | Some("fail") => Ok(OnErrorPolicy::Fail),
        Some("continue") => Ok(OnErrorPolicy::Continue),
        Some(other) => Err(ConfigValidationError::new(
            path,
            format!(
                "unknown on_error policy '{}' (expected 'fail' or 'continue')",
                other
            ),
        )),
    }
}

fn build_memory(raw: &RawMemorySpec, path: &str) -> Result<MemorySpec, ConfigValidationError> {
    let key = required_str(raw.key.as_deref(), &format!("{}.key", path))?;
    let on_error = parse_on_error(raw.on_error.as_deref(), &format!("{}.on_error", path))?;
    Ok(MemorySpec {
        namespace: raw
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string()),
        key: key.to_string(),
        from: raw.from.clone(),
        on_error,
    })
}

fn build_edge(raw: &RawEdge, index: usize) -> Result<EdgeDefinition, ConfigValidationError> {
    let path = format!("edges[{}]", index);
    let from = Endpoint::parse(required_str(raw.from.as_deref(), &format!("{}.from", path))?);

    match raw.kind.as_deref() {
        None | Some("linear") => {
            let to = Endpoint::parse(required_str(raw.to.as_deref(), &format!("{}.to", path))?);
            Ok(EdgeDefinition::Linear { from, to })
        }
        Some("conditional") => {
            let raw_routes = raw.routes.as_deref().unwrap_or_default();
            if raw_routes.is_empty() {
                return Err(ConfigValidationError::new(
                    format!("{}.routes", path),
                    "conditional edges must declare at least one route",
                ));
            }
            let mut routes = Vec::with_capacity(raw_routes.len());
            for (i, route) in raw_routes.iter().enumerate() {
                let route_path = format!("{}.routes[{}]", path, i);
                let when_str =
                    required_str(route.when.as_deref(), &format!("{}.when", route_path))?;
                let when = condition::parse(when_str).map_err(|e| {
                    ConfigValidationError::new(format!("{}.when", route_path), e.to_string())
                })?;
                let to =
                    Endpoint::parse(required_str(route.to.as_deref(), &format!("{}.to", route_path))?);
                routes.push(Route { when, to });
            }
            Ok(EdgeDefinition::Conditional { from, routes })
        }
        Some("loop") => {
            let to = Endpoint::parse(required_str(raw.to.as_deref(), &format!("{}.to", path))?);
            let max_iterations = raw.max_iterations.ok_or_else(|| {
                ConfigValidationError::new(
                    format!("{}.max_iterations", path),
                    "loop edges must declare a bound",
                )
            })?;
            let break_str =
                required_str(raw.break_when.as_deref(), &format!("{}.break_when", path))?;
            let break_when = condition::parse(break_str).map_err(|e| {
                ConfigValidationError::new(format!("{}.break_when", path), e.to_string())
            })?;
            Ok(EdgeDefinition::Loop {
                from,
                to,
                max_iterations,
                break_when,
            })
        }
        Some("parallel") => {
            let raw_branches = raw.branches.as_deref().unwrap_or_default();
            if raw_branches.is_empty() {
                return Err(ConfigValidationError::new(
                    format!("{}.branches", path),
                    "parallel edges must declare at least one branch",
                ));
            }
            let branches = raw_branches.iter().map(|b| Endpoint::parse(b)).collect();
            Ok(EdgeDefinition::Parallel { from, branches })
        }
        Some(other) => Err(ConfigValidationError::new(
            format!("{}.kind", path),
            format!(
                "unknown edge kind '{}' (expected linear, conditional, loop or parallel)",
                other
            ),
        )),
    }
}
