// SPDX-License-Identifier: MIT

//! Raw serde types for the workflow document wire contract.
//!
//! Every field is optional here; presence and semantics are enforced by the
//! schema validator, which can then report precise field paths instead of
//! opaque deserialization errors. Unknown keys are ignored to keep schema
//! versions additive.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level workflow document, exactly as deserialized.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDocument {
    pub schema_version: Option<String>,
    pub flow: Option<RawFlow>,
    pub state: Option<RawState>,
    pub nodes: Option<Vec<RawNode>>,
    pub edges: Option<Vec<RawEdge>>,
    pub config: Option<RawConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawFlow {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawState {
    pub fields: Option<Vec<RawStateField>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawStateField {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub required: Option<bool>,
    pub default: Option<Value>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawNode {
    pub id: Option<String>,
    /// "llm" (default) or "code".
    pub kind: Option<String>,
    pub prompt: Option<String>,
    pub code: Option<String>,
    pub outputs: Option<Vec<String>>,
    pub output_schema: Option<RawOutputSchema>,
    pub tools: Option<Vec<String>>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub on_error: Option<String>,
    pub memory: Option<RawMemorySpec>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawOutputSchema {
    pub fields: Option<Vec<RawFieldSchema>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawFieldSchema {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub required: Option<bool>,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Nested field list for `object` types.
    pub fields: Option<Vec<RawFieldSchema>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawEdge {
    pub from: Option<String>,
    pub to: Option<String>,
    /// "linear" (default), "conditional", "loop" or "parallel".
    pub kind: Option<String>,
    pub routes: Option<Vec<RawRoute>>,
    pub max_iterations: Option<u32>,
    pub break_when: Option<String>,
    pub branches: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawRoute {
    pub when: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawMemorySpec {
    pub namespace: Option<String>,
    pub key: Option<String>,
    pub from: Option<String>,
    pub on_error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConfig {
    pub default_model: Option<String>,
    pub retry_count: Option<u32>,
    pub run_timeout_secs: Option<u64>,
    pub node_timeout_secs: Option<u64>,
    #[serde(default)]
    pub model_parameters: std::collections::HashMap<String, Value>,
}
