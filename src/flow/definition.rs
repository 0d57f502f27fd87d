// SPDX-License-Identifier: MIT

//! Validated in-memory form of a workflow document.
//!
//! Everything in this module is produced by the schema validator and is
//! immutable afterwards. Raw serde document types live in
//! [`crate::flow::config::types`].

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::flow::condition::Expression;
use crate::flow::typesys::TypeDescriptor;

/// Schema versions this runtime understands.
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["1"];

/// Sentinel id for the workflow entry edge endpoint.
pub const START: &str = "START";
/// Sentinel id for the workflow terminal edge endpoint.
pub const END: &str = "END";

/// Fully parsed workflow definition. Structural validation has passed when
/// one of these exists; cross-reference validation stamps it as executable.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub schema_version: String,
    pub flow: FlowMeta,
    pub state: StateSchema,
    pub nodes: Vec<NodeDefinition>,
    pub edges: Vec<EdgeDefinition>,
    pub config: WorkflowConfig,
}

impl WorkflowDefinition {
    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Flow metadata block.
#[derive(Debug, Clone)]
pub struct FlowMeta {
    pub name: String,
    pub description: Option<String>,
}

/// Ordered state field declarations. Field names are unique.
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    pub fields: Vec<StateField>,
}

impl StateSchema {
    pub fn field(&self, name: &str) -> Option<&StateField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct StateField {
    pub name: String,
    pub ty: TypeDescriptor,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

/// A field of a node's structured-output schema.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: String,
    pub ty: TypeDescriptor,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

/// What a node invokes for its real work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    /// Prompt-driven language model invocation (default).
    #[default]
    Llm,
    /// Code executed through the sandbox collaborator.
    Code,
}

/// Policy applied when a node fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnErrorPolicy {
    /// Abort the run (default).
    #[default]
    Fail,
    /// Record the failure, null the node's declared outputs and proceed.
    Continue,
}

/// Declared write to the memory collaborator after a node completes.
#[derive(Debug, Clone)]
pub struct MemorySpec {
    pub namespace: String,
    pub key: String,
    /// Output field to persist; the whole result object when absent.
    pub from: Option<String>,
    /// Whether a failed write aborts the node. Defaults to fire-and-forget.
    pub on_error: OnErrorPolicy,
}

#[derive(Debug, Clone)]
pub struct NodeDefinition {
    pub id: String,
    pub kind: NodeKind,
    pub prompt: String,
    /// Sandbox payload for [`NodeKind::Code`] nodes.
    pub code: Option<String>,
    /// Declared output names; a subset of `output_schema` field names.
    pub outputs: Vec<String>,
    pub output_schema: Vec<FieldSchema>,
    pub tools: Vec<String>,
    /// Per-node model override.
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub on_error: OnErrorPolicy,
    pub memory: Option<MemorySpec>,
}

/// Endpoint of an edge: a node id or one of the sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Start,
    End,
    Node(String),
}

impl Endpoint {
    pub fn parse(raw: &str) -> Endpoint {
        match raw {
            START => Endpoint::Start,
            END => Endpoint::End,
            other => Endpoint::Node(other.to_string()),
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match self {
            Endpoint::Node(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => write!(f, "{}", START),
            Endpoint::End => write!(f, "{}", END),
            Endpoint::Node(id) => write!(f, "{}", id),
        }
    }
}

/// A conditional route: taken when its expression evaluates true.
#[derive(Debug, Clone)]
pub struct Route {
    pub when: Expression,
    pub to: Endpoint,
}

/// Edge semantics as a tagged union.
///
/// The baseline runtime executes only `Linear`; the other variants are
/// reserved for conditional routing, bounded loops and parallel fan-out and
/// are rejected by the cross-reference validator with an explicit
/// `FeatureNotSupportedError` rather than being silently ignored.
#[derive(Debug, Clone)]
pub enum EdgeDefinition {
    Linear {
        from: Endpoint,
        to: Endpoint,
    },
    Conditional {
        from: Endpoint,
        routes: Vec<Route>,
    },
    Loop {
        from: Endpoint,
        to: Endpoint,
        max_iterations: u32,
        break_when: Expression,
    },
    Parallel {
        from: Endpoint,
        branches: Vec<Endpoint>,
    },
}

impl EdgeDefinition {
    pub fn from(&self) -> &Endpoint {
        match self {
            EdgeDefinition::Linear { from, .. }
            | EdgeDefinition::Conditional { from, .. }
            | EdgeDefinition::Loop { from, .. }
            | EdgeDefinition::Parallel { from, .. } => from,
        }
    }

    /// All endpoints this edge can lead to.
    pub fn targets(&self) -> Vec<&Endpoint> {
        match self {
            EdgeDefinition::Linear { to, .. } => vec![to],
            EdgeDefinition::Conditional { routes, .. } => routes.iter().map(|r| &r.to).collect(),
            EdgeDefinition::Loop { to, .. } => vec![to],
            EdgeDefinition::Parallel { branches, .. } => branches.iter().collect(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            EdgeDefinition::Linear { .. } => "linear",
            EdgeDefinition::Conditional { .. } => "conditional",
            EdgeDefinition::Loop { .. } => "loop",
            EdgeDefinition::Parallel { .. } => "parallel",
        }
    }
}

/// Global configuration block with per-run defaults.
#[derive(Debug, Clone, Default)]
pub struct WorkflowConfig {
    pub default_model: Option<String>,
    /// Structured-output retries per node before the node fails.
    pub retry_count: Option<u32>,
    pub run_timeout_secs: Option<u64>,
    pub node_timeout_secs: Option<u64>,
    /// Free-form provider parameters forwarded to backends.
    pub model_parameters: HashMap<String, Value>,
}
