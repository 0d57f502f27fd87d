// SPDX-License-Identifier: MIT

//! Typed error hierarchy for weft-rs.
//!
//! Every error surfaced to a caller carries the offending location (node id
//! or field path), a human-readable explanation and, where a typo is likely,
//! a nearest-match suggestion.

use serde_json::Value;
use thiserror::Error;

/// Top-level error type for the workflow core.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Load(#[from] ConfigLoadError),

    #[error(transparent)]
    Validation(#[from] ConfigValidationError),

    #[error(transparent)]
    Unsupported(#[from] FeatureNotSupportedError),

    #[error(transparent)]
    Template(#[from] TemplateResolutionError),

    #[error(transparent)]
    Node(#[from] NodeExecutionError),

    #[error(transparent)]
    Execution(#[from] WorkflowExecutionError),
}

impl FlowError {
    /// True for errors raised before any backend call is made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FlowError::Load(_) | FlowError::Validation(_) | FlowError::Unsupported(_)
        )
    }

    /// Process exit code for the CLI: 2 for validation failures, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_validation() {
            2
        } else {
            1
        }
    }
}

/// Malformed serialization in the workflow document itself.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("cannot read workflow file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {format} at line {line}, column {column}: {message}")]
    Syntax {
        format: &'static str,
        line: usize,
        column: usize,
        message: String,
    },

    /// Some serializer errors carry no position information.
    #[error("malformed {format}: {message}")]
    SyntaxUnlocated { format: &'static str, message: String },
}

/// Structural or cross-reference validation failure.
///
/// `path` pinpoints the offending location in the document, e.g.
/// `nodes[2].output_schema.fields[0].type`.
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("{path}: {rule}")]
    Rule { path: String, rule: String },

    #[error("{path}: {rule} (did you mean '{suggestion}'?)")]
    RuleWithSuggestion {
        path: String,
        rule: String,
        suggestion: String,
    },
}

impl ConfigValidationError {
    pub fn new(path: impl Into<String>, rule: impl Into<String>) -> Self {
        Self::Rule {
            path: path.into(),
            rule: rule.into(),
        }
    }

    /// Attach a suggestion when one was found, fall back to a plain rule.
    pub fn suggesting(
        path: impl Into<String>,
        rule: impl Into<String>,
        suggestion: Option<String>,
    ) -> Self {
        match suggestion {
            Some(suggestion) => Self::RuleWithSuggestion {
                path: path.into(),
                rule: rule.into(),
                suggestion,
            },
            None => Self::new(path, rule),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Rule { path, .. } | Self::RuleWithSuggestion { path, .. } => path,
        }
    }
}

/// A type string that does not resolve to a known descriptor.
#[derive(Debug, Error)]
pub enum InvalidTypeError {
    #[error("unknown type '{given}'")]
    Unknown { given: String },

    #[error("unknown type '{given}' (did you mean '{suggestion}'?)")]
    UnknownWithSuggestion { given: String, suggestion: String },

    #[error("malformed type '{given}': {detail}")]
    Malformed { given: String, detail: String },
}

impl InvalidTypeError {
    pub fn given(&self) -> &str {
        match self {
            Self::Unknown { given }
            | Self::UnknownWithSuggestion { given, .. }
            | Self::Malformed { given, .. } => given,
        }
    }
}

/// A declared construct the current runtime does not implement.
///
/// Raised during validation, never silently ignored, so a gated definition
/// incurs zero backend cost.
#[derive(Debug, Error)]
#[error("{location}: feature not supported: {feature}")]
pub struct FeatureNotSupportedError {
    pub feature: String,
    pub location: String,
}

impl FeatureNotSupportedError {
    pub fn new(feature: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            location: location.into(),
        }
    }
}

/// A prompt placeholder that resolves to neither inputs nor state.
#[derive(Debug, Error)]
pub enum TemplateResolutionError {
    #[error("unresolved placeholder '{name}'")]
    Unresolved { name: String },

    #[error("unresolved placeholder '{name}' (did you mean '{suggestion}'?)")]
    UnresolvedWithSuggestion { name: String, suggestion: String },

    #[error("unclosed placeholder starting at offset {offset}")]
    Unclosed { offset: usize },

    #[error("empty placeholder at offset {offset}")]
    Empty { offset: usize },
}

impl TemplateResolutionError {
    pub fn unresolved(name: impl Into<String>, suggestion: Option<String>) -> Self {
        let name = name.into();
        match suggestion {
            Some(suggestion) => Self::UnresolvedWithSuggestion { name, suggestion },
            None => Self::Unresolved { name },
        }
    }
}

/// Failure while executing a single node, with node context attached.
#[derive(Debug, Error)]
pub enum NodeExecutionError {
    #[error("node '{node}': unknown tool '{tool}'")]
    UnknownTool { node: String, tool: String },

    #[error("node '{node}': unknown tool '{tool}' (did you mean '{suggestion}'?)")]
    UnknownToolWithSuggestion {
        node: String,
        tool: String,
        suggestion: String,
    },

    #[error("node '{node}': backend call failed: {source}")]
    Backend {
        node: String,
        #[source]
        source: ModelError,
    },

    #[error("node '{node}': sandbox execution failed: {source}")]
    Sandbox {
        node: String,
        #[source]
        source: SandboxError,
    },

    #[error("node '{node}': timeout after {seconds}s")]
    Timeout { node: String, seconds: u64 },

    #[error("node '{node}': response does not satisfy output schema: {detail}")]
    InvalidResponse {
        node: String,
        detail: String,
        /// The payload that failed validation, kept for diagnostics.
        payload: Value,
        /// The schema the backend was asked to satisfy.
        expected: Value,
    },

    #[error("node '{node}': memory write failed: {message}")]
    MemoryWrite { node: String, message: String },
}

impl NodeExecutionError {
    /// Attach a suggestion when a near-miss was found, fall back to the
    /// plain variant.
    pub fn unknown_tool(node: String, tool: String, suggestion: Option<String>) -> Self {
        match suggestion {
            Some(suggestion) => Self::UnknownToolWithSuggestion {
                node,
                tool,
                suggestion,
            },
            None => Self::UnknownTool { node, tool },
        }
    }

    pub fn node(&self) -> &str {
        match self {
            Self::UnknownTool { node, .. }
            | Self::UnknownToolWithSuggestion { node, .. }
            | Self::Backend { node, .. }
            | Self::Sandbox { node, .. }
            | Self::Timeout { node, .. }
            | Self::InvalidResponse { node, .. }
            | Self::MemoryWrite { node, .. } => node,
        }
    }
}

/// Top-level run failure surfaced to the caller.
#[derive(Debug, Error)]
pub enum WorkflowExecutionError {
    #[error("required field not provided: '{field}'")]
    MissingInput { field: String },

    #[error("input '{field}' does not match its declared type: {detail}")]
    InputType { field: String, detail: String },

    #[error("run timeout after {seconds}s")]
    RunTimeout { seconds: u64 },

    #[error("run failed while executing node '{node}': {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: Box<NodeExecutionError>,
    },
}

/// Errors from a model backend collaborator.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API key not configured for provider {provider} ({env_var} must be set)")]
    ApiKeyMissing {
        provider: &'static str,
        env_var: &'static str,
    },

    #[error("unknown model provider: {0}")]
    UnknownProvider(String),

    #[error("{provider} API error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    #[error("invalid response from {provider}: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors from a tool collaborator.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{tool}' failed: {message}")]
    Failed { tool: String, message: String },
}

/// Errors from the sandbox executor collaborator.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to start sandbox interpreter '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sandbox exceeded wall-clock limit of {seconds}s")]
    Timeout { seconds: u64 },

    #[error("sandbox exited with status {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },

    #[error("sandbox produced no parseable JSON result: {detail}")]
    InvalidResult { detail: String },
}

/// Errors from the memory collaborator.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory backend error: {0}")]
    Backend(String),
}

/// Errors from the observability collaborator. Always non-fatal to a run.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("trace sink error: {0}")]
    Sink(String),
}
