// SPDX-License-Identifier: MIT

//! Model backend contract.
//!
//! Every provider takes one structured completion request and must answer
//! with a JSON value. The request carries the output schema; how a provider
//! forces the model to honor it is provider-specific (forced tool use,
//! `response_format`, `responseSchema`), but the returned value is always a
//! bare JSON object the executor validates against the node's contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::backend::tool::Tool;
use crate::error::ModelError;

/// One structured-output completion request.
#[derive(Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Identifier for the schema, usually the node id. Providers that name
    /// their response format use this.
    pub schema_name: String,
    /// JSON Schema the response object must satisfy.
    pub output_schema: Value,
    pub tools: Vec<Arc<dyn Tool>>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl std::fmt::Debug for CompletionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("prompt", &self.prompt)
            .field("schema_name", &self.schema_name)
            .field("output_schema", &self.output_schema)
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

/// Token counts reported by a provider, when available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

/// A provider response: the structured value plus optional usage accounting.
#[derive(Debug, Clone)]
pub struct Completion {
    pub value: Value,
    pub usage: Option<TokenUsage>,
}

/// Core trait for LLM provider implementations.
#[async_trait]
pub trait Model: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError>;
}
