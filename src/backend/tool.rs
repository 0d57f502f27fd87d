// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;

/// Trait for tools a workflow node may declare.
///
/// `name()` and `description()` return `&str` and `schema()` returns
/// `&Value` so implementations store these in struct fields instead of
/// allocating on every access.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within the registry.
    fn name(&self) -> &str;

    /// Human-readable description passed to the model.
    fn description(&self) -> &str;

    /// JSON schema for the tool's input parameters.
    fn schema(&self) -> &Value;

    /// Execute the tool with the given input and return the result.
    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}
