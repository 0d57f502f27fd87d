// SPDX-License-Identifier: MIT

//! Anthropic provider - Claude Messages API.
//!
//! Structured output is enforced with forced tool use: the output schema is
//! registered as a single tool named `emit` and `tool_choice` pins the model
//! to it, so the response arrives as the tool call's input object.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;

use crate::backend::model::{Completion, CompletionRequest, Model, TokenUsage};
use crate::error::ModelError;

const PROVIDER: &str = "anthropic";
const EMIT_TOOL: &str = "emit";

pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl AnthropicModel {
    /// Requires `ANTHROPIC_API_KEY`; `ANTHROPIC_BASE_URL` overrides the
    /// endpoint for proxies and test servers.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| ModelError::ApiKeyMissing {
            provider: PROVIDER,
            env_var: "ANTHROPIC_API_KEY",
        })?;
        let base_url = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    fn build_body(&self, request: &CompletionRequest) -> Value {
        let mut tools = vec![json!({
            "name": EMIT_TOOL,
            "description": "Emit the structured result for this step.",
            "input_schema": request.output_schema,
        })];
        for tool in &request.tools {
            tools.push(json!({
                "name": tool.name(),
                "description": tool.description(),
                "input_schema": tool.schema(),
            }));
        }

        let mut body = json!({
            "model": self.model_name,
            "messages": [{
                "role": "user",
                "content": [{ "type": "text", "text": request.prompt }]
            }],
            "max_tokens": request.max_output_tokens.unwrap_or(4096),
            "tools": tools,
            "tool_choice": { "type": "tool", "name": EMIT_TOOL },
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        body
    }

    fn parse_response(response: &Value) -> Result<Completion, ModelError> {
        let blocks = response["content"]
            .as_array()
            .ok_or_else(|| ModelError::InvalidResponse {
                provider: PROVIDER,
                message: "no content blocks in response".to_string(),
            })?;

        let value = blocks
            .iter()
            .find(|b| b["type"] == "tool_use" && b["name"] == EMIT_TOOL)
            .map(|b| b["input"].clone())
            .ok_or_else(|| ModelError::InvalidResponse {
                provider: PROVIDER,
                message: format!("no '{}' tool call in response", EMIT_TOOL),
            })?;

        let usage = match (
            response["usage"]["input_tokens"].as_u64(),
            response["usage"]["output_tokens"].as_u64(),
        ) {
            (Some(input), Some(output)) => Some(TokenUsage { input, output }),
            _ => None,
        };

        Ok(Completion { value, usage })
    }
}

#[async_trait]
impl Model for AnthropicModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError> {
        let url = format!("{}/messages", self.base_url);
        let body = self.build_body(request);

        log::debug!(
            "anthropic request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let message = resp.text().await?;
            return Err(ModelError::Api {
                provider: PROVIDER,
                message,
            });
        }

        let resp_json: Value = resp.json().await?;
        log::debug!("anthropic response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}
