// SPDX-License-Identifier: MIT

//! OpenAI provider - Chat Completions API.
//!
//! Structured output uses `response_format` with a strict JSON schema, so
//! the message content is the result object serialized as a string.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;

use crate::backend::model::{Completion, CompletionRequest, Model, TokenUsage};
use crate::error::ModelError;

const PROVIDER: &str = "openai";

pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAIModel {
    /// Requires `OPENAI_API_KEY`; `OPENAI_BASE_URL` overrides the endpoint.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| ModelError::ApiKeyMissing {
            provider: PROVIDER,
            env_var: "OPENAI_API_KEY",
        })?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    fn build_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model_name,
            "messages": [{ "role": "user", "content": request.prompt }],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "strict": true,
                    "schema": request.output_schema,
                }
            },
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name(),
                            "description": t.description(),
                            "parameters": t.schema(),
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_output_tokens {
            body["max_completion_tokens"] = json!(max_tokens);
        }

        body
    }

    fn parse_response(response: &Value) -> Result<Completion, ModelError> {
        let content = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .and_then(|c| c["message"]["content"].as_str())
            .ok_or_else(|| ModelError::InvalidResponse {
                provider: PROVIDER,
                message: "no message content in response".to_string(),
            })?;

        let value: Value =
            serde_json::from_str(content).map_err(|err| ModelError::InvalidResponse {
                provider: PROVIDER,
                message: format!("message content is not valid JSON: {}", err),
            })?;

        let usage = match (
            response["usage"]["prompt_tokens"].as_u64(),
            response["usage"]["completion_tokens"].as_u64(),
        ) {
            (Some(input), Some(output)) => Some(TokenUsage { input, output }),
            _ => None,
        };

        Ok(Completion { value, usage })
    }
}

#[async_trait]
impl Model for OpenAIModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(request);

        log::debug!(
            "openai request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
        log::debug!("openai response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}
