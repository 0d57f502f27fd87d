// SPDX-License-Identifier: MIT

//! Gemini provider - generateContent API.
//!
//! Structured output uses `generationConfig.responseSchema` with a JSON
//! mime type; the candidate text is the result object serialized as a
//! string. Gemini's schema dialect has no `additionalProperties`, so that
//! key is stripped before sending.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;

use crate::backend::model::{Completion, CompletionRequest, Model, TokenUsage};
use crate::error::ModelError;

const PROVIDER: &str = "gemini";

pub struct GeminiModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl GeminiModel {
    /// Requires `GEMINI_API_KEY`; `GEMINI_BASE_URL` overrides the endpoint.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| ModelError::ApiKeyMissing {
            provider: PROVIDER,
            env_var: "GEMINI_API_KEY",
        })?;
        let base_url = env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    fn build_body(&self, request: &CompletionRequest) -> Value {
        let mut generation_config = json!({
            "responseMimeType": "application/json",
            "responseSchema": strip_unsupported_keys(&request.output_schema),
        });
        if let Some(temperature) = request.temperature {
            generation_config["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_output_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }

        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }],
            "generationConfig": generation_config,
        });

        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": strip_unsupported_keys(t.schema()),
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        body
    }

    fn parse_response(response: &Value) -> Result<Completion, ModelError> {
        let text = response["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .and_then(|c| c["content"]["parts"].as_array())
            .and_then(|parts| parts.iter().find_map(|p| p["text"].as_str()))
            .ok_or_else(|| ModelError::InvalidResponse {
                provider: PROVIDER,
                message: "no text part in candidate".to_string(),
            })?;

        let value: Value =
            serde_json::from_str(text).map_err(|err| ModelError::InvalidResponse {
                provider: PROVIDER,
                message: format!("candidate text is not valid JSON: {}", err),
            })?;

        let usage = match (
            response["usageMetadata"]["promptTokenCount"].as_u64(),
            response["usageMetadata"]["candidatesTokenCount"].as_u64(),
        ) {
            (Some(input), Some(output)) => Some(TokenUsage { input, output }),
            _ => None,
        };

        Ok(Completion { value, usage })
    }
}

/// Remove JSON Schema keys Gemini rejects, recursively.
fn strip_unsupported_keys(schema: &Value) -> Value {
    match schema {
        Value::Object(entries) => {
            let filtered = entries
                .iter()
                .filter(|(key, _)| key.as_str() != "additionalProperties")
                .map(|(key, value)| (key.clone(), strip_unsupported_keys(value)))
                .collect();
            Value::Object(filtered)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(strip_unsupported_keys).collect())
        }
        other => other.clone(),
    }
}

#[async_trait]
impl Model for GeminiModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model_name, self.api_key
        );
        let body = self.build_body(request);

        log::debug!(
            "gemini request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
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
        log::debug!("gemini response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}
