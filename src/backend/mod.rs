// SPDX-License-Identifier: MIT

//! Backend collaborators: model providers, tools, sandbox, memory, traces.
//!
//! Provider implementations live in their own submodules:
//! - [anthropic] - Anthropic's Claude API (forced tool use)
//! - [openai] - OpenAI's Chat Completions API (`response_format`)
//! - [gemini] - Google's Gemini API (`responseSchema`)

pub mod anthropic;
pub mod gemini;
pub mod memory;
pub mod model;
pub mod openai;
pub mod registry;
pub mod sandbox;
pub mod tool;
pub mod trace;

use std::env;
use std::sync::Arc;

use crate::error::ModelError;
use anthropic::AnthropicModel;
use gemini::GeminiModel;
use model::Model;
use openai::OpenAIModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
    Gemini,
}

/// Pick a provider for a model name. `MODEL_PROVIDER` overrides the
/// name-based inference (`anthropic`, `openai` or `gemini`).
pub fn infer_provider(model_name: &str) -> Result<Provider, ModelError> {
    if let Ok(forced) = env::var("MODEL_PROVIDER") {
        return match forced.to_lowercase().as_str() {
            "anthropic" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAI),
            "gemini" => Ok(Provider::Gemini),
            other => Err(ModelError::UnknownProvider(other.to_string())),
        };
    }

    if model_name.starts_with("gpt") || model_name.starts_with("o1") {
        Ok(Provider::OpenAI)
    } else if model_name.starts_with("claude") {
        Ok(Provider::Anthropic)
    } else {
        Ok(Provider::Gemini)
    }
}

/// Instantiate the provider-backed model for a model name.
pub fn create_model(model_name: &str) -> Result<Arc<dyn Model>, ModelError> {
    let model: Arc<dyn Model> = match infer_provider(model_name)? {
        Provider::Anthropic => Arc::new(AnthropicModel::new(model_name.to_string())?),
        Provider::OpenAI => Arc::new(OpenAIModel::new(model_name.to_string())?),
        Provider::Gemini => Arc::new(GeminiModel::new(model_name.to_string())?),
    };
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    // MODEL_PROVIDER is process-global; these tests only cover the
    // name-based path and assume it is unset in the test environment.

    #[test]
    fn test_infer_openai_models() {
        assert_eq!(infer_provider("gpt-4o").unwrap(), Provider::OpenAI);
        assert_eq!(infer_provider("o1-mini").unwrap(), Provider::OpenAI);
    }

    #[test]
    fn test_infer_anthropic_models() {
        assert_eq!(
            infer_provider("claude-sonnet-4-20250514").unwrap(),
            Provider::Anthropic
        );
    }

    #[test]
    fn test_unknown_names_default_to_gemini() {
        assert_eq!(
            infer_provider("gemini-2.0-flash").unwrap(),
            Provider::Gemini
        );
        assert_eq!(infer_provider("some-custom-model").unwrap(), Provider::Gemini);
    }
}
