// SPDX-License-Identifier: MIT

//! Single-node execution.
//!
//! The executor resolves the prompt, binds tools, invokes the model (or the
//! sandbox for code nodes) with the node's output contract and strictly
//! validates the response. A response that misses the contract is retried
//! with a clarifying addendum before the node fails with the offending
//! payload attached.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::memory::Memory;
use crate::backend::model::{Completion, CompletionRequest, Model};
use crate::backend::registry::ToolRegistry;
use crate::backend::sandbox::{ResourceLimits, Sandbox};
use crate::backend::tool::Tool;
use crate::error::{FlowError, NodeExecutionError};
use crate::flow::definition::{MemorySpec, NodeDefinition, NodeKind, OnErrorPolicy, WorkflowConfig};
use crate::flow::state::output::OutputType;
use crate::flow::state::{NodeResult, StateInstance};
use crate::flow::template;

const DEFAULT_RETRY_COUNT: u32 = 1;

pub struct NodeExecutor {
    registry: ToolRegistry,
    sandbox: Arc<dyn Sandbox>,
    memory: Arc<dyn Memory>,
}

impl NodeExecutor {
    pub fn new(
        registry: ToolRegistry,
        sandbox: Arc<dyn Sandbox>,
        memory: Arc<dyn Memory>,
    ) -> Self {
        Self {
            registry,
            sandbox,
            memory,
        }
    }

    /// Execute one node against the current state.
    ///
    /// `deadline` caps the whole node, including retries; `None` means the
    /// run imposes no limit on this node.
    pub async fn execute(
        &self,
        node: &NodeDefinition,
        model: &Arc<dyn Model>,
        inputs: &Map<String, Value>,
        state: &StateInstance,
        config: &WorkflowConfig,
        deadline: Option<Duration>,
    ) -> Result<NodeResult, FlowError> {
        let prompt = template::resolve(&node.prompt, inputs, &state.to_value())?;
        let tools = self.bind_tools(node).await?;
        let contract = OutputType::for_node(node);

        // Code nodes see the state snapshot with caller inputs overlaid.
        let mut scope = state.values().clone();
        for (key, value) in inputs {
            scope.insert(key.clone(), value.clone());
        }

        let work = self.invoke_with_retries(node, model, &tools, prompt, &contract, config, &scope);
        let outcome = match deadline {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                NodeExecutionError::Timeout {
                    node: node.id.clone(),
                    seconds: limit.as_secs(),
                }
            })?,
            None => work.await,
        };
        let (values, usage) = outcome?;

        let result = NodeResult {
            node_id: node.id.clone(),
            values,
            error: None,
            usage,
        };

        if let Some(spec) = &node.memory {
            self.write_memory(node, spec, &result).await?;
        }

        Ok(result)
    }

    async fn bind_tools(
        &self,
        node: &NodeDefinition,
    ) -> Result<Vec<Arc<dyn Tool>>, NodeExecutionError> {
        let mut tools = Vec::with_capacity(node.tools.len());
        for name in &node.tools {
            match self.registry.get(name).await {
                Some(tool) => tools.push(tool),
                None => {
                    let suggestion = self.registry.suggest(name).await;
                    return Err(NodeExecutionError::unknown_tool(
                        node.id.clone(),
                        name.clone(),
                        suggestion,
                    ));
                }
            }
        }
        Ok(tools)
    }

    async fn invoke_with_retries(
        &self,
        node: &NodeDefinition,
        model: &Arc<dyn Model>,
        tools: &[Arc<dyn Tool>],
        prompt: String,
        contract: &OutputType,
        config: &WorkflowConfig,
        scope: &Map<String, Value>,
    ) -> Result<(Map<String, Value>, Option<crate::backend::model::TokenUsage>), NodeExecutionError>
    {
        let retries = config.retry_count.unwrap_or(DEFAULT_RETRY_COUNT);
        let mut attempt_prompt = prompt;
        let mut last: Option<(String, Value)> = None;

        for attempt in 0..=retries {
            let completion = match node.kind {
                NodeKind::Llm => {
                    self.invoke_model(node, model, tools, &attempt_prompt, contract, config)
                        .await?
                }
                NodeKind::Code => self.invoke_sandbox(node, config, scope).await?,
            };

            match contract.validate(&completion.value) {
                Ok(values) => return Ok((values, completion.usage)),
                Err(detail) => {
                    log::warn!(
                        "node '{}': response rejected on attempt {}: {}",
                        node.id,
                        attempt + 1,
                        detail
                    );
                    // Retrying a deterministic code node would just re-run
                    // the same program.
                    if node.kind == NodeKind::Code {
                        return Err(NodeExecutionError::InvalidResponse {
                            node: node.id.clone(),
                            detail,
                            payload: completion.value,
                            expected: contract.json_schema().clone(),
                        });
                    }
                    attempt_prompt = format!(
                        "{}\n\nYour previous response was rejected: {}. \
                         Respond with a JSON object that exactly matches the required schema.",
                        attempt_prompt, detail
                    );
                    last = Some((detail, completion.value));
                }
            }
        }

        let (detail, payload) = last.expect("at least one attempt was made");
        Err(NodeExecutionError::InvalidResponse {
            node: node.id.clone(),
            detail,
            payload,
            expected: contract.json_schema().clone(),
        })
    }

    async fn invoke_model(
        &self,
        node: &NodeDefinition,
        model: &Arc<dyn Model>,
        tools: &[Arc<dyn Tool>],
        prompt: &str,
        contract: &OutputType,
        config: &WorkflowConfig,
    ) -> Result<Completion, NodeExecutionError> {
        let request = CompletionRequest {
            prompt: prompt.to_string(),
            schema_name: node.id.clone(),
            output_schema: contract.json_schema().clone(),
            tools: tools.to_vec(),
            temperature: parameter_f32(config, "temperature"),
            max_output_tokens: parameter_u32(config, "max_output_tokens"),
        };

        model
            .complete(&request)
            .await
            .map_err(|source| NodeExecutionError::Backend {
                node: node.id.clone(),
                source,
            })
    }

    async fn invoke_sandbox(
        &self,
        node: &NodeDefinition,
        config: &WorkflowConfig,
        scope: &Map<String, Value>,
    ) -> Result<Completion, NodeExecutionError> {
        // Schema validation guarantees code nodes carry code.
        let code = node.code.as_deref().unwrap_or_default();
        let limits = match node.timeout_secs.or(config.node_timeout_secs) {
            Some(seconds) => ResourceLimits {
                wall_clock_secs: seconds,
            },
            None => ResourceLimits::default(),
        };

        let outcome = self
            .sandbox
            .execute(code, scope, limits)
            .await
            .map_err(|source| NodeExecutionError::Sandbox {
                node: node.id.clone(),
                source,
            })?;

        if !outcome.stderr.is_empty() {
            log::debug!("node '{}' sandbox stderr: {}", node.id, outcome.stderr);
        }

        Ok(Completion {
            value: outcome.result,
            usage: None,
        })
    }

    async fn write_memory(
        &self,
        node: &NodeDefinition,
        spec: &MemorySpec,
        result: &NodeResult,
    ) -> Result<(), NodeExecutionError> {
        let value = match &spec.from {
            Some(field) => result.values.get(field).cloned().unwrap_or(Value::Null),
            None => Value::Object(result.values.clone()),
        };

        match self.memory.write(&spec.namespace, &spec.key, value).await {
            Ok(()) => Ok(()),
            Err(err) if spec.on_error == OnErrorPolicy::Fail => {
                Err(NodeExecutionError::MemoryWrite {
                    node: node.id.clone(),
                    message: err.to_string(),
                })
            }
            Err(err) => {
                log::warn!("node '{}': memory write failed: {}", node.id, err);
                Ok(())
            }
        }
    }
}

fn parameter_f32(config: &WorkflowConfig, key: &str) -> Option<f32> {
    config
        .model_parameters
        .get(key)
        .and_then(Value::as_f64)
        .map(|v| v as f32)
}

fn parameter_u32(config: &WorkflowConfig, key: &str) -> Option<u32> {
    config
        .model_parameters
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as u32)
}
