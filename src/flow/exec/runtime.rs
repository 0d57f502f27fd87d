// SPDX-License-Identifier: MIT

//! Workflow runtime.
//!
//! Drives a validated definition through the stage machine
//! `Loaded -> SchemaValidated -> ReferenceValidated -> GraphBuilt ->
//! Executing(node) -> Completed | Failed` and walks the execution graph
//! node by node, committing each result to a fresh state snapshot.

use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::backend::memory::{InMemoryStore, Memory};
use crate::backend::model::Model;
use crate::backend::registry::ToolRegistry;
use crate::backend::sandbox::{ProcessSandbox, Sandbox};
use crate::backend::trace::{LogTraceSink, NodeStatus, TraceRecord, TraceSink};
use crate::backend::create_model;
use crate::error::{FlowError, WorkflowExecutionError};
use crate::flow::config;
use crate::flow::definition::{Endpoint, NodeDefinition, OnErrorPolicy, WorkflowDefinition};
use crate::flow::exec::node::NodeExecutor;
use crate::flow::graph::ExecutionGraph;
use crate::flow::state::{NodeResult, StateInstance, StateType};
use crate::flow::validate::validate_references;

const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Where a run currently stands. Mostly useful for logging and diagnostics;
/// the runtime never exposes a partially executed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStage {
    Loaded,
    SchemaValidated,
    ReferenceValidated,
    GraphBuilt,
    Executing(String),
    Completed,
    Failed(String),
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub final_state: StateInstance,
    pub node_results: Vec<NodeResult>,
}

/// Reusable workflow runtime with injectable collaborators.
///
/// Defaults: provider-backed models inferred from node model names, an empty
/// tool registry, the process sandbox, the in-process memory store and the
/// logging trace sink. Tests inject a scripted model via [`with_model`].
///
/// [`with_model`]: Runtime::with_model
pub struct Runtime {
    model_override: Option<Arc<dyn Model>>,
    registry: ToolRegistry,
    sandbox: Arc<dyn Sandbox>,
    memory: Arc<dyn Memory>,
    trace: Arc<dyn TraceSink>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            model_override: None,
            registry: ToolRegistry::new(),
            sandbox: Arc::new(ProcessSandbox::default()),
            memory: Arc::new(InMemoryStore::new()),
            trace: Arc::new(LogTraceSink),
        }
    }

    /// Use one model for every node instead of per-node provider lookup.
    pub fn with_model(mut self, model: Arc<dyn Model>) -> Self {
        self.model_override = Some(model);
        self
    }

    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_sandbox(mut self, sandbox: Arc<dyn Sandbox>) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    /// Load, validate and run a workflow document from disk, logging the
    /// preparation stages as each pass completes.
    pub async fn run_file(
        &self,
        path: impl AsRef<Path>,
        inputs: &Map<String, Value>,
    ) -> Result<RunOutcome, FlowError> {
        let raw = config::load(&path)?;
        log::debug!("{}: stage {:?}", path.as_ref().display(), RunStage::Loaded);
        let definition = config::validate_schema(&raw)?;
        log::debug!(
            "{}: stage {:?}",
            path.as_ref().display(),
            RunStage::SchemaValidated
        );
        let definition = validate_references(definition)?;
        log::debug!(
            "{}: stage {:?}",
            path.as_ref().display(),
            RunStage::ReferenceValidated
        );
        self.run(&definition, inputs).await
    }

    /// Execute a validated definition.
    pub async fn run(
        &self,
        definition: &WorkflowDefinition,
        inputs: &Map<String, Value>,
    ) -> Result<RunOutcome, FlowError> {
        let run_id = Uuid::new_v4();
        let graph = ExecutionGraph::build(definition);
        let mut stage = RunStage::GraphBuilt;
        log::info!(
            "run {}: starting workflow '{}' ({} nodes, stage {:?})",
            run_id,
            definition.flow.name,
            graph.node_count(),
            stage
        );

        let state_type = StateType::from_schema(&definition.state);
        let mut state = StateInstance::initial(&state_type, inputs)?;
        let mut node_results = Vec::new();

        let executor = NodeExecutor::new(
            self.registry.clone(),
            self.sandbox.clone(),
            self.memory.clone(),
        );
        let deadline = definition
            .config
            .run_timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        let mut current = graph.entry().cloned();
        while let Some(Endpoint::Node(node_id)) = current {
            stage = RunStage::Executing(node_id.clone());
            log::debug!("run {}: stage {:?}", run_id, stage);
            // Validation guarantees every successor is a real node.
            let node = graph
                .node(&node_id)
                .expect("validated graph has all nodes");

            let result = self
                .run_node(run_id, node, &executor, inputs, &state, definition, deadline)
                .await;
            let result = match result {
                Ok(result) => result,
                Err(err) => {
                    stage = RunStage::Failed(node_id.clone());
                    log::error!("run {}: failed at stage {:?}: {}", run_id, stage, err);
                    return Err(err);
                }
            };

            state = state.with_result(&result);
            node_results.push(result);
            current = graph.successor(&node_id).cloned();
        }

        stage = RunStage::Completed;
        log::info!("run {}: reached {:?}", run_id, stage);

        Ok(RunOutcome {
            run_id,
            final_state: state,
            node_results,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_node(
        &self,
        run_id: Uuid,
        node: &NodeDefinition,
        executor: &NodeExecutor,
        inputs: &Map<String, Value>,
        state: &StateInstance,
        definition: &WorkflowDefinition,
        deadline: Option<Instant>,
    ) -> Result<NodeResult, FlowError> {
        log::info!("run {}: executing node '{}'", run_id, node.id);
        let started = Instant::now();

        let node_limit = node
            .timeout_secs
            .or(definition.config.node_timeout_secs)
            .map(Duration::from_secs);
        let remaining = match deadline {
            Some(deadline) => Some(
                deadline
                    .checked_duration_since(Instant::now())
                    .ok_or_else(|| run_timeout(definition))?,
            ),
            None => None,
        };
        let limit = match (node_limit, remaining) {
            (Some(n), Some(r)) => Some(n.min(r)),
            (limit, None) | (None, limit) => limit,
        };

        let model = self.model_for(node, definition)?;
        let outcome = executor
            .execute(node, &model, inputs, state, &definition.config, limit)
            .await;

        let outcome = match outcome {
            // The run deadline, not the node's own budget, cut this off.
            Err(FlowError::Node(crate::error::NodeExecutionError::Timeout { .. }))
                if hit_run_deadline(node_limit, remaining) =>
            {
                Err(FlowError::Execution(run_timeout(definition)))
            }
            other => other,
        };

        match outcome {
            Ok(result) => {
                self.emit_trace(run_id, node, &result, NodeStatus::Succeeded, started)
                    .await;
                log::info!("run {}: node '{}' completed", run_id, node.id);
                Ok(result)
            }
            Err(FlowError::Node(err)) if node.on_error == OnErrorPolicy::Continue => {
                log::warn!(
                    "run {}: node '{}' failed, continuing per policy: {}",
                    run_id,
                    node.id,
                    err
                );
                let result = nulled_result(node, err.to_string());
                self.emit_trace(run_id, node, &result, NodeStatus::Continued, started)
                    .await;
                Ok(result)
            }
            Err(FlowError::Node(err)) => {
                log::error!("run {}: node '{}' failed: {}", run_id, node.id, err);
                // The record carries nulled outputs; the failure itself
                // travels in the returned error.
                let record = nulled_result(node, err.to_string());
                self.emit_trace(run_id, node, &record, NodeStatus::Failed, started)
                    .await;
                Err(FlowError::Execution(WorkflowExecutionError::NodeFailed {
                    node: node.id.clone(),
                    source: Box::new(err),
                }))
            }
            Err(other) => Err(other),
        }
    }

    fn model_for(
        &self,
        node: &NodeDefinition,
        definition: &WorkflowDefinition,
    ) -> Result<Arc<dyn Model>, FlowError> {
        if let Some(model) = &self.model_override {
            return Ok(model.clone());
        }

        let name = node
            .model
            .as_deref()
            .or(definition.config.default_model.as_deref())
            .unwrap_or(DEFAULT_MODEL);
        create_model(name).map_err(|source| {
            FlowError::Node(crate::error::NodeExecutionError::Backend {
                node: node.id.clone(),
                source,
            })
        })
    }

    async fn emit_trace(
        &self,
        run_id: Uuid,
        node: &NodeDefinition,
        result: &NodeResult,
        status: NodeStatus,
        started: Instant,
    ) {
        let record = TraceRecord {
            run_id,
            node_id: node.id.clone(),
            status,
            duration: started.elapsed(),
            token_usage: result.usage,
            cost: None,
            timestamp: chrono::Utc::now(),
        };
        if let Err(err) = self.trace.record(&record).await {
            log::warn!("run {}: trace sink failed: {}", run_id, err);
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a document and run it through both validation stages.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<WorkflowDefinition, FlowError> {
    let raw = config::load(&path)?;
    let definition = config::validate_schema(&raw)?;
    validate_references(definition)
}

fn run_timeout(definition: &WorkflowDefinition) -> WorkflowExecutionError {
    WorkflowExecutionError::RunTimeout {
        seconds: definition.config.run_timeout_secs.unwrap_or_default(),
    }
}

/// True when the effective limit was imposed by the run deadline rather than
/// the node's own budget.
fn hit_run_deadline(node_limit: Option<Duration>, remaining: Option<Duration>) -> bool {
    match (node_limit, remaining) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(n), Some(r)) => r < n,
    }
}

fn nulled_result(node: &NodeDefinition, error: String) -> NodeResult {
    let values = node
        .outputs
        .iter()
        .map(|name| (name.clone(), Value::Null))
        .collect();
    NodeResult {
        node_id: node.id.clone(),
        values,
        error: Some(error),
        usage: None,
    }
}
