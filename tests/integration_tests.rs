// SPDX-License-Identifier: MIT

//! Integration tests for workflow validation and execution.
//!
//! These tests drive complete documents through the load -> validate ->
//! execute pipeline using a scripted mock model, so no network is touched.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use weft_rs::backend::model::{Completion, CompletionRequest, Model, TokenUsage};
use weft_rs::backend::trace::{NodeStatus, TraceRecord, TraceSink};
use weft_rs::error::{FlowError, ModelError, TraceError, WorkflowExecutionError};
use weft_rs::flow::config::{parse_str, validate_schema, DocumentFormat};
use weft_rs::flow::validate::validate_references;
use weft_rs::flow::{Runtime, WorkflowDefinition};

// ============================================================================
// Mock Components
// ============================================================================

/// Mock model that returns predefined structured responses in order.
struct MockModel {
    responses: Mutex<Vec<Result<Value, ModelError>>>,
    calls: AtomicUsize,
}

impl MockModel {
    fn new(responses: Vec<Result<Value, ModelError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Model for MockModel {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        assert!(!responses.is_empty(), "mock model ran out of responses");
        let value = responses.remove(0)?;
        Ok(Completion {
            value,
            usage: Some(TokenUsage {
                input: 100,
                output: 20,
            }),
        })
    }
}

/// Trace sink that keeps every record for inspection.
#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<TraceRecord>>,
}

#[async_trait]
impl TraceSink for RecordingSink {
    async fn record(&self, record: &TraceRecord) -> Result<(), TraceError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

static RESEARCH_FLOW: Lazy<&str> = Lazy::new(|| {
    r#"
schema_version: "1"
flow:
  name: research-and-write
state:
  fields:
    - { name: topic, type: string, required: true }
    - { name: research, type: string }
    - { name: article, type: string }
nodes:
  - id: research
    prompt: "Research the topic: {topic}"
    outputs: [research]
    output_schema:
      fields:
        - { name: research, type: string }
  - id: write
    prompt: "Write an article about {topic} based on: {state.research}"
    outputs: [article]
    output_schema:
      fields:
        - { name: article, type: string }
edges:
  - { from: START, to: research }
  - { from: research, to: write }
  - { from: write, to: END }
"#
});

fn load(yaml: &str) -> Result<WorkflowDefinition, FlowError> {
    let raw = parse_str(yaml, DocumentFormat::Yaml)?;
    let definition = validate_schema(&raw)?;
    validate_references(definition)
}

fn inputs(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// ============================================================================
// End-to-end execution
// ============================================================================

#[tokio::test]
async fn test_linear_flow_executes_end_to_end() {
    let definition = load(&RESEARCH_FLOW).unwrap();
    let mock = MockModel::new(vec![
        Ok(json!({"research": "key findings about rust"})),
        Ok(json!({"article": "an article built on the findings"})),
    ]);
    let runtime = Runtime::new().with_model(mock.clone());

    let outcome = runtime
        .run(&definition, &inputs(&[("topic", json!("rust"))]))
        .await
        .unwrap();

    assert_eq!(mock.call_count(), 2);
    assert_eq!(outcome.node_results.len(), 2);
    assert_eq!(
        outcome.final_state.get("research"),
        Some(&json!("key findings about rust"))
    );
    assert_eq!(
        outcome.final_state.get("article"),
        Some(&json!("an article built on the findings"))
    );
    // The required input is carried through untouched.
    assert_eq!(outcome.final_state.get("topic"), Some(&json!("rust")));
}

#[tokio::test]
async fn test_missing_required_input_fails_before_any_call() {
    let definition = load(&RESEARCH_FLOW).unwrap();
    let mock = MockModel::new(vec![]);
    let runtime = Runtime::new().with_model(mock.clone());

    let err = runtime.run(&definition, &Map::new()).await.unwrap_err();

    assert_eq!(mock.call_count(), 0);
    match err {
        FlowError::Execution(WorkflowExecutionError::MissingInput { field }) => {
            assert_eq!(field, "topic");
        }
        other => panic!("expected MissingInput, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_response_is_retried_then_rejected() {
    let definition = load(&RESEARCH_FLOW).unwrap();
    // Both attempts return a payload missing the required field.
    let mock = MockModel::new(vec![
        Ok(json!({"unexpected": 1})),
        Ok(json!({"unexpected": 2})),
    ]);
    let runtime = Runtime::new().with_model(mock.clone());

    let err = runtime
        .run(&definition, &inputs(&[("topic", json!("rust"))]))
        .await
        .unwrap_err();

    // One retry by default, then the node fails and the run aborts.
    assert_eq!(mock.call_count(), 2);
    match err {
        FlowError::Execution(WorkflowExecutionError::NodeFailed { ref node, .. }) => {
            assert_eq!(node, "research");
        }
        other => panic!("expected NodeFailed, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_on_error_continue_records_and_proceeds() {
    let yaml = r#"
schema_version: "1"
flow:
  name: resilient
state:
  fields:
    - { name: topic, type: string, required: true }
    - { name: research, type: string }
    - { name: article, type: string }
nodes:
  - id: research
    prompt: "Research {topic}"
    on_error: continue
    outputs: [research]
    output_schema:
      fields:
        - { name: research, type: string }
  - id: write
    prompt: "Write about {topic}"
    outputs: [article]
    output_schema:
      fields:
        - { name: article, type: string }
edges:
  - { from: START, to: research }
  - { from: research, to: write }
  - { from: write, to: END }
"#;
    let definition = load(yaml).unwrap();
    let mock = MockModel::new(vec![
        Err(ModelError::Api {
            provider: "anthropic",
            message: "overloaded".to_string(),
        }),
        Ok(json!({"article": "written anyway"})),
    ]);
    let runtime = Runtime::new().with_model(mock.clone());

    let outcome = runtime
        .run(&definition, &inputs(&[("topic", json!("rust"))]))
        .await
        .unwrap();

    // Failed node contributed nulls plus an error record; the run went on.
    assert_eq!(outcome.final_state.get("research"), Some(&Value::Null));
    assert_eq!(
        outcome.final_state.get("article"),
        Some(&json!("written anyway"))
    );
    assert!(outcome.node_results[0].error.is_some());
    assert!(outcome.node_results[1].error.is_none());
}

#[tokio::test]
async fn test_aborting_node_failure_is_traced() {
    let definition = load(&RESEARCH_FLOW).unwrap();
    let mock = MockModel::new(vec![Err(ModelError::Api {
        provider: "anthropic",
        message: "overloaded".to_string(),
    })]);
    let sink = Arc::new(RecordingSink::default());
    let runtime = Runtime::new().with_model(mock).with_trace(sink.clone());

    let err = runtime
        .run(&definition, &inputs(&[("topic", json!("rust"))]))
        .await
        .unwrap_err();

    match err {
        FlowError::Execution(WorkflowExecutionError::NodeFailed { node, .. }) => {
            assert_eq!(node, "research");
        }
        other => panic!("expected NodeFailed, got {:?}", other),
    }

    // The aborting failure still leaves a trace record behind.
    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].node_id, "research");
    assert_eq!(records[0].status, NodeStatus::Failed);
}

#[tokio::test]
async fn test_every_node_outcome_is_traced() {
    let definition = load(&RESEARCH_FLOW).unwrap();
    let mock = MockModel::new(vec![
        Ok(json!({"research": "notes"})),
        Ok(json!({"article": "done"})),
    ]);
    let sink = Arc::new(RecordingSink::default());
    let runtime = Runtime::new().with_model(mock).with_trace(sink.clone());

    runtime
        .run(&definition, &inputs(&[("topic", json!("rust"))]))
        .await
        .unwrap();

    let records = sink.records.lock().unwrap();
    let statuses: Vec<_> = records.iter().map(|r| (r.node_id.as_str(), r.status)).collect();
    assert_eq!(
        statuses,
        vec![
            ("research", NodeStatus::Succeeded),
            ("write", NodeStatus::Succeeded),
        ]
    );
}

#[tokio::test]
async fn test_run_file_loads_and_executes_from_disk() {
    let path = std::env::temp_dir().join(format!("research-flow-{}.yaml", std::process::id()));
    std::fs::write(&path, *RESEARCH_FLOW).unwrap();

    let mock = MockModel::new(vec![
        Ok(json!({"research": "notes"})),
        Ok(json!({"article": "done"})),
    ]);
    let runtime = Runtime::new().with_model(mock);
    let outcome = runtime
        .run_file(&path, &inputs(&[("topic", json!("rust"))]))
        .await;
    std::fs::remove_file(&path).ok();

    let outcome = outcome.unwrap();
    assert_eq!(outcome.final_state.get("article"), Some(&json!("done")));
}

// ============================================================================
// Validation scenarios
// ============================================================================

#[tokio::test]
async fn test_placeholder_typo_is_caught_with_suggestion() {
    let yaml = r#"
schema_version: "1"
flow:
  name: typo
state:
  fields:
    - { name: topic, type: string, required: true }
    - { name: research, type: string }
nodes:
  - id: research
    prompt: "Research {topick}"
    outputs: [research]
    output_schema:
      fields:
        - { name: research, type: string }
edges:
  - { from: START, to: research }
  - { from: research, to: END }
"#;
    let err = load(yaml).unwrap_err();
    let message = err.to_string();

    assert!(message.contains("topick"));
    assert!(message.contains("did you mean 'topic'"));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_cyclic_definition_is_rejected() {
    let yaml = r#"
schema_version: "1"
flow:
  name: cyclic
state:
  fields:
    - { name: draft, type: string }
    - { name: review, type: string }
nodes:
  - id: write
    prompt: "Write a draft"
    outputs: [draft]
    output_schema:
      fields:
        - { name: draft, type: string }
  - id: review
    prompt: "Review {state.draft}"
    outputs: [review]
    output_schema:
      fields:
        - { name: review, type: string }
edges:
  - { from: START, to: write }
  - { from: write, to: review }
  - { from: review, to: write }
"#;
    let err = load(yaml).unwrap_err();

    assert!(err.to_string().contains("cycle detected"));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_conditional_edges_are_gated_not_ignored() {
    let yaml = r#"
schema_version: "1"
flow:
  name: branching
state:
  fields:
    - { name: draft, type: string }
    - { name: verdict, type: string }
nodes:
  - id: review
    prompt: "Review the draft"
    outputs: [verdict]
    output_schema:
      fields:
        - { name: verdict, type: string }
  - id: publish
    prompt: "Publish"
    outputs: [draft]
    output_schema:
      fields:
        - { name: draft, type: string }
edges:
  - { from: START, to: review }
  - from: review
    kind: conditional
    routes:
      - { when: "verdict == 'approve'", to: publish }
      - { when: "verdict != 'approve'", to: END }
  - { from: publish, to: END }
"#;
    let err = load(yaml).unwrap_err();
    let message = err.to_string();

    assert!(message.contains("feature not supported"));
    assert!(message.contains("conditional"));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_unreachable_node_is_rejected() {
    let yaml = r#"
schema_version: "1"
flow:
  name: unreachable
state:
  fields:
    - { name: a, type: string }
nodes:
  - id: first
    prompt: "Go"
    outputs: [a]
    output_schema:
      fields:
        - { name: a, type: string }
  - id: orphan
    prompt: "Never wired in"
    outputs: [a]
    output_schema:
      fields:
        - { name: a, type: string }
edges:
  - { from: START, to: first }
  - { from: first, to: END }
"#;
    let err = load(yaml).unwrap_err();
    assert!(err.to_string().contains("orphan"));
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_output_state_type_disagreement_is_rejected() {
    let yaml = r#"
schema_version: "1"
flow:
  name: mismatch
state:
  fields:
    - { name: score, type: float }
nodes:
  - id: rate
    prompt: "Rate it"
    outputs: [score]
    output_schema:
      fields:
        - { name: score, type: string }
edges:
  - { from: START, to: rate }
  - { from: rate, to: END }
"#;
    let err = load(yaml).unwrap_err();
    let message = err.to_string();

    assert!(message.contains("score"));
    assert_eq!(err.exit_code(), 2);
}

// ============================================================================
// JSON documents and run timeouts
// ============================================================================

#[tokio::test]
async fn test_json_document_round_trip() {
    let doc = json!({
        "schema_version": "1",
        "flow": { "name": "json-flow" },
        "state": {
            "fields": [
                { "name": "topic", "type": "string", "required": true },
                { "name": "summary", "type": "string" }
            ]
        },
        "nodes": [{
            "id": "summarize",
            "prompt": "Summarize {topic}",
            "outputs": ["summary"],
            "output_schema": {
                "fields": [ { "name": "summary", "type": "string" } ]
            }
        }],
        "edges": [
            { "from": "START", "to": "summarize" },
            { "from": "summarize", "to": "END" }
        ]
    });

    let raw = parse_str(&doc.to_string(), DocumentFormat::Json).unwrap();
    let definition = validate_references(validate_schema(&raw).unwrap()).unwrap();

    let mock = MockModel::new(vec![Ok(json!({"summary": "short"}))]);
    let runtime = Runtime::new().with_model(mock);
    let outcome = runtime
        .run(&definition, &inputs(&[("topic", json!("anything"))]))
        .await
        .unwrap();

    assert_eq!(outcome.final_state.get("summary"), Some(&json!("short")));
}

#[tokio::test]
async fn test_run_timeout_aborts_the_run() {
    /// Model that never answers within the deadline.
    struct StallingModel;

    #[async_trait]
    impl Model for StallingModel {
        async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, ModelError> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            unreachable!("the runtime must cancel this call");
        }
    }

    let yaml = r#"
schema_version: "1"
flow:
  name: slow
state:
  fields:
    - { name: out, type: string }
nodes:
  - id: slow
    prompt: "Take your time"
    outputs: [out]
    output_schema:
      fields:
        - { name: out, type: string }
edges:
  - { from: START, to: slow }
  - { from: slow, to: END }
config:
  run_timeout_secs: 1
"#;
    let definition = load(yaml).unwrap();
    let runtime = Runtime::new().with_model(Arc::new(StallingModel));

    let err = runtime.run(&definition, &Map::new()).await.unwrap_err();

    match err {
        FlowError::Execution(WorkflowExecutionError::RunTimeout { seconds }) => {
            assert_eq!(seconds, 1);
        }
        other => panic!("expected RunTimeout, got {:?}", other),
    }
}
