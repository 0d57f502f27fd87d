// SPDX-License-Identifier: MIT

//! Typed workflow state.
//!
//! [`StateType`] is the compiled form of the declared state schema.
//! [`StateInstance`] carries the run's values and is immutable: committing a
//! node result produces a new instance, the previous one is never touched.
//! That discipline is what lets a future parallel fan-out hand each branch
//! its own snapshot without locking.

pub mod output;

use serde_json::{Map, Value};

use crate::backend::model::TokenUsage;
use crate::error::WorkflowExecutionError;
use crate::flow::definition::{StateField, StateSchema};

/// Compiled state container type. Built once per validated definition.
#[derive(Debug, Clone)]
pub struct StateType {
    fields: Vec<StateField>,
}

impl StateType {
    /// Deterministic mapping from schema to container type; required fields
    /// carry no default, optional fields keep their declared one.
    pub fn from_schema(schema: &StateSchema) -> StateType {
        StateType {
            fields: schema.fields.clone(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&StateField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[StateField] {
        &self.fields
    }
}

/// The validated output values produced by one node invocation.
#[derive(Debug, Clone)]
pub struct NodeResult {
    pub node_id: String,
    /// Declared output name -> validated value. Null values with a set
    /// `error` indicate a downgraded failure under `on_error: continue`.
    pub values: Map<String, Value>,
    pub error: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Immutable runtime state keyed by state field name.
#[derive(Debug, Clone)]
pub struct StateInstance {
    values: Map<String, Value>,
}

impl StateInstance {
    /// Create the initial state for a run: defaults merged with caller
    /// inputs, required fields enforced, declared input types checked.
    pub fn initial(
        ty: &StateType,
        inputs: &Map<String, Value>,
    ) -> Result<StateInstance, WorkflowExecutionError> {
        let mut values = Map::new();

        for field in ty.fields() {
            match inputs.get(&field.name) {
                Some(value) => {
                    field.ty.validate_value(value).map_err(|detail| {
                        WorkflowExecutionError::InputType {
                            field: field.name.clone(),
                            detail,
                        }
                    })?;
                    values.insert(field.name.clone(), value.clone());
                }
                None if field.required => {
                    return Err(WorkflowExecutionError::MissingInput {
                        field: field.name.clone(),
                    });
                }
                None => {
                    if let Some(default) = &field.default {
                        values.insert(field.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(StateInstance { values })
    }

    /// Commit a node result, producing the next state. Every declared output
    /// is written; all other fields are carried over unchanged.
    pub fn with_result(&self, result: &NodeResult) -> StateInstance {
        let mut values = self.values.clone();
        for (name, value) in &result.values {
            values.insert(name.clone(), value.clone());
        }
        StateInstance { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Snapshot as a JSON object, for template resolution and condition
    /// evaluation.
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}
