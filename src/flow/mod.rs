// SPDX-License-Identifier: MIT

//! The workflow execution core.
//!
//! A document moves through this module in a fixed order: load
//! ([`config::loader`]), structural validation ([`config::schema`]),
//! cross-reference validation ([`validate`]), graph compilation ([`graph`])
//! and finally execution ([`exec`]). No backend call is ever made on a
//! definition that has not passed every validation stage.

pub mod condition;
pub mod config;
pub mod definition;
pub mod exec;
pub mod graph;
pub mod state;
pub mod suggest;
pub mod template;
pub mod typesys;
pub mod validate;

pub use definition::WorkflowDefinition;
pub use exec::{load_and_validate, RunOutcome, Runtime};
pub use graph::ExecutionGraph;
