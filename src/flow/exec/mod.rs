// SPDX-License-Identifier: MIT

//! Node and workflow execution.

pub mod node;
pub mod runtime;

pub use node::NodeExecutor;
pub use runtime::{load_and_validate, RunOutcome, RunStage, Runtime};
