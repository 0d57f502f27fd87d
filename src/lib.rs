// SPDX-License-Identifier: MIT

//! weft-rs: a declarative LLM workflow engine.
//!
//! Workflows are YAML or JSON documents describing typed state, prompt
//! nodes and the edges between them. The [`flow`] module validates and
//! executes them; the [`backend`] module holds the collaborators a run
//! talks to (model providers, tools, sandbox, memory, traces).

pub mod backend;
pub mod error;
pub mod flow;
