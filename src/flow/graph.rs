// SPDX-License-Identifier: MIT

//! Compiled execution graph.
//!
//! Built once from a validated definition and reusable across runs: it is
//! immutable and carries no per-run data. Construction is total — anything
//! that could fail was rejected by the validators.

use std::collections::HashMap;

use crate::flow::definition::{EdgeDefinition, Endpoint, NodeDefinition, WorkflowDefinition};

#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    nodes: HashMap<String, NodeDefinition>,
    successors: HashMap<Endpoint, Endpoint>,
}

impl ExecutionGraph {
    /// Compile the successor map and node lookup. In baseline mode this
    /// degenerates to a single chain from `START` to `END`.
    pub fn build(def: &WorkflowDefinition) -> ExecutionGraph {
        let nodes = def
            .nodes
            .iter()
            .map(|n| (n.id.clone(), n.clone()))
            .collect();

        let successors = def
            .edges
            .iter()
            .filter_map(|edge| match edge {
                EdgeDefinition::Linear { from, to } => Some((from.clone(), to.clone())),
                // Non-linear kinds never survive validation in baseline mode.
                _ => None,
            })
            .collect();

        ExecutionGraph { nodes, successors }
    }

    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.get(id)
    }

    /// First endpoint after `START`.
    pub fn entry(&self) -> Option<&Endpoint> {
        self.successors.get(&Endpoint::Start)
    }

    pub fn successor(&self, node_id: &str) -> Option<&Endpoint> {
        self.successors.get(&Endpoint::Node(node_id.to_string()))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node ids in execution order, following the chain from `START`.
    pub fn chain(&self) -> Vec<&str> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut current = self.entry();
        while let Some(Endpoint::Node(id)) = current {
            order.push(id.as_str());
            current = self.successor(id);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::config::{parse_str, validate_schema, DocumentFormat};
    use crate::flow::validate::validate_references;

    fn graph(yaml: &str) -> ExecutionGraph {
        let doc = parse_str(yaml, DocumentFormat::Yaml).unwrap();
        let def = validate_references(validate_schema(&doc).unwrap()).unwrap();
        ExecutionGraph::build(&def)
    }

    const LINEAR: &str = r#"
schema_version: "1"
flow: { name: chain }
state:
  fields:
    - { name: topic, type: string, required: true }
    - { name: research, type: string }
    - { name: article, type: string }
nodes:
  - id: research
    prompt: "Research {topic}"
    outputs: [research]
    output_schema: { fields: [ { name: research, type: string } ] }
  - id: write
    prompt: "Write from {research}"
    outputs: [article]
    output_schema: { fields: [ { name: article, type: string } ] }
edges:
  - { from: START, to: research }
  - { from: research, to: write }
  - { from: write, to: END }
"#;

    #[test]
    fn test_chain_order() {
        let g = graph(LINEAR);
        assert_eq!(g.chain(), vec!["research", "write"]);
        assert_eq!(g.node_count(), 2);
    }

    #[test]
    fn test_entry_and_successors() {
        let g = graph(LINEAR);
        assert_eq!(g.entry(), Some(&Endpoint::Node("research".to_string())));
        assert_eq!(
            g.successor("research"),
            Some(&Endpoint::Node("write".to_string()))
        );
        assert_eq!(g.successor("write"), Some(&Endpoint::End));
    }

    #[test]
    fn test_node_lookup() {
        let g = graph(LINEAR);
        assert!(g.node("research").is_some());
        assert!(g.node("missing").is_none());
    }

    #[test]
    fn test_graph_is_reusable() {
        // Cloning is cheap enough and the graph carries no per-run data, so
        // independent runs can share one instance.
        let g = graph(LINEAR);
        let g2 = g.clone();
        assert_eq!(g.chain(), g2.chain());
    }
}
