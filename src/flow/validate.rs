// SPDX-License-Identifier: MIT

//! Cross-reference validation.
//!
//! Semantic checks the structural schema alone cannot express, run as an
//! ordered pipeline that stops at the first failure. A definition that fails
//! here never reaches graph construction, so no backend call is ever made on
//! a bad definition.
//!
//! Stage order:
//! 1. edge endpoints reference real nodes or the `START`/`END` sentinels;
//! 2. baseline gate: only linear edges, one outgoing edge per node, no
//!    cycles (a cycle is reported as such, not as the unreachable-END
//!    symptom it also causes);
//! 3. every node is reachable from `START` and has a path to `END`;
//! 4. declared `outputs` exist in the node's output schema;
//! 5. output fields that shadow state fields agree on type exactly;
//! 6. every prompt placeholder resolves to a known state field.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{ConfigValidationError, FeatureNotSupportedError, FlowError};
use crate::flow::definition::{EdgeDefinition, Endpoint, WorkflowDefinition, END, START};
use crate::flow::suggest::nearest_match;
use crate::flow::template;

/// Run the full pipeline, consuming and returning the definition so callers
/// can treat the result as "validated".
pub fn validate_references(def: WorkflowDefinition) -> Result<WorkflowDefinition, FlowError> {
    check_endpoints(&def)?;
    check_baseline_shape(&def)?;
    check_reachability(&def)?;
    check_outputs_subset(&def)?;
    check_state_type_agreement(&def)?;
    check_placeholders(&def)?;
    Ok(def)
}

fn node_ids(def: &WorkflowDefinition) -> Vec<&str> {
    def.nodes.iter().map(|n| n.id.as_str()).collect()
}

/// Stage 1: every endpoint is a real node id or a sentinel.
fn check_endpoints(def: &WorkflowDefinition) -> Result<(), ConfigValidationError> {
    let ids: HashSet<&str> = node_ids(def).into_iter().collect();

    let check = |endpoint: &Endpoint, path: String| -> Result<(), ConfigValidationError> {
        if let Endpoint::Node(id) = endpoint {
            if !ids.contains(id.as_str()) {
                let suggestion = nearest_match(id, ids.iter().copied());
                return Err(ConfigValidationError::suggesting(
                    path,
                    format!("unknown node '{}'", id),
                    suggestion,
                ));
            }
        }
        Ok(())
    };

    for (i, edge) in def.edges.iter().enumerate() {
        if *edge.from() == Endpoint::End {
            return Err(ConfigValidationError::new(
                format!("edges[{}].from", i),
                format!("edges cannot start at {}", END),
            ));
        }
        check(edge.from(), format!("edges[{}].from", i))?;
        for (j, target) in edge.targets().into_iter().enumerate() {
            if *target == Endpoint::Start {
                return Err(ConfigValidationError::new(
                    format!("edges[{}].to", i),
                    format!("edges cannot point back to {}", START),
                ));
            }
            let path = match edge {
                EdgeDefinition::Conditional { .. } => format!("edges[{}].routes[{}].to", i, j),
                EdgeDefinition::Parallel { .. } => format!("edges[{}].branches[{}]", i, j),
                _ => format!("edges[{}].to", i),
            };
            check(target, path)?;
        }
    }
    Ok(())
}

/// Stage 3: forward reachability from START, reverse reachability from END.
fn check_reachability(def: &WorkflowDefinition) -> Result<(), ConfigValidationError> {
    let mut forward: HashMap<Endpoint, Vec<Endpoint>> = HashMap::new();
    let mut reverse: HashMap<Endpoint, Vec<Endpoint>> = HashMap::new();
    for edge in &def.edges {
        for target in edge.targets() {
            forward
                .entry(edge.from().clone())
                .or_default()
                .push(target.clone());
            reverse
                .entry(target.clone())
                .or_default()
                .push(edge.from().clone());
        }
    }

    if !forward.contains_key(&Endpoint::Start) {
        return Err(ConfigValidationError::new(
            "edges",
            format!("no edge leaves {}", START),
        ));
    }
    if !reverse.contains_key(&Endpoint::End) {
        return Err(ConfigValidationError::new(
            "edges",
            format!("no edge reaches {}", END),
        ));
    }

    let reached_forward = bfs(&forward, Endpoint::Start);
    let reached_reverse = bfs(&reverse, Endpoint::End);

    for node in &def.nodes {
        let endpoint = Endpoint::Node(node.id.clone());
        if !reached_forward.contains(&endpoint) {
            return Err(ConfigValidationError::new(
                format!("nodes[{}]", node_index(def, &node.id)),
                format!("node '{}' is not reachable from {}", node.id, START),
            ));
        }
        if !reached_reverse.contains(&endpoint) {
            return Err(ConfigValidationError::new(
                format!("nodes[{}]", node_index(def, &node.id)),
                format!("node '{}' has no path to {}", node.id, END),
            ));
        }
    }
    Ok(())
}

fn bfs(adjacency: &HashMap<Endpoint, Vec<Endpoint>>, start: Endpoint) -> HashSet<Endpoint> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        if let Some(nexts) = adjacency.get(&current) {
            for next in nexts {
                if !seen.contains(next) {
                    queue.push_back(next.clone());
                }
            }
        }
    }
    seen
}

fn node_index(def: &WorkflowDefinition, id: &str) -> usize {
    def.nodes.iter().position(|n| n.id == id).unwrap_or(0)
}

/// Stage 2: the baseline runtime executes only linear chains. Non-linear
/// edge kinds are declared-but-unimplemented constructs and hit the feature
/// gate; linear definitions must additionally be single-successor and
/// acyclic.
fn check_baseline_shape(def: &WorkflowDefinition) -> Result<(), FlowError> {
    for (i, edge) in def.edges.iter().enumerate() {
        if !matches!(edge, EdgeDefinition::Linear { .. }) {
            return Err(FeatureNotSupportedError::new(
                format!("'{}' edges are not implemented by this runtime", edge.kind_name()),
                format!("edges[{}]", i),
            )
            .into());
        }
    }

    let mut outgoing: HashMap<&Endpoint, usize> = HashMap::new();
    for edge in &def.edges {
        *outgoing.entry(edge.from()).or_default() += 1;
    }
    for (endpoint, count) in &outgoing {
        if *count > 1 {
            return Err(ConfigValidationError::new(
                "edges",
                format!("'{}' has {} outgoing edges, expected exactly one", endpoint, count),
            )
            .into());
        }
    }

    // Single-successor holds at this point, so following the chain from each
    // node either terminates or revisits a node on the current path.
    let successors: HashMap<&str, &Endpoint> = def
        .edges
        .iter()
        .filter_map(|e| match e {
            EdgeDefinition::Linear { from: Endpoint::Node(id), to } => Some((id.as_str(), to)),
            _ => None,
        })
        .collect();

    let mut visited: HashSet<&str> = HashSet::new();
    for node in &def.nodes {
        if visited.contains(node.id.as_str()) {
            continue;
        }
        let mut on_path: Vec<&str> = Vec::new();
        let mut current: &str = &node.id;
        loop {
            if let Some(pos) = on_path.iter().position(|&n| n == current) {
                let mut cycle: Vec<&str> = on_path[pos..].to_vec();
                cycle.push(current);
                return Err(ConfigValidationError::new(
                    "edges",
                    format!("cycle detected: {}", cycle.join(" -> ")),
                )
                .into());
            }
            if visited.contains(current) {
                break;
            }
            on_path.push(current);
            match successors.get(current) {
                Some(Endpoint::Node(next)) => current = next,
                _ => break,
            }
        }
        visited.extend(on_path);
    }

    Ok(())
}

/// Stage 4: `outputs ⊆ output_schema.fields` per node.
fn check_outputs_subset(def: &WorkflowDefinition) -> Result<(), ConfigValidationError> {
    for (i, node) in def.nodes.iter().enumerate() {
        let schema_names: Vec<&str> =
            node.output_schema.iter().map(|f| f.name.as_str()).collect();
        for (j, output) in node.outputs.iter().enumerate() {
            if !schema_names.contains(&output.as_str()) {
                let suggestion = nearest_match(output, schema_names.iter().copied());
                return Err(ConfigValidationError::suggesting(
                    format!("nodes[{}].outputs[{}]", i, j),
                    format!(
                        "node '{}' declares output '{}' which is not in its output schema",
                        node.id, output
                    ),
                    suggestion,
                ));
            }
        }
    }
    Ok(())
}

/// Stage 5: an output field that shares a name with a state field must have
/// exactly the same type. No implicit widening.
fn check_state_type_agreement(def: &WorkflowDefinition) -> Result<(), ConfigValidationError> {
    for (i, node) in def.nodes.iter().enumerate() {
        for (j, field) in node.output_schema.iter().enumerate() {
            if let Some(state_field) = def.state.field(&field.name) {
                if state_field.ty != field.ty {
                    return Err(ConfigValidationError::new(
                        format!("nodes[{}].output_schema.fields[{}].type", i, j),
                        format!(
                            "node '{}' output '{}' has type {} but state field '{}' is {}",
                            node.id,
                            field.name,
                            field.ty.display_name(),
                            field.name,
                            state_field.ty.display_name()
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Stage 6: every prompt placeholder must name a state field (directly, via
/// a `state.` prefix, or as the head of a dotted path).
fn check_placeholders(def: &WorkflowDefinition) -> Result<(), ConfigValidationError> {
    let state_names: Vec<&str> = def.state.names().collect();

    for (i, node) in def.nodes.iter().enumerate() {
        let names = template::placeholders(&node.prompt).map_err(|e| {
            ConfigValidationError::new(format!("nodes[{}].prompt", i), e.to_string())
        })?;
        for name in names {
            if !placeholder_resolves(&name, &state_names) {
                let mut candidates: Vec<String> =
                    state_names.iter().map(|s| s.to_string()).collect();
                candidates.extend(state_names.iter().map(|s| format!("state.{}", s)));
                let suggestion = nearest_match(&name, candidates.iter().map(String::as_str));
                return Err(ConfigValidationError::suggesting(
                    format!("nodes[{}].prompt", i),
                    format!(
                        "node '{}' references '{{{}}}' which is not a state field or input",
                        node.id, name
                    ),
                    suggestion,
                ));
            }
        }
    }
    Ok(())
}

fn placeholder_resolves(name: &str, state_names: &[&str]) -> bool {
    let effective = name.strip_prefix("state.").unwrap_or(name);
    let head = effective.split('.').next().unwrap_or(effective);
    state_names.contains(&head)
}
