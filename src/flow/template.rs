// SPDX-License-Identifier: MIT

//! Prompt template resolution.
//!
//! Templates contain `{placeholder}` markers, including dotted paths for
//! nested access (`{state.review.verdict}`). Resolution checks caller inputs
//! first, then state fields, then walks dotted paths into nested values.
//! `{{` and `}}` escape literal braces. Resolution is deterministic and
//! idempotent: the same template against the same context always yields the
//! same string.

use serde_json::{Map, Value};

use crate::error::TemplateResolutionError;
use crate::flow::condition::lookup_path;
use crate::flow::suggest::nearest_match;

/// Extract every placeholder name from a template, in order of appearance.
///
/// Also used by the cross-reference validator to check prompts before any
/// execution happens.
pub fn placeholders(template: &str) -> Result<Vec<String>, TemplateResolutionError> {
    let mut names = Vec::new();
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => i += 2,
            b'}' if bytes.get(i + 1) == Some(&b'}') => i += 2,
            b'{' => {
                let start = i;
                let Some(end) = template[i..].find('}').map(|off| i + off) else {
                    return Err(TemplateResolutionError::Unclosed { offset: start });
                };
                let name = template[i + 1..end].trim();
                if name.is_empty() {
                    return Err(TemplateResolutionError::Empty { offset: start });
                }
                names.push(name.to_string());
                i = end + 1;
            }
            _ => i += 1,
        }
    }

    Ok(names)
}

/// Resolve a template against inputs (priority) and state (fallback).
pub fn resolve(
    template: &str,
    inputs: &Map<String, Value>,
    state: &Value,
) -> Result<String, TemplateResolutionError> {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                out.push('{');
                i += 2;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                out.push('}');
                i += 2;
            }
            b'{' => {
                let start = i;
                let Some(end) = template[i..].find('}').map(|off| i + off) else {
                    return Err(TemplateResolutionError::Unclosed { offset: start });
                };
                let name = template[i + 1..end].trim();
                if name.is_empty() {
                    return Err(TemplateResolutionError::Empty { offset: start });
                }
                let value = resolve_name(name, inputs, state)
                    .ok_or_else(|| unresolved(name, inputs, state))?;
                out.push_str(&render(&value));
                i = end + 1;
            }
            _ => {
                // Copy one full UTF-8 character.
                let ch_len = template[i..].chars().next().map(char::len_utf8).unwrap_or(1);
                out.push_str(&template[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    Ok(out)
}

fn resolve_name(name: &str, inputs: &Map<String, Value>, state: &Value) -> Option<Value> {
    // Explicit `state.` prefix bypasses inputs.
    if let Some(rest) = name.strip_prefix("state.") {
        return lookup_path(state, rest).cloned();
    }

    // Inputs win over state for bare names.
    if let Some(value) = inputs.get(name) {
        return Some(value.clone());
    }
    if let Some((head, rest)) = name.split_once('.') {
        if let Some(root) = inputs.get(head) {
            return lookup_path(root, rest).cloned();
        }
    }

    lookup_path(state, name).cloned()
}

fn unresolved(
    name: &str,
    inputs: &Map<String, Value>,
    state: &Value,
) -> TemplateResolutionError {
    let mut candidates: Vec<String> = inputs.keys().cloned().collect();
    if let Value::Object(entries) = state {
        for key in entries.keys() {
            candidates.push(key.clone());
            candidates.push(format!("state.{}", key));
        }
    }
    let suggestion = nearest_match(name, candidates.iter().map(String::as_str));
    TemplateResolutionError::unresolved(name, suggestion)
}

/// Render a resolved value as prompt text. Strings are inlined without
/// quotes; everything else uses its JSON representation.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
