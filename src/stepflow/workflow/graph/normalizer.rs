//! Graph normalization - turns loosely shaped JSON into a [`GraphDefinition`]
//!
//! Graphs submitted by clients are often incomplete. Normalization fills
//! in what can be inferred and rejects what cannot:
//! - missing `nodes`, `edges` or `conditions` become empty
//! - a missing `start_node` becomes the first node, or a new `start` node
//! - a start node or edge endpoint that is not declared gets an empty node
//! - non-object node entries become empty node definitions

use serde_json::{Map, Value};
use std::collections::HashMap;

use super::types::{GraphDefinition, NodeDefinition};
use crate::runtime::error::FlowError;

/// Name given to the start node of a graph that declares no nodes
pub const DEFAULT_START_NODE: &str = "start";

/// Normalize a raw graph payload
pub fn normalize_graph(raw: Value) -> Result<GraphDefinition, FlowError> {
    let mut payload = match raw {
        Value::Object(payload) => payload,
        other => {
            return Err(FlowError::invalid_graph(format!(
                "graph must be an object, got {}",
                kind_of(&other)
            )))
        }
    };

    let raw_nodes = section(&mut payload, "nodes")?;
    let raw_edges = section(&mut payload, "edges")?;
    let raw_conditions = section(&mut payload, "conditions")?;

    // Object keys keep their declaration order
    let first_declared = raw_nodes.keys().next().cloned();
    let mut nodes: HashMap<String, NodeDefinition> = raw_nodes
        .into_iter()
        .map(|(name, value)| (name, node_definition(value)))
        .collect();

    let start_node = match payload.remove("start_node") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            return Err(FlowError::invalid_graph(format!(
                "`start_node` must be a string, got {}",
                kind_of(&other)
            )))
        }
    };
    let start_node = match start_node {
        Some(name) => name,
        None => match first_declared {
            Some(name) => {
                log::info!("No start_node provided; defaulting to first node: {}", name);
                name
            }
            None => {
                log::info!(
                    "No nodes provided; created default start node: {}",
                    DEFAULT_START_NODE
                );
                DEFAULT_START_NODE.to_string()
            }
        },
    };
    if !nodes.contains_key(&start_node) {
        log::warn!("Auto-created start node '{}'", start_node);
        nodes.insert(start_node.clone(), NodeDefinition::default());
    }

    let mut edges = HashMap::with_capacity(raw_edges.len());
    for (from, targets) in raw_edges {
        let targets = match targets {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .into_iter()
                .map(|t| match t {
                    Value::String(name) => Ok(name),
                    other => Err(FlowError::invalid_graph(format!(
                        "edge targets must be node names (got {} on '{}')",
                        kind_of(&other),
                        from
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(FlowError::invalid_graph(format!(
                    "edges for node '{}' must be a list, got {}",
                    from,
                    kind_of(&other)
                )))
            }
        };

        for name in std::iter::once(&from).chain(&targets) {
            if !nodes.contains_key(name) {
                log::warn!("Auto-created node '{}' referenced in edges", name);
                nodes.insert(name.clone(), NodeDefinition::default());
            }
        }
        edges.insert(from, targets);
    }

    let conditions = raw_conditions
        .into_iter()
        .map(|(edge, guard)| match guard {
            Value::String(text) => Ok((edge, text)),
            other => Err(FlowError::invalid_graph(format!(
                "condition for '{}' must be a string, got {}",
                edge,
                kind_of(&other)
            ))),
        })
        .collect::<Result<HashMap<_, _>, _>>()?;

    Ok(GraphDefinition {
        nodes,
        edges,
        conditions,
        start_node,
    })
}

/// Take an object-valued section, treating a missing or null one as empty
fn section(payload: &mut Map<String, Value>, key: &str) -> Result<Map<String, Value>, FlowError> {
    match payload.remove(key) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(FlowError::invalid_graph(format!(
            "`{}` must be an object, got {}",
            key,
            kind_of(&other)
        ))),
    }
}

fn node_definition(value: Value) -> NodeDefinition {
    let func = match value {
        Value::Object(mut fields) => match fields.remove("func") {
            Some(Value::String(func)) if !func.is_empty() => Some(func),
            _ => None,
        },
        _ => None,
    };
    NodeDefinition { func }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
