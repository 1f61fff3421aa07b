//! Graph workflow type definitions
//!
//! A graph is a set of named nodes, an ordered successor list per node and
//! optional guards on individual edges. Guards are keyed `"<src>-><dst>"`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::runtime::error::FlowError;
use crate::stepflow::workflow::condition;

/// Separator between source and destination in a guard key
pub const EDGE_SEPARATOR: &str = "->";

/// Build the guard key for the edge `from -> to`
pub fn condition_key(from: &str, to: &str) -> String {
    format!("{}{}{}", from, EDGE_SEPARATOR, to)
}

/// A graph workflow definition
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct GraphDefinition {
    /// Nodes by unique name
    #[serde(default)]
    pub nodes: HashMap<String, NodeDefinition>,
    /// Successors per node; order is branch priority
    #[serde(default)]
    pub edges: HashMap<String, Vec<String>>,
    /// Guard expressions keyed by `"<src>-><dst>"`
    #[serde(default)]
    pub conditions: HashMap<String, String>,
    /// Node the stepper visits first
    pub start_node: String,
}

/// A node in the workflow graph
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct NodeDefinition {
    /// Registered function backing this node; defaults to the node name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func: Option<String>,
}

impl NodeDefinition {
    pub fn with_func(func: impl Into<String>) -> Self {
        Self {
            func: Some(func.into()),
        }
    }

    /// Function name to resolve for a node called `node_name`
    pub fn function_name<'a>(&'a self, node_name: &'a str) -> &'a str {
        match self.func.as_deref() {
            Some(func) if !func.is_empty() => func,
            _ => node_name,
        }
    }
}

impl GraphDefinition {
    /// Start an empty graph whose start node is `start_node`
    pub fn new(start_node: impl Into<String>) -> Self {
        Self {
            start_node: start_node.into(),
            ..Default::default()
        }
    }

    /// Add a node backed by the function of the same name
    pub fn node(mut self, name: impl Into<String>) -> Self {
        self.nodes.insert(name.into(), NodeDefinition::default());
        self
    }

    /// Add a node backed by a differently named function
    pub fn node_with_func(mut self, name: impl Into<String>, func: impl Into<String>) -> Self {
        self.nodes.insert(name.into(), NodeDefinition::with_func(func));
        self
    }

    /// Append `to` to the successors of `from`
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.entry(from.into()).or_default().push(to.into());
        self
    }

    /// Guard the edge `from -> to`
    pub fn condition(mut self, from: &str, to: &str, guard: impl Into<String>) -> Self {
        self.conditions.insert(condition_key(from, to), guard.into());
        self
    }

    /// Successors of `node` in declared order
    pub fn successors(&self, node: &str) -> &[String] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Guard text for the edge `from -> to`, if any
    pub fn guard(&self, from: &str, to: &str) -> Option<&str> {
        self.conditions
            .get(&condition_key(from, to))
            .map(String::as_str)
    }

    /// Check structural invariants and compile every guard.
    ///
    /// The start node and every edge endpoint must be a declared node.
    /// Guards on edges that do not exist are allowed but never consulted.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.start_node.is_empty() {
            return Err(FlowError::invalid_graph("start_node must not be empty"));
        }
        if !self.nodes.contains_key(&self.start_node) {
            return Err(FlowError::invalid_graph(format!(
                "start_node '{}' is not a declared node",
                self.start_node
            )));
        }

        for (from, targets) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(FlowError::invalid_graph(format!(
                    "edge source '{}' is not a declared node",
                    from
                )));
            }
            if let Some(to) = targets.iter().find(|t| !self.nodes.contains_key(*t)) {
                return Err(FlowError::invalid_graph(format!(
                    "edge target '{}' (from '{}') is not a declared node",
                    to, from
                )));
            }
        }

        for (edge, guard) in &self.conditions {
            condition::compile(guard).map_err(|source| FlowError::InvalidCondition {
                edge: edge.clone(),
                source,
            })?;
            if !self.has_edge(edge) {
                log::warn!("Guard '{}' does not match any edge", edge);
            }
        }

        Ok(())
    }

    fn has_edge(&self, key: &str) -> bool {
        key.split_once(EDGE_SEPARATOR)
            .is_some_and(|(from, to)| self.successors(from).iter().any(|t| t == to))
    }
}
