// SPDX-License-Identifier: MIT

//! Typed error handling for stepflow-rs
//!
//! `FlowError` covers every failure a run or its surrounding plumbing can
//! report. Engine errors are always fatal to the run that raised them.

use thiserror::Error;

use crate::stepflow::workflow::condition::ConditionError;

/// Top-level error type for stepflow-rs
#[derive(Debug, Error)]
pub enum FlowError {
    /// The stepper reached a node name that is not part of the graph
    #[error("Unknown node: {name}")]
    UnknownNode { name: String },

    /// The node exists in the graph but no function is registered for it
    #[error("Node function not found: {function} (node '{node}')")]
    MissingNodeFunction { node: String, function: String },

    /// A node function returned an error
    #[error("Error executing node {node}: {message}")]
    NodeExecution { node: String, message: String },

    /// A guard expression failed to parse, validate or evaluate
    #[error("Invalid condition for {edge}: {source}")]
    InvalidCondition {
        edge: String,
        #[source]
        source: ConditionError,
    },

    /// The run did not reach a terminal node within the step budget
    #[error("Workflow exceeded maximum steps ({limit})")]
    StepLimitExceeded { limit: usize },

    /// A graph definition is malformed
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// A state value that must be a JSON object was something else
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Graph id not present in the graph store
    #[error("Graph '{0}' not found")]
    GraphNotFound(String),

    /// Run id not present in the run store
    #[error("Run '{0}' not found")]
    RunNotFound(String),

    /// Configuration errors (bad env vars, bad CLI values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl FlowError {
    /// Create an unknown node error
    pub fn unknown_node(name: impl Into<String>) -> Self {
        Self::UnknownNode { name: name.into() }
    }

    /// Create a node execution error
    pub fn node_execution(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create an invalid graph error
    pub fn invalid_graph(message: impl Into<String>) -> Self {
        Self::InvalidGraph(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error means a looked-up resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::GraphNotFound(_) | Self::RunNotFound(_))
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, FlowError>;
