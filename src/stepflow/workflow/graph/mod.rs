// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! Graph definitions, their normalization from raw JSON and the engine
//! that steps through them.

pub mod executor;
mod normalizer;
pub mod types;

pub use executor::{WorkflowEngine, DEFAULT_MAX_STEPS};
pub use normalizer::{normalize_graph, DEFAULT_START_NODE};
pub use types::{condition_key, GraphDefinition, NodeDefinition};
