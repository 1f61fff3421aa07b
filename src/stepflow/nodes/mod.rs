// SPDX-License-Identifier: MIT

//! Built-in node functions
//!
//! A small code-review pipeline over Python source, used by the CLI and
//! the HTTP server out of the box.

pub mod review;
pub mod tools;

use crate::stepflow::workflow::registry::NodeRegistry;

/// Registry holding every built-in node under its function name
pub fn default_registry() -> NodeRegistry {
    NodeRegistry::new()
        .with("extract_functions", review::extract_functions)
        .with("check_complexity", review::check_complexity)
        .with("detect_issues", review::detect_issues)
        .with("suggest_improvements", review::suggest_improvements)
        .with("end_node", review::end_node)
}
