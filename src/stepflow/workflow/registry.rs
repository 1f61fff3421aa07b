// SPDX-License-Identifier: MIT

use crate::runtime::node::NodeFunction;
use std::collections::HashMap;
use std::sync::Arc;

/// Node functions by name.
///
/// Built up front and then shared read-only by every run; cloning shares
/// the underlying functions.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    functions: HashMap<String, Arc<dyn NodeFunction>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `function` under `name`, replacing any previous entry
    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: NodeFunction + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: NodeFunction + 'static,
    {
        self.register(name, function);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn NodeFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
