// SPDX-License-Identifier: MIT

//! In-memory graph and run storage
//!
//! Both stores are cheap to clone; clones share the same map.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::graph::GraphDefinition;
use super::log::ExecutionLog;
use super::run::Run;
use super::state::WorkflowState;
use crate::runtime::error::FlowError;

#[derive(Clone, Default)]
pub struct GraphStore {
    graphs: Arc<RwLock<HashMap<String, Arc<GraphDefinition>>>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a graph under a fresh id and return the id
    pub async fn insert(&self, graph: GraphDefinition) -> String {
        let graph_id = Uuid::new_v4().to_string();
        let mut graphs = self.graphs.write().await;
        graphs.insert(graph_id.clone(), Arc::new(graph));
        graph_id
    }

    pub async fn get(&self, graph_id: &str) -> Result<Arc<GraphDefinition>, FlowError> {
        let graphs = self.graphs.read().await;
        graphs
            .get(graph_id)
            .cloned()
            .ok_or_else(|| FlowError::GraphNotFound(graph_id.to_string()))
    }
}

#[derive(Clone, Default)]
pub struct RunStore {
    runs: Arc<RwLock<HashMap<String, Run>>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new running run so it can be polled before it finishes
    pub async fn reserve(&self, graph_id: &str, initial_state: WorkflowState) -> Run {
        let run = Run::start(graph_id, initial_state);
        self.put(run.clone()).await;
        run
    }

    /// Insert or replace a run
    pub async fn put(&self, run: Run) {
        let mut runs = self.runs.write().await;
        runs.insert(run.run_id.clone(), run);
    }

    pub async fn get(&self, run_id: &str) -> Result<Run, FlowError> {
        let runs = self.runs.read().await;
        runs.get(run_id)
            .cloned()
            .ok_or_else(|| FlowError::RunNotFound(run_id.to_string()))
    }

    /// Mark a reserved run completed
    pub async fn complete(
        &self,
        run_id: &str,
        final_state: WorkflowState,
        log: ExecutionLog,
    ) -> Result<(), FlowError> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| FlowError::RunNotFound(run_id.to_string()))?;
        run.complete(final_state, log);
        Ok(())
    }

    /// Mark a run failed. A run that was never reserved gets a failed record
    /// of its own so the error stays visible to pollers.
    pub async fn mark_failed(&self, run_id: &str, message: &str) {
        let mut runs = self.runs.write().await;
        match runs.get_mut(run_id) {
            Some(run) => run.fail(message),
            None => {
                log::warn!("Marking unreserved run {} as failed", run_id);
                let mut run = Run::start(String::new(), WorkflowState::empty());
                run.run_id = run_id.to_string();
                run.fail(message);
                runs.insert(run.run_id.clone(), run);
            }
        }
    }

    /// All runs of one graph, oldest first
    pub async fn list_for_graph(&self, graph_id: &str) -> Vec<Run> {
        let runs = self.runs.read().await;
        let mut matching: Vec<Run> = runs
            .values()
            .filter(|run| run.graph_id == graph_id)
            .cloned()
            .collect();
        matching.sort_by_key(|run| run.created_at);
        matching
    }
}
