//! Graph workflow executor
//!
//! Steps a single path through the graph: run the current node, evaluate
//! the guards on its outgoing edges, log the visit, move to the first
//! successor that qualified.

use chrono::Utc;
use std::collections::HashMap;
use std::time::Instant;

use crate::runtime::error::FlowError;
use crate::stepflow::config::AppConfig;
use crate::stepflow::workflow::condition::{self, Condition};
use crate::stepflow::workflow::log::{ExecutionLog, LogEntry};
use crate::stepflow::workflow::registry::NodeRegistry;
use crate::stepflow::workflow::state::WorkflowState;

use super::types::{condition_key, GraphDefinition};

/// Step ceiling used when none is configured
pub const DEFAULT_MAX_STEPS: usize = 1000;

/// Runs graphs against a fixed set of node functions
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    registry: NodeRegistry,
    max_steps: usize,
}

impl WorkflowEngine {
    pub fn new(registry: NodeRegistry) -> Self {
        Self {
            registry,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn from_config(registry: NodeRegistry, config: &AppConfig) -> Self {
        Self::new(registry).with_max_steps(config.max_steps)
    }

    /// Override the step ceiling
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Run `graph` from its start node on a copy of `initial`.
    ///
    /// Returns the final state and one log entry per visited node. Any
    /// error aborts the run; no partial log is returned.
    pub fn execute(
        &self,
        graph: &GraphDefinition,
        initial: &WorkflowState,
    ) -> Result<(WorkflowState, ExecutionLog), FlowError> {
        let mut state = initial.clone();
        let mut log = ExecutionLog::new();
        let mut guards: HashMap<String, Condition> = HashMap::new();
        let mut current = Some(graph.start_node.clone());
        let mut step = 0;

        log::info!(
            "Starting workflow at '{}' (max {} steps)",
            graph.start_node,
            self.max_steps
        );

        while step < self.max_steps {
            let Some(node_name) = current.take() else {
                break;
            };

            let node = graph
                .nodes
                .get(&node_name)
                .ok_or_else(|| FlowError::unknown_node(&node_name))?;

            step += 1;
            let entry_state = state.clone();

            let function_name = node.function_name(&node_name);
            let function =
                self.registry
                    .get(function_name)
                    .ok_or_else(|| FlowError::MissingNodeFunction {
                        node: node_name.clone(),
                        function: function_name.to_string(),
                    })?;

            log::debug!("Step {}: executing node '{}'", step, node_name);
            let started = Instant::now();
            state = function
                .call(state)
                .map_err(|e| FlowError::node_execution(&node_name, e.to_string()))?;
            let duration = started.elapsed().as_secs_f64();

            let exit_state = state.clone();
            let decision = self.decide(graph, &node_name, &state, &mut guards)?;
            log::debug!("Node '{}' decision: {:?}", node_name, decision);

            current = decision.first().cloned();
            log.push(LogEntry {
                step,
                node_name,
                entry_state,
                exit_state,
                decision,
                duration,
                timestamp: Utc::now(),
            });
        }

        // Using up the whole budget counts as a runaway, even when the last
        // node had no successor.
        if step >= self.max_steps {
            log::error!("Workflow exceeded maximum steps ({})", self.max_steps);
            return Err(FlowError::StepLimitExceeded {
                limit: self.max_steps,
            });
        }

        log::info!("Workflow finished after {} steps", step);
        Ok((state, log))
    }

    /// Every successor of `node` whose guard holds, in declared order
    fn decide(
        &self,
        graph: &GraphDefinition,
        node: &str,
        state: &WorkflowState,
        guards: &mut HashMap<String, Condition>,
    ) -> Result<Vec<String>, FlowError> {
        let mut decision = Vec::new();

        for next in graph.successors(node) {
            let key = condition_key(node, next);
            let Some(text) = graph.conditions.get(&key) else {
                decision.push(next.clone());
                continue;
            };

            let result = match guards.get(&key) {
                Some(compiled) => compiled.evaluate(state),
                None => condition::compile(text).and_then(|compiled| {
                    let result = compiled.evaluate(state);
                    guards.insert(key.clone(), compiled);
                    result
                }),
            };

            match result {
                Ok(true) => decision.push(next.clone()),
                Ok(false) => {}
                Err(source) => return Err(FlowError::InvalidCondition { edge: key, source }),
            }
        }

        Ok(decision)
    }
}
