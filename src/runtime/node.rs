use std::error::Error;

use crate::stepflow::workflow::state::WorkflowState;

/// Result of a node function call
pub type NodeResult = Result<WorkflowState, Box<dyn Error + Send + Sync>>;

/// Trait for the state transforms that back workflow nodes.
///
/// A node function receives the run's state by value and hands back the
/// state the run continues with. It may mutate the value it was given or
/// build a new one. Errors abort the run.
///
/// Plain functions and closures with the signature
/// `Fn(WorkflowState) -> NodeResult` implement this trait automatically.
pub trait NodeFunction: Send + Sync {
    /// Run the transform
    fn call(&self, state: WorkflowState) -> NodeResult;
}

impl<F> NodeFunction for F
where
    F: Fn(WorkflowState) -> NodeResult + Send + Sync,
{
    fn call(&self, state: WorkflowState) -> NodeResult {
        self(state)
    }
}
