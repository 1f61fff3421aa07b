//! Run records
//!
//! A [`Run`] is what callers poll for: the inputs of one execution, its
//! outcome and its log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::log::ExecutionLog;
use super::state::WorkflowState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// One execution of a stored graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub graph_id: String,
    pub initial_state: WorkflowState,
    pub final_state: Option<WorkflowState>,
    #[serde(default)]
    pub log: ExecutionLog,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Run {
    /// A fresh running record with a new id
    pub fn start(graph_id: impl Into<String>, initial_state: WorkflowState) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            graph_id: graph_id.into(),
            initial_state,
            final_state: None,
            log: ExecutionLog::new(),
            status: RunStatus::Running,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn complete(&mut self, final_state: WorkflowState, log: ExecutionLog) {
        self.final_state = Some(final_state);
        self.log = log;
        self.status = RunStatus::Completed;
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(message.into());
        self.completed_at = Some(Utc::now());
    }
}
