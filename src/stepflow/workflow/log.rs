//! Execution log
//!
//! One [`LogEntry`] per node visit, in visit order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::WorkflowState;

/// Record of a single node visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 1-based position in the run
    pub step: usize,
    pub node_name: String,
    /// State handed to the node
    pub entry_state: WorkflowState,
    /// State the node returned
    pub exit_state: WorkflowState,
    /// Every successor whose guard held, in declared order
    pub decision: Vec<String>,
    /// Wall-clock time spent in the node function, in seconds
    pub duration: f64,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// The successor the run moved to, if any
    pub fn next_node(&self) -> Option<&str> {
        self.decision.first().map(String::as_str)
    }
}

/// Ordered, append-only list of node visits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionLog {
    entries: Vec<LogEntry>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogEntry> {
        self.entries.iter()
    }

    /// Node names in visit order
    pub fn path(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.node_name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a ExecutionLog {
    type Item = &'a LogEntry;
    type IntoIter = std::slice::Iter<'a, LogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
