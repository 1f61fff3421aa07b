// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! `WorkflowState` is the open key/value map each run owns. Log snapshots
//! are clones of it.

mod store;

pub use store::WorkflowState;
