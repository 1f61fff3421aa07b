// SPDX-License-Identifier: MIT

//! Runtime building blocks shared by the engine and its hosts:
//! the crate error type and the node function contract.

pub mod error;
pub mod node;

pub use error::{FlowError, Result};
pub use node::{NodeFunction, NodeResult};
