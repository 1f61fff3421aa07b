// SPDX-License-Identifier: MIT

//! Guard conditions for graph edges
//!
//! Conditions are small expressions over the workflow state, such as:
//! - `state['x'] > 5`
//! - `state.get('i', 0) < 5`
//! - `state['intent'] == 'search' and state.get('confidence', 0) >= 0.8`
//!
//! Text goes through [`parse`], then [`validate`] checks it against the
//! allow-list. Only a validated [`Condition`] can be evaluated.

mod ast;
mod error;
mod evaluator;
mod lexer;
mod parser;
mod validator;
mod value;

pub use ast::{BinaryOp, BoolOp, CompareOp, Expr, Literal, UnaryOp};
pub use error::{ConditionCause, ConditionError};
pub use parser::{parse, MAX_DEPTH, MAX_LENGTH};
pub use validator::{validate, Condition, ACCESSOR, MAX_TREE_DEPTH, STATE_VAR};

use crate::stepflow::workflow::state::WorkflowState;

/// Parse and validate an expression without evaluating it
pub fn compile(expression: &str) -> Result<Condition, ConditionError> {
    let trimmed = expression.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Ok(Condition::constant(expression, true));
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Ok(Condition::constant(expression, false));
    }

    let expr = parse(expression)?;
    validate(expression, &expr)
}

/// Compile and evaluate in one step
pub fn evaluate(expression: &str, state: &WorkflowState) -> Result<bool, ConditionError> {
    compile(expression)?.evaluate(state)
}
