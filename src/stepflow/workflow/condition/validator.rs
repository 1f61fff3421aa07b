// SPDX-License-Identifier: MIT

//! Allow-list validation of parsed conditions
//!
//! `validate` walks the whole parsed tree before anything is evaluated and
//! converts it into a [`Condition`]. The checked tree has no variant for a
//! free name, an arbitrary call or a disallowed operator, so the evaluator
//! cannot run anything outside the grammar.

use super::ast::{BinaryOp, BoolOp, CompareOp, Expr, Literal, UnaryOp};
use super::error::{ConditionCause, ConditionError};
use super::evaluator;
use crate::stepflow::workflow::state::WorkflowState;

/// The single variable a condition may reference
pub const STATE_VAR: &str = "state";

/// The single method a condition may call on [`STATE_VAR`]
pub const ACCESSOR: &str = "get";

/// Deepest checked tree accepted
pub const MAX_TREE_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Validated expression tree
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Node {
    Literal(Literal),
    /// The whole state mapping
    State,
    /// `state[key]`
    Lookup(Literal),
    /// `state.get(key, default)`
    Get { key: Literal, default: Literal },
    Neg(Box<Node>),
    Pos(Box<Node>),
    Not(Box<Node>),
    Arith {
        op: Arith,
        left: Box<Node>,
        right: Box<Node>,
    },
    And(Vec<Node>),
    Or(Vec<Node>),
    Compare {
        left: Box<Node>,
        rest: Vec<(Cmp, Node)>,
    },
}

/// A condition that passed validation and can be evaluated any number of times
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    root: Node,
}

impl Condition {
    pub(super) fn constant(source: &str, value: bool) -> Self {
        Self {
            source: source.to_string(),
            root: Node::Literal(Literal::Boolean(value)),
        }
    }

    /// The expression text this condition was built from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a state, coercing the result to a boolean
    pub fn evaluate(&self, state: &WorkflowState) -> Result<bool, ConditionError> {
        evaluator::evaluate_node(&self.root, state)
            .map(|value| value.truthy())
            .map_err(|cause| cause.with_expression(&self.source))
    }
}

/// Check a parsed expression against the allow-list
pub fn validate(expression: &str, expr: &Expr) -> Result<Condition, ConditionError> {
    check(expr, 0)
        .map(|root| Condition {
            source: expression.to_string(),
            root,
        })
        .map_err(|cause| cause.with_expression(expression))
}

fn check(expr: &Expr, depth: usize) -> Result<Node, ConditionCause> {
    if depth > MAX_TREE_DEPTH {
        return Err(ConditionCause::disallowed(format!(
            "expression tree deeper than {} levels",
            MAX_TREE_DEPTH
        )));
    }
    let next = depth + 1;

    match expr {
        Expr::Literal(literal) => Ok(Node::Literal(literal.clone())),
        Expr::Name(name) if name == STATE_VAR => Ok(Node::State),
        Expr::Name(name) => Err(ConditionCause::disallowed(format!(
            "name '{}' is not allowed; only '{}' may appear in conditions",
            name, STATE_VAR
        ))),
        Expr::Subscript { target, key } => {
            if !is_state(target) {
                return Err(ConditionCause::disallowed(
                    "only state[...] subscripts are allowed",
                ));
            }
            let key = constant(key).ok_or_else(|| {
                ConditionCause::disallowed(
                    "state subscript must be a constant key, e.g. state['x']",
                )
            })?;
            Ok(Node::Lookup(key))
        }
        Expr::Attribute { target, attr } => {
            if is_state(target) && attr == ACCESSOR {
                Err(ConditionCause::disallowed(
                    "state.get must be called, e.g. state.get('x')",
                ))
            } else {
                Err(ConditionCause::disallowed(format!(
                    "attribute access '.{}' is not allowed",
                    attr
                )))
            }
        }
        Expr::Call { func, args } => check_call(func, args),
        Expr::Unary { op, operand } => {
            let inner = Box::new(check(operand, next)?);
            Ok(match op {
                UnaryOp::Neg => Node::Neg(inner),
                UnaryOp::Pos => Node::Pos(inner),
                UnaryOp::Not => Node::Not(inner),
            })
        }
        Expr::Binary { op, left, right } => {
            let op = arith(*op)?;
            // `a + b + c` is a flat chain leaning left, not nesting
            let left_depth = match **left {
                Expr::Binary { .. } => depth,
                _ => next,
            };
            Ok(Node::Arith {
                op,
                left: Box::new(check(left, left_depth)?),
                right: Box::new(check(right, next)?),
            })
        }
        Expr::Bool { op, values } => {
            let nodes = values
                .iter()
                .map(|value| check(value, next))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match op {
                BoolOp::And => Node::And(nodes),
                BoolOp::Or => Node::Or(nodes),
            })
        }
        Expr::Compare { left, rest } => {
            let ops = rest
                .iter()
                .map(|(op, _)| cmp(*op))
                .collect::<Result<Vec<_>, _>>()?;
            let left = Box::new(check(left, next)?);
            let mut checked = Vec::with_capacity(rest.len());
            for (op, (_, comparator)) in ops.into_iter().zip(rest) {
                checked.push((op, check(comparator, next)?));
            }
            Ok(Node::Compare {
                left,
                rest: checked,
            })
        }
    }
}

fn check_call(func: &Expr, args: &[Expr]) -> Result<Node, ConditionCause> {
    let is_accessor = matches!(
        func,
        Expr::Attribute { target, attr } if is_state(target) && attr == ACCESSOR
    );
    if !is_accessor {
        let message = match func {
            Expr::Name(name) => format!(
                "call to '{}' is not allowed; only state.get(...) calls are allowed",
                name
            ),
            _ => "only state.get(...) calls are allowed".to_string(),
        };
        return Err(ConditionCause::disallowed(message));
    }

    if !(1..=2).contains(&args.len()) {
        return Err(ConditionCause::disallowed(format!(
            "state.get expects 1 or 2 arguments, got {}",
            args.len()
        )));
    }

    let mut literals = args.iter().map(constant);
    let key = literals.next().flatten();
    let default = literals.next().unwrap_or(Some(Literal::Null));
    match (key, default) {
        (Some(key), Some(default)) => Ok(Node::Get { key, default }),
        _ => Err(ConditionCause::disallowed(
            "arguments to state.get(...) must be constants",
        )),
    }
}

fn is_state(expr: &Expr) -> bool {
    matches!(expr, Expr::Name(name) if name == STATE_VAR)
}

/// A literal, or a sign applied to a numeric literal
fn constant(expr: &Expr) -> Option<Literal> {
    match expr {
        Expr::Literal(literal) => Some(literal.clone()),
        Expr::Unary {
            op: UnaryOp::Pos,
            operand,
        } => match constant(operand)? {
            number @ (Literal::Int(_) | Literal::Float(_)) => Some(number),
            _ => None,
        },
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match constant(operand)? {
            Literal::Int(n) => Some(
                n.checked_neg()
                    .map(Literal::Int)
                    .unwrap_or(Literal::Float(-(n as f64))),
            ),
            Literal::Float(n) => Some(Literal::Float(-n)),
            _ => None,
        },
        _ => None,
    }
}

fn arith(op: BinaryOp) -> Result<Arith, ConditionCause> {
    match op {
        BinaryOp::Add => Ok(Arith::Add),
        BinaryOp::Sub => Ok(Arith::Sub),
        BinaryOp::Mul => Ok(Arith::Mul),
        BinaryOp::Div => Ok(Arith::Div),
        BinaryOp::Mod => Ok(Arith::Mod),
        BinaryOp::Pow => Ok(Arith::Pow),
        BinaryOp::FloorDiv => Err(ConditionCause::disallowed(format!(
            "binary operator '{}' is not allowed",
            op
        ))),
    }
}

fn cmp(op: CompareOp) -> Result<Cmp, ConditionCause> {
    match op {
        CompareOp::Eq => Ok(Cmp::Eq),
        CompareOp::NotEq => Ok(Cmp::Ne),
        CompareOp::Lt => Ok(Cmp::Lt),
        CompareOp::Lte => Ok(Cmp::Le),
        CompareOp::Gt => Ok(Cmp::Gt),
        CompareOp::Gte => Ok(Cmp::Ge),
        CompareOp::In | CompareOp::NotIn | CompareOp::Is | CompareOp::IsNot => Err(
            ConditionCause::disallowed(format!("comparison operator '{}' is not allowed", op)),
        ),
    }
}
