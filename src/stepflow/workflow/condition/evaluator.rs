//! Condition expression evaluator
//!
//! Only ever sees trees that passed validation. Everything here is pure
//! computation over literals and reads of the state map.

use std::borrow::Cow;
use std::cmp::Ordering;

use super::ast::Literal;
use super::error::ConditionCause;
use super::validator::{Arith, Cmp, Node};
use super::value::{Number, Operand};
use crate::stepflow::workflow::state::WorkflowState;

type EvalResult<'a> = Result<Operand<'a>, ConditionCause>;

pub(super) fn evaluate_node<'a>(node: &'a Node, state: &'a WorkflowState) -> EvalResult<'a> {
    match node {
        Node::Literal(literal) => Ok(Operand::from_literal(literal)),
        Node::State => Ok(Operand::Map(state.as_map())),
        Node::Lookup(key) => lookup(key, state),
        Node::Get { key, default } => Ok(match key {
            Literal::String(k) => state.get(k).map(Operand::from_json),
            _ => None,
        }
        .unwrap_or_else(|| Operand::from_literal(default))),
        Node::Not(inner) => Ok(Operand::Bool(!evaluate_node(inner, state)?.truthy())),
        Node::Neg(inner) => negate(evaluate_node(inner, state)?),
        Node::Pos(inner) => {
            let value = evaluate_node(inner, state)?;
            match value.as_number() {
                Some(Number::Int(n)) => Ok(Operand::Int(n)),
                Some(Number::Float(n)) => Ok(Operand::Float(n)),
                None => Err(ConditionCause::evaluation(format!(
                    "bad operand type for unary +: '{}'",
                    value.type_name()
                ))),
            }
        }
        Node::Arith { op, left, right } => {
            let left = evaluate_node(left, state)?;
            let right = evaluate_node(right, state)?;
            arithmetic(*op, left, right)
        }
        Node::And(values) => {
            let mut last = Operand::Bool(true);
            for value in values {
                last = evaluate_node(value, state)?;
                if !last.truthy() {
                    break;
                }
            }
            Ok(last)
        }
        Node::Or(values) => {
            let mut last = Operand::Bool(false);
            for value in values {
                last = evaluate_node(value, state)?;
                if last.truthy() {
                    break;
                }
            }
            Ok(last)
        }
        Node::Compare { left, rest } => {
            let mut left = evaluate_node(left, state)?;
            for (op, comparator) in rest {
                let right = evaluate_node(comparator, state)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Operand::Bool(false));
                }
                left = right;
            }
            Ok(Operand::Bool(true))
        }
    }
}

fn lookup<'a>(key: &Literal, state: &'a WorkflowState) -> EvalResult<'a> {
    let found = match key {
        Literal::String(k) => state.get(k),
        _ => None,
    };
    found
        .map(Operand::from_json)
        .ok_or_else(|| ConditionCause::evaluation(format!("key {} not found in state", key)))
}

fn negate(value: Operand<'_>) -> EvalResult<'static> {
    match value.as_number() {
        Some(Number::Int(n)) => Ok(n
            .checked_neg()
            .map(Operand::Int)
            .unwrap_or(Operand::Float(-(n as f64)))),
        Some(Number::Float(n)) => Ok(Operand::Float(-n)),
        None => Err(ConditionCause::evaluation(format!(
            "bad operand type for unary -: '{}'",
            value.type_name()
        ))),
    }
}

fn arithmetic<'a>(op: Arith, left: Operand<'a>, right: Operand<'a>) -> EvalResult<'a> {
    if op == Arith::Add {
        match (&left, &right) {
            (Operand::Str(a), Operand::Str(b)) => {
                return Ok(Operand::Str(Cow::Owned(format!("{}{}", a, b))));
            }
            (Operand::List(a), Operand::List(b)) => {
                return Ok(Operand::List(a.iter().chain(b.iter()).cloned().collect()));
            }
            _ => {}
        }
    }

    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(ConditionCause::evaluation(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            symbol(op),
            left.type_name(),
            right.type_name()
        )));
    };

    match op {
        Arith::Add => Ok(int_or_float(a, b, i64::checked_add, |x, y| x + y)),
        Arith::Sub => Ok(int_or_float(a, b, i64::checked_sub, |x, y| x - y)),
        Arith::Mul => Ok(int_or_float(a, b, i64::checked_mul, |x, y| x * y)),
        Arith::Div => {
            if b.as_f64() == 0.0 {
                return Err(ConditionCause::evaluation("division by zero"));
            }
            Ok(Operand::Float(a.as_f64() / b.as_f64()))
        }
        Arith::Mod => modulo(a, b),
        Arith::Pow => power(a, b),
    }
}

fn int_or_float(
    a: Number,
    b: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Operand<'static> {
    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        if let Some(result) = int_op(x, y) {
            return Operand::Int(result);
        }
    }
    Operand::Float(float_op(a.as_f64(), b.as_f64()))
}

/// Modulo whose result takes the sign of the divisor
fn modulo(a: Number, b: Number) -> EvalResult<'static> {
    if b.as_f64() == 0.0 {
        return Err(ConditionCause::evaluation("modulo by zero"));
    }
    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        if let Some(r) = x.checked_rem(y) {
            let r = if r != 0 && (r < 0) != (y < 0) { r + y } else { r };
            return Ok(Operand::Int(r));
        }
    }
    let (x, y) = (a.as_f64(), b.as_f64());
    let r = x % y;
    let r = if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r };
    Ok(Operand::Float(r))
}

fn power(a: Number, b: Number) -> EvalResult<'static> {
    if let (Number::Int(base), Number::Int(exp)) = (a, b) {
        if exp >= 0 {
            if let Some(result) = u32::try_from(exp).ok().and_then(|e| base.checked_pow(e)) {
                return Ok(Operand::Int(result));
            }
        } else if base == 0 {
            return Err(ConditionCause::evaluation(
                "0.0 cannot be raised to a negative power",
            ));
        }
    }
    let (x, y) = (a.as_f64(), b.as_f64());
    if x == 0.0 && y < 0.0 {
        return Err(ConditionCause::evaluation(
            "0.0 cannot be raised to a negative power",
        ));
    }
    let result = x.powf(y);
    if result.is_nan() && !x.is_nan() && !y.is_nan() {
        return Err(ConditionCause::evaluation(format!(
            "{} ** {} is not a real number",
            x, y
        )));
    }
    Ok(Operand::Float(result))
}

fn compare(op: Cmp, left: &Operand<'_>, right: &Operand<'_>) -> Result<bool, ConditionCause> {
    let ordering = match op {
        Cmp::Eq => return Ok(left.loose_eq(right)),
        Cmp::Ne => return Ok(!left.loose_eq(right)),
        _ => left.order(right).ok_or_else(|| {
            ConditionCause::evaluation(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                cmp_symbol(op),
                left.type_name(),
                right.type_name()
            ))
        })?,
    };
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        Cmp::Lt => ordering == Ordering::Less,
        Cmp::Le => ordering != Ordering::Greater,
        Cmp::Gt => ordering == Ordering::Greater,
        Cmp::Ge => ordering != Ordering::Less,
        Cmp::Eq | Cmp::Ne => unreachable!("equality handled above"),
    })
}

fn symbol(op: Arith) -> &'static str {
    match op {
        Arith::Add => "+",
        Arith::Sub => "-",
        Arith::Mul => "*",
        Arith::Div => "/",
        Arith::Mod => "%",
        Arith::Pow => "**",
    }
}

fn cmp_symbol(op: Cmp) -> &'static str {
    match op {
        Cmp::Eq => "==",
        Cmp::Ne => "!=",
        Cmp::Lt => "<",
        Cmp::Le => "<=",
        Cmp::Gt => ">",
        Cmp::Ge => ">=",
    }
}
