//! Runtime values produced while evaluating a condition

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

use super::ast::Literal;

/// An intermediate value during evaluation.
///
/// Strings, lists and maps borrow from the state or the condition tree;
/// only results of `+` own their data.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Operand<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Cow<'a, str>),
    List(Cow<'a, [Value]>),
    Map(&'a Map<String, Value>),
}

/// Numeric view of an operand; booleans count as 0 and 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(n) => n,
        }
    }
}

impl<'a> Operand<'a> {
    pub fn from_json(value: &'a Value) -> Self {
        match value {
            Value::Null => Operand::Null,
            Value::Bool(b) => Operand::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Operand::Int(i),
                None => Operand::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Operand::Str(Cow::Borrowed(s)),
            Value::Array(items) => Operand::List(Cow::Borrowed(items)),
            Value::Object(map) => Operand::Map(map),
        }
    }

    pub fn from_literal(literal: &'a Literal) -> Self {
        match literal {
            Literal::Null => Operand::Null,
            Literal::Boolean(b) => Operand::Bool(*b),
            Literal::Int(n) => Operand::Int(*n),
            Literal::Float(n) => Operand::Float(*n),
            Literal::String(s) => Operand::Str(Cow::Borrowed(s)),
        }
    }

    /// Truthiness: empty, zero, false and null are false
    pub fn truthy(&self) -> bool {
        match self {
            Operand::Null => false,
            Operand::Bool(b) => *b,
            Operand::Int(n) => *n != 0,
            Operand::Float(n) => *n != 0.0,
            Operand::Str(s) => !s.is_empty(),
            Operand::List(items) => !items.is_empty(),
            Operand::Map(map) => !map.is_empty(),
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Operand::Bool(b) => Some(Number::Int(i64::from(*b))),
            Operand::Int(n) => Some(Number::Int(*n)),
            Operand::Float(n) => Some(Number::Float(*n)),
            _ => None,
        }
    }

    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Operand::Null => "NoneType",
            Operand::Bool(_) => "bool",
            Operand::Int(_) => "int",
            Operand::Float(_) => "float",
            Operand::Str(_) => "str",
            Operand::List(_) => "list",
            Operand::Map(_) => "dict",
        }
    }

    /// Equality with numeric coercion across int, float and bool
    pub fn loose_eq(&self, other: &Operand<'_>) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return match (a, b) {
                (Number::Int(a), Number::Int(b)) => a == b,
                (a, b) => a.as_f64() == b.as_f64(),
            };
        }
        match (self, other) {
            (Operand::Null, Operand::Null) => true,
            (Operand::Str(a), Operand::Str(b)) => a == b,
            (Operand::List(a), Operand::List(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| Operand::from_json(x).loose_eq(&Operand::from_json(y)))
            }
            (Operand::Map(a), Operand::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, x)| {
                        b.get(k).is_some_and(|y| {
                            Operand::from_json(x).loose_eq(&Operand::from_json(y))
                        })
                    })
            }
            _ => false,
        }
    }

    /// Ordering between comparable operands; `None` when the kinds cannot
    /// be ordered. NaN compares as unordered-but-comparable (`Some(None)`).
    pub fn order(&self, other: &Operand<'_>) -> Option<Option<Ordering>> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Some(match (a, b) {
                (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
                (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
            });
        }
        match (self, other) {
            (Operand::Str(a), Operand::Str(b)) => Some(Some(a.cmp(b))),
            (Operand::List(a), Operand::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let (x, y) = (Operand::from_json(x), Operand::from_json(y));
                    if x.loose_eq(&y) {
                        continue;
                    }
                    return x.order(&y);
                }
                Some(Some(a.len().cmp(&b.len())))
            }
            _ => None,
        }
    }
}
