use thiserror::Error;

/// A guard expression that could not be turned into a boolean.
///
/// Syntax errors, sandbox violations and runtime failures all surface as
/// this one type; `cause` says which.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid or unsafe condition: {expression}. Error: {cause}")]
pub struct ConditionError {
    pub expression: String,
    pub cause: ConditionCause,
}

/// Why a condition failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionCause {
    /// The text does not match the grammar
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// The text parses but uses a construct outside the allow-list
    #[error("{0}")]
    Disallowed(String),

    /// The expression is allowed but failed against this state
    #[error("{0}")]
    Evaluation(String),
}

impl ConditionCause {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn disallowed(message: impl Into<String>) -> Self {
        Self::Disallowed(message.into())
    }

    pub(crate) fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }

    /// Attach the offending expression text
    pub(crate) fn with_expression(self, expression: &str) -> ConditionError {
        ConditionError {
            expression: expression.to_string(),
            cause: self,
        }
    }
}
