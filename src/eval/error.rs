use thiserror::Error;

use crate::error::{CollaboratorError, ErrorKind};
use crate::value::ValueError;

use super::function::Arity;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("Invalid expression: {message} at offset {offset}")]
    Syntax { message: String, offset: usize },
    #[error("Function '{function}' takes {expected}, got {found}")]
    Arity {
        function: &'static str,
        expected: Arity,
        found: usize,
    },
    #[error("Unresolved reference '{name}'")]
    UnresolvedReference { name: String },
    #[error("Unknown variable '{name}'")]
    UnknownVariable { name: String },
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl EvalError {
    pub(crate) fn syntax(message: impl Into<String>, offset: usize) -> Self {
        EvalError::Syntax {
            message: message.into(),
            offset,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Syntax { .. } | EvalError::Arity { .. } => ErrorKind::Parse,
            EvalError::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            EvalError::UnknownVariable { .. } => ErrorKind::UnknownVariable,
            EvalError::Value(ValueError::TypeMismatch { .. })
            | EvalError::Value(ValueError::UnsupportedOperand { .. })
            | EvalError::Value(ValueError::Conversion { .. }) => ErrorKind::TypeMismatch,
            EvalError::Value(ValueError::DivisionByZero { .. })
            | EvalError::Value(ValueError::Overflow { .. })
            | EvalError::Value(ValueError::Domain { .. }) => ErrorKind::Arithmetic,
            EvalError::Collaborator(_) => ErrorKind::Collaborator,
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
