use thiserror::Error;

use crate::error::{CollaboratorError, ErrorKind};
use crate::eval::EvalError;
use crate::store::StoreError;
use crate::token::Span;
use crate::value::Value;

/// Failure raised while executing a loaded program.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error("Random generator '{name}' needs numeric bounds, got {min} and {max}")]
    RandomBounds { name: String, min: Value, max: Value },
    #[error("Random generator '{name}' has min {min} above max {max}")]
    EmptyRange { name: String, min: Value, max: Value },
    #[error("{source} in <{tag}> at {span}")]
    At {
        tag: &'static str,
        span: Span,
        #[source]
        source: Box<RuntimeError>,
    },
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Store(error) => error.kind(),
            RuntimeError::Eval(error) => error.kind(),
            RuntimeError::Collaborator(_) => ErrorKind::Collaborator,
            RuntimeError::RandomBounds { .. } => ErrorKind::TypeMismatch,
            RuntimeError::EmptyRange { .. } => ErrorKind::Attribute,
            RuntimeError::At { source, .. } => source.kind(),
        }
    }

    /// Collaborator failures stop the engine even inside the polling loop.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Collaborator
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            RuntimeError::At { span, .. } => Some(*span),
            _ => None,
        }
    }

    /// Attaches the failing tag's position unless an inner node already did.
    pub(crate) fn at(self, tag: &'static str, span: Span) -> Self {
        match self {
            located @ RuntimeError::At { .. } => located,
            error => RuntimeError::At {
                tag,
                span,
                source: Box::new(error),
            },
        }
    }
}
