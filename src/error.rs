use std::fmt;

use thiserror::Error;

/// Coarse classification shared by load-time and run-time errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    DuplicateName,
    UnresolvedReference,
    TypeMismatch,
    Arithmetic,
    Attribute,
    UnknownVariable,
    Collaborator,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Parse => "ParseError",
            ErrorKind::DuplicateName => "DuplicateNameError",
            ErrorKind::UnresolvedReference => "UnresolvedReferenceError",
            ErrorKind::TypeMismatch => "TypeMismatchError",
            ErrorKind::Arithmetic => "ArithmeticError",
            ErrorKind::Attribute => "AttributeError",
            ErrorKind::UnknownVariable => "UnknownVariableError",
            ErrorKind::Collaborator => "CollaboratorError",
        };
        f.write_str(name)
    }
}

/// Failure reported by the widget toolkit or the console.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("Unknown widget handle {handle}")]
    UnknownHandle { handle: usize },
    #[error("Unknown widget '{name}'")]
    UnknownWidget { name: String },
    #[error("Widget '{widget}' has no property '{property}'")]
    UnknownProperty { widget: String, property: String },
    #[error("Widget '{widget}' was destroyed")]
    Destroyed { widget: String },
    #[error("Console input exhausted while reading '{prompt}'")]
    InputExhausted { prompt: String },
    #[error("Console I/O failed: {message}")]
    Io { message: String },
}

impl From<std::io::Error> for CollaboratorError {
    fn from(error: std::io::Error) -> Self {
        CollaboratorError::Io {
            message: error.to_string(),
        }
    }
}
