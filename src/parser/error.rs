use thiserror::Error;

use crate::error::ErrorKind;
use crate::lexer::LexError;
use crate::parser::attrs::AttrError;
use crate::token::Span;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("Malformed tag: {message} at {span}")]
    MalformedTag { message: String, span: Span },
    #[error("Malformed tag: {source} at {span}")]
    MalformedAttributes {
        #[source]
        source: AttrError,
        span: Span,
    },
    #[error("Unknown tag '<{tag}>' at {span}")]
    UnknownTag { tag: String, span: Span },
    #[error("Unresolved reference '{name}' in '<{tag}>' at {span}")]
    UnresolvedReference {
        tag: String,
        name: String,
        span: Span,
    },
    #[error("Name '{name}' is already declared, redeclared at {span}")]
    DuplicateName { name: String, span: Span },
    #[error("Missing attribute '{attribute}' on '<{tag}>' at {span}")]
    MissingAttribute {
        tag: String,
        attribute: String,
        span: Span,
    },
    #[error("Unexpected attribute '{attribute}' on '<{tag}>' at {span}")]
    UnexpectedAttribute {
        tag: String,
        attribute: String,
        span: Span,
    },
    #[error("Invalid attribute '{attribute}' on '<{tag}>': {message} at {span}")]
    InvalidAttribute {
        tag: String,
        attribute: String,
        message: String,
        span: Span,
    },
    #[error("Invalid expression in '<{tag}>': {message} at {span}")]
    InvalidExpression {
        tag: String,
        message: String,
        span: Span,
    },
    #[error("Closing tag '</{tag}>' without a matching block at {span}")]
    UnmatchedCloseTag { tag: String, span: Span },
    #[error("Block '<{tag}>' opened at {span} is never closed")]
    UnclosedBlock { tag: String, span: Span },
    #[error("'<{tag}>' is not allowed here: {message} at {span}")]
    Misplaced {
        tag: String,
        message: String,
        span: Span,
    },
    #[error("'<{tag}>' can never run because it follows a forever block at {span}")]
    UnreachableAfterForever { tag: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Lex(error) => error.span(),
            ParseError::MalformedTag { span, .. }
            | ParseError::MalformedAttributes { span, .. }
            | ParseError::UnknownTag { span, .. }
            | ParseError::UnresolvedReference { span, .. }
            | ParseError::DuplicateName { span, .. }
            | ParseError::MissingAttribute { span, .. }
            | ParseError::UnexpectedAttribute { span, .. }
            | ParseError::InvalidAttribute { span, .. }
            | ParseError::InvalidExpression { span, .. }
            | ParseError::UnmatchedCloseTag { span, .. }
            | ParseError::UnclosedBlock { span, .. }
            | ParseError::Misplaced { span, .. }
            | ParseError::UnreachableAfterForever { span, .. } => *span,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::DuplicateName { .. } => ErrorKind::DuplicateName,
            ParseError::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            ParseError::MissingAttribute { .. }
            | ParseError::UnexpectedAttribute { .. }
            | ParseError::InvalidAttribute { .. } => ErrorKind::Attribute,
            _ => ErrorKind::Parse,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
