use thiserror::Error;

use crate::token::Span;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unterminated tag starting at {span}")]
    UnterminatedTag { span: Span },
    #[error("Unterminated attribute string in tag starting at {span}")]
    UnterminatedString { span: Span },
    #[error("Empty tag at {span}")]
    EmptyTag { span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnterminatedTag { span }
            | LexError::UnterminatedString { span }
            | LexError::EmptyTag { span } => *span,
        }
    }
}

pub type LexResult<T> = Result<T, LexError>;
