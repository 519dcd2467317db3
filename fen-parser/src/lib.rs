use thiserror::Error;

// Modular parser structure
mod parser;
pub use parser::Parser;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{message}")]
    SyntaxError {
        message: String,
        span: std::ops::Range<usize>,
    },
    #[error("{message}")]
    LexerError {
        message: String,
        span: std::ops::Range<usize>,
    },
}

impl ParseError {
    pub fn span(&self) -> std::ops::Range<usize> {
        match self {
            ParseError::SyntaxError { span, .. } => span.clone(),
            ParseError::LexerError { span, .. } => span.clone(),
        }
    }
}
