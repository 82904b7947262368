use cascara_core::EngineError;
use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("Unexpected token at {line}:{column}: expected {expected}, found {found}")]
    UnexpectedToken {
        line: u32,
        column: u32,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of file at {line}:{column}")]
    UnexpectedEof { line: u32, column: u32 },

    #[error("Invalid syntax at {line}:{column}: {message}")]
    InvalidSyntax {
        line: u32,
        column: u32,
        message: String,
    },

    #[error("Lexer error at {line}:{column}")]
    LexerError { line: u32, column: u32 },

    #[error(transparent)]
    Broadcast(#[from] EngineError),
}

impl ParseError {
    pub fn unexpected_token(
        line: u32,
        column: u32,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::UnexpectedToken {
            line,
            column,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unexpected_eof(line: u32, column: u32) -> Self {
        Self::UnexpectedEof { line, column }
    }

    pub fn invalid_syntax(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn lexer_error(line: u32, column: u32) -> Self {
        Self::LexerError { line, column }
    }
}
