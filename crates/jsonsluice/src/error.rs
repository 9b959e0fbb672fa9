use std::io;

use thiserror::Error;

use crate::{
    charset::{DecodeError, EncodeError},
    materialize::MaterializeError,
};

/// A malformed token or structure found by the [`JsonPipeline`].
///
/// [`JsonPipeline`]: crate::JsonPipeline
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("unexpected character '{}'", .0.escape_debug())]
    UnexpectedCharacter(char),
    #[error("unterminated string")]
    UnterminatedString,
    #[error("invalid escape sequence '\\{}'", .0.escape_debug())]
    InvalidEscape(char),
    #[error("invalid unicode escape \\u{0:04X}")]
    InvalidUnicodeEscape(u32),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("unexpected '{}' after the top-level value", .0.escape_debug())]
    TrailingData(char),
    #[error("expected a top-level array, found '{}'", .0.escape_debug())]
    ExpectedArray(char),
    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),
}

/// A [`SyntaxError`] together with the position of the offending character.
///
/// Lines and columns are 1-based.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} at {line}:{column}")]
pub struct ParserError {
    pub kind: SyntaxError,
    pub line: usize,
    pub column: usize,
}

/// Every way a conversion between bytes and typed values can fail.
///
/// Each of these aborts the conversion: owned resources are released and no
/// partial value is handed to the caller. A consumer cancelling a push-mode
/// session is not an error; it is reported as
/// [`SessionOutcome::Cancelled`](crate::SessionOutcome::Cancelled).
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("syntax error: {0}")]
    Syntax(ParserError),
    #[error("trailing data: {0}")]
    TrailingData(ParserError),
    #[error("type mismatch: {0}")]
    TypeMismatch(MaterializeError),
    #[error("serialization failed: {0}")]
    Serialize(MaterializeError),
}

impl ConvertError {
    /// The parser position, for syntax and trailing-data errors.
    #[must_use]
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            Self::Syntax(err) | Self::TrailingData(err) => Some((err.line, err.column)),
            _ => None,
        }
    }
}

impl From<ParserError> for ConvertError {
    fn from(err: ParserError) -> Self {
        match err.kind {
            SyntaxError::TrailingData(_) => Self::TrailingData(err),
            _ => Self::Syntax(err),
        }
    }
}
