use crate::query::lexer::{Position, Token};
use thiserror::Error as ThisError;

///
/// QuerySyntaxError
///
/// Lexical or grammatical violation at a precise position. `found` is the
/// offending token text; `expected` is a human-readable expectation.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("syntax error at {position}: expected {expected}, found {found}")]
pub struct QuerySyntaxError {
    pub position: Position,
    pub found: String,
    pub expected: String,
}

impl QuerySyntaxError {
    pub fn new(position: Position, found: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            position,
            found: found.into(),
            expected: expected.into(),
        }
    }

    pub(crate) fn unexpected(token: &Token, expected: impl Into<String>) -> Self {
        Self::new(token.position, token.kind.to_string(), expected)
    }
}
