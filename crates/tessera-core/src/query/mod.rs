//! Query parsing, binding and execution.
//!
//! A query is parsed once into an [`OperationDescriptor`], bound against
//! [`Params`](crate::params::Params) into a [`BoundOperation`], and handed to
//! a [`Backend`]. Immediate mode runs all three steps per call; a
//! [`PreparedStatement`] parses once and binds per execution.

mod condition;
mod descriptor;
mod error;
pub mod eval;
mod executor;
mod lexer;
mod parser;
mod prepared;

#[cfg(test)]
mod tests;

pub use condition::{ConditionNode, Connector, Operand, Operator};
pub use descriptor::{Assignment, BoundOperation, DataModel, OperationDescriptor, Target, Verb};
pub use error::QuerySyntaxError;
pub use executor::{
    Backend, IMMEDIATE_REJECT_PLACEHOLDERS, LiteralPolicy, PREPARED_ALLOW_LITERALS,
    PlaceholderPolicy, QueryOptions, QueryResult, QueryRunner, Record,
};
pub use lexer::{Keyword, Lexer, Position, Token, TokenKind};
pub use parser::{Parser, QueryParser, StandardParser};
pub use prepared::{PreparedStatement, StatementState};
