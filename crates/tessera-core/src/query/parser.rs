//! Recursive-descent parser for the query grammar.
//!
//! Key-value family:
//!
//! ```text
//! put <key> <value> | get <key> | del <key>
//! ```
//!
//! Document/column family:
//!
//! ```text
//! select [* from | f1, f2 from] <target> [where <cond>]
//!        [order by f [asc|desc], ...] [skip n] [limit n]
//! insert [into] <target> set f = v, ... [where <cond>]
//! update <target> set f = v, ... [where <cond>]
//! delete [from] <target> [where <cond>]
//! ```
//!
//! Condition precedence, highest first: parentheses, `NOT`, comparison,
//! `AND`, `OR`. Chains of the same connector flatten into one composite in
//! source order; parenthesized groups stay nested.

use crate::{
    error::Error,
    query::{
        QuerySyntaxError,
        condition::{ConditionNode, Connector, Operand, Operator},
        descriptor::{Assignment, DataModel, OperationDescriptor, Target, Verb},
        lexer::{Keyword, Lexer, Token, TokenKind},
    },
    sort::{Direction, Sort, SortList},
    value::Value,
};

///
/// QueryParser
///
/// Grammar extension point. A backend may contribute its own dialect;
/// [`StandardParser`] handles every data model otherwise.
///

pub trait QueryParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        0
    }

    fn supports(&self, model: DataModel) -> bool;

    fn parse(&self, text: &str, model: DataModel) -> Result<OperationDescriptor, Error>;
}

///
/// StandardParser
///

#[derive(Clone, Copy, Debug, Default)]
pub struct StandardParser;

impl QueryParser for StandardParser {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn supports(&self, _model: DataModel) -> bool {
        true
    }

    fn parse(&self, text: &str, model: DataModel) -> Result<OperationDescriptor, Error> {
        Ok(Parser::parse(text, model)?)
    }
}

///
/// Parser
///

pub struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    model: DataModel,
}

impl Parser {
    /// Parse one complete statement for `model`.
    pub fn parse(text: &str, model: DataModel) -> Result<OperationDescriptor, QuerySyntaxError> {
        let mut parser = Self {
            tokens: Lexer::tokenize(text)?,
            cursor: 0,
            model,
        };

        let descriptor = parser.parse_statement()?;
        parser.expect_eof()?;

        Ok(descriptor)
    }

    ///
    /// TOKENS
    ///

    fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    // The stream always ends with Eof, which is returned for any overrun.
    fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.cursor + n).min(last)]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.cursor += 1;
        }

        token
    }

    fn next_is(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.next();
            true
        } else {
            false
        }
    }

    fn next_is_keyword(&mut self, keyword: Keyword) -> bool {
        self.next_is(&TokenKind::Keyword(keyword))
    }

    fn next_if_map<T>(&mut self, f: impl Fn(&TokenKind) -> Option<T>) -> Option<T> {
        let value = f(&self.peek().kind)?;
        self.next();

        Some(value)
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<(), QuerySyntaxError> {
        if self.next_is(kind) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), QuerySyntaxError> {
        self.expect(&TokenKind::Keyword(keyword), keyword.as_str())
    }

    fn expect_eof(&self) -> Result<(), QuerySyntaxError> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    fn unexpected(&self, expected: &str) -> QuerySyntaxError {
        QuerySyntaxError::unexpected(self.peek(), expected)
    }

    fn next_ident(&mut self, expected: &str) -> Result<String, QuerySyntaxError> {
        self.next_if_map(|kind| match kind {
            TokenKind::Ident(name) => Some(name.clone()),
            _ => None,
        })
        .ok_or_else(|| self.unexpected(expected))
    }

    ///
    /// STATEMENTS
    ///

    fn parse_statement(&mut self) -> Result<OperationDescriptor, QuerySyntaxError> {
        match self.model {
            DataModel::KeyValue => self.parse_key_value(),
            DataModel::Document | DataModel::Column => self.parse_document(),
        }
    }

    fn parse_key_value(&mut self) -> Result<OperationDescriptor, QuerySyntaxError> {
        let verb = self
            .next_if_map(|kind| match kind {
                TokenKind::Keyword(Keyword::Put) => Some(Verb::Put),
                TokenKind::Keyword(Keyword::Get) => Some(Verb::Get),
                TokenKind::Keyword(Keyword::Del) => Some(Verb::Del),
                _ => None,
            })
            .ok_or_else(|| self.unexpected("put, get or del"))?;

        let key = self.parse_kv_operand("key")?;
        let mut descriptor = OperationDescriptor::new(verb, self.model, Target::Key(key));
        if verb == Verb::Put {
            descriptor.value = Some(self.parse_kv_operand("value")?);
        }

        Ok(descriptor)
    }

    // Key-value operands also accept barewords as text.
    fn parse_kv_operand(&mut self, expected: &str) -> Result<Operand, QuerySyntaxError> {
        if let Some(word) = self.next_if_map(|kind| match kind {
            TokenKind::Ident(word) => Some(word.clone()),
            _ => None,
        }) {
            return Ok(Operand::Value(Value::Text(word)));
        }

        self.parse_scalar_operand(expected)
    }

    fn parse_document(&mut self) -> Result<OperationDescriptor, QuerySyntaxError> {
        let verb = self
            .next_if_map(|kind| match kind {
                TokenKind::Keyword(Keyword::Select) => Some(Verb::Select),
                TokenKind::Keyword(Keyword::Insert) => Some(Verb::Insert),
                TokenKind::Keyword(Keyword::Update) => Some(Verb::Update),
                TokenKind::Keyword(Keyword::Delete) => Some(Verb::Delete),
                _ => None,
            })
            .ok_or_else(|| self.unexpected("select, insert, update or delete"))?;

        match verb {
            Verb::Select => self.parse_select(),
            Verb::Insert => {
                self.skip_noise(Keyword::Into);
                let target = self.parse_target()?;
                let mut descriptor = OperationDescriptor::new(verb, self.model, target);
                descriptor.assignments = self.parse_set_clause()?;
                descriptor.condition = self.parse_where()?;
                Ok(descriptor)
            }
            Verb::Update => {
                let target = self.parse_target()?;
                let mut descriptor = OperationDescriptor::new(verb, self.model, target);
                descriptor.assignments = self.parse_set_clause()?;
                descriptor.condition = self.parse_where()?;
                Ok(descriptor)
            }
            _ => {
                self.skip_noise(Keyword::From);
                let target = self.parse_target()?;
                let mut descriptor = OperationDescriptor::new(verb, self.model, target);
                descriptor.condition = self.parse_where()?;
                Ok(descriptor)
            }
        }
    }

    fn parse_select(&mut self) -> Result<OperationDescriptor, QuerySyntaxError> {
        let projection = self.parse_projection()?;
        let target = self.parse_target()?;

        let mut descriptor = OperationDescriptor::new(Verb::Select, self.model, target);
        descriptor.projection = projection;
        descriptor.condition = self.parse_where()?;
        descriptor.sort = self.parse_order_by()?;
        if self.next_is_keyword(Keyword::Skip) {
            descriptor.skip = Some(self.parse_count("skip count")?);
        }
        if self.next_is_keyword(Keyword::Limit) {
            descriptor.limit = Some(self.parse_count("limit count")?);
        }

        Ok(descriptor)
    }

    // `*` and field lists must be followed by FROM; a lone FROM is noise
    // only when an identifier follows it.
    fn parse_projection(&mut self) -> Result<Vec<String>, QuerySyntaxError> {
        if self.next_is(&TokenKind::Star) {
            self.expect_keyword(Keyword::From)?;
            return Ok(Vec::new());
        }

        let is_field_list = matches!(self.peek().kind, TokenKind::Ident(_))
            && matches!(
                self.peek_nth(1).kind,
                TokenKind::Comma | TokenKind::Keyword(Keyword::From)
            );
        if is_field_list {
            let mut fields = vec![self.next_ident("field name")?];
            while self.next_is(&TokenKind::Comma) {
                fields.push(self.next_ident("field name")?);
            }
            self.expect_keyword(Keyword::From)?;
            return Ok(fields);
        }

        self.skip_noise(Keyword::From);

        Ok(Vec::new())
    }

    fn skip_noise(&mut self, keyword: Keyword) {
        if self.peek().kind == TokenKind::Keyword(keyword)
            && matches!(self.peek_nth(1).kind, TokenKind::Ident(_))
        {
            self.next();
        }
    }

    // A noise word left unconsumed names the target itself.
    fn parse_target(&mut self) -> Result<Target, QuerySyntaxError> {
        self.next_if_map(|kind| match kind {
            TokenKind::Ident(name) => Some(Target::Entity(name.clone())),
            TokenKind::Keyword(k @ (Keyword::From | Keyword::Into)) => {
                Some(Target::Entity(k.as_str().to_ascii_lowercase()))
            }
            _ => None,
        })
        .ok_or_else(|| self.unexpected("target name"))
    }

    fn parse_set_clause(&mut self) -> Result<Vec<Assignment>, QuerySyntaxError> {
        self.expect_keyword(Keyword::Set)?;

        let mut assignments = vec![self.parse_assignment()?];
        while self.next_is(&TokenKind::Comma) {
            assignments.push(self.parse_assignment()?);
        }

        Ok(assignments)
    }

    fn parse_assignment(&mut self) -> Result<Assignment, QuerySyntaxError> {
        let field = self.next_ident("field name")?;
        self.expect(&TokenKind::Eq, "'='")?;
        let value = if self.peek().kind == TokenKind::LParen {
            self.parse_operand_list()?
        } else {
            self.parse_scalar_operand("value or placeholder")?
        };

        Ok(Assignment { field, value })
    }

    fn parse_where(&mut self) -> Result<Option<ConditionNode>, QuerySyntaxError> {
        if !self.next_is_keyword(Keyword::Where) {
            return Ok(None);
        }

        self.parse_or().map(Some)
    }

    fn parse_order_by(&mut self) -> Result<Option<SortList>, QuerySyntaxError> {
        if !self.next_is_keyword(Keyword::Order) {
            return Ok(None);
        }
        self.expect_keyword(Keyword::By)?;

        let mut sorts = SortList::new();
        loop {
            let field = self.next_ident("sort field")?;
            let direction = self
                .next_if_map(|kind| match kind {
                    TokenKind::Keyword(Keyword::Asc) => Some(Direction::Asc),
                    TokenKind::Keyword(Keyword::Desc) => Some(Direction::Desc),
                    _ => None,
                })
                .unwrap_or_default();
            sorts.add(Sort::new(field, direction));

            if !self.next_is(&TokenKind::Comma) {
                return Ok(Some(sorts));
            }
        }
    }

    fn parse_count(&mut self, expected: &str) -> Result<u64, QuerySyntaxError> {
        self.next_if_map(|kind| match kind {
            TokenKind::Int(v) => u64::try_from(*v).ok(),
            TokenKind::Uint(v) => Some(*v),
            _ => None,
        })
        .ok_or_else(|| self.unexpected(expected))
    }

    ///
    /// CONDITIONS
    ///

    fn parse_or(&mut self) -> Result<ConditionNode, QuerySyntaxError> {
        let mut children = vec![self.parse_and()?];
        while self.next_is_keyword(Keyword::Or) {
            children.push(self.parse_and()?);
        }

        Ok(flatten(children, Connector::Or))
    }

    fn parse_and(&mut self) -> Result<ConditionNode, QuerySyntaxError> {
        let mut children = vec![self.parse_not()?];
        while self.next_is_keyword(Keyword::And) {
            children.push(self.parse_not()?);
        }

        Ok(flatten(children, Connector::And))
    }

    fn parse_not(&mut self) -> Result<ConditionNode, QuerySyntaxError> {
        if self.next_is_keyword(Keyword::Not) {
            return Ok(ConditionNode::negate(self.parse_not()?));
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<ConditionNode, QuerySyntaxError> {
        if self.next_is(&TokenKind::LParen) {
            let inner = self.parse_or()?;
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(inner);
        }

        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<ConditionNode, QuerySyntaxError> {
        let field = self.next_ident("field name")?;

        let simple = self.next_if_map(|kind| match kind {
            TokenKind::Eq => Some(Operator::Eq),
            TokenKind::NotEq => Some(Operator::NotEq),
            TokenKind::Gt => Some(Operator::Gt),
            TokenKind::GtEq => Some(Operator::Gte),
            TokenKind::Lt => Some(Operator::Lt),
            TokenKind::LtEq => Some(Operator::Lte),
            _ => None,
        });
        if let Some(operator) = simple {
            let operand = self.parse_scalar_operand("value or placeholder")?;
            return Ok(ConditionNode::leaf(field, operator, operand));
        }

        let negated = self.next_is_keyword(Keyword::Not);
        let leaf = if self.next_is_keyword(Keyword::Between) {
            let low = self.parse_scalar_operand("lower bound")?;
            self.expect_keyword(Keyword::And)?;
            let high = self.parse_scalar_operand("upper bound")?;
            ConditionNode::leaf(field, Operator::Between, Operand::List(vec![low, high]))
        } else if self.next_is_keyword(Keyword::In) {
            if self.peek().kind != TokenKind::LParen {
                return Err(self.unexpected("'('"));
            }
            ConditionNode::leaf(field, Operator::In, self.parse_operand_list()?)
        } else if self.next_is_keyword(Keyword::Like) {
            let pattern = self.parse_scalar_operand("pattern or placeholder")?;
            ConditionNode::leaf(field, Operator::Like, pattern)
        } else if negated {
            return Err(self.unexpected("BETWEEN, IN or LIKE"));
        } else {
            return Err(self.unexpected("comparison operator"));
        };

        Ok(if negated {
            ConditionNode::negate(leaf)
        } else {
            leaf
        })
    }

    ///
    /// OPERANDS
    ///

    fn parse_operand_list(&mut self) -> Result<Operand, QuerySyntaxError> {
        self.expect(&TokenKind::LParen, "'('")?;

        let mut items = vec![self.parse_scalar_operand("value or placeholder")?];
        while self.next_is(&TokenKind::Comma) {
            items.push(self.parse_scalar_operand("value or placeholder")?);
        }
        self.expect(&TokenKind::RParen, "')' or ','")?;

        Ok(Operand::List(items))
    }

    fn parse_scalar_operand(&mut self, expected: &str) -> Result<Operand, QuerySyntaxError> {
        if self.peek().kind == TokenKind::Minus {
            return self.parse_negative(expected);
        }

        self.next_if_map(|kind| match kind {
            TokenKind::Placeholder(name) => Some(Operand::Placeholder(name.clone())),
            TokenKind::String(s) => Some(Operand::Value(Value::Text(s.clone()))),
            TokenKind::Int(v) => Some(Operand::Value(Value::Int(*v))),
            TokenKind::Uint(v) => Some(Operand::Value(Value::Uint(*v))),
            TokenKind::Float(v) => Some(Operand::Value(Value::Float64(*v))),
            TokenKind::Keyword(Keyword::True) => Some(Operand::Value(Value::Bool(true))),
            TokenKind::Keyword(Keyword::False) => Some(Operand::Value(Value::Bool(false))),
            TokenKind::Keyword(Keyword::Null) => Some(Operand::Value(Value::Null)),
            _ => None,
        })
        .ok_or_else(|| self.unexpected(expected))
    }

    fn parse_negative(&mut self, expected: &str) -> Result<Operand, QuerySyntaxError> {
        let minus = self.next();
        let number = self.peek().clone();

        let value = match &number.kind {
            TokenKind::Int(v) => Some(Value::Int(-*v)),
            TokenKind::Uint(v) if *v == i64::MIN.unsigned_abs() => Some(Value::Int(i64::MIN)),
            TokenKind::Float(v) => Some(Value::float(-v.get())),
            _ => None,
        };

        match value {
            Some(value) => {
                self.next();
                Ok(Operand::Value(value))
            }
            None if matches!(number.kind, TokenKind::Uint(_)) => Err(QuerySyntaxError::new(
                minus.position,
                format!("-{}", number.kind),
                "integer within 64 bits",
            )),
            None => Err(QuerySyntaxError::unexpected(&number, expected)),
        }
    }
}

// A single child is returned as-is; otherwise one flat composite.
fn flatten(mut children: Vec<ConditionNode>, connector: Connector) -> ConditionNode {
    if children.len() == 1
        && let Some(only) = children.pop()
    {
        return only;
    }

    ConditionNode::Composite {
        connector,
        children,
    }
}
