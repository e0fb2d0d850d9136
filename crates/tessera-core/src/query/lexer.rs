//! Query tokenizer.
//!
//! Produces the full token stream up front, terminated by [`TokenKind::Eof`].
//! Every token carries the [`Position`] of its first character so syntax
//! errors can point at the exact failure location.

use crate::{
    params::PLACEHOLDER_SIGIL,
    query::QuerySyntaxError,
    value::Float64,
};
use std::{fmt, iter::Peekable, str::CharIndices};

///
/// Position
///
/// Byte offset plus 1-based line and column.
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    #[must_use]
    pub const fn start() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {} (offset {})",
            self.line, self.column, self.offset
        )
    }
}

///
/// Keyword
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Keyword {
    And,
    Asc,
    Between,
    By,
    Del,
    Delete,
    Desc,
    False,
    From,
    Get,
    In,
    Insert,
    Into,
    Like,
    Limit,
    Not,
    Null,
    Or,
    Order,
    Put,
    Select,
    Set,
    Skip,
    True,
    Update,
    Where,
}

impl Keyword {
    /// Case-insensitive keyword lookup.
    #[must_use]
    pub fn lookup(word: &str) -> Option<Self> {
        let keyword = match word.to_ascii_uppercase().as_str() {
            "AND" => Self::And,
            "ASC" => Self::Asc,
            "BETWEEN" => Self::Between,
            "BY" => Self::By,
            "DEL" => Self::Del,
            "DELETE" => Self::Delete,
            "DESC" => Self::Desc,
            "FALSE" => Self::False,
            "FROM" => Self::From,
            "GET" => Self::Get,
            "IN" => Self::In,
            "INSERT" => Self::Insert,
            "INTO" => Self::Into,
            "LIKE" => Self::Like,
            "LIMIT" => Self::Limit,
            "NOT" => Self::Not,
            "NULL" => Self::Null,
            "OR" => Self::Or,
            "ORDER" => Self::Order,
            "PUT" => Self::Put,
            "SELECT" => Self::Select,
            "SET" => Self::Set,
            "SKIP" => Self::Skip,
            "TRUE" => Self::True,
            "UPDATE" => Self::Update,
            "WHERE" => Self::Where,
            _ => return None,
        };

        Some(keyword)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Asc => "ASC",
            Self::Between => "BETWEEN",
            Self::By => "BY",
            Self::Del => "DEL",
            Self::Delete => "DELETE",
            Self::Desc => "DESC",
            Self::False => "FALSE",
            Self::From => "FROM",
            Self::Get => "GET",
            Self::In => "IN",
            Self::Insert => "INSERT",
            Self::Into => "INTO",
            Self::Like => "LIKE",
            Self::Limit => "LIMIT",
            Self::Not => "NOT",
            Self::Null => "NULL",
            Self::Or => "OR",
            Self::Order => "ORDER",
            Self::Put => "PUT",
            Self::Select => "SELECT",
            Self::Set => "SET",
            Self::Skip => "SKIP",
            Self::True => "TRUE",
            Self::Update => "UPDATE",
            Self::Where => "WHERE",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// TokenKind
///

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Comma,
    Eof,
    Eq,
    Float(Float64),
    Gt,
    GtEq,
    Ident(String),
    Int(i64),
    Keyword(Keyword),
    LParen,
    Lt,
    LtEq,
    Minus,
    NotEq,
    Placeholder(String),
    RParen,
    Star,
    String(String),
    Uint(u64),
}

impl From<Keyword> for TokenKind {
    fn from(keyword: Keyword) -> Self {
        Self::Keyword(keyword)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comma => f.write_str("','"),
            Self::Eof => f.write_str("end of input"),
            Self::Eq => f.write_str("'='"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Gt => f.write_str("'>'"),
            Self::GtEq => f.write_str("'>='"),
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Keyword(k) => write!(f, "keyword {k}"),
            Self::LParen => f.write_str("'('"),
            Self::Lt => f.write_str("'<'"),
            Self::LtEq => f.write_str("'<='"),
            Self::Minus => f.write_str("'-'"),
            Self::NotEq => f.write_str("'!='"),
            Self::Placeholder(name) => write!(f, "placeholder {PLACEHOLDER_SIGIL}{name}"),
            Self::RParen => f.write_str("')'"),
            Self::Star => f.write_str("'*'"),
            Self::String(s) => write!(f, "string {s:?}"),
            Self::Uint(v) => write!(f, "{v}"),
        }
    }
}

///
/// Token
///

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

///
/// Lexer
///

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Tokenize `input` completely.
    pub fn tokenize(input: &str) -> Result<Vec<Token>, QuerySyntaxError> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();

        loop {
            let token = lexer.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn position(&mut self) -> Position {
        let offset = self.chars.peek().map_or(self.input.len(), |&(i, _)| i);

        Position {
            offset,
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn next_token(&mut self) -> Result<Token, QuerySyntaxError> {
        self.skip_whitespace();
        let position = self.position();

        let Some(c) = self.peek_char() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                position,
            });
        };

        let kind = match c {
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_word(),
            c if c.is_ascii_digit() => self.scan_number(position)?,
            '\'' | '"' => self.scan_string(position)?,
            c if c == PLACEHOLDER_SIGIL => self.scan_placeholder(position)?,
            _ => self.scan_symbol(position)?,
        };

        Ok(Token { kind, position })
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek_char().filter(|&c| pred(c)) {
            out.push(c);
            self.bump();
        }

        out
    }

    fn scan_word(&mut self) -> TokenKind {
        let word = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

        Keyword::lookup(&word).map_or(TokenKind::Ident(word), TokenKind::Keyword)
    }

    fn scan_number(&mut self, start: Position) -> Result<TokenKind, QuerySyntaxError> {
        let mut text = self.take_while(|c| c.is_ascii_digit());
        let mut is_float = false;

        if self.peek_char() == Some('.') {
            let mut ahead = self.chars.clone();
            ahead.next();
            if ahead.peek().is_some_and(|&(_, c)| c.is_ascii_digit()) {
                self.bump();
                text.push('.');
                text.push_str(&self.take_while(|c| c.is_ascii_digit()));
                is_float = true;
            }
        }

        if matches!(self.peek_char(), Some('e' | 'E')) {
            let exponent_at = self.position();
            self.bump();
            text.push('e');
            if let Some(sign) = self.peek_char().filter(|c| matches!(c, '+' | '-')) {
                self.bump();
                text.push(sign);
            }
            let digits = self.take_while(|c| c.is_ascii_digit());
            if digits.is_empty() {
                let found = self.peek_char().map_or("end of input".to_string(), |c| format!("'{c}'"));
                return Err(QuerySyntaxError::new(exponent_at, found, "exponent digits"));
            }
            text.push_str(&digits);
            is_float = true;
        }

        if self.peek_char().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
            let tail = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
            return Err(QuerySyntaxError::new(
                start,
                format!("'{text}{tail}'"),
                "numeric literal",
            ));
        }

        if is_float {
            return text
                .parse::<f64>()
                .ok()
                .and_then(Float64::try_new)
                .map(TokenKind::Float)
                .ok_or_else(|| {
                    QuerySyntaxError::new(start, format!("'{text}'"), "finite numeric literal")
                });
        }

        if let Ok(v) = text.parse::<i64>() {
            return Ok(TokenKind::Int(v));
        }
        text.parse::<u64>().map(TokenKind::Uint).map_err(|_| {
            QuerySyntaxError::new(start, format!("'{text}'"), "integer within 64 bits")
        })
    }

    fn scan_string(&mut self, start: Position) -> Result<TokenKind, QuerySyntaxError> {
        let Some(quote) = self.bump() else {
            return Err(QuerySyntaxError::new(start, "end of input", "string literal"));
        };
        let mut out = String::new();

        loop {
            let escape_at = self.position();
            match self.bump() {
                None => {
                    return Err(QuerySyntaxError::new(
                        start,
                        "unterminated string",
                        format!("closing {quote}"),
                    ));
                }
                Some(c) if c == quote => return Ok(TokenKind::String(out)),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some(c @ ('\\' | '\'' | '"')) => c,
                        Some(other) => {
                            return Err(QuerySyntaxError::new(
                                escape_at,
                                format!("'\\{other}'"),
                                "escape sequence (\\n \\t \\r \\0 \\\\ \\' \\\")",
                            ));
                        }
                        None => {
                            return Err(QuerySyntaxError::new(
                                start,
                                "unterminated string",
                                format!("closing {quote}"),
                            ));
                        }
                    };
                    out.push(escaped);
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn scan_placeholder(&mut self, start: Position) -> Result<TokenKind, QuerySyntaxError> {
        self.bump();
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if name.is_empty() {
            let found = self.peek_char().map_or("end of input".to_string(), |c| format!("'{c}'"));
            return Err(QuerySyntaxError::new(start, found, "placeholder name after '?'"));
        }

        Ok(TokenKind::Placeholder(name))
    }

    fn scan_symbol(&mut self, start: Position) -> Result<TokenKind, QuerySyntaxError> {
        let Some(c) = self.bump() else {
            return Ok(TokenKind::Eof);
        };

        let kind = match c {
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '*' => TokenKind::Star,
            '-' => TokenKind::Minus,
            '=' => {
                self.bump_if('=');
                TokenKind::Eq
            }
            '!' if self.bump_if('=') => TokenKind::NotEq,
            '<' if self.bump_if('=') => TokenKind::LtEq,
            '<' if self.bump_if('>') => TokenKind::NotEq,
            '<' => TokenKind::Lt,
            '>' if self.bump_if('=') => TokenKind::GtEq,
            '>' => TokenKind::Gt,
            other => {
                return Err(QuerySyntaxError::new(
                    start,
                    format!("'{other}'"),
                    "operator, literal or identifier",
                ));
            }
        };

        Ok(kind)
    }
}
