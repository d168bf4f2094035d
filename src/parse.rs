use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, trace};

use crate::scan::{scan, Keyword, LexError, Symbol, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Arithmetic tree of a `calc` statement.
///
/// A parsed tree always has `rhs` set; the evaluator treats a missing right
/// child as "return the left value".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number {
        literal: String,
    },
    Binary {
        lhs: Box<Expr>,
        op: BinaryOp,
        rhs: Option<Box<Expr>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// Only string and identifier tokens.
    Print { parts: Vec<Token> },
    Set { name: String, value: String },
    Calc { expr: Expr },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("unexpected token: {token}")]
    UnexpectedToken { token: String },

    #[error("expected string or identifier, got {token}")]
    ExpectedStringOrIdentifier { token: String },

    #[error("expected identifier")]
    ExpectedIdentifier,

    #[error("expected equal sign")]
    ExpectedEqualSign,

    #[error("only string values supported")]
    OnlyStringValues,

    #[error("expected `;` at end of statement")]
    MissingSemicolon,

    #[error("incomplete expression")]
    IncompleteExpression,

    #[error("expression nested deeper than {limit} levels")]
    TooDeep { limit: usize },
}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Bounds both parenthesis nesting and operator chains, which also bounds
/// recursion when the tree is evaluated and dropped.
pub const MAX_EXPR_DEPTH: usize = 256;

impl BinaryOp {
    fn from_symbol(symbol: Symbol) -> Option<BinaryOp> {
        match symbol {
            Symbol::Plus => Some(BinaryOp::Add),
            Symbol::Minus => Some(BinaryOp::Subtract),
            Symbol::Times => Some(BinaryOp::Multiply),
            Symbol::Divide => Some(BinaryOp::Divide),
            _ => None,
        }
    }
}

impl Expr {
    pub fn number(literal: impl Into<String>) -> Expr {
        Expr::Number {
            literal: literal.into(),
        }
    }

    pub fn binary(lhs: Expr, op: BinaryOp, rhs: Expr) -> Expr {
        Expr::Binary {
            lhs: Box::new(lhs),
            op,
            rhs: Some(Box::new(rhs)),
        }
    }
}

fn unexpected(token: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        token: token.to_string(),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    cursor: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Parser<'a> {
        Parser {
            tokens,
            cursor: 0,
            depth: 0,
        }
    }

    fn next_token(&mut self) -> Option<&'a Token> {
        let tokens = self.tokens;
        let token = tokens.get(self.cursor)?;
        self.cursor += 1;
        Some(token)
    }

    fn parse_program(&mut self) -> Result<Program> {
        let mut body = Vec::new();
        // every statement consumes at least its keyword, so this always advances
        while let Some(token) = self.next_token() {
            let stmt = match token.keyword() {
                Some(Keyword::Print) => self.parse_print()?,
                Some(Keyword::Set) => self.parse_set()?,
                Some(Keyword::Calc) => self.parse_calc()?,
                None => return Err(unexpected(token)),
            };
            trace!(?stmt, "parsed statement");
            body.push(stmt);
        }
        Ok(Program { body })
    }

    fn expect_semicolon(&mut self) -> Result<()> {
        match self.next_token() {
            Some(token) if token.is_symbol(Symbol::Semicolon) => Ok(()),
            _ => Err(ParseError::MissingSemicolon),
        }
    }

    fn parse_print(&mut self) -> Result<Stmt> {
        let mut parts = Vec::new();
        loop {
            let Some(token) = self.next_token() else {
                return Err(ParseError::MissingSemicolon);
            };
            match token.kind {
                TokenKind::String | TokenKind::Identifier => parts.push(token.clone()),
                _ if token.is_symbol(Symbol::Semicolon) => return Ok(Stmt::Print { parts }),
                _ => {
                    return Err(ParseError::ExpectedStringOrIdentifier {
                        token: token.to_string(),
                    })
                }
            }
        }
    }

    fn parse_set(&mut self) -> Result<Stmt> {
        let name = match self.next_token() {
            Some(Token {
                kind: TokenKind::Identifier,
                value,
            }) => value.clone(),
            _ => return Err(ParseError::ExpectedIdentifier),
        };
        if !self
            .next_token()
            .is_some_and(|token| token.is_symbol(Symbol::Equal))
        {
            return Err(ParseError::ExpectedEqualSign);
        }
        let value = match self.next_token() {
            Some(Token {
                kind: TokenKind::String,
                value,
            }) => value.clone(),
            _ => return Err(ParseError::OnlyStringValues),
        };
        self.expect_semicolon()?;
        Ok(Stmt::Set { name, value })
    }

    fn parse_calc(&mut self) -> Result<Stmt> {
        let expr = self.parse_expr(Symbol::Semicolon)?;
        Ok(Stmt::Calc { expr })
    }

    /// Parses `term (op expr)?` and consumes `terminator`.
    ///
    /// The right operand is parsed recursively, so operators group to the
    /// right with no precedence: `2-3-4` is `2-(3-4)`.
    fn parse_expr(&mut self, terminator: Symbol) -> Result<Expr> {
        if self.depth >= MAX_EXPR_DEPTH {
            return Err(ParseError::TooDeep {
                limit: MAX_EXPR_DEPTH,
            });
        }
        self.depth += 1;
        let expr = self.parse_operation(terminator);
        self.depth -= 1;
        expr
    }

    fn parse_operation(&mut self, terminator: Symbol) -> Result<Expr> {
        let lhs = self.parse_term()?;
        let token = self.next_token().ok_or(ParseError::IncompleteExpression)?;
        if token.is_symbol(terminator) {
            return Ok(lhs);
        }
        let Some(op) = token.symbol().and_then(BinaryOp::from_symbol) else {
            return Err(unexpected(token));
        };
        let rhs = self.parse_expr(terminator)?;
        Ok(Expr::binary(lhs, op, rhs))
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let token = self.next_token().ok_or(ParseError::IncompleteExpression)?;
        match token.kind {
            TokenKind::Number => Ok(Expr::number(token.value.as_str())),
            _ if token.is_symbol(Symbol::LeftParen) => self.parse_expr(Symbol::RightParen),
            _ => Err(unexpected(token)),
        }
    }
}

/// Scans and parses one line.
///
/// Either the whole line parses or nothing does; there is no partial program.
pub fn parse(source: &str) -> Result<Program> {
    let tokens = scan(source)?;
    Parser::new(&tokens).parse_program().map_err(|error| {
        debug!(%error, "parse failed");
        error
    })
}

impl FromStr for Program {
    type Err = ParseError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        parse(source)
    }
}
