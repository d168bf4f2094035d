use std::fmt::{Display, Formatter};

use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Parser)]
#[grammar = "quip.pest"]
struct QuipScanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    String,
    Symbol,
    Keyword,
    Number,
    Identifier,
}

/// The smallest lexical unit of a line.
///
/// `value` holds the raw text without decoration: string tokens drop their
/// quotes and identifier tokens drop their leading `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Semicolon,
    Equal,
    LeftParen,
    RightParen,
    Plus,
    Minus,
    Times,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Print,
    Set,
    Calc,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unexpected character at [{line}:{column}]")]
pub struct LexError {
    pub line: usize,
    pub column: usize,
}

impl Symbol {
    pub const ALL: [Symbol; 8] = [
        Symbol::Semicolon,
        Symbol::Equal,
        Symbol::LeftParen,
        Symbol::RightParen,
        Symbol::Plus,
        Symbol::Minus,
        Symbol::Times,
        Symbol::Divide,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Symbol::Semicolon => ";",
            Symbol::Equal => "=",
            Symbol::LeftParen => "(",
            Symbol::RightParen => ")",
            Symbol::Plus => "+",
            Symbol::Minus => "-",
            Symbol::Times => "*",
            Symbol::Divide => "/",
        }
    }
}

impl Keyword {
    pub const ALL: [Keyword; 3] = [Keyword::Print, Keyword::Calc, Keyword::Set];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Print => "print",
            Keyword::Set => "set",
            Keyword::Calc => "calc",
        }
    }
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Token {
        Token {
            kind,
            value: value.into(),
        }
    }

    pub fn symbol(&self) -> Option<Symbol> {
        if self.kind != TokenKind::Symbol {
            return None;
        }
        Symbol::ALL
            .into_iter()
            .find(|symbol| symbol.as_str() == self.value)
    }

    pub fn keyword(&self) -> Option<Keyword> {
        if self.kind != TokenKind::Keyword {
            return None;
        }
        Keyword::ALL
            .into_iter()
            .find(|keyword| keyword.as_str() == self.value)
    }

    pub fn is_symbol(&self, symbol: Symbol) -> bool {
        self.symbol() == Some(symbol)
    }

    fn from_pair(pair: Pair<'_, Rule>) -> Option<Token> {
        let kind = match pair.as_rule() {
            Rule::symbol => TokenKind::Symbol,
            Rule::keyword => TokenKind::Keyword,
            Rule::number => TokenKind::Number,
            Rule::string => TokenKind::String,
            Rule::identifier => TokenKind::Identifier,
            _ => return None,
        };
        let value = match kind {
            TokenKind::String | TokenKind::Identifier => pair
                .into_inner()
                .map(|inner| inner.as_str())
                .collect::<String>(),
            _ => pair.as_str().to_string(),
        };
        Some(Token { kind, value })
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::String => write!(f, "\"{}\"", self.value),
            TokenKind::Identifier => write!(f, "#{}", self.value),
            _ => write!(f, "{}", self.value),
        }
    }
}

impl From<pest::error::Error<Rule>> for LexError {
    fn from(error: pest::error::Error<Rule>) -> Self {
        let (line, column) = match error.line_col {
            LineColLocation::Pos(pos) | LineColLocation::Span(pos, _) => pos,
        };
        LexError { line, column }
    }
}

/// Splits one line of source into tokens.
///
/// Sub-scanners are tried in the order symbol, keyword, string, number,
/// identifier; the first one that matches wins.
pub fn scan(source: &str) -> Result<Vec<Token>, LexError> {
    let pairs = QuipScanner::parse(Rule::line, source).map_err(|error| {
        let error = LexError::from(error);
        debug!(%error, "scan failed");
        error
    })?;
    let mut tokens = Vec::new();
    for pair in pairs.flat_map(Pair::into_inner) {
        if pair.as_rule() == Rule::invalid {
            let (line, column) = pair.as_span().start_pos().line_col();
            let error = LexError { line, column };
            debug!(%error, "scan failed");
            return Err(error);
        }
        tokens.extend(Token::from_pair(pair));
    }
    trace!(count = tokens.len(), "scanned line");
    Ok(tokens)
}
