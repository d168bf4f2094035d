//! # quip
//!
//! A line-at-a-time interpreter for a tiny statement language:
//!
//! ```text
//! set #name = "world";
//! print "hello " #name;
//! calc (1+2)*3;
//! ```
//!
//! Each line goes through [`scan`], then [`parse`], then [`Machine::run`].
//! The [`Machine`] keeps its variables between lines.

pub mod interpreter;
pub mod parse;
pub mod scan;

pub use interpreter::{Machine, RuntimeError};
pub use parse::{parse, BinaryOp, Expr, ParseError, Program, Stmt};
pub use scan::{scan, Keyword, LexError, Symbol, Token, TokenKind};
