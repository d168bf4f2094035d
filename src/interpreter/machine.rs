use std::collections::HashMap;
use std::io::{self, Stdout, Write};

use tracing::{debug, trace};

use crate::interpreter::error::Result;
use crate::interpreter::error::RuntimeError::{DivideByZero, InvalidNumber, Overflow};
use crate::parse::{BinaryOp, Expr, Program, Stmt};
use crate::scan::{Token, TokenKind};

/// Executes parsed programs against a variable store that lives as long as
/// the machine does.
///
/// Output goes to `W`; stdout unless built with [`Machine::with_output`].
pub struct Machine<W: Write = Stdout> {
    variables: HashMap<String, String>,
    out: W,
}

impl Machine<Stdout> {
    pub fn new() -> Machine<Stdout> {
        Machine::with_output(io::stdout())
    }
}

impl Default for Machine<Stdout> {
    fn default() -> Self {
        Machine::new()
    }
}

impl<W: Write> Machine<W> {
    pub fn with_output(out: W) -> Machine<W> {
        Machine {
            variables: HashMap::new(),
            out,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Parses and runs one line. Nothing runs if the line fails to parse.
    pub fn eval_line(&mut self, line: &str) -> anyhow::Result<()> {
        let program: Program = line.parse()?;
        self.run(program)?;
        Ok(())
    }

    /// Runs every statement in order, stopping at the first failure.
    ///
    /// Statements before the failing one keep their effects.
    pub fn run(&mut self, Program { body }: Program) -> Result<()> {
        let result = body.into_iter().try_for_each(|stmt| self.exec(stmt));
        let flushed = self.out.flush();
        if let Err(error) = &result {
            debug!(%error, "statement failed");
        }
        result?;
        flushed?;
        Ok(())
    }

    fn exec(&mut self, stmt: Stmt) -> Result<()> {
        trace!(?stmt, "exec");
        match stmt {
            Stmt::Print { parts } => self.print(&parts)?,
            Stmt::Set { name, value } => {
                self.variables.insert(name, value);
            }
            Stmt::Calc { expr } => {
                let value = eval(&expr)?;
                write!(self.out, "{value}")?;
            }
        }
        Ok(())
    }

    fn print(&mut self, parts: &[Token]) -> Result<()> {
        for token in parts {
            match token.kind {
                TokenKind::String => self.out.write_all(token.value.as_bytes())?,
                TokenKind::Identifier => match self.variables.get(&token.value) {
                    Some(value) => self.out.write_all(value.as_bytes())?,
                    None => write!(self.out, "## unidentified variable:{} ##", token.value)?,
                },
                _ => {}
            }
        }
        Ok(())
    }
}

fn eval(expr: &Expr) -> Result<i64> {
    match expr {
        Expr::Number { literal } => literal.parse().map_err(|_| InvalidNumber {
            literal: literal.clone(),
        }),
        Expr::Binary { lhs, op, rhs } => {
            let lhs = eval(lhs)?;
            let Some(rhs) = rhs else {
                return Ok(lhs);
            };
            let rhs = eval(rhs)?;
            apply(*op, lhs, rhs)
        }
    }
}

fn apply(op: BinaryOp, lhs: i64, rhs: i64) -> Result<i64> {
    match op {
        BinaryOp::Add => lhs.checked_add(rhs).ok_or(Overflow),
        BinaryOp::Subtract => lhs.checked_sub(rhs).ok_or(Overflow),
        BinaryOp::Multiply => lhs.checked_mul(rhs).ok_or(Overflow),
        BinaryOp::Divide if rhs == 0 => Err(DivideByZero),
        BinaryOp::Divide => lhs.checked_div(rhs).ok_or(Overflow),
    }
}
