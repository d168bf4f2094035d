use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("invalid number literal: '{literal}'")]
    InvalidNumber { literal: String },

    #[error("cannot divide by zero")]
    DivideByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T = (), E = RuntimeError> = std::result::Result<T, E>;
