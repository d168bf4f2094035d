pub use error::RuntimeError;
pub use machine::Machine;

mod error;
mod machine;
