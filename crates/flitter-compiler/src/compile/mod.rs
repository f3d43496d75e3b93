//! Lowers a simplified `Expr` tree to a pre-link `Instruction` stream (§4.4).

pub mod compiler;
pub mod scope;
pub mod verify;

pub use compiler::{Compiler, CompilerBuilder};
