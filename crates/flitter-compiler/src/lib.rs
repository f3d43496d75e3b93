//! Partial evaluator, stack-machine compiler, peephole optimiser, and
//! linker for Flitter programs. Depends on `flitter-core` (values, the
//! scene tree, the `Callable`/`SubProgram` seams) and `flitter-bytecode`
//! (the instruction set); never on `flitter-vm`, so the partial evaluator
//! can be reused by tooling that never executes a program.

pub mod ast;
pub mod compile;
pub mod error;
pub mod link;
pub mod optimize;
pub mod program;
pub mod simplify;

pub use error::{CompileError, CompileResult};
pub use program::{compile_and_link, CompiledProgram};
