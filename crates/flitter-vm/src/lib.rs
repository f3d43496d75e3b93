//! Stack-based virtual machine for linked Flitter programs (§4.6).
//!
//! Depends on `flitter-core` (values, the scene tree, the `Callable`/
//! `SubProgram` seams), `flitter-bytecode` (the instruction set), and
//! `flitter-compiler` (`CompiledProgram`, for `Func`'s nested bodies and
//! `Import`'s loaded modules) — never the reverse.

pub mod builtins;
pub mod engine;
pub mod error;

pub use builtins::DynamicBuiltins;
pub use engine::{Function, NullSourceLoader, SourceLoader, Fuel, Vm, VmBuilder};
pub use error::{RuntimeError, RuntimeResult};
