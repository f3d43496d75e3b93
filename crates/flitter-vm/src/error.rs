//! Fatal, internal VM errors (§7's "Internal error" bucket) — distinct from
//! the non-fatal kinds in `flitter_core::error`, which accumulate as strings
//! in `Context::errors` and never abort a run.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("fuel exhausted after {executed} instructions")]
    FuelExhausted { executed: u64 },

    #[error("program counter {pc} out of bounds (program has {len} instructions)")]
    PcOutOfBounds { pc: usize, len: usize },

    #[error("value stack underflow at pc {pc}")]
    StackUnderflow { pc: usize },

    #[error("locals stack underflow at pc {pc}")]
    LocalsUnderflow { pc: usize },

    #[error("loop stack underflow at pc {pc}")]
    LoopStackUnderflow { pc: usize },

    #[error("an unlinked jump label reached the VM at pc {pc}")]
    UnlinkedJump { pc: usize },

    #[error("Func body is not a compiled program")]
    MalformedFunctionBody,

    #[error("function body left {left} values on the stack, expected exactly 1")]
    FunctionBodyImbalance { left: usize },
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
