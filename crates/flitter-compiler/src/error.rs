//! Fatal, internal compile-time errors (§7 "Internal error" bucket, the
//! slice of it detected before a program ever runs).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("label L{0} was never defined")]
    UnresolvedLabel(u32),

    #[error("jump at instruction {pc} targets out-of-range offset {offset}")]
    JumpOutOfRange { pc: usize, offset: i32 },

    #[error("stack discipline violated: instruction {pc} expected net delta {expected}, got {actual}")]
    StackDisciplineViolation { pc: usize, expected: i32, actual: i32 },

    #[error("partial evaluator exceeded its simplify budget without terminating a fixpoint")]
    SimplifyBudgetExceeded,
}

pub type CompileResult<T> = Result<T, CompileError>;
