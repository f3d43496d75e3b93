//! Debug-only stack-discipline check (§4.6 "bad stack states ... are
//! internal errors"). Walks the linked instruction list with a simulated
//! value-stack depth and flags anything that would underflow. Zero-cost
//! in release builds — call sites gate this behind `cfg(debug_assertions)`.

use flitter_bytecode::Instruction;

use crate::error::{CompileError, CompileResult};

pub fn verify_stack_discipline(instructions: &[Instruction]) -> CompileResult<()> {
    let mut depth: i64 = 0;
    for (pc, instr) in instructions.iter().enumerate() {
        match instr.stack_delta() {
            Some(delta) => {
                depth += delta as i64;
                if depth < 0 {
                    return Err(CompileError::StackDisciplineViolation {
                        pc,
                        expected: delta,
                        actual: depth as i32,
                    });
                }
            }
            // Dynamically-sized effect (Call, Import, loop control): its
            // exact delta depends on runtime state, so we can't track depth
            // precisely past it. Trust the emitter and keep walking.
            None => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flitter_core::Vector;

    #[test]
    fn balanced_program_passes() {
        let program = vec![Instruction::Literal(Vector::number(1.0)), Instruction::Literal(Vector::number(2.0)), Instruction::Add];
        assert!(verify_stack_discipline(&program).is_ok());
    }

    #[test]
    fn underflow_is_detected() {
        let program = vec![Instruction::Drop(1)];
        assert!(matches!(verify_stack_discipline(&program), Err(CompileError::StackDisciplineViolation { .. })));
    }
}
