//! Resolves `Jump::ToLabel` targets to relative `Jump::Offset`s (§4.5).
//! Runs after the peephole optimiser, since fusion changes instruction
//! counts and therefore every address downstream of a fusion.

use indexmap::IndexMap;

use flitter_bytecode::{Instruction, Jump, Label};

use crate::error::{CompileError, CompileResult};

pub fn link(instructions: &mut [Instruction], label_positions: &IndexMap<Label, usize>) -> CompileResult<()> {
    for (pc, instr) in instructions.iter_mut().enumerate() {
        let Some(jump) = instr.jump_mut() else { continue };
        let Jump::ToLabel(label) = *jump else { continue };
        let target = *label_positions.get(&label).ok_or(CompileError::UnresolvedLabel(label.0))?;
        let offset = target as i64 - pc as i64;
        let offset = i32::try_from(offset).map_err(|_| CompileError::JumpOutOfRange { pc, offset: offset as i32 })?;
        *jump = Jump::Offset(offset);
    }
    Ok(())
}
