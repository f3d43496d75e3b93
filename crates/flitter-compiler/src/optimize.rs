//! Peephole optimiser (§4.5): a fixpoint of local instruction fusions, run
//! at most [`MAX_PASSES`] times over a function body or top-level program
//! before linking. Runs after compilation, before the linker resolves
//! labels — so every pass also remaps `label_positions` in lockstep,
//! otherwise a label recorded against a pre-fusion index would point at
//! the wrong instruction once fused/dropped instructions shift everything
//! downstream of it.

use indexmap::IndexMap;

use flitter_bytecode::{Instruction, Label};
use flitter_core::Vector;

const MAX_PASSES: u32 = 8;

pub fn peephole_fixpoint(instructions: &mut Vec<Instruction>, label_positions: &mut IndexMap<Label, usize>) {
    for _ in 0..MAX_PASSES {
        match one_pass(instructions) {
            Some(mapping) => {
                for pos in label_positions.values_mut() {
                    *pos = mapping[*pos];
                }
            }
            None => return,
        }
    }
}

/// Runs one fusion pass. Returns the old-index -> new-index map (one entry
/// per old instruction, plus a sentinel for "one past the end") if anything
/// changed, or `None` at a fixpoint.
fn one_pass(instructions: &mut Vec<Instruction>) -> Option<Vec<usize>> {
    let mut out = Vec::with_capacity(instructions.len());
    let mut mapping = vec![0usize; instructions.len() + 1];
    let mut changed = false;
    let mut i = 0;
    while i < instructions.len() {
        let rest = &instructions[i..];
        match rest {
            [Instruction::Compose(n), Instruction::Compose(m), ..] => {
                mapping[i] = out.len();
                mapping[i + 1] = out.len();
                out.push(Instruction::Compose(n + m - 1));
                i += 2;
                changed = true;
            }
            [Instruction::Compose(n), Instruction::Append(m), ..] => {
                mapping[i] = out.len();
                mapping[i + 1] = out.len();
                out.push(Instruction::Append(n + m - 1));
                i += 2;
                changed = true;
            }
            [Instruction::Mul, Instruction::Add, ..] => {
                mapping[i] = out.len();
                mapping[i + 1] = out.len();
                out.push(Instruction::MulAdd);
                i += 2;
                changed = true;
            }
            [Instruction::Literal(v), Instruction::Append(_), ..] if is_null(v) => {
                mapping[i] = out.len();
                mapping[i + 1] = out.len();
                i += 2;
                changed = true;
            }
            [Instruction::Literal(v), Instruction::AppendRoot, ..] if is_null(v) => {
                mapping[i] = out.len();
                mapping[i + 1] = out.len();
                i += 2;
                changed = true;
            }
            [other, ..] => {
                mapping[i] = out.len();
                out.push(other.clone());
                i += 1;
            }
            [] => unreachable!(),
        }
    }
    mapping[instructions.len()] = out.len();
    *instructions = out;
    changed.then_some(mapping)
}

fn is_null(v: &Vector) -> bool {
    v.len() == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(instructions: &mut Vec<Instruction>) -> IndexMap<Label, usize> {
        let mut labels = IndexMap::new();
        peephole_fixpoint(instructions, &mut labels);
        labels
    }

    #[test]
    fn fuses_adjacent_composes() {
        let mut program = vec![Instruction::Compose(2), Instruction::Compose(3)];
        run(&mut program);
        assert!(matches!(program.as_slice(), [Instruction::Compose(4)]));
    }

    #[test]
    fn fuses_mul_add_into_mul_add() {
        let mut program = vec![Instruction::Mul, Instruction::Add];
        run(&mut program);
        assert!(matches!(program.as_slice(), [Instruction::MulAdd]));
    }

    #[test]
    fn drops_null_before_append_root() {
        let mut program = vec![Instruction::Literal(Vector::null()), Instruction::AppendRoot];
        run(&mut program);
        assert!(program.is_empty());
    }

    #[test]
    fn leaves_unrelated_instructions_alone() {
        let mut program = vec![Instruction::Dup, Instruction::Neg];
        run(&mut program);
        assert!(matches!(program.as_slice(), [Instruction::Dup, Instruction::Neg]));
    }

    #[test]
    fn remaps_a_label_past_a_dropped_pair() {
        let mut program = vec![Instruction::Literal(Vector::null()), Instruction::AppendRoot, Instruction::Dup];
        let mut labels = IndexMap::new();
        labels.insert(Label(0), 2);
        peephole_fixpoint(&mut program, &mut labels);
        assert_eq!(program.len(), 1);
        assert_eq!(labels[&Label(0)], 0);
    }
}
