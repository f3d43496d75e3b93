//! Human-readable disassembly, used by `flitter check`/`flitter dump` and in
//! the internal-error failure path (§4.6 "logged dump of the five
//! surrounding instructions").

use std::fmt::Write as _;

use crate::instruction::{Instruction, Jump};

/// Render one instruction as `<index>: <mnemonic> <operands>`.
pub fn dump_one(index: usize, instr: &Instruction) -> String {
    let mut out = String::new();
    write!(out, "{index:>5}: ").unwrap();
    write_instruction(&mut out, instr);
    out
}

/// Render an entire instruction stream, one line per instruction.
pub fn dump_all(instructions: &[Instruction]) -> String {
    let mut out = String::new();
    for (i, instr) in instructions.iter().enumerate() {
        writeln!(out, "{index:>5}: {mnemonic}", index = i, mnemonic = format_instruction(instr)).unwrap();
    }
    out
}

/// The five instructions surrounding `pc` (clamped to bounds), for the
/// internal-error dump described in §4.6's failure semantics.
pub fn dump_window(instructions: &[Instruction], pc: usize) -> String {
    let start = pc.saturating_sub(2);
    let end = (pc + 3).min(instructions.len());
    let mut out = String::new();
    for i in start..end {
        let marker = if i == pc { "-> " } else { "   " };
        writeln!(out, "{marker}{}", dump_one(i, &instructions[i])).unwrap();
    }
    out
}

fn write_instruction(out: &mut String, instr: &Instruction) {
    write!(out, "{}", format_instruction(instr)).unwrap();
}

fn jump_str(j: Jump) -> String {
    match j {
        Jump::ToLabel(l) => format!("L{}", l.0),
        Jump::Offset(o) => format!("{o:+}"),
    }
}

fn format_instruction(instr: &Instruction) -> String {
    use Instruction::*;
    match instr {
        Literal(v) => format!("Literal {v:?}"),
        LiteralNode(n) => format!("LiteralNode <{}>", n.kind()),
        Dup => "Dup".into(),
        Drop(k) => format!("Drop {k}"),
        Name(s) => format!("Name #{}", s.as_u32()),
        LocalLoad(k) => format!("LocalLoad {k}"),
        LocalPush(n) => format!("LocalPush {n}"),
        LocalDrop(n) => format!("LocalDrop {n}"),
        Lookup => "Lookup".into(),
        LookupLiteral(v) => format!("LookupLiteral {v:?}"),
        Range => "Range".into(),
        Add => "Add".into(),
        Sub => "Sub".into(),
        Mul => "Mul".into(),
        MulAdd => "MulAdd".into(),
        TrueDiv => "TrueDiv".into(),
        FloorDiv => "FloorDiv".into(),
        Mod => "Mod".into(),
        Pow => "Pow".into(),
        Eq => "Eq".into(),
        Ne => "Ne".into(),
        Lt => "Lt".into(),
        Le => "Le".into(),
        Gt => "Gt".into(),
        Ge => "Ge".into(),
        Not => "Not".into(),
        Neg => "Neg".into(),
        Pos => "Pos".into(),
        Xor => "Xor".into(),
        Slice => "Slice".into(),
        SliceLiteral(v) => format!("SliceLiteral {v:?}"),
        IndexLiteral(i) => format!("IndexLiteral {i}"),
        Call(k, names) => format!("Call {k} names={}", names.len()),
        CallFast(name, k) => format!("CallFast {name} {k}"),
        Func(name, params) => format!("Func #{} params={}", name.as_u32(), params.len()),
        Tag(s) => format!("Tag #{}", s.as_u32()),
        Attribute(s) => format!("Attribute #{}", s.as_u32()),
        Append(k) => format!("Append {k}"),
        Prepend => "Prepend".into(),
        AppendRoot => "AppendRoot".into(),
        Compose(k) => format!("Compose {k}"),
        BeginFor => "BeginFor".into(),
        Next(k, label) => format!("Next {k} {}", jump_str(*label)),
        PushNext(label) => format!("PushNext {}", jump_str(*label)),
        EndFor => "EndFor".into(),
        EndForCompose => "EndForCompose".into(),
        SetNodeScope => "SetNodeScope".into(),
        ClearNodeScope => "ClearNodeScope".into(),
        StoreGlobal(s) => format!("StoreGlobal #{}", s.as_u32()),
        Search(_) => "Search <query>".into(),
        Import(names) => format!("Import names={}", names.len()),
        Jump(label) => format!("Jump {}", jump_str(*label)),
        BranchTrue(label) => format!("BranchTrue {}", jump_str(*label)),
        BranchFalse(label) => format!("BranchFalse {}", jump_str(*label)),
        Pragma(s) => format!("Pragma #{}", s.as_u32()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flitter_core::Vector;

    #[test]
    fn dump_one_includes_index_and_mnemonic() {
        let line = dump_one(3, &Instruction::Literal(Vector::number(1.0)));
        assert!(line.contains("3:"));
        assert!(line.contains("Literal"));
    }

    #[test]
    fn dump_window_clamps_to_bounds() {
        let instrs = vec![Instruction::Dup, Instruction::Dup, Instruction::Dup];
        let window = dump_window(&instrs, 0);
        assert!(window.contains("-> "));
    }
}
