//! The finished artifact of the pipeline: a linked instruction stream plus
//! the source path it was compiled from, held behind `SubProgram` so
//! `flitter-vm` can execute it without this crate depending on the VM.

use std::rc::Rc;

use flitter_bytecode::Instruction;
use flitter_core::{Interner, StaticBuiltins, SubProgram};

use crate::ast::Expr;
use crate::compile::Compiler;
use crate::error::CompileResult;
use crate::simplify::{self, Diagnostics, SimplifyBudget, Variables};

#[derive(Debug)]
pub struct CompiledProgram {
    path: Rc<str>,
    /// The partially-evaluated AST this program was compiled from, for
    /// diagnostics and re-use by importers (§3 "Program"). `Expr::null()`
    /// until `set_top` is called.
    top: Rc<Expr>,
    instructions: Rc<[Instruction]>,
}

impl CompiledProgram {
    pub fn new(path: Rc<str>, instructions: Vec<Instruction>) -> Self {
        Self { path, top: Rc::new(Expr::null()), instructions: instructions.into() }
    }

    pub fn instructions(&self) -> &Rc<[Instruction]> {
        &self.instructions
    }

    pub fn top(&self) -> &Expr {
        &self.top
    }

    /// Re-points this program at a different source path — used when a
    /// host re-uses an already-compiled program under an import alias.
    pub fn set_path(&mut self, path: Rc<str>) {
        self.path = path;
    }

    /// Attaches the AST this program was compiled from.
    pub fn set_top(&mut self, top: Rc<Expr>) {
        self.top = top;
    }
}

impl SubProgram for CompiledProgram {
    fn path(&self) -> &str {
        &self.path
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Runs the full pipeline — partial evaluation, lowering, peephole
/// optimisation, and linking — over one top-level `Expr`, producing a
/// program ready for `flitter-vm` to run.
///
/// `globals` seeds the partial evaluator's name environment (e.g. names
/// already bound by an enclosing `Import`); pass an empty map for a
/// freestanding program.
pub fn compile_and_link(
    top: &crate::ast::Expr,
    globals: Variables,
    budget: SimplifyBudget,
    interner: &mut Interner,
    static_builtins: &StaticBuiltins,
    path: Rc<str>,
) -> CompileResult<(CompiledProgram, Diagnostics)> {
    let (simplified, diagnostics) = simplify::simplify(top, globals, budget, static_builtins, None);
    let (mut instructions, mut label_positions) = Compiler::builder(interner, static_builtins, path.clone()).build().compile_top(&simplified)?;
    crate::optimize::peephole_fixpoint(&mut instructions, &mut label_positions);
    crate::link::link(&mut instructions, &label_positions)?;
    #[cfg(debug_assertions)]
    crate::compile::verify::verify_stack_discipline(&instructions)?;
    let mut program = CompiledProgram::new(path, instructions);
    program.set_top(Rc::new(simplified));
    Ok((program, diagnostics))
}
