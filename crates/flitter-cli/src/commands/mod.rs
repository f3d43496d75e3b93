//! Shared loading/compiling logic for the `run`/`dump`/`check` subcommands.

pub mod check;
pub mod dump;
pub mod run;

use std::path::Path;
use std::rc::Rc;

use flitter_compiler::ast::Expr;
use flitter_compiler::simplify::{Diagnostics, SimplifyBudget, Variables};
use flitter_compiler::{compile_and_link, CompiledProgram};
use flitter_core::{Interner, StaticBuiltins};

use crate::ast_ron;

/// Reads and parses a `.fl.ron` debug-AST file, exiting with an error
/// message on any I/O or parse failure.
pub fn load_entry(file: &Path) -> Expr {
    let text = std::fs::read_to_string(file).unwrap_or_else(|e| {
        eprintln!("error: failed to read '{}': {}", file.display(), e);
        std::process::exit(1);
    });
    ast_ron::parse_ron(&text).unwrap_or_else(|e| {
        eprintln!("error: failed to parse '{}': {}", file.display(), e);
        std::process::exit(1);
    })
}

/// Compiles `top`, exiting with an error message if the pipeline hits one
/// of the fatal internal-error cases (§7).
pub fn compile_entry(top: &Expr, globals: Variables, interner: &mut Interner, builtins: &StaticBuiltins, path: &Path) -> (CompiledProgram, Diagnostics) {
    let path_rc: Rc<str> = path.to_string_lossy().into_owned().into();
    compile_and_link(top, globals, SimplifyBudget::default(), interner, builtins, path_rc).unwrap_or_else(|e| {
        eprintln!("error: {}: {}", path.display(), e);
        std::process::exit(1);
    })
}
