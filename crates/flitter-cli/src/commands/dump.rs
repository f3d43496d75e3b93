use flitter_bytecode::dump;
use flitter_compiler::simplify::{self, SimplifyBudget, Variables};
use flitter_core::{Interner, StaticBuiltins};

use super::{compile_entry, load_entry};
use crate::cli::DumpArgs;

pub fn run(args: DumpArgs) {
    let top = load_entry(&args.file);
    let mut interner = Interner::new();
    let builtins = StaticBuiltins::default();

    let (simplified, _) = simplify::simplify(&top, Variables::default(), SimplifyBudget::default(), &builtins, None);
    println!("{:#?}", simplified);
    println!();

    let (program, diagnostics) = compile_entry(&top, Default::default(), &mut interner, &builtins, &args.file);
    for d in &diagnostics {
        eprintln!("warning: {d}");
    }
    print!("{}", dump::dump_all(program.instructions()));
}
