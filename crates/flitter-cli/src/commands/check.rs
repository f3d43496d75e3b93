use flitter_core::{Interner, StaticBuiltins};

use super::{compile_entry, load_entry};
use crate::cli::CheckArgs;

pub fn run(args: CheckArgs) {
    let top = load_entry(&args.file);
    let mut interner = Interner::new();
    let builtins = StaticBuiltins::default();
    let (_program, diagnostics) = compile_entry(&top, Default::default(), &mut interner, &builtins, &args.file);

    if !diagnostics.is_empty() {
        for d in &diagnostics {
            eprintln!("error: {d}");
        }
        std::process::exit(1);
    }

    // Silent on success (like cargo check).
}
