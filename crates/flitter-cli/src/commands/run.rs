use std::cell::RefCell;
use std::rc::Rc;

use flitter_compiler::simplify::{Binding, Variables};
use flitter_core::{Context, Interner, StaticBuiltins, State};
use flitter_vm::{DynamicBuiltins, Fuel, SourceLoader, Vm};

use super::{compile_entry, load_entry};
use crate::ast_ron;
use crate::cli::RunArgs;
use crate::loader::FsSourceLoader;
use crate::state_ron;

pub fn run(args: RunArgs) {
    let top = load_entry(&args.file);

    let interner = Rc::new(RefCell::new(Interner::new()));
    let builtins = Rc::new(StaticBuiltins::default());

    let mut globals: Variables = Variables::default();
    for (name, value) in &args.vars {
        let v = ast_ron::parse_ron_vector(value).unwrap_or_else(|e| {
            eprintln!("error: --var {name}={value}: {e}");
            std::process::exit(1);
        });
        globals.insert(name.as_str().into(), Some(Binding::Value(v)));
    }

    let diagnostics;
    let program;
    {
        let mut interner_mut = interner.borrow_mut();
        let (p, d) = compile_entry(&top, globals, &mut *interner_mut, &builtins, &args.file);
        program = p;
        diagnostics = d;
    }
    for d in &diagnostics {
        eprintln!("warning: {d}");
    }

    let mut state = match &args.state {
        Some(path) => state_ron::load_state(path),
        None => State::new(),
    };

    let loader: Rc<RefCell<dyn SourceLoader>> = Rc::new(RefCell::new(FsSourceLoader::new(interner.clone(), builtins.clone())));
    let mut vm_builder = Vm::builder(interner.clone(), builtins, loader).dynamic_builtins(DynamicBuiltins::default());
    if let Some(fuel) = args.fuel {
        vm_builder = vm_builder.fuel(Fuel::limited(fuel));
    }
    let vm = vm_builder.build();

    tracing::info!(file = %args.file.display(), "running");
    let mut ctx = Context::new(&mut state, args.file.to_string_lossy().into_owned());
    if let Err(e) = vm.run(&program, &mut ctx) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    println!("{:#?}", ctx.graph);
    for (sym, value) in &ctx.pragmas {
        println!("pragma {}: {:?}", interner.borrow().resolve(*sym), value);
    }
    for err in &ctx.errors {
        eprintln!("error: {err}");
    }
    for log in &ctx.logs {
        println!("{log}");
    }

    if let Some(path) = &args.state {
        state_ron::save_state(path, &state);
    }
}
