//! End-to-end scenarios run through the whole pipeline — hand-built `Ast`,
//! `simplify`, `compile_and_link`, then `Vm::run` — exercising the same six
//! cases as `flitter-compiler`'s own simplify-level tests, but through the
//! VM so the compiled bytecode is actually dispatched.

use std::cell::RefCell;
use std::rc::Rc;

use flitter_compiler::ast::{BinaryOp, Expr};
use flitter_compiler::simplify::{SimplifyBudget, Variables};
use flitter_compiler::{compile_and_link, CompiledProgram};
use flitter_core::{Callable, Context, Interner, NodeRef, Object, StaticBuiltins, State, Vector};
use flitter_vm::{DynamicBuiltins, NullSourceLoader, SourceLoader, Vm};

fn compile(top: &Expr, interner: &mut Interner, builtins: &StaticBuiltins, path: &str) -> CompiledProgram {
    let (program, diagnostics) =
        compile_and_link(top, Variables::default(), SimplifyBudget::default(), interner, builtins, Rc::from(path)).unwrap();
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
    program
}

fn null_loader_vm(interner: Interner, builtins: StaticBuiltins) -> Vm {
    let loader: Rc<RefCell<dyn SourceLoader>> = Rc::new(RefCell::new(NullSourceLoader));
    Vm::builder(Rc::new(RefCell::new(interner)), Rc::new(builtins), loader).build()
}

#[test]
fn arithmetic_folding_produces_a_literal_pragma() {
    // let x=2+3 !pragma v=x*x
    let mut interner = Interner::new();
    let builtins = StaticBuiltins::default();
    let top = Expr::Sequence(vec![
        Expr::Let(vec![(
            "x".into(),
            Expr::Binary(BinaryOp::Add, Box::new(Expr::Literal(Vector::number(2.0))), Box::new(Expr::Literal(Vector::number(3.0)))),
        )]),
        Expr::Pragma(
            "v".into(),
            Box::new(Expr::Binary(BinaryOp::Mul, Box::new(Expr::Name("x".into())), Box::new(Expr::Name("x".into())))),
        ),
    ]);
    let program = compile(&top, &mut interner, &builtins, "scenario1");
    let v_sym = interner.intern("v");

    let vm = null_loader_vm(interner, builtins);
    let mut state = State::new();
    let mut ctx = Context::new(&mut state, "scenario1");
    vm.run(&program, &mut ctx).unwrap();

    assert_eq!(ctx.pragmas.get(&v_sym).unwrap().as_numbers().unwrap(), &[25.0]);
}

#[test]
fn loop_unrolling_produces_three_tagged_children() {
    // for i in 0..3 !dot x=i*2
    let mut interner = Interner::new();
    let builtins = StaticBuiltins::default();
    let top = Expr::For {
        var: "i".into(),
        source: Box::new(Expr::Range(
            Box::new(Expr::Literal(Vector::number(0.0))),
            Box::new(Expr::Literal(Vector::number(3.0))),
            Box::new(Expr::Literal(Vector::number(1.0))),
        )),
        body: Box::new(Expr::Attributes(
            Box::new(Expr::NodeCtor { kind: "dot".into(), tags: vec![], children: Box::new(Expr::null()) }),
            vec![("x".into(), Expr::Binary(BinaryOp::Mul, Box::new(Expr::Name("i".into())), Box::new(Expr::Literal(Vector::number(2.0)))))],
        )),
    };
    let program = compile(&top, &mut interner, &builtins, "scenario2");

    let vm = null_loader_vm(interner, builtins);
    let mut state = State::new();
    let mut ctx = Context::new(&mut state, "scenario2");
    vm.run(&program, &mut ctx).unwrap();

    let children: Vec<NodeRef> = ctx.graph.children().collect();
    assert_eq!(children.len(), 3);
    let xs: Vec<f64> = children.iter().map(|n| n.get_attribute("x").unwrap().as_numbers().unwrap()[0]).collect();
    assert_eq!(xs, vec![0.0, 2.0, 4.0]);
}

#[test]
fn function_inlining_folds_a_call_to_a_literal() {
    // func square(n) n*n  let y=square(4) !pragma out=y
    let mut interner = Interner::new();
    let builtins = StaticBuiltins::default();
    let top = Expr::Sequence(vec![
        Expr::Function {
            name: "square".into(),
            params: vec!["n".into()],
            defaults: vec![None],
            body: Box::new(Expr::Binary(BinaryOp::Mul, Box::new(Expr::Name("n".into())), Box::new(Expr::Name("n".into())))),
        },
        Expr::Let(vec![(
            "y".into(),
            Expr::Call { callee: Box::new(Expr::Name("square".into())), args: vec![Expr::Literal(Vector::number(4.0))], kwargs: vec![] },
        )]),
        Expr::Pragma("out".into(), Box::new(Expr::Name("y".into()))),
    ]);
    let program = compile(&top, &mut interner, &builtins, "scenario3");
    let out_sym = interner.intern("out");

    let vm = null_loader_vm(interner, builtins);
    let mut state = State::new();
    let mut ctx = Context::new(&mut state, "scenario3");
    vm.run(&program, &mut ctx).unwrap();

    assert_eq!(ctx.pragmas.get(&out_sym).unwrap().as_numbers().unwrap(), &[16.0]);
}

#[test]
fn state_round_trips_across_separate_runs() {
    // first run: store(:foo, 7) — a context-consuming host builtin writing
    // straight into `Context::state`; second run, against the same `State`,
    // reads it back via `$[:foo]` and binds it onto an emitted node.
    fn builtin_store(ctx: &mut Context, args: &[Vector]) -> Vector {
        ctx.state.set(args[0].clone(), args[1].clone());
        Vector::null()
    }

    let mut interner = Interner::new();
    let builtins = StaticBuiltins::default();
    let mut dynamic = DynamicBuiltins::default();
    dynamic.insert("store", builtin_store);

    let write_top = Expr::Call {
        callee: Box::new(Expr::Name("store".into())),
        args: vec![Expr::Literal(Vector::string(":foo")), Expr::Literal(Vector::number(7.0))],
        kwargs: vec![],
    };
    let write_program = compile(&write_top, &mut interner, &builtins, "write");

    let read_top = Expr::Attributes(
        Box::new(Expr::NodeCtor { kind: "emit".into(), tags: vec![], children: Box::new(Expr::null()) }),
        vec![("value".into(), Expr::Lookup(Box::new(Expr::Literal(Vector::string(":foo")))))],
    );
    let read_program = compile(&read_top, &mut interner, &builtins, "read");

    let loader: Rc<RefCell<dyn SourceLoader>> = Rc::new(RefCell::new(NullSourceLoader));
    let vm = Vm::builder(Rc::new(RefCell::new(interner)), Rc::new(builtins), loader).dynamic_builtins(dynamic).build();

    let mut state = State::new();
    {
        let mut ctx = Context::new(&mut state, "write");
        vm.run(&write_program, &mut ctx).unwrap();
    }
    assert_eq!(state.get(&Vector::string(":foo")).unwrap().as_numbers().unwrap(), &[7.0]);

    let mut ctx = Context::new(&mut state, "read");
    vm.run(&read_program, &mut ctx).unwrap();
    let emitted = ctx.graph.children().next().unwrap();
    assert_eq!(emitted.get_attribute("value").unwrap().as_numbers().unwrap(), &[7.0]);
}

struct TwoModuleLoader {
    a: Rc<CompiledProgram>,
    b: Rc<CompiledProgram>,
}

impl SourceLoader for TwoModuleLoader {
    fn load(&mut self, filename: &str, _current_path: &str) -> Option<Rc<CompiledProgram>> {
        match filename {
            "a" => Some(self.a.clone()),
            "b" => Some(self.b.clone()),
            _ => None,
        }
    }
}

#[test]
fn circular_import_reports_exactly_one_error_and_binds_null() {
    // module "a" imports "x" from "b"; module "b" imports "y" from "a" —
    // the cycle closes inside b's own import, one level down from the
    // top-level run.
    let mut interner = Interner::new();
    let builtins = StaticBuiltins::default();

    let b_top = Expr::Import { filename: Box::new(Expr::Literal(Vector::string("a"))), names: vec!["y".into()] };
    let b_program = Rc::new(compile(&b_top, &mut interner, &builtins, "b"));

    let a_top = Expr::Import { filename: Box::new(Expr::Literal(Vector::string("b"))), names: vec!["x".into()] };
    let a_program = Rc::new(compile(&a_top, &mut interner, &builtins, "a"));
    let x_sym = interner.intern("x");

    let loader: Rc<RefCell<dyn SourceLoader>> = Rc::new(RefCell::new(TwoModuleLoader { a: a_program.clone(), b: b_program }));
    let vm = Vm::builder(Rc::new(RefCell::new(interner)), Rc::new(builtins), loader).build();

    let mut state = State::new();
    let mut ctx = Context::new(&mut state, "a");
    vm.run(&a_program, &mut ctx).unwrap();

    assert_eq!(ctx.errors.len(), 1);
    assert!(ctx.errors.iter().next().unwrap().contains("Circular import"));
    assert_eq!(ctx.variables.get(&x_sym).unwrap().len(), 0);
}

struct RaisingCallable;

impl Callable for RaisingCallable {
    fn name(&self) -> &str {
        "error_func"
    }

    fn call(&self, _context: &mut Context, _args: &[Vector], _kwargs: &[(Rc<str>, Vector)]) -> Result<Vector, String> {
        Err("error_func should never be called".to_string())
    }
}

#[test]
fn short_circuit_never_evaluates_the_skipped_side() {
    // let x = (false and error_func()) or 1 !pragma out=x
    let mut interner = Interner::new();
    let builtins = StaticBuiltins::default();
    let top = Expr::Sequence(vec![
        Expr::Let(vec![(
            "x".into(),
            Expr::Or(
                Box::new(Expr::And(
                    Box::new(Expr::Literal(Vector::false_())),
                    Box::new(Expr::Call { callee: Box::new(Expr::Name("error_func".into())), args: vec![], kwargs: vec![] }),
                )),
                Box::new(Expr::Literal(Vector::number(1.0))),
            ),
        )]),
        Expr::Pragma("out".into(), Box::new(Expr::Name("x".into()))),
    ]);
    let program = compile(&top, &mut interner, &builtins, "scenario6");
    let out_sym = interner.intern("out");
    let error_func_sym = interner.intern("error_func");

    let vm = null_loader_vm(interner, builtins);
    let mut state = State::new();
    let mut ctx = Context::new(&mut state, "scenario6");
    ctx.variables.insert(error_func_sym, Vector::from_objects([Object::Callable(Rc::new(RaisingCallable))]));
    vm.run(&program, &mut ctx).unwrap();

    assert_eq!(ctx.pragmas.get(&out_sym).unwrap().as_numbers().unwrap(), &[1.0]);
    assert!(ctx.errors.is_empty());
}
