use std::rc::Rc;

use flitter_core::{StaticBuiltins, Vector};

use super::*;
use crate::ast::{BinaryOp, Expr};

fn run(ast: &Expr) -> Expr {
    let builtins = StaticBuiltins::default();
    simplify(ast, Variables::new(), SimplifyBudget::default(), &builtins, None).0
}

#[test]
fn folds_pure_arithmetic() {
    let e = Expr::Binary(
        BinaryOp::Add,
        Box::new(Expr::Literal(Vector::number(1.0))),
        Box::new(Expr::Literal(Vector::number(2.0))),
    );
    let result = run(&e);
    assert_eq!(result.as_literal().unwrap().as_numbers().unwrap(), &[3.0]);
}

#[test]
fn add_zero_collapses_to_other_operand() {
    let e = Expr::Binary(BinaryOp::Add, Box::new(Expr::Literal(Vector::number(0.0))), Box::new(Expr::Name("x".into())));
    let result = run(&e);
    assert!(matches!(result, Expr::Name(n) if &*n == "x"));
}

#[test]
fn mul_by_minus_one_becomes_negation() {
    let e = Expr::Binary(BinaryOp::Mul, Box::new(Expr::Literal(Vector::minus_one())), Box::new(Expr::Name("x".into())));
    let result = run(&e);
    assert!(matches!(result, Expr::Unary(UnaryOp::Neg, inner) if matches!(*inner, Expr::Name(n) if &*n == "x")));
}

#[test]
fn double_negation_cancels() {
    let e = Expr::Unary(UnaryOp::Neg, Box::new(Expr::Unary(UnaryOp::Neg, Box::new(Expr::Name("x".into())))));
    let result = run(&e);
    assert!(matches!(result, Expr::Name(n) if &*n == "x"));
}

#[test]
fn and_short_circuits_without_evaluating_right_when_false() {
    // `false and whatever(x)` must not require `x` bound — proves the right
    // side is never visited when the left is a falsy literal.
    let e = Expr::And(
        Box::new(Expr::Literal(Vector::false_())),
        Box::new(Expr::Name("unbound_and_never_touched".into())),
    );
    let mut unbound = std::collections::HashSet::new();
    let builtins = StaticBuiltins::default();
    let (result, _) = simplify(&e, Variables::new(), SimplifyBudget::default(), &builtins, Some(&mut unbound));
    assert!(matches!(result, Expr::Literal(v) if !v.as_bool()));
    assert!(unbound.is_empty());
}

#[test]
fn or_short_circuits_to_left_when_truthy() {
    let e = Expr::Or(Box::new(Expr::Literal(Vector::number(5.0))), Box::new(Expr::Name("never".into())));
    let result = run(&e);
    assert_eq!(result.as_literal().unwrap().as_numbers().unwrap(), &[5.0]);
}

#[test]
fn name_bound_to_value_folds_to_literal() {
    let mut vars = Variables::new();
    vars.insert("x".into(), Some(Binding::Value(Vector::number(7.0))));
    let builtins = StaticBuiltins::default();
    let (result, _) = simplify(&Expr::Name("x".into()), vars, SimplifyBudget::default(), &builtins, None);
    assert_eq!(result.as_literal().unwrap().as_numbers().unwrap(), &[7.0]);
}

#[test]
fn unbound_name_without_outer_set_is_diagnosed() {
    let builtins = StaticBuiltins::default();
    let (result, diagnostics) = simplify(&Expr::Name("mystery".into()), Variables::new(), SimplifyBudget::default(), &builtins, None);
    assert!(matches!(result, Expr::Name(n) if &*n == "mystery"));
    assert_eq!(diagnostics.len(), 1);
}

#[test]
fn static_builtin_call_folds_when_args_literal() {
    let e = Expr::Call {
        callee: Box::new(Expr::Name("sum".into())),
        args: vec![Expr::Literal(Vector::from_numbers([1.0, 2.0, 3.0]))],
        kwargs: vec![],
    };
    let result = run(&e);
    assert_eq!(result.as_literal().unwrap().as_numbers().unwrap(), &[6.0]);
}

#[test]
fn for_loop_unrolls_over_literal_source() {
    let e = Expr::For {
        var: "i".into(),
        source: Box::new(Expr::Literal(Vector::from_numbers([1.0, 2.0]))),
        body: Box::new(Expr::Name("i".into())),
    };
    let result = run(&e);
    match result {
        Expr::Sequence(items) => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].as_literal().unwrap().as_numbers().unwrap(), &[1.0]);
            assert_eq!(items[1].as_literal().unwrap().as_numbers().unwrap(), &[2.0]);
        }
        other => panic!("expected unrolled sequence, got {other:?}"),
    }
}

#[test]
fn if_else_prunes_false_branches() {
    let e = Expr::IfElse(
        vec![(Expr::Literal(Vector::false_()), Expr::Literal(Vector::number(1.0)))],
        Some(Box::new(Expr::Literal(Vector::number(2.0)))),
    );
    let result = run(&e);
    assert_eq!(result.as_literal().unwrap().as_numbers().unwrap(), &[2.0]);
}

#[test]
fn if_else_short_circuits_to_true_branch() {
    let e = Expr::IfElse(
        vec![(Expr::Literal(Vector::true_()), Expr::Literal(Vector::number(9.0)))],
        Some(Box::new(Expr::Literal(Vector::number(2.0)))),
    );
    let result = run(&e);
    assert_eq!(result.as_literal().unwrap().as_numbers().unwrap(), &[9.0]);
}

#[test]
fn let_with_literal_rhs_is_eliminated() {
    let e = Expr::Sequence(vec![
        Expr::Let(vec![("x".into(), Expr::Literal(Vector::number(4.0)))]),
        Expr::Name("x".into()),
    ]);
    let result = run(&e);
    assert_eq!(result.as_literal().unwrap().as_numbers().unwrap(), &[4.0]);
}

#[test]
fn call_to_single_definition_function_inlines() {
    let func = Expr::Function {
        name: "double".into(),
        params: vec!["n".into()],
        defaults: vec![None],
        body: Box::new(Expr::Binary(BinaryOp::Mul, Box::new(Expr::Name("n".into())), Box::new(Expr::Literal(Vector::number(2.0))))),
    };
    let call = Expr::Call {
        callee: Box::new(Expr::Name("double".into())),
        args: vec![Expr::Literal(Vector::number(21.0))],
        kwargs: vec![],
    };
    let e = Expr::Sequence(vec![func, call]);
    let result = run(&e);
    match result {
        Expr::Sequence(items) => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[1].as_literal().unwrap().as_numbers().unwrap(), &[42.0]);
        }
        other => panic!("expected [Function, Literal(42)], got {other:?}"),
    }
}

#[test]
fn node_ctor_with_literal_children_folds_to_node() {
    let e = Expr::NodeCtor { kind: "group".into(), tags: vec![Rc::from("root")], children: Box::new(Expr::null()) };
    let result = run(&e);
    let literal = result.as_literal().expect("node ctor with no children should fold");
    let objs = literal.objects().unwrap();
    assert_eq!(objs.len(), 1);
}

#[test]
fn attributes_on_literal_node_fold_into_the_node() {
    let node = flitter_core::NodeRef::new("shape");
    let ctor_result = Expr::Literal(Vector::node(node));
    let e = Expr::Attributes(Box::new(ctor_result), vec![("x".into(), Expr::Literal(Vector::number(3.0)))]);
    let result = run(&e);
    let literal = result.as_literal().unwrap();
    let objs = literal.objects().unwrap();
    let flitter_core::Object::Node(n) = objs[0].as_ref() else { panic!("expected node") };
    assert_eq!(n.get_attribute("x").unwrap().as_numbers().unwrap(), &[3.0]);
}

#[test]
fn sequence_drops_empty_and_merges_adjacent_literals() {
    let e = Expr::Sequence(vec![
        Expr::Literal(Vector::from_numbers([1.0])),
        Expr::Literal(Vector::from_numbers([2.0])),
    ]);
    let result = run(&e);
    assert_eq!(result.as_literal().unwrap().as_numbers().unwrap(), &[1.0, 2.0]);
}

#[test]
fn range_folds_when_all_operands_literal() {
    let e = Expr::Range(
        Box::new(Expr::Literal(Vector::number(0.0))),
        Box::new(Expr::Literal(Vector::number(3.0))),
        Box::new(Expr::Literal(Vector::number(1.0))),
    );
    let result = run(&e);
    assert_eq!(result.as_literal().unwrap().as_numbers().unwrap(), &[0.0, 1.0, 2.0]);
}
