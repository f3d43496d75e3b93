//! The on-disk debug-AST format: a serde/RON mirror of
//! `flitter_compiler::ast::Expr`.
//!
//! There is no textual Flitter grammar (see `flitter-compiler::ast`'s own
//! doc comment) so this crate's `.fl.ron` files are the only way to build a
//! program from disk; `flitter_core::Vector` and `flitter_compiler::ast::Expr`
//! don't derive `serde` themselves (neither type is ever serialized inside
//! the engine), so this module owns the bridge.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use flitter_compiler::ast::{BinaryOp, CompareOp, Expr, UnaryOp};
use flitter_core::{Object, Query, Vector};

#[derive(Debug, Serialize, Deserialize)]
pub enum RonVector {
    Null,
    Num(Vec<f64>),
    Str(String),
}

impl From<RonVector> for Vector {
    fn from(v: RonVector) -> Self {
        match v {
            RonVector::Null => Vector::null(),
            RonVector::Num(ns) => Vector::from_numbers(ns),
            RonVector::Str(s) => Vector::string(s),
        }
    }
}

/// The inverse direction, used to snapshot `State` to a `--state` file.
/// `None` for object kinds with no on-disk representation (nodes,
/// callables, compiled programs) — a `State` entry holding one of those is
/// simply dropped from the snapshot rather than failing the whole write.
impl TryFrom<&Vector> for RonVector {
    type Error = ();

    fn try_from(v: &Vector) -> Result<Self, ()> {
        match v {
            Vector::Numeric(ns) if ns.is_empty() => Ok(RonVector::Null),
            Vector::Numeric(ns) => Ok(RonVector::Num(ns.to_vec())),
            Vector::Objects(objs) => match objs.as_ref() {
                [obj] => match obj.as_ref() {
                    Object::Str(s) => Ok(RonVector::Str(s.to_string())),
                    _ => Err(()),
                },
                _ => Err(()),
            },
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RonQuery {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub stop: bool,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub subquery: Option<Box<RonQuery>>,
    #[serde(default)]
    pub altquery: Option<Box<RonQuery>>,
}

impl From<RonQuery> for Query {
    fn from(q: RonQuery) -> Self {
        Query {
            kind: q.kind.map(Rc::from),
            tags: q.tags.into_iter().map(Rc::from).collect(),
            strict: q.strict,
            stop: q.stop,
            first: q.first,
            subquery: q.subquery.map(|q| Box::new((*q).into())),
            altquery: q.altquery.map(|q| Box::new((*q).into())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub enum RonUnaryOp {
    Neg,
    Pos,
    Not,
}

impl From<RonUnaryOp> for UnaryOp {
    fn from(op: RonUnaryOp) -> Self {
        match op {
            RonUnaryOp::Neg => UnaryOp::Neg,
            RonUnaryOp::Pos => UnaryOp::Pos,
            RonUnaryOp::Not => UnaryOp::Not,
        }
    }
}

#[derive(Debug, Deserialize)]
pub enum RonBinaryOp {
    Add,
    Sub,
    Mul,
    TrueDiv,
    FloorDiv,
    Mod,
    Pow,
    Xor,
}

impl From<RonBinaryOp> for BinaryOp {
    fn from(op: RonBinaryOp) -> Self {
        match op {
            RonBinaryOp::Add => BinaryOp::Add,
            RonBinaryOp::Sub => BinaryOp::Sub,
            RonBinaryOp::Mul => BinaryOp::Mul,
            RonBinaryOp::TrueDiv => BinaryOp::TrueDiv,
            RonBinaryOp::FloorDiv => BinaryOp::FloorDiv,
            RonBinaryOp::Mod => BinaryOp::Mod,
            RonBinaryOp::Pow => BinaryOp::Pow,
            RonBinaryOp::Xor => BinaryOp::Xor,
        }
    }
}

#[derive(Debug, Deserialize)]
pub enum RonCompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl From<RonCompareOp> for CompareOp {
    fn from(op: RonCompareOp) -> Self {
        match op {
            RonCompareOp::Eq => CompareOp::Eq,
            RonCompareOp::Ne => CompareOp::Ne,
            RonCompareOp::Lt => CompareOp::Lt,
            RonCompareOp::Le => CompareOp::Le,
            RonCompareOp::Gt => CompareOp::Gt,
            RonCompareOp::Ge => CompareOp::Ge,
        }
    }
}

/// Mirrors the on-disk-authorable subset of `flitter_compiler::ast::Expr`;
/// every `Name` is a plain `String` here (interned during conversion) and
/// every `Box<Expr>` is a `Box<RonExpr>`. Omits `FunctionName`, `InlineLet`,
/// and `FastSlice` — these only ever arise from the partial evaluator
/// inlining a call or folding a `Slice`, never from source a host would
/// hand-write or emit as a debug AST.
#[derive(Debug, Deserialize)]
pub enum RonExpr {
    Literal(RonVector),
    Name(String),
    Lookup(Box<RonExpr>),
    Range(Box<RonExpr>, Box<RonExpr>, Box<RonExpr>),
    Unary(RonUnaryOp, Box<RonExpr>),
    Binary(RonBinaryOp, Box<RonExpr>, Box<RonExpr>),
    Compare(RonCompareOp, Box<RonExpr>, Box<RonExpr>),
    And(Box<RonExpr>, Box<RonExpr>),
    Or(Box<RonExpr>, Box<RonExpr>),
    Slice(Box<RonExpr>, Box<RonExpr>),
    Call {
        callee: Box<RonExpr>,
        args: Vec<RonExpr>,
        kwargs: Vec<(String, RonExpr)>,
    },
    Let(Vec<(String, RonExpr)>),
    For {
        var: String,
        source: Box<RonExpr>,
        body: Box<RonExpr>,
    },
    IfElse(Vec<(RonExpr, RonExpr)>, Option<Box<RonExpr>>),
    Function {
        name: String,
        params: Vec<String>,
        defaults: Vec<Option<RonExpr>>,
        body: Box<RonExpr>,
    },
    Import {
        filename: Box<RonExpr>,
        names: Vec<String>,
    },
    Pragma(String, Box<RonExpr>),
    NodeCtor {
        kind: String,
        tags: Vec<String>,
        children: Box<RonExpr>,
    },
    Attributes(Box<RonExpr>, Vec<(String, RonExpr)>),
    Prepend(Box<RonExpr>),
    Sequence(Vec<RonExpr>),
    Search(RonQuery),
}

impl From<RonExpr> for Expr {
    fn from(e: RonExpr) -> Self {
        match e {
            RonExpr::Literal(v) => Expr::Literal(v.into()),
            RonExpr::Name(n) => Expr::Name(n.into()),
            RonExpr::Lookup(e) => Expr::Lookup(Box::new((*e).into())),
            RonExpr::Range(a, b, c) => Expr::Range(Box::new((*a).into()), Box::new((*b).into()), Box::new((*c).into())),
            RonExpr::Unary(op, e) => Expr::Unary(op.into(), Box::new((*e).into())),
            RonExpr::Binary(op, a, b) => Expr::Binary(op.into(), Box::new((*a).into()), Box::new((*b).into())),
            RonExpr::Compare(op, a, b) => Expr::Compare(op.into(), Box::new((*a).into()), Box::new((*b).into())),
            RonExpr::And(a, b) => Expr::And(Box::new((*a).into()), Box::new((*b).into())),
            RonExpr::Or(a, b) => Expr::Or(Box::new((*a).into()), Box::new((*b).into())),
            RonExpr::Slice(a, b) => Expr::Slice(Box::new((*a).into()), Box::new((*b).into())),
            RonExpr::Call { callee, args, kwargs } => Expr::Call {
                callee: Box::new((*callee).into()),
                args: args.into_iter().map(Into::into).collect(),
                kwargs: kwargs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            },
            RonExpr::Let(binds) => Expr::Let(binds.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
            RonExpr::For { var, source, body } => {
                Expr::For { var: var.into(), source: Box::new((*source).into()), body: Box::new((*body).into()) }
            }
            RonExpr::IfElse(arms, else_) => Expr::IfElse(
                arms.into_iter().map(|(c, t)| (c.into(), t.into())).collect(),
                else_.map(|e| Box::new((*e).into())),
            ),
            RonExpr::Function { name, params, defaults, body } => Expr::Function {
                name: name.into(),
                params: params.into_iter().map(Into::into).collect(),
                defaults: defaults.into_iter().map(|d| d.map(Into::into)).collect(),
                body: Box::new((*body).into()),
            },
            RonExpr::Import { filename, names } => {
                Expr::Import { filename: Box::new((*filename).into()), names: names.into_iter().map(Into::into).collect() }
            }
            RonExpr::Pragma(name, e) => Expr::Pragma(name.into(), Box::new((*e).into())),
            RonExpr::NodeCtor { kind, tags, children } => {
                Expr::NodeCtor { kind: kind.into(), tags: tags.into_iter().map(Into::into).collect(), children: Box::new((*children).into()) }
            }
            RonExpr::Attributes(target, binds) => {
                Expr::Attributes(Box::new((*target).into()), binds.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
            }
            RonExpr::Prepend(e) => Expr::Prepend(Box::new((*e).into())),
            RonExpr::Sequence(es) => Expr::Sequence(es.into_iter().map(Into::into).collect()),
            RonExpr::Search(q) => Expr::Search(Rc::new(q.into())),
        }
    }
}

/// Parses a `.fl.ron` debug-AST file's contents into a compiler-ready `Expr`.
pub fn parse_ron(text: &str) -> Result<Expr, ron::error::SpannedError> {
    let ron_expr: RonExpr = ron::from_str(text)?;
    Ok(ron_expr.into())
}

/// Parses a single `--var name=VALUE` RHS (a `RonVector` literal, e.g.
/// `Num([1.0])` or `Str("hi")`) into a `Vector`.
pub fn parse_ron_vector(text: &str) -> Result<Vector, ron::error::SpannedError> {
    let ron_vector: RonVector = ron::from_str(text)?;
    Ok(ron_vector.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_trivial_literal() {
        let expr = parse_ron("Literal(Num([42.0]))").unwrap();
        assert_eq!(expr.as_literal().unwrap().as_numbers().unwrap(), &[42.0]);
    }

    #[test]
    fn parses_a_pragma_wrapping_a_binary_expr() {
        let expr = parse_ron(r#"Pragma("v", Binary(Add, Literal(Num([1.0])), Literal(Num([2.0]))))"#).unwrap();
        assert!(matches!(expr, Expr::Pragma(_, _)));
    }
}
