//! The expression tree `simplify` and `compile` operate on (§2 AST, 25% of
//! the budget). Built directly by a host (there is no textual parser in
//! this crate — see `flitter-cli`'s debug-AST loader for a way to construct
//! one from a file).

use std::rc::Rc;

use flitter_core::{Query, Vector};

pub type Name = Rc<str>;

/// The root of a compiled unit. Usually a `Sequence`.
pub type Top = Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    TrueDiv,
    FloorDiv,
    Mod,
    Pow,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// A constant value, cloned whenever the tree is cloned so simplified
    /// copies never alias a mutable node (§4.3 "Literal passes through").
    Literal(Vector),
    Name(Name),
    /// A `Name` known (by the partial evaluator) to refer to a single-
    /// definition function — kept symbolic, rather than folded to a value,
    /// so a later `Call` can still inline it.
    FunctionName(Name),
    /// `$[key]` — looks `key` up in `Context::state`.
    Lookup(Box<Expr>),
    Range(Box<Expr>, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Slice(Box<Expr>, Box<Expr>),
    /// `Slice` with a literal index, produced by the partial evaluator.
    FastSlice(Box<Expr>, Vector),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(Name, Expr)>,
    },
    /// Binds names for the remainder of the enclosing `Sequence`.
    Let(Vec<(Name, Expr)>),
    /// Binds names scoped only to `body` — the form the partial evaluator
    /// produces when inlining a call.
    InlineLet(Box<Expr>, Vec<(Name, Expr)>),
    For {
        var: Name,
        source: Box<Expr>,
        body: Box<Expr>,
    },
    /// `(condition, then)` branches tried in order, with an optional final
    /// `else`.
    IfElse(Vec<(Expr, Expr)>, Option<Box<Expr>>),
    Function {
        name: Name,
        params: Vec<Name>,
        defaults: Vec<Option<Expr>>,
        body: Box<Expr>,
    },
    Import {
        filename: Box<Expr>,
        names: Vec<Name>,
    },
    Pragma(Name, Box<Expr>),
    /// Constructs one fresh node of `kind` with `tags`; `children` is
    /// compiled to append into it (not the graph root).
    NodeCtor {
        kind: Name,
        tags: Vec<Name>,
        children: Box<Expr>,
    },
    /// Binds attributes onto every node in the vector `target` evaluates
    /// to (a `For`-style loop when that vector has more than one element).
    Attributes(Box<Expr>, Vec<(Name, Expr)>),
    /// Prepend (rather than append) this expression's result into the
    /// enclosing node/graph.
    Prepend(Box<Expr>),
    Sequence(Vec<Expr>),
    /// Scans `Context::graph` for nodes matching `query`.
    Search(Rc<Query>),
}

impl Expr {
    pub fn null() -> Expr {
        Expr::Literal(Vector::null())
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal(_))
    }

    pub fn as_literal(&self) -> Option<&Vector> {
        match self {
            Expr::Literal(v) => Some(v),
            _ => None,
        }
    }
}
