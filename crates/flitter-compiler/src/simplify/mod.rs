//! The partial evaluator (§4.3): walks the AST with a `variables` mapping
//! of names to known values/aliases/functions and returns a simplified,
//! equivalent AST — constant folding, algebraic rewrites, bounded loop
//! unrolling, bounded function inlining, dead-`let` elimination.

use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;

use flitter_core::{Object, StaticBuiltins, Vector};

use crate::ast::{BinaryOp, CompareOp, Expr, Name, UnaryOp};

/// What a name is known to be, while walking the tree.
#[derive(Clone)]
pub enum Binding {
    Value(Vector),
    Alias(Name),
    Function(Rc<FunctionDecl>),
}

#[derive(Clone)]
pub struct FunctionDecl {
    pub name: Name,
    pub params: Vec<Name>,
    pub defaults: Vec<Option<Expr>>,
    pub body: Expr,
}

/// `name -> Option<Binding>`: `Some` is a known value/alias/function,
/// `None` is "explicitly unknown" (e.g. a loop variable or function
/// parameter, shadowing whatever the enclosing scope bound), and a
/// missing key is a genuinely free name.
pub type Variables = IndexMap<Name, Option<Binding>>;

/// Caps on unrolling/inlining (§9 "partial evaluation termination").
/// Exceeding either leaves the `For`/`Call` node as-is rather than erroring.
#[derive(Debug, Clone, Copy)]
pub struct SimplifyBudget {
    pub max_unroll: u32,
    pub max_inline_depth: u32,
}

impl Default for SimplifyBudget {
    fn default() -> Self {
        SimplifyBudget { max_unroll: 256, max_inline_depth: 64 }
    }
}

/// Diagnostics collected while simplifying — unresolved free names when no
/// outer `unbound` set was supplied to receive them. Informational only;
/// `flitter check` surfaces these, but they never block compilation.
pub type Diagnostics = Vec<String>;

struct Simplifier<'b> {
    variables: Variables,
    unbound: Option<HashSet<Name>>,
    budget: SimplifyBudget,
    inline_depth: u32,
    static_builtins: &'b StaticBuiltins,
    diagnostics: Diagnostics,
}

/// Run the partial evaluator over `ast`.
///
/// `unbound`, if provided, receives names that resolve to nothing in
/// `variables` — used by `Function`/`Attributes` simplification at an
/// outer level to discover whether a subtree is closed. Free names are
/// otherwise reported in the returned `Diagnostics`.
pub fn simplify(
    ast: &Expr,
    variables: Variables,
    budget: SimplifyBudget,
    static_builtins: &StaticBuiltins,
    mut unbound: Option<&mut HashSet<Name>>,
) -> (Expr, Diagnostics) {
    let mut simplifier = Simplifier {
        variables,
        unbound: unbound.as_deref().map(|_| HashSet::new()),
        budget,
        inline_depth: 0,
        static_builtins,
        diagnostics: Vec::new(),
    };
    let result = simplifier.simplify_expr(ast);
    if let Some(out) = unbound.as_deref_mut() {
        if let Some(found) = simplifier.unbound {
            out.extend(found);
        }
    }
    (result, simplifier.diagnostics)
}

fn clone_literal_safely(v: &Vector) -> Vector {
    match v.objects() {
        None => v.clone(),
        Some(objs) if !objs.iter().any(|o| matches!(o.as_ref(), Object::Node(_))) => v.clone(),
        Some(objs) => Vector::from_objects(objs.iter().map(|o| match o.as_ref() {
            Object::Node(n) => Object::Node(n.deep_clone()),
            other => other.clone(),
        })),
    }
}

fn scalar(v: &Vector) -> Option<f64> {
    v.as_numbers().filter(|n| n.len() == 1).map(|n| n[0])
}

impl<'b> Simplifier<'b> {
    fn with_scope<T>(&mut self, extra: impl IntoIterator<Item = (Name, Option<Binding>)>, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.variables.clone();
        for (name, binding) in extra {
            self.variables.insert(name, binding);
        }
        let result = f(self);
        self.variables = saved;
        result
    }

    fn simplify_many(&mut self, exprs: &[Expr]) -> Vec<Expr> {
        exprs.iter().map(|e| self.simplify_expr(e)).collect()
    }

    fn try_fold_node(&self, kind: &Name, tags: &[Name], children: &Expr) -> Option<flitter_core::NodeRef> {
        let objs: Vec<Rc<Object>> = match children {
            Expr::Literal(v) if v.is_empty() => Vec::new(),
            Expr::Literal(v) => v.objects()?.to_vec(),
            _ => return None,
        };
        let node = flitter_core::NodeRef::new(kind.clone());
        for tag in tags {
            node.add_tag(tag.clone());
        }
        for obj in &objs {
            match obj.as_ref() {
                Object::Node(child) => {
                    let to_attach = if child.has_parent() { child.deep_clone() } else { child.clone() };
                    node.append_child(to_attach);
                }
                _ => return None,
            }
        }
        Some(node)
    }

    fn simplify_expr(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Literal(v) => Expr::Literal(clone_literal_safely(v)),

            Expr::Name(name) => match self.variables.get(name) {
                Some(Some(Binding::Value(v))) => Expr::Literal(clone_literal_safely(v)),
                Some(Some(Binding::Alias(other))) => Expr::Name(other.clone()),
                Some(Some(Binding::Function(decl))) => Expr::FunctionName(decl.name.clone()),
                Some(None) => Expr::Name(name.clone()),
                None => {
                    match &mut self.unbound {
                        Some(set) => {
                            set.insert(name.clone());
                        }
                        None => self.diagnostics.push(format!("unbound name '{name}'")),
                    }
                    Expr::Name(name.clone())
                }
            },

            Expr::FunctionName(name) => Expr::FunctionName(name.clone()),

            Expr::Lookup(key) => Expr::Lookup(Box::new(self.simplify_expr(key))),

            Expr::Range(a, b, c) => {
                let a = self.simplify_expr(a);
                let b = self.simplify_expr(b);
                let c = self.simplify_expr(c);
                if let (Expr::Literal(av), Expr::Literal(bv), Expr::Literal(cv)) = (&a, &b, &c) {
                    if let (Some(a0), Some(b0), Some(c0)) = (scalar(av), scalar(bv), scalar(cv)) {
                        return Expr::Literal(Vector::fill_range(a0, b0, c0));
                    }
                }
                Expr::Range(Box::new(a), Box::new(b), Box::new(c))
            }

            Expr::Unary(op, e) => {
                let e = self.simplify_expr(e);
                if let Expr::Literal(v) = &e {
                    let folded = match op {
                        UnaryOp::Neg => v.neg(),
                        UnaryOp::Pos => v.pos(),
                        UnaryOp::Not => v.not(),
                    };
                    return Expr::Literal(folded);
                }
                match (op, &e) {
                    (UnaryOp::Pos, _) => e,
                    (UnaryOp::Neg, Expr::Unary(UnaryOp::Neg, inner)) => (**inner).clone(),
                    (UnaryOp::Neg, Expr::Binary(BinaryOp::Mul, l, r)) if l.is_literal() => Expr::Binary(
                        BinaryOp::Mul,
                        Box::new(Expr::Literal(l.as_literal().unwrap().neg())),
                        r.clone(),
                    ),
                    _ => Expr::Unary(*op, Box::new(e)),
                }
            }

            Expr::Binary(op, l, r) => {
                let l = self.simplify_expr(l);
                let r = self.simplify_expr(r);
                if let (Expr::Literal(lv), Expr::Literal(rv)) = (&l, &r) {
                    let folded = match op {
                        BinaryOp::Add => lv.add(rv),
                        BinaryOp::Sub => lv.sub(rv),
                        BinaryOp::Mul => lv.mul(rv),
                        BinaryOp::TrueDiv => lv.truediv(rv),
                        BinaryOp::FloorDiv => lv.floordiv(rv),
                        BinaryOp::Mod => lv.modulo(rv),
                        BinaryOp::Pow => lv.pow(rv),
                        BinaryOp::Xor => Vector::truth(lv.as_bool() != rv.as_bool()),
                    };
                    return Expr::Literal(folded);
                }
                let is_zero = |e: &Expr| matches!(e, Expr::Literal(v) if scalar(v) == Some(0.0));
                let is_one = |e: &Expr| matches!(e, Expr::Literal(v) if scalar(v) == Some(1.0));
                let is_minus_one = |e: &Expr| matches!(e, Expr::Literal(v) if scalar(v) == Some(-1.0));
                match op {
                    BinaryOp::Add => {
                        if is_zero(&l) {
                            return r;
                        }
                        if is_zero(&r) {
                            return l;
                        }
                        if let Expr::Unary(UnaryOp::Neg, inner) = &r {
                            return Expr::Binary(BinaryOp::Sub, Box::new(l), inner.clone());
                        }
                    }
                    BinaryOp::Sub => {
                        if is_zero(&r) {
                            return l;
                        }
                        if is_zero(&l) {
                            return Expr::Unary(UnaryOp::Neg, Box::new(r));
                        }
                    }
                    BinaryOp::Mul => {
                        if is_one(&l) {
                            return r;
                        }
                        if is_one(&r) {
                            return l;
                        }
                        if is_minus_one(&l) {
                            return Expr::Unary(UnaryOp::Neg, Box::new(r));
                        }
                        if is_minus_one(&r) {
                            return Expr::Unary(UnaryOp::Neg, Box::new(l));
                        }
                    }
                    _ => {}
                }
                Expr::Binary(*op, Box::new(l), Box::new(r))
            }

            Expr::Compare(op, l, r) => {
                let l = self.simplify_expr(l);
                let r = self.simplify_expr(r);
                if let (Expr::Literal(lv), Expr::Literal(rv)) = (&l, &r) {
                    let folded = match op {
                        CompareOp::Eq => lv.eq_vector(rv),
                        CompareOp::Ne => lv.ne_vector(rv),
                        CompareOp::Lt => lv.lt_vector(rv),
                        CompareOp::Le => lv.le_vector(rv),
                        CompareOp::Gt => lv.gt_vector(rv),
                        CompareOp::Ge => lv.ge_vector(rv),
                    };
                    return Expr::Literal(folded);
                }
                Expr::Compare(*op, Box::new(l), Box::new(r))
            }

            Expr::And(l, r) => {
                let l = self.simplify_expr(l);
                if let Expr::Literal(lv) = &l {
                    return if lv.as_bool() { self.simplify_expr(r) } else { l };
                }
                Expr::And(Box::new(l), Box::new(self.simplify_expr(r)))
            }

            Expr::Or(l, r) => {
                let l = self.simplify_expr(l);
                if let Expr::Literal(lv) = &l {
                    return if lv.as_bool() { l } else { self.simplify_expr(r) };
                }
                Expr::Or(Box::new(l), Box::new(self.simplify_expr(r)))
            }

            Expr::Slice(e, idx) => {
                let e = self.simplify_expr(e);
                let idx = self.simplify_expr(idx);
                if let Expr::Literal(idx_v) = &idx {
                    if let Expr::Literal(e_v) = &e {
                        return Expr::Literal(e_v.slice(idx_v));
                    }
                    return Expr::FastSlice(Box::new(e), idx_v.clone());
                }
                Expr::Slice(Box::new(e), Box::new(idx))
            }

            Expr::FastSlice(e, idx) => {
                let e = self.simplify_expr(e);
                if let Expr::Literal(ev) = &e {
                    return Expr::Literal(ev.slice(idx));
                }
                Expr::FastSlice(Box::new(e), idx.clone())
            }

            Expr::Call { callee, args, kwargs } => {
                let callee = self.simplify_expr(callee);
                let args = self.simplify_many(args);
                let kwargs: Vec<(Name, Expr)> = kwargs.iter().map(|(n, e)| (n.clone(), self.simplify_expr(e))).collect();

                if let Expr::FunctionName(name) = &callee {
                    if self.inline_depth < self.budget.max_inline_depth {
                        if let Some(Some(Binding::Function(decl))) = self.variables.get(name) {
                            let decl = decl.clone();
                            if args.len() <= decl.params.len() {
                                let mut bindings: Vec<(Name, Expr)> = decl
                                    .params
                                    .iter()
                                    .enumerate()
                                    .map(|(i, p)| {
                                        let value = args
                                            .get(i)
                                            .cloned()
                                            .or_else(|| decl.defaults.get(i).cloned().flatten())
                                            .unwrap_or_else(Expr::null);
                                        (p.clone(), value)
                                    })
                                    .collect();
                                for (kwarg_name, kwarg_val) in &kwargs {
                                    if let Some(slot) = bindings.iter_mut().find(|(n, _)| n == kwarg_name) {
                                        slot.1 = kwarg_val.clone();
                                    }
                                }
                                self.inline_depth += 1;
                                let inlined = Expr::InlineLet(Box::new(decl.body.clone()), bindings);
                                let result = self.simplify_expr(&inlined);
                                self.inline_depth -= 1;
                                return result;
                            }
                        }
                    }
                }

                if let Expr::Name(name) = &callee {
                    if kwargs.is_empty() && args.iter().all(Expr::is_literal) && self.static_builtins.contains(name) {
                        if let Some(f) = self.static_builtins.get(name) {
                            let arg_vals: Vec<Vector> = args.iter().map(|a| a.as_literal().unwrap().clone()).collect();
                            return Expr::Literal(f(&arg_vals));
                        }
                    }
                }

                Expr::Call { callee: Box::new(callee), args, kwargs }
            }

            Expr::Let(bindings) => {
                let mut remaining = Vec::new();
                for (name, rhs) in bindings {
                    let rhs = self.simplify_expr(rhs);
                    if let Expr::Literal(v) = &rhs {
                        self.variables.insert(name.clone(), Some(Binding::Value(v.clone())));
                    } else {
                        self.variables.insert(name.clone(), None);
                        remaining.push((name.clone(), rhs));
                    }
                }
                if remaining.is_empty() { Expr::null() } else { Expr::Let(remaining) }
            }

            Expr::InlineLet(body, bindings) => {
                let mut remaining = Vec::new();
                let mut extra_scope = Vec::new();
                for (name, rhs) in bindings {
                    let rhs = self.simplify_expr(rhs);
                    if let Expr::Literal(v) = &rhs {
                        extra_scope.push((name.clone(), Some(Binding::Value(v.clone()))));
                    } else {
                        extra_scope.push((name.clone(), None));
                        remaining.push((name.clone(), rhs));
                    }
                }
                let body = self.with_scope(extra_scope, |s| s.simplify_expr(body));
                if remaining.is_empty() { body } else { Expr::InlineLet(Box::new(body), remaining) }
            }

            Expr::For { var, source, body } => {
                let source = self.simplify_expr(source);
                if let Expr::Literal(src) = &source {
                    let n = src.len();
                    if (n as u32) <= self.budget.max_unroll {
                        let items: Vec<Expr> = (0..n)
                            .map(|i| {
                                let elem = src.slice(&Vector::number(i as f64));
                                self.with_scope([(var.clone(), Some(Binding::Value(elem)))], |s| s.simplify_expr(body))
                            })
                            .collect();
                        return Expr::Sequence(items);
                    }
                }
                let body = self.with_scope([(var.clone(), None)], |s| s.simplify_expr(body));
                Expr::For { var: var.clone(), source: Box::new(source), body: Box::new(body) }
            }

            Expr::IfElse(branches, else_) => {
                let mut remaining = Vec::new();
                for (cond, then) in branches {
                    let cond = self.simplify_expr(cond);
                    if let Expr::Literal(v) = &cond {
                        if v.as_bool() {
                            return self.simplify_expr(then);
                        }
                        continue;
                    }
                    let then = self.simplify_expr(then);
                    remaining.push((cond, then));
                }
                if remaining.is_empty() {
                    return match else_ {
                        Some(e) => self.simplify_expr(e),
                        None => Expr::null(),
                    };
                }
                let else_ = else_.as_ref().map(|e| Box::new(self.simplify_expr(e)));
                Expr::IfElse(remaining, else_)
            }

            Expr::Function { name, params, defaults, body } => {
                let defaults: Vec<Option<Expr>> = defaults.iter().map(|d| d.as_ref().map(|e| self.simplify_expr(e))).collect();
                let param_scope: Vec<(Name, Option<Binding>)> = params.iter().cloned().map(|p| (p, None)).collect();
                let body = self.with_scope(param_scope, |s| s.simplify_expr(body));
                let decl = Rc::new(FunctionDecl {
                    name: name.clone(),
                    params: params.clone(),
                    defaults: defaults.clone(),
                    body: body.clone(),
                });
                self.variables.insert(name.clone(), Some(Binding::Function(decl)));
                Expr::Function { name: name.clone(), params: params.clone(), defaults, body: Box::new(body) }
            }

            Expr::Import { filename, names } => {
                let filename = self.simplify_expr(filename);
                for name in names {
                    self.variables.insert(name.clone(), None);
                }
                Expr::Import { filename: Box::new(filename), names: names.clone() }
            }

            Expr::Pragma(name, e) => Expr::Pragma(name.clone(), Box::new(self.simplify_expr(e))),

            Expr::NodeCtor { kind, tags, children } => {
                let children = self.simplify_expr(children);
                if let Some(node) = self.try_fold_node(kind, tags, &children) {
                    return Expr::Literal(Vector::node(node));
                }
                Expr::NodeCtor { kind: kind.clone(), tags: tags.clone(), children: Box::new(children) }
            }

            Expr::Attributes(target, bindings) => {
                let target = self.simplify_expr(target);
                let target_nodes = match &target {
                    Expr::Literal(v) => v.objects().map(|objs| objs.to_vec()),
                    _ => None,
                };
                let mut remaining = Vec::new();
                for (name, rhs) in bindings {
                    let rhs = self.simplify_expr(rhs);
                    if let (Expr::Literal(val), Some(nodes)) = (&rhs, &target_nodes) {
                        let all_nodes = nodes.iter().all(|o| matches!(o.as_ref(), Object::Node(_)));
                        if all_nodes {
                            for obj in nodes {
                                if let Object::Node(n) = obj.as_ref() {
                                    n.set_attribute(name.clone(), val.clone());
                                }
                            }
                            continue;
                        }
                    }
                    remaining.push((name.clone(), rhs));
                }
                if remaining.is_empty() { target } else { Expr::Attributes(Box::new(target), remaining) }
            }

            Expr::Prepend(e) => Expr::Prepend(Box::new(self.simplify_expr(e))),

            Expr::Search(q) => Expr::Search(q.clone()),

            Expr::Sequence(items) => {
                let mut flat = Vec::new();
                for item in items {
                    let simplified = self.simplify_expr(item);
                    match simplified {
                        Expr::Sequence(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                let mut merged: Vec<Expr> = Vec::new();
                for item in flat {
                    match (merged.last_mut(), &item) {
                        (Some(Expr::Literal(prev)), Expr::Literal(cur)) => {
                            *prev = Vector::compose(&[prev.clone(), cur.clone()]);
                        }
                        _ => merged.push(item),
                    }
                }
                let has_binding_forms =
                    merged.iter().any(|e| matches!(e, Expr::Let(_) | Expr::Import { .. } | Expr::Function { .. }));
                if !has_binding_forms {
                    match merged.len() {
                        0 => return Expr::null(),
                        1 => return merged.into_iter().next().unwrap(),
                        _ => {}
                    }
                }
                Expr::Sequence(merged)
            }
        }
    }
}

#[cfg(test)]
mod tests;
