//! Lowers a (already partially-evaluated) `Expr` tree into a linear,
//! pre-link `Instruction` stream (§4.4). Mirrors the teacher's
//! `Compiler`/`CompilerBuilder` split, minus the node-type/field-id linking
//! concerns that don't apply to this bytecode's value model.

use std::rc::Rc;

use indexmap::IndexMap;

use flitter_bytecode::{Instruction, Jump, Label, Names};
use flitter_core::{Interner, NodeRef, Object, StaticBuiltins, Vector};

use crate::ast::{BinaryOp, CompareOp, Expr, Name, UnaryOp};
use crate::error::CompileResult;
use crate::program::CompiledProgram;

use super::scope::LocalScope;

pub struct CompilerBuilder<'a> {
    interner: &'a mut Interner,
    static_builtins: &'a StaticBuiltins,
    path: Rc<str>,
    initial_locals: Vec<Option<Name>>,
}

impl<'a> CompilerBuilder<'a> {
    pub fn new(interner: &'a mut Interner, static_builtins: &'a StaticBuiltins, path: Rc<str>) -> Self {
        Self { interner, static_builtins, path, initial_locals: Vec::new() }
    }

    pub fn with_locals(mut self, names: impl IntoIterator<Item = Option<Name>>) -> Self {
        self.initial_locals.extend(names);
        self
    }

    pub fn build(self) -> Compiler<'a> {
        let mut scope = LocalScope::new();
        scope.push_many(self.initial_locals);
        Compiler {
            instructions: Vec::new(),
            label_positions: IndexMap::new(),
            next_label: 0,
            scope,
            interner: self.interner,
            static_builtins: self.static_builtins,
            path: self.path,
        }
    }
}

pub struct Compiler<'a> {
    instructions: Vec<Instruction>,
    label_positions: IndexMap<Label, usize>,
    next_label: u32,
    scope: LocalScope,
    interner: &'a mut Interner,
    static_builtins: &'a StaticBuiltins,
    path: Rc<str>,
}

impl<'a> Compiler<'a> {
    pub fn builder(interner: &'a mut Interner, static_builtins: &'a StaticBuiltins, path: Rc<str>) -> CompilerBuilder<'a> {
        CompilerBuilder::new(interner, static_builtins, path)
    }

    /// Compile the root of a program: every non-`Let`/`Import`/`Function`/
    /// `Pragma` child of the (implicit) top-level sequence emits `AppendRoot`,
    /// and any local still bound at the end is spilled to a global.
    pub fn compile_top(mut self, top: &Expr) -> CompileResult<(Vec<Instruction>, IndexMap<Label, usize>)> {
        self.compile_top_level(top)?;
        Ok(self.into_parts())
    }

    pub fn into_parts(self) -> (Vec<Instruction>, IndexMap<Label, usize>) {
        (self.instructions, self.label_positions)
    }

    fn fresh_label(&mut self) -> Label {
        let l = Label(self.next_label);
        self.next_label += 1;
        l
    }

    fn bind_label(&mut self, label: Label) {
        self.label_positions.insert(label, self.instructions.len());
    }

    fn emit(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    fn compile_top_level(&mut self, top: &Expr) -> CompileResult<()> {
        let items: Vec<&Expr> = match top {
            Expr::Sequence(items) => items.iter().collect(),
            other => vec![other],
        };
        for item in items {
            if self.compile_binding_item(item)? {
                continue;
            }
            self.compile_expr(item)?;
            self.emit(Instruction::AppendRoot);
        }

        let remaining: Vec<(u32, Name)> = self.scope.remaining().map(|(d, n)| (d, n.clone())).collect();
        for (depth, name) in &remaining {
            self.emit(Instruction::LocalLoad(*depth));
            let sym = self.interner.intern(name);
            self.emit(Instruction::StoreGlobal(sym));
        }
        let bound = self.scope.len() as u32;
        if bound > 0 {
            self.emit(Instruction::LocalDrop(bound));
            self.scope.pop(bound as usize);
        }
        Ok(())
    }

    /// Compiles `item` if it is a binding/effect form that contributes no
    /// value (`Let`, `Import`, `Function`, `Pragma`); returns `false` (and
    /// compiles nothing) otherwise so the caller treats it as a value.
    fn compile_binding_item(&mut self, item: &Expr) -> CompileResult<bool> {
        match item {
            Expr::Let(bindings) => {
                self.compile_let(bindings)?;
                Ok(true)
            }
            Expr::Import { filename, names } => {
                self.compile_import(filename, names)?;
                Ok(true)
            }
            Expr::Function { name, params, defaults, body } => {
                self.compile_function(name, params, defaults, body)?;
                Ok(true)
            }
            Expr::Pragma(name, e) => {
                self.compile_pragma(name, e)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn compile_let(&mut self, bindings: &[(Name, Expr)]) -> CompileResult<()> {
        for (_, rhs) in bindings {
            self.compile_expr(rhs)?;
        }
        self.emit(Instruction::LocalPush(bindings.len() as u32));
        self.scope.push_many(bindings.iter().map(|(n, _)| Some(n.clone())));
        Ok(())
    }

    fn compile_import(&mut self, filename: &Expr, names: &[Name]) -> CompileResult<()> {
        self.compile_expr(filename)?;
        let syms: Names = names.iter().map(|n| self.interner.intern(n)).collect::<Vec<_>>().into();
        self.emit(Instruction::Import(syms));
        self.scope.push_many(names.iter().cloned().map(Some));
        Ok(())
    }

    fn compile_pragma(&mut self, name: &Name, e: &Expr) -> CompileResult<()> {
        self.compile_expr(e)?;
        let sym = self.interner.intern(name);
        self.emit(Instruction::Pragma(sym));
        Ok(())
    }

    /// Compiles one default-value `Vector` per parameter (`Vector::null()`
    /// where absent), the body as its own optimised and linked nested
    /// program, then `Func`/`LocalPush(1)` to bind it by name (§4.4
    /// "`Function` emits the default-value vectors, the body as a nested
    /// program ..., then `Func` ... and `LocalPush` to bind it"). Each
    /// default is left on the stack as its own `Vector` — not `Compose`d
    /// into one — so `Func` can recover parameter `i`'s default by position
    /// rather than by indexing into a flattened vector whose element count
    /// no longer lines up with the parameter count once a default is
    /// absent or multi-element.
    fn compile_function(&mut self, name: &Name, params: &[Name], defaults: &[Option<Expr>], body: &Expr) -> CompileResult<()> {
        for d in defaults {
            match d {
                Some(e) => self.compile_expr(e)?,
                None => self.emit(Instruction::Literal(Vector::null())),
            }
        }

        let mut body_compiler = Compiler::builder(&mut *self.interner, self.static_builtins, self.path.clone())
            .with_locals(params.iter().cloned().map(Some))
            .build();
        body_compiler.compile_expr(body)?;
        let (mut body_instructions, mut label_positions) = body_compiler.into_parts();
        crate::optimize::peephole_fixpoint(&mut body_instructions, &mut label_positions);
        crate::link::link(&mut body_instructions, &label_positions)?;
        #[cfg(debug_assertions)]
        super::verify::verify_stack_discipline(&body_instructions)?;

        let mut compiled = CompiledProgram::new(self.path.clone(), body_instructions);
        compiled.set_top(Rc::new(body.clone()));
        self.emit(Instruction::Literal(Vector::from_objects([Object::Program(Rc::new(compiled))])));

        let name_sym = self.interner.intern(name);
        let param_syms: Names = params.iter().map(|p| self.interner.intern(p)).collect::<Vec<_>>().into();
        self.emit(Instruction::Func(name_sym, param_syms));
        self.emit(Instruction::LocalPush(1));
        self.scope.push(Some(name.clone()));
        Ok(())
    }

    /// Compile `expr` so it leaves exactly one `Vector` value on top of
    /// the value stack.
    fn compile_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        match expr {
            Expr::Literal(v) => self.compile_literal(v),

            Expr::Name(name) | Expr::FunctionName(name) => {
                if let Some(depth) = self.scope.depth_of(name) {
                    self.emit(Instruction::LocalLoad(depth));
                } else {
                    let sym = self.interner.intern(name);
                    self.emit(Instruction::Name(sym));
                }
                Ok(())
            }

            Expr::Lookup(key) => {
                self.compile_expr(key)?;
                self.emit(Instruction::Lookup);
                Ok(())
            }

            Expr::Range(a, b, c) => {
                self.compile_expr(a)?;
                self.compile_expr(b)?;
                self.compile_expr(c)?;
                self.emit(Instruction::Range);
                Ok(())
            }

            Expr::Unary(op, e) => {
                self.compile_expr(e)?;
                self.emit(match op {
                    UnaryOp::Neg => Instruction::Neg,
                    UnaryOp::Pos => Instruction::Pos,
                    UnaryOp::Not => Instruction::Not,
                });
                Ok(())
            }

            Expr::Binary(op, l, r) => {
                self.compile_expr(l)?;
                self.compile_expr(r)?;
                self.emit(match op {
                    BinaryOp::Add => Instruction::Add,
                    BinaryOp::Sub => Instruction::Sub,
                    BinaryOp::Mul => Instruction::Mul,
                    BinaryOp::TrueDiv => Instruction::TrueDiv,
                    BinaryOp::FloorDiv => Instruction::FloorDiv,
                    BinaryOp::Mod => Instruction::Mod,
                    BinaryOp::Pow => Instruction::Pow,
                    BinaryOp::Xor => Instruction::Xor,
                });
                Ok(())
            }

            Expr::Compare(op, l, r) => {
                self.compile_expr(l)?;
                self.compile_expr(r)?;
                self.emit(match op {
                    CompareOp::Eq => Instruction::Eq,
                    CompareOp::Ne => Instruction::Ne,
                    CompareOp::Lt => Instruction::Lt,
                    CompareOp::Le => Instruction::Le,
                    CompareOp::Gt => Instruction::Gt,
                    CompareOp::Ge => Instruction::Ge,
                });
                Ok(())
            }

            Expr::And(l, r) => self.compile_and_or(l, r, true),
            Expr::Or(l, r) => self.compile_and_or(l, r, false),

            Expr::Slice(e, idx) => {
                self.compile_expr(e)?;
                self.compile_expr(idx)?;
                self.emit(Instruction::Slice);
                Ok(())
            }

            Expr::FastSlice(e, idx) => {
                self.compile_expr(e)?;
                self.emit(Instruction::SliceLiteral(idx.clone()));
                Ok(())
            }

            Expr::Call { callee, args, kwargs } => self.compile_call(callee, args, kwargs),

            Expr::Let(_) | Expr::Import { .. } | Expr::Function { .. } | Expr::Pragma(_, _) => {
                self.compile_binding_item(expr)?;
                self.emit(Instruction::Literal(Vector::null()));
                Ok(())
            }

            Expr::InlineLet(body, bindings) => {
                let start = self.scope.len();
                self.compile_let(bindings)?;
                self.compile_expr(body)?;
                let bound = (self.scope.len() - start) as u32;
                self.emit(Instruction::LocalDrop(bound));
                self.scope.pop(bound as usize);
                Ok(())
            }

            Expr::For { var, source, body } => self.compile_for(var, source, body),

            Expr::IfElse(branches, else_) => self.compile_if_else(branches, else_),

            Expr::NodeCtor { kind, tags, children } => {
                let mut template = NodeRef::new(kind.as_ref());
                for tag in tags {
                    template.add_tag(tag.as_ref());
                }
                self.emit(Instruction::LiteralNode(template));
                self.compile_node_children(children)
            }

            Expr::Attributes(target, bindings) => self.compile_attributes(target, bindings),

            Expr::Prepend(inner) => self.compile_expr(inner),

            Expr::Search(q) => {
                self.emit(Instruction::Search(q.clone()));
                Ok(())
            }

            Expr::Sequence(items) => {
                let start = self.scope.len();
                let mut value_count = 0u32;
                for item in items {
                    if self.compile_binding_item(item)? {
                        continue;
                    }
                    self.compile_expr(item)?;
                    value_count += 1;
                }
                let bound = (self.scope.len() - start) as u32;
                if bound > 0 {
                    self.emit(Instruction::LocalDrop(bound));
                    self.scope.pop(bound as usize);
                }
                match value_count {
                    0 => self.emit(Instruction::Literal(Vector::null())),
                    1 => {}
                    n => self.emit(Instruction::Compose(n)),
                }
                Ok(())
            }
        }
    }

    /// A `Literal` carrying a node must become `LiteralNode` (fresh copy
    /// per execution) rather than `Literal` (which would share the same
    /// mutable node across every run of a live-coded program).
    fn compile_literal(&mut self, v: &Vector) -> CompileResult<()> {
        let Some(objs) = v.objects() else {
            self.emit(Instruction::Literal(v.clone()));
            return Ok(());
        };
        if !objs.iter().any(|o| matches!(o.as_ref(), Object::Node(_))) {
            self.emit(Instruction::Literal(v.clone()));
            return Ok(());
        }
        for obj in objs.iter() {
            match obj.as_ref() {
                Object::Node(n) => self.emit(Instruction::LiteralNode(n.clone())),
                other => self.emit(Instruction::Literal(Vector::from_objects([other.clone()]))),
            }
        }
        if objs.len() > 1 {
            self.emit(Instruction::Compose(objs.len() as u32));
        }
        Ok(())
    }

    fn compile_and_or(&mut self, l: &Expr, r: &Expr, is_and: bool) -> CompileResult<()> {
        let short = self.fresh_label();
        let end = self.fresh_label();
        self.compile_expr(l)?;
        self.emit(Instruction::Dup);
        self.emit(if is_and {
            Instruction::BranchFalse(Jump::ToLabel(short))
        } else {
            Instruction::BranchTrue(Jump::ToLabel(short))
        });
        self.emit(Instruction::Drop(1));
        self.compile_expr(r)?;
        self.emit(Instruction::Jump(Jump::ToLabel(end)));
        self.bind_label(short);
        self.bind_label(end);
        Ok(())
    }

    fn compile_if_else(&mut self, branches: &[(Expr, Expr)], else_: &Option<Box<Expr>>) -> CompileResult<()> {
        let end = self.fresh_label();
        for (cond, then) in branches {
            let next = self.fresh_label();
            self.compile_expr(cond)?;
            self.emit(Instruction::BranchFalse(Jump::ToLabel(next)));
            self.compile_expr(then)?;
            self.emit(Instruction::Jump(Jump::ToLabel(end)));
            self.bind_label(next);
        }
        match else_ {
            Some(e) => self.compile_expr(e)?,
            None => self.emit(Instruction::Literal(Vector::null())),
        }
        self.bind_label(end);
        Ok(())
    }

    fn compile_for(&mut self, var: &Name, source: &Expr, body: &Expr) -> CompileResult<()> {
        self.compile_expr(source)?;
        self.emit(Instruction::BeginFor);
        let next = self.fresh_label();
        let exit = self.fresh_label();
        self.bind_label(next);
        self.emit(Instruction::Next(1, Jump::ToLabel(exit)));
        self.scope.push(Some(var.clone()));
        self.compile_expr(body)?;
        self.scope.pop(1);
        self.emit(Instruction::PushNext(Jump::ToLabel(next)));
        self.bind_label(exit);
        self.emit(Instruction::EndForCompose);
        Ok(())
    }

    /// Always lowered via a loop over `target`'s vector, per §4.4 "multi-node
    /// attribute application is compiled as a `For`-style loop" — the single-
    /// node literal case never reaches the compiler, since the partial
    /// evaluator folds it directly into the node's attribute map.
    fn compile_attributes(&mut self, target: &Expr, bindings: &[(Name, Expr)]) -> CompileResult<()> {
        self.compile_expr(target)?;
        self.emit(Instruction::Dup);
        self.emit(Instruction::BeginFor);
        let next = self.fresh_label();
        let exit = self.fresh_label();
        self.bind_label(next);
        self.emit(Instruction::Next(1, Jump::ToLabel(exit)));
        self.scope.push(None);
        self.emit(Instruction::LocalLoad(0));
        self.emit(Instruction::SetNodeScope);
        for (name, rhs) in bindings {
            self.compile_expr(rhs)?;
            let sym = self.interner.intern(name);
            self.emit(Instruction::Attribute(sym));
        }
        self.emit(Instruction::ClearNodeScope);
        self.scope.pop(1);
        self.emit(Instruction::PushNext(Jump::ToLabel(next)));
        self.bind_label(exit);
        self.emit(Instruction::EndFor);
        Ok(())
    }

    /// Splits `children` into `Prepend`-wrapped items (attached individually,
    /// in reverse, so their relative order survives) and the rest (composed
    /// and attached in one `Append`). Assumes the constructed node is on top
    /// of the value stack.
    fn compile_node_children(&mut self, children: &Expr) -> CompileResult<()> {
        let items: Vec<Expr> = match children {
            Expr::Sequence(items) => items.clone(),
            other => vec![other.clone()],
        };
        let mut normal = Vec::new();
        let mut prepends = Vec::new();
        for item in items {
            match item {
                Expr::Prepend(inner) => prepends.push(*inner),
                other => normal.push(other),
            }
        }
        self.compile_expr(&Expr::Sequence(normal))?;
        self.emit(Instruction::Append(1));
        for inner in prepends.into_iter().rev() {
            self.compile_expr(&inner)?;
            self.emit(Instruction::Prepend);
        }
        Ok(())
    }

    fn compile_call(&mut self, callee: &Expr, args: &[Expr], kwargs: &[(Name, Expr)]) -> CompileResult<()> {
        if kwargs.is_empty() {
            if let Expr::Name(name) = callee {
                if let Some(key) = self.static_builtins.names().find(|&k| k == name.as_ref()) {
                    for a in args {
                        self.compile_expr(a)?;
                    }
                    self.emit(Instruction::CallFast(key, args.len() as u32));
                    return Ok(());
                }
            }
        }
        for a in args {
            self.compile_expr(a)?;
        }
        for (_, kv) in kwargs {
            self.compile_expr(kv)?;
        }
        self.compile_expr(callee)?;
        let names: Names = kwargs.iter().map(|(n, _)| self.interner.intern(n)).collect::<Vec<_>>().into();
        self.emit(Instruction::Call(args.len() as u32, names));
        Ok(())
    }
}
