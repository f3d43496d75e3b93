//! The stack-based dispatch loop (§4.6). Grounded on the teacher's
//! `VM`/`VMBuilder` split (`engine/vm.rs`): a builder assembles the shared,
//! cheaply-cloned handles (interner, builtin tables, loader, fuel), and the
//! `Vm` itself carries no per-run state — the value/locals/loop stacks live
//! on the stack of `exec`, not on `Vm`, so a nested `Function` call can hand
//! out a clone of the same `Vm` without aliasing its caller's stacks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use flitter_bytecode::{Instruction, Jump};
use flitter_core::{Context, Interner, NodeRef, Object, StaticBuiltins, Vector};
use flitter_compiler::CompiledProgram;

use crate::builtins::DynamicBuiltins;
use crate::error::{RuntimeError, RuntimeResult};

use super::import::SourceLoader;
use super::value::Function;

/// An optional instruction budget, shared (via `Rc`) across a `Vm` and every
/// nested `Vm` spawned for a `Function` call or an `Import`, so recursion
/// can't escape the limit by starting a "fresh" counter one frame down.
/// Grounded on the teacher's `FuelLimits` (`exec_fuel`), collapsed to a
/// single counter since this VM has no separate recursion-depth limit.
#[derive(Clone)]
pub struct Fuel {
    limit: Option<u64>,
    executed: Rc<Cell<u64>>,
}

impl Fuel {
    pub fn unlimited() -> Self {
        Fuel { limit: None, executed: Rc::new(Cell::new(0)) }
    }

    pub fn limited(limit: u64) -> Self {
        Fuel { limit: Some(limit), executed: Rc::new(Cell::new(0)) }
    }

    fn tick(&self) -> RuntimeResult<()> {
        let executed = self.executed.get() + 1;
        self.executed.set(executed);
        if let Some(limit) = self.limit {
            if executed > limit {
                return Err(RuntimeError::FuelExhausted { executed });
            }
        }
        Ok(())
    }
}

impl Default for Fuel {
    fn default() -> Self {
        Fuel::unlimited()
    }
}

struct LoopFrame {
    items: Vec<Vector>,
    pos: usize,
    /// How many locals the most recent `Next` bound — `PushNext` undoes
    /// exactly that many. Every current emission site uses 1, but the
    /// instruction itself is general.
    locals_per_step: usize,
    accumulator: Vec<Vector>,
}

/// A handle cheap enough to clone per `Function` call: everything it holds
/// is an `Rc`. No mutable per-run state lives here — see `exec`.
#[derive(Clone)]
pub struct Vm {
    interner: Rc<RefCell<Interner>>,
    static_builtins: Rc<StaticBuiltins>,
    dynamic_builtins: Rc<DynamicBuiltins>,
    loader: Rc<RefCell<dyn SourceLoader>>,
    fuel: Fuel,
}

pub struct VmBuilder {
    interner: Rc<RefCell<Interner>>,
    static_builtins: Rc<StaticBuiltins>,
    dynamic_builtins: Rc<DynamicBuiltins>,
    loader: Rc<RefCell<dyn SourceLoader>>,
    fuel: Fuel,
}

impl VmBuilder {
    pub fn new(interner: Rc<RefCell<Interner>>, static_builtins: Rc<StaticBuiltins>, loader: Rc<RefCell<dyn SourceLoader>>) -> Self {
        Self {
            interner,
            static_builtins,
            dynamic_builtins: Rc::new(DynamicBuiltins::default()),
            loader,
            fuel: Fuel::unlimited(),
        }
    }

    pub fn dynamic_builtins(mut self, builtins: DynamicBuiltins) -> Self {
        self.dynamic_builtins = Rc::new(builtins);
        self
    }

    pub fn fuel(mut self, fuel: Fuel) -> Self {
        self.fuel = fuel;
        self
    }

    pub fn build(self) -> Vm {
        Vm {
            interner: self.interner,
            static_builtins: self.static_builtins,
            dynamic_builtins: self.dynamic_builtins,
            loader: self.loader,
            fuel: self.fuel,
        }
    }
}

fn single(v: &Vector) -> Option<f64> {
    v.as_numbers().filter(|n| n.len() == 1).map(|n| n[0])
}

fn jump_target(pc: usize, jump: Jump) -> RuntimeResult<usize> {
    match jump.offset() {
        Some(offset) => Ok((pc as i64 + offset as i64) as usize),
        None => Err(RuntimeError::UnlinkedJump { pc }),
    }
}

impl Vm {
    pub fn builder(interner: Rc<RefCell<Interner>>, static_builtins: Rc<StaticBuiltins>, loader: Rc<RefCell<dyn SourceLoader>>) -> VmBuilder {
        VmBuilder::new(interner, static_builtins, loader)
    }

    /// Runs `program` as a top-level module: every `AppendRoot` attaches
    /// into `context.graph`, every surviving local is spilled to
    /// `context.variables` via `StoreGlobal`. The value stack is expected to
    /// be empty once the program's instructions are exhausted.
    pub fn run(&self, program: &CompiledProgram, context: &mut Context) -> RuntimeResult<()> {
        let stack = self.exec(program.instructions(), Vec::new(), context)?;
        debug_assert!(stack.is_empty(), "top-level program left {} values on the stack", stack.len());
        Ok(())
    }

    /// The core dispatch loop: executes `instructions` to completion
    /// starting from `locals`, returning whatever is left on the value
    /// stack. A top-level program drains it to empty via `AppendRoot`/
    /// `StoreGlobal`; a `Function` body leaves exactly one value (its
    /// return value).
    pub(crate) fn exec(&self, instructions: &[Instruction], locals: Vec<Vector>, context: &mut Context) -> RuntimeResult<Vec<Vector>> {
        let mut stack: Vec<Vector> = Vec::new();
        let mut locals = locals;
        let mut node_scope: Vec<NodeRef> = Vec::new();
        let mut loops: Vec<LoopFrame> = Vec::new();
        let mut pc: usize = 0;

        macro_rules! pop {
            () => {
                stack.pop().ok_or(RuntimeError::StackUnderflow { pc })?
            };
        }

        while pc < instructions.len() {
            self.fuel.tick()?;
            tracing::trace!(pc, instr = ?instructions[pc], "dispatch");
            let mut next_pc = pc + 1;
            match &instructions[pc] {
                Instruction::Literal(v) => stack.push(v.clone()),
                Instruction::LiteralNode(n) => stack.push(Vector::node(n.deep_clone())),
                Instruction::Dup => {
                    let top = stack.last().ok_or(RuntimeError::StackUnderflow { pc })?.clone();
                    stack.push(top);
                }
                Instruction::Drop(k) => {
                    let new_len = stack.len().checked_sub(*k as usize).ok_or(RuntimeError::StackUnderflow { pc })?;
                    stack.truncate(new_len);
                }

                Instruction::Name(sym) => stack.push(self.resolve_name(*sym, &locals, &node_scope, context)),
                Instruction::LocalLoad(depth) => {
                    let idx = locals.len().checked_sub(1 + *depth as usize).ok_or(RuntimeError::LocalsUnderflow { pc })?;
                    stack.push(locals[idx].clone());
                }
                Instruction::LocalPush(n) => {
                    let n = *n as usize;
                    if stack.len() < n {
                        return Err(RuntimeError::StackUnderflow { pc });
                    }
                    let start = stack.len() - n;
                    let pushed: Vec<Vector> = stack.split_off(start);
                    locals.extend(pushed);
                }
                Instruction::LocalDrop(n) => {
                    let new_len = locals.len().checked_sub(*n as usize).ok_or(RuntimeError::LocalsUnderflow { pc })?;
                    locals.truncate(new_len);
                }

                Instruction::Lookup => {
                    let key = pop!();
                    stack.push(context.state.get(&key).unwrap_or_else(Vector::null));
                }
                Instruction::LookupLiteral(key) => {
                    stack.push(context.state.get(key).unwrap_or_else(Vector::null));
                }

                Instruction::Range => {
                    let step = pop!();
                    let stop = pop!();
                    let start = pop!();
                    stack.push(match (single(&start), single(&stop), single(&step)) {
                        (Some(a), Some(b), Some(c)) => Vector::fill_range(a, b, c),
                        _ => Vector::null(),
                    });
                }

                Instruction::Add => binop(&mut stack, pc, Vector::add)?,
                Instruction::Sub => binop(&mut stack, pc, Vector::sub)?,
                Instruction::Mul => binop(&mut stack, pc, Vector::mul)?,
                Instruction::TrueDiv => binop(&mut stack, pc, Vector::truediv)?,
                Instruction::FloorDiv => binop(&mut stack, pc, Vector::floordiv)?,
                Instruction::Mod => binop(&mut stack, pc, Vector::modulo)?,
                Instruction::Pow => binop(&mut stack, pc, Vector::pow)?,
                Instruction::MulAdd => {
                    // Fused `Mul, Add`: stack (bottom to top) is [addend, x, y],
                    // folding x*y (the `Mul`) then (that) + addend (the `Add`).
                    let y = pop!();
                    let x = pop!();
                    let addend = pop!();
                    stack.push(x.mul_add(&y, &addend));
                }

                Instruction::Eq => binop(&mut stack, pc, Vector::eq_vector)?,
                Instruction::Ne => binop(&mut stack, pc, Vector::ne_vector)?,
                Instruction::Lt => binop(&mut stack, pc, Vector::lt_vector)?,
                Instruction::Le => binop(&mut stack, pc, Vector::le_vector)?,
                Instruction::Gt => binop(&mut stack, pc, Vector::gt_vector)?,
                Instruction::Ge => binop(&mut stack, pc, Vector::ge_vector)?,
                Instruction::Xor => {
                    let b = pop!();
                    let a = pop!();
                    stack.push(Vector::truth(a.as_bool() ^ b.as_bool()));
                }
                Instruction::Not => {
                    let a = pop!();
                    stack.push(a.not());
                }
                Instruction::Neg => {
                    let a = pop!();
                    stack.push(a.neg());
                }
                Instruction::Pos => {
                    let a = pop!();
                    stack.push(a.pos());
                }

                Instruction::Slice => {
                    let idx = pop!();
                    let v = pop!();
                    stack.push(v.slice(&idx));
                }
                Instruction::SliceLiteral(idx) => {
                    let v = pop!();
                    stack.push(v.slice(idx));
                }
                Instruction::IndexLiteral(i) => {
                    let v = pop!();
                    stack.push(v.slice(&Vector::number(*i as f64)));
                }

                Instruction::Call(k, names) => {
                    let callee = pop!();
                    let mut kwargs = Vec::with_capacity(names.len());
                    for sym in names.iter().rev() {
                        kwargs.push((Rc::from(self.interner.borrow().resolve(*sym)), pop!()));
                    }
                    kwargs.reverse();
                    let k = *k as usize;
                    if stack.len() < k {
                        return Err(RuntimeError::StackUnderflow { pc });
                    }
                    let args: Vec<Vector> = stack.split_off(stack.len() - k);
                    stack.push(self.dispatch_call(&callee, &args, &kwargs, context));
                }
                Instruction::CallFast(name, k) => {
                    let k = *k as usize;
                    if stack.len() < k {
                        return Err(RuntimeError::StackUnderflow { pc });
                    }
                    let args: Vec<Vector> = stack.split_off(stack.len() - k);
                    let f = self.static_builtins.get(*name).expect("CallFast only emitted for registered builtins");
                    stack.push(f(&args));
                }

                Instruction::Func(name_sym, params) => {
                    let body_val = pop!();
                    if stack.len() < params.len() {
                        return Err(RuntimeError::StackUnderflow { pc });
                    }
                    let defaults: Vec<Vector> = stack.split_off(stack.len() - params.len());
                    let instructions = self.extract_program_instructions(&body_val)?;
                    let param_names: Vec<Rc<str>> = params.iter().map(|s| Rc::from(self.interner.borrow().resolve(*s))).collect();
                    let name = Rc::from(self.interner.borrow().resolve(*name_sym));
                    let function = Function::new(name, param_names, defaults, instructions, locals.clone(), self.clone());
                    stack.push(Vector::from_objects([Object::Callable(Rc::new(function))]));
                }

                Instruction::Tag(sym) => {
                    let node = top_node(&stack, pc)?;
                    node.add_tag(self.interner.borrow().resolve(*sym));
                }
                Instruction::Attribute(sym) => {
                    let value = pop!();
                    let node = node_scope.last().ok_or(RuntimeError::StackUnderflow { pc })?;
                    node.set_attribute(self.interner.borrow().resolve(*sym), value);
                }

                Instruction::Append(k) => {
                    let k = *k as usize;
                    if stack.len() < k {
                        return Err(RuntimeError::StackUnderflow { pc });
                    }
                    let children_vals: Vec<Vector> = stack.split_off(stack.len() - k);
                    let children = Vector::compose(&children_vals);
                    let parent = stack.last().ok_or(RuntimeError::StackUnderflow { pc })?;
                    attach(parent, &children, Attach::Append);
                }
                Instruction::Prepend => {
                    let child = pop!();
                    let parent = stack.last().ok_or(RuntimeError::StackUnderflow { pc })?;
                    attach(parent, &child, Attach::Prepend);
                }
                Instruction::AppendRoot => {
                    let value = pop!();
                    if let Some(objs) = value.objects() {
                        for obj in objs {
                            if let Object::Node(n) = obj.as_ref() {
                                if !n.has_parent() {
                                    context.graph.append_child(n.clone());
                                }
                            }
                        }
                    }
                }

                Instruction::Compose(k) => {
                    let k = *k as usize;
                    if stack.len() < k {
                        return Err(RuntimeError::StackUnderflow { pc });
                    }
                    let parts: Vec<Vector> = stack.split_off(stack.len() - k);
                    stack.push(Vector::compose(&parts));
                }

                Instruction::BeginFor => {
                    let source = pop!();
                    loops.push(LoopFrame { items: expand(&source), pos: 0, locals_per_step: 0, accumulator: Vec::new() });
                }
                Instruction::Next(n, exit) => {
                    let n = *n as usize;
                    let frame = loops.last_mut().ok_or(RuntimeError::LoopStackUnderflow { pc })?;
                    if frame.pos + n <= frame.items.len() {
                        for item in &frame.items[frame.pos..frame.pos + n] {
                            locals.push(item.clone());
                        }
                        frame.pos += n;
                        frame.locals_per_step = n;
                    } else {
                        next_pc = jump_target(pc, *exit)?;
                    }
                }
                Instruction::PushNext(next) => {
                    let result = pop!();
                    let frame = loops.last_mut().ok_or(RuntimeError::LoopStackUnderflow { pc })?;
                    let new_len = locals.len().checked_sub(frame.locals_per_step).ok_or(RuntimeError::LocalsUnderflow { pc })?;
                    locals.truncate(new_len);
                    frame.accumulator.push(result);
                    next_pc = jump_target(pc, *next)?;
                }
                Instruction::EndFor => {
                    loops.pop().ok_or(RuntimeError::LoopStackUnderflow { pc })?;
                }
                Instruction::EndForCompose => {
                    let frame = loops.pop().ok_or(RuntimeError::LoopStackUnderflow { pc })?;
                    stack.push(Vector::compose(&frame.accumulator));
                }

                Instruction::SetNodeScope => {
                    let node = top_node(&stack, pc)?;
                    node_scope.push(node.clone());
                }
                Instruction::ClearNodeScope => {
                    node_scope.pop().ok_or(RuntimeError::StackUnderflow { pc })?;
                }

                Instruction::StoreGlobal(sym) => {
                    let value = pop!();
                    context.variables.insert(*sym, value);
                }

                Instruction::Search(query) => {
                    let matches = query.search(&context.graph);
                    stack.push(Vector::from_objects(matches.into_iter().map(Object::Node)));
                }

                Instruction::Import(names) => {
                    self.exec_import(names, &mut stack, &mut locals, context, pc)?;
                }

                Instruction::Jump(j) => next_pc = jump_target(pc, *j)?,
                Instruction::BranchTrue(j) => {
                    let v = pop!();
                    if v.as_bool() {
                        next_pc = jump_target(pc, *j)?;
                    }
                }
                Instruction::BranchFalse(j) => {
                    let v = pop!();
                    if !v.as_bool() {
                        next_pc = jump_target(pc, *j)?;
                    }
                }

                Instruction::Pragma(sym) => {
                    let value = pop!();
                    context.pragmas.insert(*sym, value);
                }
            }
            pc = next_pc;
        }
        Ok(stack)
    }

    fn resolve_name(&self, sym: flitter_core::Symbol, locals: &[Vector], node_scope: &[NodeRef], context: &mut Context) -> Vector {
        if let Some(v) = context.variables.get(&sym) {
            return v.clone();
        }
        let name = self.interner.borrow().resolve(sym);
        if let Some(f) = self.static_builtins.get(name) {
            return Vector::from_objects([Object::Callable(Rc::new(StaticBuiltinCallable { name: name.into(), f }))]);
        }
        if let Some(f) = self.dynamic_builtins.get(name) {
            return Vector::from_objects([Object::Callable(Rc::new(DynamicBuiltinCallable { name: name.into(), f }))]);
        }
        if let Some(node) = node_scope.last() {
            if let Some(v) = node.get_attribute(name) {
                return v;
            }
        }
        let _ = locals;
        context.record_error(flitter_core::error::ReferenceError { name: name.to_owned() });
        Vector::null()
    }

    fn dispatch_call(&self, callee: &Vector, args: &[Vector], kwargs: &[(Rc<str>, Vector)], context: &mut Context) -> Vector {
        let Some(objs) = callee.objects() else {
            return Vector::null();
        };
        let mut results = Vec::new();
        for obj in objs {
            if let Object::Callable(c) = obj.as_ref() {
                match c.call(context, args, kwargs) {
                    Ok(v) => results.push(v),
                    Err(message) => context.record_error(flitter_core::error::HostCallError { callee: c.name().to_owned(), message }),
                }
            }
        }
        Vector::compose(&results)
    }

    fn extract_program_instructions(&self, v: &Vector) -> RuntimeResult<Rc<[Instruction]>> {
        let program = v
            .objects()
            .and_then(|objs| objs.first())
            .and_then(|o| match o.as_ref() {
                Object::Program(p) => Some(p.clone()),
                _ => None,
            })
            .ok_or(RuntimeError::MalformedFunctionBody)?;
        let compiled = program.as_any().downcast_ref::<CompiledProgram>().ok_or(RuntimeError::MalformedFunctionBody)?;
        Ok(compiled.instructions().clone())
    }

    fn exec_import(&self, names: &flitter_bytecode::Names, stack: &mut Vec<Vector>, locals: &mut Vec<Vector>, context: &mut Context, pc: usize) -> RuntimeResult<()> {
        let filename_val = stack.pop().ok_or(RuntimeError::StackUnderflow { pc })?;
        let filename = filename_val.objects().and_then(|o| o.first()).and_then(|o| match o.as_ref() {
            Object::Str(s) => Some(s.to_string()),
            _ => None,
        });
        let Some(filename) = filename else {
            context.record_error(flitter_core::error::ImportError::NotFound { filename: "<non-string import target>".into() });
            for _ in names.iter() {
                locals.push(Vector::null());
            }
            return Ok(());
        };
        if context.would_cycle(&filename) {
            context.record_error(flitter_core::error::ImportError::Circular { path: filename });
            for _ in names.iter() {
                locals.push(Vector::null());
            }
            return Ok(());
        }
        let loaded = self.loader.borrow_mut().load(&filename, &context.path);
        match loaded {
            None => {
                context.record_error(flitter_core::error::ImportError::NotFound { filename });
                for _ in names.iter() {
                    locals.push(Vector::null());
                }
            }
            Some(program) => {
                let instructions = program.instructions().clone();
                let mut child_context = context.child(filename.clone());
                self.run_raw(&instructions, &mut child_context)?;
                for sym in names.iter() {
                    locals.push(child_context.variables.get(sym).cloned().unwrap_or_else(Vector::null));
                }
                context.errors.extend(child_context.errors);
                context.logs.extend(child_context.logs);
            }
        }
        Ok(())
    }

    fn run_raw(&self, instructions: &[Instruction], context: &mut Context) -> RuntimeResult<()> {
        let stack = self.exec(instructions, Vec::new(), context)?;
        debug_assert!(stack.is_empty(), "imported module left {} values on the stack", stack.len());
        Ok(())
    }
}

fn binop(stack: &mut Vec<Vector>, pc: usize, f: impl Fn(&Vector, &Vector) -> Vector) -> RuntimeResult<()> {
    let b = stack.pop().ok_or(RuntimeError::StackUnderflow { pc })?;
    let a = stack.pop().ok_or(RuntimeError::StackUnderflow { pc })?;
    stack.push(f(&a, &b));
    Ok(())
}

fn top_node(stack: &[Vector], pc: usize) -> RuntimeResult<NodeRef> {
    let top = stack.last().ok_or(RuntimeError::StackUnderflow { pc })?;
    top.objects()
        .and_then(|objs| objs.first())
        .and_then(|o| match o.as_ref() {
            Object::Node(n) => Some(n.clone()),
            _ => None,
        })
        .ok_or(RuntimeError::StackUnderflow { pc })
}

/// Expands a composed vector into one length-1 `Vector` per element, the
/// per-iteration value `BeginFor`/`Next` hand to a loop body.
fn expand(v: &Vector) -> Vec<Vector> {
    match v {
        Vector::Numeric(nums) => nums.iter().map(|n| Vector::number(*n)).collect(),
        Vector::Objects(objs) => objs.iter().map(|o| Vector::from_objects([(**o).clone()])).collect(),
    }
}

enum Attach {
    Append,
    Prepend,
}

/// Attaches `children`'s node elements under every node element of `parent`
/// (§9 Open Question (a)): the last parent keeps the original child nodes,
/// every earlier parent receives a deep copy; a child that already has a
/// parent is always cloned regardless.
fn attach(parent: &Vector, children: &Vector, mode: Attach) {
    let Some(parent_objs) = parent.objects() else { return };
    let parent_nodes: Vec<NodeRef> = parent_objs
        .iter()
        .filter_map(|o| match o.as_ref() {
            Object::Node(n) => Some(n.clone()),
            _ => None,
        })
        .collect();
    let Some(child_objs) = children.objects() else { return };
    let child_nodes: Vec<NodeRef> = child_objs
        .iter()
        .filter_map(|o| match o.as_ref() {
            Object::Node(n) => Some(n.clone()),
            _ => None,
        })
        .collect();
    for (i, parent_node) in parent_nodes.iter().enumerate() {
        let is_last = i + 1 == parent_nodes.len();
        let ordered: Vec<&NodeRef> = match mode {
            Attach::Append => child_nodes.iter().collect(),
            Attach::Prepend => child_nodes.iter().rev().collect(),
        };
        for child in ordered {
            let to_attach = if is_last && !child.has_parent() { child.clone() } else { child.deep_clone() };
            match mode {
                Attach::Append => parent_node.append_child(to_attach),
                Attach::Prepend => parent_node.prepend_child(to_attach),
            }
        }
    }
}

struct StaticBuiltinCallable {
    name: Rc<str>,
    f: flitter_core::builtins::StaticBuiltinFn,
}

impl flitter_core::Callable for StaticBuiltinCallable {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, _context: &mut Context, args: &[Vector], _kwargs: &[(Rc<str>, Vector)]) -> Result<Vector, String> {
        Ok((self.f)(args))
    }
}

struct DynamicBuiltinCallable {
    name: Rc<str>,
    f: crate::builtins::DynamicBuiltinFn,
}

impl flitter_core::Callable for DynamicBuiltinCallable {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_context_consuming(&self) -> bool {
        true
    }

    fn call(&self, context: &mut Context, args: &[Vector], _kwargs: &[(Rc<str>, Vector)]) -> Result<Vector, String> {
        Ok((self.f)(context, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flitter_core::State;
    use super::super::import::NullSourceLoader;

    fn test_vm() -> Vm {
        test_vm_with_interner(Interner::new())
    }

    fn test_vm_with_interner(interner: Interner) -> Vm {
        let builtins = Rc::new(StaticBuiltins::default());
        let loader: Rc<RefCell<dyn SourceLoader>> = Rc::new(RefCell::new(NullSourceLoader));
        Vm::builder(Rc::new(RefCell::new(interner)), builtins, loader).build()
    }

    #[test]
    fn literal_node_appends_to_graph() {
        let vm = test_vm();
        let mut state = State::new();
        let mut ctx = Context::new(&mut state, "test");
        let instrs = vec![Instruction::LiteralNode(NodeRef::new("shape")), Instruction::AppendRoot];
        let stack = vm.exec(&instrs, Vec::new(), &mut ctx).unwrap();
        assert!(stack.is_empty());
        assert_eq!(ctx.graph.children().count(), 1);
        assert_eq!(ctx.graph.children().next().unwrap().kind(), "shape");
    }

    #[test]
    fn append_root_skips_an_already_parented_node() {
        let vm = test_vm();
        let mut state = State::new();
        let mut ctx = Context::new(&mut state, "test");
        let child = NodeRef::new("shape");
        let holder = NodeRef::new("group");
        holder.append_child(child.clone());
        let instrs = vec![Instruction::Literal(Vector::node(child)), Instruction::AppendRoot];
        vm.exec(&instrs, Vec::new(), &mut ctx).unwrap();
        assert_eq!(ctx.graph.children().count(), 0);
    }

    #[test]
    fn arithmetic_adds_broadcasting_operands() {
        let vm = test_vm();
        let mut state = State::new();
        let mut ctx = Context::new(&mut state, "test");
        let instrs = vec![
            Instruction::Literal(Vector::from_numbers([1.0, 2.0])),
            Instruction::Literal(Vector::number(10.0)),
            Instruction::Add,
        ];
        let stack = vm.exec(&instrs, Vec::new(), &mut ctx).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].as_numbers().unwrap(), &[11.0, 12.0]);
    }

    #[test]
    fn mul_add_fuses_left_to_right() {
        // 2 * 3 + 4, pre-fused the way the peephole optimiser leaves it.
        let vm = test_vm();
        let mut state = State::new();
        let mut ctx = Context::new(&mut state, "test");
        let instrs = vec![
            Instruction::Literal(Vector::number(4.0)),
            Instruction::Literal(Vector::number(2.0)),
            Instruction::Literal(Vector::number(3.0)),
            Instruction::MulAdd,
        ];
        let stack = vm.exec(&instrs, Vec::new(), &mut ctx).unwrap();
        assert_eq!(stack[0].as_numbers().unwrap(), &[10.0]);
    }

    #[test]
    fn branch_false_takes_the_else_arm() {
        let vm = test_vm();
        let mut state = State::new();
        let mut ctx = Context::new(&mut state, "test");
        let instrs = vec![
            Instruction::Literal(Vector::false_()),       // pc 0
            Instruction::BranchFalse(Jump::Offset(3)),     // pc 1 -> pc 4
            Instruction::Literal(Vector::number(1.0)),     // pc 2 (then)
            Instruction::Jump(Jump::Offset(2)),            // pc 3 -> pc 5 (past end)
            Instruction::Literal(Vector::number(2.0)),     // pc 4 (else)
        ];
        let stack = vm.exec(&instrs, Vec::new(), &mut ctx).unwrap();
        assert_eq!(stack[0].as_numbers().unwrap(), &[2.0]);
    }

    #[test]
    fn for_loop_composes_the_body_result_per_iteration() {
        // for x in [1, 2, 3]: x * 10
        let vm = test_vm();
        let mut state = State::new();
        let mut ctx = Context::new(&mut state, "test");
        let instrs = vec![
            Instruction::Literal(Vector::from_numbers([1.0, 2.0, 3.0])), // pc 0
            Instruction::BeginFor,                                      // pc 1
            Instruction::Next(1, Jump::Offset(5)),                      // pc 2 -> pc 7 on exit
            Instruction::LocalLoad(0),                                  // pc 3
            Instruction::Literal(Vector::number(10.0)),                 // pc 4
            Instruction::Mul,                                           // pc 5
            Instruction::PushNext(Jump::Offset(-4)),                    // pc 6 -> pc 2
            Instruction::EndForCompose,                                 // pc 7
        ];
        let stack = vm.exec(&instrs, Vec::new(), &mut ctx).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].as_numbers().unwrap(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn func_then_call_invokes_the_compiled_body() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let f = interner.intern("f");
        let vm = test_vm_with_interner(interner);

        let body = CompiledProgram::new(
            Rc::from("test"),
            vec![Instruction::LocalLoad(0), Instruction::Literal(Vector::number(2.0)), Instruction::Mul],
        );
        let instrs = vec![
            Instruction::Literal(Vector::null()),                                          // defaults
            Instruction::Literal(Vector::from_objects([Object::Program(Rc::new(body))])), // body
            Instruction::Func(f, Rc::from(vec![x])),
            Instruction::LocalPush(1),
            Instruction::Literal(Vector::number(5.0)), // arg
            Instruction::LocalLoad(0),                 // callee, pushed last
            Instruction::Call(1, Rc::from(Vec::new())),
        ];
        let mut state = State::new();
        let mut ctx = Context::new(&mut state, "test");
        let stack = vm.exec(&instrs, Vec::new(), &mut ctx).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].as_numbers().unwrap(), &[10.0]);
    }

    #[test]
    fn func_defaults_stay_aligned_per_parameter() {
        // func f(a, b=5) a+b, called as f(3) — a has no default (null, and
        // is overridden by the positional arg anyway), b falls back to 5.
        let mut interner = Interner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        let f = interner.intern("f");
        let vm = test_vm_with_interner(interner);

        let body = CompiledProgram::new(Rc::from("test"), vec![Instruction::LocalLoad(0), Instruction::LocalLoad(1), Instruction::Add]);
        let instrs = vec![
            Instruction::Literal(Vector::null()),                                          // a's default
            Instruction::Literal(Vector::number(5.0)),                                     // b's default
            Instruction::Literal(Vector::from_objects([Object::Program(Rc::new(body))])), // body
            Instruction::Func(f, Rc::from(vec![a, b])),
            Instruction::LocalPush(1),
            Instruction::Literal(Vector::number(3.0)), // arg for a
            Instruction::LocalLoad(0),                 // callee, pushed last
            Instruction::Call(1, Rc::from(Vec::new())),
        ];
        let mut state = State::new();
        let mut ctx = Context::new(&mut state, "test");
        let stack = vm.exec(&instrs, Vec::new(), &mut ctx).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].as_numbers().unwrap(), &[8.0]);
    }

    #[test]
    fn unbound_name_records_a_reference_error_and_yields_null() {
        let mut interner = Interner::new();
        let missing = interner.intern("missing");
        let vm = test_vm_with_interner(interner);
        let mut state = State::new();
        let mut ctx = Context::new(&mut state, "test");
        let stack = vm.exec(&[Instruction::Name(missing)], Vec::new(), &mut ctx).unwrap();
        assert_eq!(stack[0].len(), 0);
        assert_eq!(ctx.errors.len(), 1);
    }

    #[test]
    fn fuel_budget_halts_a_runaway_program() {
        let builtins = Rc::new(StaticBuiltins::default());
        let loader: Rc<RefCell<dyn SourceLoader>> = Rc::new(RefCell::new(NullSourceLoader));
        let vm = Vm::builder(Rc::new(RefCell::new(Interner::new())), builtins, loader).fuel(Fuel::limited(2)).build();
        let mut state = State::new();
        let mut ctx = Context::new(&mut state, "test");
        let instrs = vec![
            Instruction::Literal(Vector::number(1.0)),
            Instruction::Literal(Vector::number(2.0)),
            Instruction::Literal(Vector::number(3.0)),
        ];
        let err = vm.exec(&instrs, Vec::new(), &mut ctx).unwrap_err();
        assert_eq!(err, RuntimeError::FuelExhausted { executed: 3 });
    }

    #[test]
    fn stack_underflow_is_reported_with_the_offending_pc() {
        let vm = test_vm();
        let mut state = State::new();
        let mut ctx = Context::new(&mut state, "test");
        let err = vm.exec(&[Instruction::Add], Vec::new(), &mut ctx).unwrap_err();
        assert_eq!(err, RuntimeError::StackUnderflow { pc: 0 });
    }
}
