//! First-class runtime values beyond what `flitter_core::Vector` already
//! carries: `Function`, the compiled-body `Callable` produced by a `Func`
//! instruction. Grounded on the teacher's `engine/frame.rs` call-frame shape
//! (a frame is a saved continuation plus a locals snapshot) — here collapsed
//! to a single struct since Flitter has no backtracking, only straight-line
//! calls.

use std::rc::Rc;

use flitter_bytecode::Instruction;
use flitter_core::{Callable, Context, Vector};

use super::vm::Vm;

/// A compiled function body bound to the locals in scope at its definition
/// site (lexical capture), plus its parameter names and one default value
/// per parameter. Produced by the `Func` instruction; held as
/// `Object::Callable(Rc<Function>)` inside a `Vector`.
pub struct Function {
    name: Rc<str>,
    params: Vec<Rc<str>>,
    /// One `Vector` per parameter, evaluated at `Func` time; `Vector::null()`
    /// at a parameter's index if it has no default (§3 "one `Vector` per
    /// parameter; `null` if absent").
    defaults: Vec<Vector>,
    body: Rc<[Instruction]>,
    captured_locals: Vec<Vector>,
    vm: Vm,
}

impl Function {
    pub fn new(
        name: Rc<str>,
        params: Vec<Rc<str>>,
        defaults: Vec<Vector>,
        body: Rc<[Instruction]>,
        captured_locals: Vec<Vector>,
        vm: Vm,
    ) -> Self {
        Self { name, params, defaults, body, captured_locals, vm }
    }

    fn default_for(&self, index: usize) -> Vector {
        self.defaults.get(index).cloned().unwrap_or_else(Vector::null)
    }
}

impl Callable for Function {
    fn name(&self) -> &str {
        &self.name
    }

    /// Binds `args` positionally, falls back to `kwargs` by name, then to
    /// the captured default, and runs the body as its own independent
    /// instruction stream seeded with the captured locals plus the bound
    /// parameters.
    fn call(&self, context: &mut Context, args: &[Vector], kwargs: &[(Rc<str>, Vector)]) -> Result<Vector, String> {
        let mut locals = self.captured_locals.clone();
        for (i, param) in self.params.iter().enumerate() {
            let value = if i < args.len() {
                args[i].clone()
            } else if let Some((_, kv)) = kwargs.iter().find(|(n, _)| n.as_ref() == param.as_ref()) {
                kv.clone()
            } else {
                self.default_for(i)
            };
            locals.push(value);
        }
        let mut stack = self.vm.exec(&self.body, locals, context).map_err(|e| e.to_string())?;
        if stack.len() != 1 {
            return Err(format!("function '{}' body left {} values on the stack, expected 1", self.name, stack.len()));
        }
        Ok(stack.pop().unwrap())
    }
}
