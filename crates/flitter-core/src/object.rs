//! Heterogeneous object elements held by an `Objects`-kind `Vector`.

use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::node::NodeRef;
use crate::vector::Vector;

/// An element of an object-kind `Vector`.
///
/// `Num` exists alongside `Vector::Numeric` so a numeric scalar can sit
/// inside a mixed object vector (e.g. `compose([1, "x", node])`) without
/// forcing the whole vector to widen element-by-element in a special way.
#[derive(Clone)]
pub enum Object {
    Str(Rc<str>),
    Num(f64),
    Node(NodeRef),
    Callable(Rc<dyn Callable>),
    Program(Rc<dyn SubProgram>),
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Str(s) => write!(f, "Str({s:?})"),
            Object::Num(n) => write!(f, "Num({n})"),
            Object::Node(n) => write!(f, "Node({:?})", n.kind()),
            Object::Callable(c) => write!(f, "Callable({})", c.name()),
            Object::Program(_) => write!(f, "Program(..)"),
        }
    }
}

impl Object {
    /// Truthiness of a single object element, per §3: a non-empty string,
    /// a live node, or any callable/program counts as truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Object::Str(s) => !s.is_empty(),
            Object::Num(n) => *n != 0.0,
            Object::Node(_) => true,
            Object::Callable(_) => true,
            Object::Program(_) => true,
        }
    }
}

/// Something a `Call` instruction can dispatch to.
///
/// Implemented by `flitter-vm::Function` (a compiled body with a captured
/// locals snapshot) and by host closures registered as dynamic builtins.
/// Lives in `flitter-core` so a `Vector` can carry a callable as a first
/// class object without this crate depending on `flitter-vm`.
pub trait Callable {
    /// Name used in diagnostics; need not be unique.
    fn name(&self) -> &str;

    /// Whether this callable needs the live `Context` threaded in as an
    /// extra leading argument (§6 "context-consuming" host functions).
    fn is_context_consuming(&self) -> bool {
        false
    }

    /// Invoke with positional arguments (and, for context-consuming
    /// callables, the context). Keyword arguments are passed as an
    /// auxiliary name/value list; plain callables ignore it.
    fn call(
        &self,
        context: &mut Context,
        args: &[Vector],
        kwargs: &[(Rc<str>, Vector)],
    ) -> Result<Vector, String>;
}

/// A compiled module, held as an object so a `Vector` can carry it without
/// `flitter-core` depending on `flitter-compiler`. Implemented by
/// `flitter_compiler::CompiledProgram`.
pub trait SubProgram {
    /// Source path this program was compiled from, used for import-cycle
    /// detection and diagnostics.
    fn path(&self) -> &str;

    /// Downcast hook: `flitter-core` cannot name `flitter_bytecode::Instruction`
    /// without depending on it, so `flitter-vm` recovers the concrete
    /// `CompiledProgram` (and its instructions) through this instead.
    fn as_any(&self) -> &dyn std::any::Any;
}
