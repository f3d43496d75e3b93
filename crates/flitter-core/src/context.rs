//! Per-run mutable context threaded through a `Program` execution.

use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::interner::Symbol;
use crate::node::NodeRef;
use crate::state::State;
use crate::vector::Vector;

/// One link of the enclosing-import chain, used for cycle detection. A
/// `Context` doesn't hold a reference to its parent `Context` directly
/// (that would fight the borrow checker across the nested VM call that runs
/// the imported module); it only remembers the path chain.
pub struct ImportChain {
    pub path: Rc<str>,
    pub parent: Option<Rc<ImportChain>>,
}

/// Per-run mutable bag: state, variables, pragmas, errors, logs, the graph
/// root, and enough of the enclosing import chain to detect cycles.
pub struct Context<'s> {
    pub state: &'s mut State,
    pub variables: IndexMap<Symbol, Vector>,
    pub graph: NodeRef,
    pub pragmas: IndexMap<Symbol, Vector>,
    pub errors: IndexSet<String>,
    pub logs: IndexSet<String>,
    pub path: Rc<str>,
    pub parent: Option<Rc<ImportChain>>,
}

impl<'s> Context<'s> {
    pub fn new(state: &'s mut State, path: impl Into<Rc<str>>) -> Self {
        Context {
            state,
            variables: IndexMap::new(),
            graph: NodeRef::new("root"),
            pragmas: IndexMap::new(),
            errors: IndexSet::new(),
            logs: IndexSet::new(),
            path: path.into(),
            parent: None,
        }
    }

    /// Build the child context used to run an imported module: shares
    /// `state`, carries a fresh `variables`/`graph`/`pragmas` (the importee
    /// evaluates independently), and chains `path` onto the import chain
    /// for cycle detection in the child's own nested imports.
    pub fn child(&mut self, path: impl Into<Rc<str>>) -> Context<'_> {
        let chain = Rc::new(ImportChain {
            path: self.path.clone(),
            parent: self.parent.clone(),
        });
        Context {
            state: self.state,
            variables: IndexMap::new(),
            graph: NodeRef::new("root"),
            pragmas: IndexMap::new(),
            errors: IndexSet::new(),
            logs: IndexSet::new(),
            path: path.into(),
            parent: Some(chain),
        }
    }

    /// True if `path` already appears on the chain from here to the root
    /// import — i.e. importing it now would close a cycle.
    pub fn would_cycle(&self, path: &str) -> bool {
        if self.path.as_ref() == path {
            return true;
        }
        let mut link = self.parent.as_deref();
        while let Some(l) = link {
            if l.path.as_ref() == path {
                return true;
            }
            link = l.parent.as_deref();
        }
        false
    }

    pub fn record_error(&mut self, err: impl fmt::Display) {
        self.errors.insert(err.to_string());
    }

    pub fn record_log(&mut self, message: impl fmt::Display) {
        self.logs.insert(message.to_string());
    }
}
