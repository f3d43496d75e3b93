//! Core value, tree, and context types shared by the Flitter compiler and
//! virtual machine.
//!
//! This crate has no dependency on the compiler or VM crates; `Callable`
//! and `SubProgram` are the dyn-compatible seams those crates plug into so
//! a `Vector` can carry a function or a compiled module as a first-class
//! object.

pub mod builtins;
pub mod context;
pub mod error;
pub mod interner;
pub mod node;
pub mod object;
pub mod query;
pub mod state;
pub mod vector;

pub use builtins::StaticBuiltins;
pub use context::Context;
pub use interner::{Interner, Symbol};
pub use node::NodeRef;
pub use object::{Callable, Object, SubProgram};
pub use query::Query;
pub use state::State;
pub use vector::Vector;
