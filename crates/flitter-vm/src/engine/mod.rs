//! The execution engine: the dispatch loop (`vm`), first-class callables
//! produced at runtime (`value`), and the host module-loader seam
//! (`import`).

pub mod import;
pub mod value;
pub mod vm;

pub use import::{NullSourceLoader, SourceLoader};
pub use value::Function;
pub use vm::{Fuel, Vm, VmBuilder};
