//! The host-supplied module loader contract (§6 "source loader contract").
//!
//! `flitter-vm` never reads from disk itself — a host (e.g. `flitter-cli`'s
//! `FsSourceLoader`) supplies a `SourceLoader` that resolves a filename to an
//! already-compiled program, however it sees fit (filesystem, embedded
//! assets, a network fetch). Cycle detection is handled separately, by
//! `Context::would_cycle` walking the import chain before a loader is ever
//! consulted.

use std::rc::Rc;

use flitter_compiler::CompiledProgram;

/// Resolves an import's filename to a compiled program.
///
/// `current_path` is the path of the importing module, for loaders that
/// resolve relative paths. Returns `None` if the module cannot be found or
/// fails to compile; the VM records an `ImportError` and binds the imported
/// names to `null` rather than aborting the run.
pub trait SourceLoader {
    fn load(&mut self, filename: &str, current_path: &str) -> Option<Rc<CompiledProgram>>;
}

/// A loader that always fails — useful for programs known not to import
/// anything, and as the default when a host doesn't care about imports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSourceLoader;

impl SourceLoader for NullSourceLoader {
    fn load(&mut self, _filename: &str, _current_path: &str) -> Option<Rc<CompiledProgram>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_loader_never_resolves() {
        let mut loader = NullSourceLoader;
        assert!(loader.load("anything.fl", "main.fl").is_none());
    }
}
