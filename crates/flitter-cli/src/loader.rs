//! Filesystem-backed `SourceLoader` (§6): resolves an `Import`'s filename to
//! a sibling `.fl.ron` debug-AST file, compiles it against the host's
//! shared `Interner`, and caches the result by canonicalized path so the
//! same file visited through two different import chains compiles once.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use flitter_compiler::compile_and_link;
use flitter_compiler::simplify::{SimplifyBudget, Variables};
use flitter_compiler::CompiledProgram;
use flitter_core::{Interner, StaticBuiltins};
use flitter_vm::SourceLoader;

use crate::ast_ron;

fn sibling_path(filename: &str, current_path: &str) -> PathBuf {
    let current = Path::new(current_path);
    let dir = current.parent().unwrap_or_else(|| Path::new("."));
    let mut candidate = dir.join(filename);
    if candidate.extension().is_none() {
        candidate.set_extension("fl.ron");
    }
    candidate
}

pub struct FsSourceLoader {
    interner: Rc<RefCell<Interner>>,
    static_builtins: Rc<StaticBuiltins>,
    cache: HashMap<PathBuf, Rc<CompiledProgram>>,
}

impl FsSourceLoader {
    pub fn new(interner: Rc<RefCell<Interner>>, static_builtins: Rc<StaticBuiltins>) -> Self {
        Self { interner, static_builtins, cache: HashMap::new() }
    }

    fn compile(&mut self, path: &Path) -> Option<Rc<CompiledProgram>> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(cached) = self.cache.get(&canonical) {
            return Some(cached.clone());
        }
        let text = std::fs::read_to_string(&canonical).ok()?;
        let top = ast_ron::parse_ron(&text).ok()?;
        let path_rc: Rc<str> = canonical.to_string_lossy().into_owned().into();
        let (program, _diagnostics) = compile_and_link(
            &top,
            Variables::default(),
            SimplifyBudget::default(),
            &mut *self.interner.borrow_mut(),
            &self.static_builtins,
            path_rc,
        )
        .ok()?;
        let program = Rc::new(program);
        self.cache.insert(canonical, program.clone());
        Some(program)
    }
}

impl SourceLoader for FsSourceLoader {
    fn load(&mut self, filename: &str, current_path: &str) -> Option<Rc<CompiledProgram>> {
        let path = sibling_path(filename, current_path);
        self.compile(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_filename_gets_the_fl_ron_extension() {
        let path = sibling_path("shapes", "scenes/main.fl.ron");
        assert_eq!(path, Path::new("scenes/shapes.fl.ron"));
    }

    #[test]
    fn filename_with_an_explicit_extension_is_left_alone() {
        let path = sibling_path("shapes.fl.ron", "scenes/main.fl.ron");
        assert_eq!(path, Path::new("scenes/shapes.fl.ron"));
    }

    #[test]
    fn missing_file_loads_to_none_without_panicking() {
        let interner = Rc::new(RefCell::new(Interner::new()));
        let builtins = Rc::new(StaticBuiltins::default());
        let mut loader = FsSourceLoader::new(interner, builtins);
        assert!(loader.load("does_not_exist", "main.fl.ron").is_none());
    }
}
