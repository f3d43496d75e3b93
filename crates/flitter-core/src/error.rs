//! Non-fatal error kinds (§7): recorded into `Context::errors` as
//! deduplicated strings rather than propagated as Rust `Result` errors —
//! the run always continues, with the offending expression evaluating to
//! `null`.

use std::fmt;

/// An unbound name was referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceError {
    pub name: String,
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unbound name '{}'", self.name)
    }
}

/// A module import failed: missing file, parse/compile failure in the
/// importee, a circular import, or a missing symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    NotFound { filename: String },
    Circular { path: String },
    MissingSymbol { filename: String, name: String },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::NotFound { filename } => write!(f, "cannot load module '{filename}'"),
            ImportError::Circular { path } => write!(f, "Circular import detected at '{path}'"),
            ImportError::MissingSymbol { filename, name } => {
                write!(f, "module '{filename}' has no member '{name}'")
            }
        }
    }
}

/// An exception escaped a builtin or a user-invoked host function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCallError {
    pub callee: String,
    pub message: String,
}

impl fmt::Display for HostCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host call '{}' failed: {}", self.callee, self.message)
    }
}

/// Any of the three recorded (non-fatal) error kinds, as they accumulate
/// in `Context::errors`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedError {
    Reference(ReferenceError),
    Import(ImportError),
    HostCall(HostCallError),
}

impl fmt::Display for RecordedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordedError::Reference(e) => e.fmt(f),
            RecordedError::Import(e) => e.fmt(f),
            RecordedError::HostCall(e) => e.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_import_message_matches_scenario_wording() {
        let err = ImportError::Circular { path: "a.fl".into() };
        assert!(err.to_string().contains("Circular import"));
    }
}
