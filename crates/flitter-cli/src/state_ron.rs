//! Reads and writes the RON-serialized `State` snapshot behind `flitter
//! run --state` (§6).

use std::path::Path;

use serde::{Deserialize, Serialize};

use flitter_core::{State, Vector};

use crate::ast_ron::RonVector;

#[derive(Serialize, Deserialize, Default)]
struct RonState(Vec<(RonVector, RonVector)>);

pub fn load_state(path: &Path) -> State {
    let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error: failed to read '{}': {}", path.display(), e);
        std::process::exit(1);
    });
    let ron_state: RonState = ron::from_str(&text).unwrap_or_else(|e| {
        eprintln!("error: failed to parse '{}': {}", path.display(), e);
        std::process::exit(1);
    });
    let mut state = State::new();
    for (k, v) in ron_state.0 {
        state.set(k.into(), v.into());
    }
    state
}

/// Writes every `State` entry whose key and value both have an on-disk
/// representation; entries holding nodes/callables/programs are silently
/// dropped (see `RonVector`'s `TryFrom<&Vector>`).
pub fn save_state(path: &Path, state: &State) {
    let pairs: Vec<(RonVector, RonVector)> = state
        .iter()
        .filter_map(|(k, v)| Some((RonVector::try_from(k).ok()?, RonVector::try_from(v).ok()?)))
        .collect();
    let text = ron::ser::to_string_pretty(&RonState(pairs), ron::ser::PrettyConfig::default()).unwrap_or_else(|e| {
        eprintln!("error: failed to serialize state: {}", e);
        std::process::exit(1);
    });
    std::fs::write(path, text).unwrap_or_else(|e| {
        eprintln!("error: failed to write '{}': {}", path.display(), e);
        std::process::exit(1);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_temp_file() {
        let mut state = State::new();
        state.set(Vector::string("seed"), Vector::number(42.0));

        let path = std::env::temp_dir().join("flitter_cli_state_ron_test.ron");
        save_state(&path, &state);
        let loaded = load_state(&path);
        assert_eq!(loaded.get(&Vector::string("seed")).unwrap().as_numbers().unwrap(), &[42.0]);
        let _ = std::fs::remove_file(&path);
    }
}
