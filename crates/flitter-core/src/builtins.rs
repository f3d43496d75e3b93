//! Static (pure, context-free) builtins — §4.8. These live in `flitter-core`
//! rather than `flitter-vm` because the partial evaluator needs to fold
//! calls to them at simplify time (§4.3 "if callee and all arguments are
//! literal and the callee is a pure builtin... fold to a literal result"),
//! and `flitter-compiler` cannot depend on `flitter-vm`. Context-consuming
//! (dynamic) builtins stay in `flitter-vm::builtins` since they need
//! `&mut Context`.

use indexmap::IndexMap;

use crate::vector::Vector;

pub type StaticBuiltinFn = fn(&[Vector]) -> Vector;

/// `name -> fn`, safe to call during constant folding.
#[derive(Clone)]
pub struct StaticBuiltins {
    table: IndexMap<&'static str, StaticBuiltinFn>,
}

impl StaticBuiltins {
    pub fn get(&self, name: &str) -> Option<StaticBuiltinFn> {
        self.table.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.table.keys().copied()
    }

    pub fn insert(&mut self, name: &'static str, f: StaticBuiltinFn) {
        self.table.insert(name, f);
    }
}

fn builtin_len(args: &[Vector]) -> Vector {
    args.first().map_or(Vector::null(), |v| Vector::number(v.len() as f64))
}

fn builtin_sum(args: &[Vector]) -> Vector {
    match args.first().and_then(Vector::as_numbers) {
        Some(nums) => Vector::number(nums.iter().sum()),
        None => Vector::null(),
    }
}

fn builtin_min(args: &[Vector]) -> Vector {
    match args.first().and_then(Vector::as_numbers) {
        Some(nums) if !nums.is_empty() => {
            Vector::number(nums.iter().copied().fold(f64::INFINITY, f64::min))
        }
        _ => Vector::null(),
    }
}

fn builtin_max(args: &[Vector]) -> Vector {
    match args.first().and_then(Vector::as_numbers) {
        Some(nums) if !nums.is_empty() => {
            Vector::number(nums.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
        _ => Vector::null(),
    }
}

fn builtin_zip(args: &[Vector]) -> Vector {
    let Some((first, rest)) = args.split_first() else {
        return Vector::null();
    };
    let Some(mut out) = first.as_numbers().map(<[f64]>::to_vec) else {
        return Vector::null();
    };
    for v in rest {
        match v.as_numbers() {
            Some(nums) => out.extend_from_slice(nums),
            None => return Vector::null(),
        }
    }
    Vector::from_numbers(out)
}

fn builtin_sine(args: &[Vector]) -> Vector {
    match args.first().and_then(Vector::as_numbers) {
        Some(nums) => Vector::from_numbers(nums.iter().map(|n| n.sin())),
        None => Vector::null(),
    }
}

fn builtin_cosine(args: &[Vector]) -> Vector {
    match args.first().and_then(Vector::as_numbers) {
        Some(nums) => Vector::from_numbers(nums.iter().map(|n| n.cos())),
        None => Vector::null(),
    }
}

impl Default for StaticBuiltins {
    /// The illustrative default set named in §4.8: `len`, `sum`, `min`,
    /// `max`, `zip`, `sine`, `cosine`. A host is expected to extend or
    /// replace these; they are not part of a closed vocabulary.
    fn default() -> Self {
        let mut table = IndexMap::new();
        table.insert("len", builtin_len as StaticBuiltinFn);
        table.insert("sum", builtin_sum as StaticBuiltinFn);
        table.insert("min", builtin_min as StaticBuiltinFn);
        table.insert("max", builtin_max as StaticBuiltinFn);
        table.insert("zip", builtin_zip as StaticBuiltinFn);
        table.insert("sine", builtin_sine as StaticBuiltinFn);
        table.insert("cosine", builtin_cosine as StaticBuiltinFn);
        StaticBuiltins { table }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_counts_elements() {
        let builtins = StaticBuiltins::default();
        let f = builtins.get("len").unwrap();
        assert_eq!(f(&[Vector::from_numbers([1.0, 2.0, 3.0])]).as_numbers().unwrap(), &[3.0]);
    }

    #[test]
    fn sum_and_min_and_max() {
        let builtins = StaticBuiltins::default();
        let v = [Vector::from_numbers([3.0, 1.0, 2.0])];
        assert_eq!(builtins.get("sum").unwrap()(&v).as_numbers().unwrap(), &[6.0]);
        assert_eq!(builtins.get("min").unwrap()(&v).as_numbers().unwrap(), &[1.0]);
        assert_eq!(builtins.get("max").unwrap()(&v).as_numbers().unwrap(), &[3.0]);
    }

    #[test]
    fn unknown_name_is_absent() {
        let builtins = StaticBuiltins::default();
        assert!(builtins.get("not_a_builtin").is_none());
    }
}
