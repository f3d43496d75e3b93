//! Context-consuming (dynamic) builtins — §4.8. Unlike
//! `flitter_core::StaticBuiltins`, these need the live `Context` (RNG seed
//! state, the log) and so can never be folded by the partial evaluator;
//! only the VM, which owns the running `Context`, can call them. Table shape
//! grounded on the teacher's `StaticNodeTypes` (a narrow array/map-backed
//! lookup trait rather than a trait object per builtin).

use indexmap::IndexMap;

use flitter_core::{Context, Vector};

pub type DynamicBuiltinFn = fn(&mut Context, &[Vector]) -> Vector;

#[derive(Clone)]
pub struct DynamicBuiltins {
    table: IndexMap<&'static str, DynamicBuiltinFn>,
}

impl DynamicBuiltins {
    pub fn get(&self, name: &str) -> Option<DynamicBuiltinFn> {
        self.table.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn insert(&mut self, name: &'static str, f: DynamicBuiltinFn) {
        self.table.insert(name, f);
    }
}

/// A deterministic LCG seeded from `Context::state` under a fixed key, so a
/// given `(state, call-site)` pair reproduces the same stream across frames
/// — a live-coded scene re-evaluates its whole program every frame and
/// `rand`'s thread-local generator would make `uniform()` flicker
/// incoherently between runs.
fn next_seed(context: &mut Context) -> u64 {
    let key = Vector::string("__rng_seed");
    let current = context.state.get(&key).and_then(|v| v.as_numbers().map(<[f64]>::to_vec));
    let seed = current.and_then(|n| n.first().copied()).unwrap_or(0x2545F4914F6CDD1Du64 as f64);
    let bits = seed.to_bits().wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    context.state.set(key, Vector::number(f64::from_bits(bits)));
    bits
}

fn builtin_uniform(context: &mut Context, args: &[Vector]) -> Vector {
    let (lo, hi) = match args.first().and_then(Vector::as_numbers) {
        Some([lo, hi, ..]) => (*lo, *hi),
        Some([x]) => (0.0, *x),
        _ => (0.0, 1.0),
    };
    let bits = next_seed(context);
    let unit = (bits >> 11) as f64 * (1.0 / ((1u64 << 53) as f64));
    Vector::number(lo + unit * (hi - lo))
}

fn builtin_print(context: &mut Context, args: &[Vector]) -> Vector {
    let rendered = args.iter().map(render_for_log).collect::<Vec<_>>().join(" ");
    context.record_log(rendered);
    Vector::null()
}

fn render_for_log(v: &Vector) -> String {
    if let Some(nums) = v.as_numbers() {
        return nums.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(",");
    }
    match v.objects() {
        Some(objs) => objs.iter().map(|o| format!("{o:?}")).collect::<Vec<_>>().join(","),
        None => String::new(),
    }
}

impl Default for DynamicBuiltins {
    /// The illustrative default set named in §4.8: `uniform` (host RNG,
    /// seeded from `Context::state` for frame-to-frame reproducibility) and
    /// `print` (writes to `context.logs`).
    fn default() -> Self {
        let mut table = IndexMap::new();
        table.insert("uniform", builtin_uniform as DynamicBuiltinFn);
        table.insert("print", builtin_print as DynamicBuiltinFn);
        DynamicBuiltins { table }
    }
}
