//! Persistent `Vector → Vector` store, read and written by a program across
//! frames.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::object::Object;
use crate::vector::Vector;

/// Open Question (b): canonicalise `-0.0` to `0.0` and hash finite numbers
/// by their floored integer value (state keys are typically compounds of
/// interned scalars, so this also satisfies §6's "floor-to-integer
/// equivalence for numeric scalars"); non-finite values (`NaN`, `±inf`) hash
/// by their raw bit pattern so they don't all collide on one bucket.
fn hash_number<H: Hasher>(n: f64, state: &mut H) {
    if n.is_finite() {
        (n.floor() as i64).hash(state);
    } else {
        n.to_bits().hash(state);
    }
}

fn hash_object<H: Hasher>(obj: &Object, state: &mut H) {
    match obj {
        Object::Str(s) => {
            0u8.hash(state);
            s.hash(state);
        }
        Object::Num(n) => {
            1u8.hash(state);
            hash_number(*n, state);
        }
        Object::Node(n) => {
            2u8.hash(state);
            n.ptr_id().hash(state);
        }
        Object::Callable(c) => {
            3u8.hash(state);
            (Rc::as_ptr(c) as *const () as usize).hash(state);
        }
        Object::Program(p) => {
            4u8.hash(state);
            (Rc::as_ptr(p) as *const () as usize).hash(state);
        }
    }
}

fn hash_vector<H: Hasher>(v: &Vector, state: &mut H) {
    match v {
        Vector::Numeric(nums) => {
            0u8.hash(state);
            nums.len().hash(state);
            for n in nums.iter() {
                hash_number(*n, state);
            }
        }
        Vector::Objects(objs) => {
            1u8.hash(state);
            objs.len().hash(state);
            for o in objs.iter() {
                hash_object(o, state);
            }
        }
    }
}

#[derive(Clone)]
struct StateKey(Vector);

impl PartialEq for StateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_vector(&other.0).as_bool()
    }
}

impl Eq for StateKey {}

impl Hash for StateKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_vector(&self.0, state);
    }
}

/// A `Vector → Vector` map that survives across frames. Values are read and
/// written through [`State::get`]/[`State::set`]; writes from one frame are
/// visible to the next but never observed mid-frame by another run.
#[derive(Clone, Default)]
pub struct State {
    entries: HashMap<StateKey, Vector>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Vector) -> Option<Vector> {
        self.entries.get(&StateKey(key.clone())).cloned()
    }

    pub fn set(&mut self, key: Vector, value: Vector) {
        self.entries.insert(StateKey(key), value);
    }

    pub fn remove(&mut self, key: &Vector) -> Option<Vector> {
        self.entries.remove(&StateKey(key.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in arbitrary (hash) order — for a host to snapshot the
    /// store (e.g. `flitter-cli`'s `--state` file) rather than to rely on
    /// any particular iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Vector, &Vector)> {
        self.entries.iter().map(|(k, v)| (&k.0, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_by_value_equality() {
        let mut state = State::new();
        state.set(Vector::string("foo"), Vector::number(7.0));
        assert_eq!(state.get(&Vector::string("foo")).unwrap().as_numbers().unwrap(), &[7.0]);
    }

    #[test]
    fn iter_visits_every_entry() {
        let mut state = State::new();
        state.set(Vector::string("a"), Vector::number(1.0));
        state.set(Vector::string("b"), Vector::number(2.0));
        assert_eq!(state.iter().count(), 2);
    }

    #[test]
    fn negative_zero_and_positive_zero_are_the_same_key() {
        let mut state = State::new();
        state.set(Vector::number(-0.0), Vector::number(1.0));
        assert_eq!(state.get(&Vector::number(0.0)).unwrap().as_numbers().unwrap(), &[1.0]);
    }

    #[test]
    fn missing_key_returns_none() {
        let state = State::new();
        assert!(state.get(&Vector::string("missing")).is_none());
    }

    #[test]
    fn overwrite_replaces_value() {
        let mut state = State::new();
        let key = Vector::string("k");
        state.set(key.clone(), Vector::number(1.0));
        state.set(key.clone(), Vector::number(2.0));
        assert_eq!(state.get(&key).unwrap().as_numbers().unwrap(), &[2.0]);
    }
}
