//! `Vector`: the universal runtime value — a packed numeric array or a list
//! of heterogeneous objects.

use std::cmp::Ordering;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::object::Object;

/// Inline capacity for numeric vectors before the buffer spills to the heap.
/// Covers scalars and the small coordinate/colour tuples a scene language
/// pushes around constantly (vec2/vec3/rgba).
pub type NumBuf = SmallVec<[f64; 16]>;

/// The universal runtime value: either a densely packed numeric array or a
/// list of heterogeneous objects (strings, nodes, callables, sub-programs).
#[derive(Debug, Clone)]
pub enum Vector {
    Numeric(NumBuf),
    Objects(Rc<[Rc<Object>]>),
}

impl Vector {
    pub fn null() -> Vector {
        Vector::Numeric(NumBuf::new())
    }

    pub fn number(n: f64) -> Vector {
        let mut buf = NumBuf::new();
        buf.push(n);
        Vector::Numeric(buf)
    }

    pub fn truth(b: bool) -> Vector {
        Vector::number(if b { 1.0 } else { 0.0 })
    }

    pub fn true_() -> Vector {
        Vector::number(1.0)
    }

    pub fn false_() -> Vector {
        Vector::number(0.0)
    }

    pub fn minus_one() -> Vector {
        Vector::number(-1.0)
    }

    pub fn from_numbers(values: impl IntoIterator<Item = f64>) -> Vector {
        Vector::Numeric(values.into_iter().collect())
    }

    pub fn from_objects(values: impl IntoIterator<Item = Object>) -> Vector {
        Vector::Objects(values.into_iter().map(Rc::new).collect())
    }

    pub fn string(s: impl Into<Rc<str>>) -> Vector {
        Vector::from_objects([Object::Str(s.into())])
    }

    pub fn node(node: crate::node::NodeRef) -> Vector {
        Vector::from_objects([Object::Node(node)])
    }

    pub fn len(&self) -> usize {
        match self {
            Vector::Numeric(v) => v.len(),
            Vector::Objects(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Vector::Numeric(_))
    }

    /// All elements as numbers, if this is a `Numeric` vector.
    pub fn as_numbers(&self) -> Option<&[f64]> {
        match self {
            Vector::Numeric(v) => Some(v),
            Vector::Objects(_) => None,
        }
    }

    pub fn objects(&self) -> Option<&[Rc<Object>]> {
        match self {
            Vector::Objects(v) => Some(v),
            Vector::Numeric(_) => None,
        }
    }

    /// Truthiness: non-empty and at least one element non-zero (numeric) or
    /// a non-empty string / live node / other object (object).
    pub fn as_bool(&self) -> bool {
        match self {
            Vector::Numeric(v) => v.iter().any(|n| *n != 0.0),
            Vector::Objects(v) => v.iter().any(|o| o.is_truthy()),
        }
    }

    /// The numeric value of element `i`, coercing through `Object::Num` for
    /// object vectors. Used by arithmetic/comparison coercion.
    fn number_at(&self, i: usize) -> Option<f64> {
        match self {
            Vector::Numeric(v) => v.get(i).copied(),
            Vector::Objects(v) => match v.get(i).map(|o| o.as_ref()) {
                Some(Object::Num(n)) => Some(*n),
                _ => None,
            },
        }
    }

    fn str_at(&self, i: usize) -> Option<&str> {
        match self {
            Vector::Numeric(_) => None,
            Vector::Objects(v) => match v.get(i).map(|o| o.as_ref()) {
                Some(Object::Str(s)) => Some(s),
                _ => None,
            },
        }
    }

    fn object_at(&self, i: usize) -> Option<&Rc<Object>> {
        match self {
            Vector::Numeric(_) => None,
            Vector::Objects(v) => v.get(i),
        }
    }

    fn elem_eq(&self, i: usize, other: &Vector, j: usize) -> bool {
        if let (Some(a), Some(b)) = (self.number_at(i), other.number_at(j)) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.str_at(i), other.str_at(j)) {
            return a == b;
        }
        match (self.object_at(i), other.object_at(j)) {
            (Some(a), Some(b)) => match (a.as_ref(), b.as_ref()) {
                (Object::Node(na), Object::Node(nb)) => na == nb,
                (Object::Callable(ca), Object::Callable(cb)) => Rc::ptr_eq(ca, cb),
                (Object::Program(pa), Object::Program(pb)) => Rc::ptr_eq(pa, pb),
                _ => false,
            },
            _ => false,
        }
    }

    fn elem_cmp(&self, i: usize, other: &Vector, j: usize) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.number_at(i), other.number_at(j)) {
            return a.partial_cmp(&b);
        }
        if let (Some(a), Some(b)) = (self.str_at(i), other.str_at(j)) {
            return Some(a.cmp(b));
        }
        None
    }

    /// `eq`/`ne` per §4.1: a length-1 `true`/`false` Vector. Numeric and
    /// object vectors are equal when their element sequences coerce equal.
    pub fn eq_vector(&self, other: &Vector) -> Vector {
        let equal = self.len() == other.len() && (0..self.len()).all(|i| self.elem_eq(i, other, i));
        Vector::truth(equal)
    }

    pub fn ne_vector(&self, other: &Vector) -> Vector {
        Vector::truth(!self.eq_vector(other).as_bool())
    }

    /// Lexicographic comparison across elements; `None` for a mismatched
    /// kind or an incomparable element pair (e.g. involving `NaN`).
    fn lexicographic_cmp(&self, other: &Vector) -> Option<Ordering> {
        if self.is_numeric() != other.is_numeric() {
            return None;
        }
        let n = self.len().min(other.len());
        for i in 0..n {
            match self.elem_cmp(i, other, i) {
                Some(Ordering::Equal) => continue,
                other => return other,
            }
        }
        Some(self.len().cmp(&other.len()))
    }

    pub fn lt_vector(&self, other: &Vector) -> Vector {
        Vector::truth(self.lexicographic_cmp(other) == Some(Ordering::Less))
    }

    pub fn le_vector(&self, other: &Vector) -> Vector {
        Vector::truth(matches!(
            self.lexicographic_cmp(other),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ))
    }

    pub fn gt_vector(&self, other: &Vector) -> Vector {
        Vector::truth(self.lexicographic_cmp(other) == Some(Ordering::Greater))
    }

    pub fn ge_vector(&self, other: &Vector) -> Vector {
        Vector::truth(matches!(
            self.lexicographic_cmp(other),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ))
    }

    /// Concatenate a sequence of vectors, preserving numeric packing when
    /// every input is numeric and widening to an object vector otherwise.
    pub fn compose(vs: &[Vector]) -> Vector {
        if vs.is_empty() {
            return Vector::null();
        }
        if vs.iter().all(Vector::is_numeric) {
            let mut out = NumBuf::new();
            for v in vs {
                if let Vector::Numeric(nums) = v {
                    out.extend_from_slice(nums);
                }
            }
            return Vector::Numeric(out);
        }
        let mut out: Vec<Rc<Object>> = Vec::with_capacity(vs.iter().map(Vector::len).sum());
        for v in vs {
            match v {
                Vector::Numeric(nums) => out.extend(nums.iter().map(|n| Rc::new(Object::Num(*n)))),
                Vector::Objects(objs) => out.extend(objs.iter().cloned()),
            }
        }
        Vector::Objects(out.into())
    }

    /// Broadcast length for two operands per §4.1: a length-1 operand
    /// broadcasts over any length; otherwise the longer must be a multiple
    /// of the shorter, cycling the shorter; `None` if incompatible.
    fn broadcast_len(a: usize, b: usize) -> Option<usize> {
        if a == 0 && b == 0 {
            return Some(0);
        }
        if a == 0 || b == 0 {
            return None;
        }
        let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
        if hi % lo == 0 { Some(hi) } else { None }
    }

    fn binary_numeric(&self, other: &Vector, f: impl Fn(f64, f64) -> f64) -> Vector {
        let (Vector::Numeric(a), Vector::Numeric(b)) = (self, other) else {
            return Vector::null();
        };
        let Some(len) = Self::broadcast_len(a.len(), b.len()) else {
            return Vector::null();
        };
        let mut out = NumBuf::with_capacity(len);
        for i in 0..len {
            out.push(f(a[i % a.len()], b[i % b.len()]));
        }
        Vector::Numeric(out)
    }

    pub fn add(&self, other: &Vector) -> Vector {
        self.binary_numeric(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Vector) -> Vector {
        self.binary_numeric(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Vector) -> Vector {
        self.binary_numeric(other, |a, b| a * b)
    }

    pub fn truediv(&self, other: &Vector) -> Vector {
        self.binary_numeric(other, |a, b| a / b)
    }

    pub fn floordiv(&self, other: &Vector) -> Vector {
        self.binary_numeric(other, |a, b| (a / b).floor())
    }

    pub fn modulo(&self, other: &Vector) -> Vector {
        self.binary_numeric(other, |a, b| {
            if b == 0.0 { f64::NAN } else { a - b * (a / b).floor() }
        })
    }

    pub fn pow(&self, other: &Vector) -> Vector {
        self.binary_numeric(other, f64::powf)
    }

    /// `mul_add(a, b) == self * a + b`, fused into one broadcasted pass.
    pub fn mul_add(&self, a: &Vector, b: &Vector) -> Vector {
        let (Vector::Numeric(s), Vector::Numeric(a), Vector::Numeric(b)) = (self, a, b) else {
            return Vector::null();
        };
        let Some(len1) = Self::broadcast_len(s.len(), a.len()) else {
            return Vector::null();
        };
        let Some(len) = Self::broadcast_len(len1, b.len()) else {
            return Vector::null();
        };
        let mut out = NumBuf::with_capacity(len);
        for i in 0..len {
            out.push(s[i % s.len()].mul_add(a[i % a.len()], b[i % b.len()]));
        }
        Vector::Numeric(out)
    }

    pub fn neg(&self) -> Vector {
        match self {
            Vector::Numeric(v) => Vector::Numeric(v.iter().map(|n| -n).collect()),
            Vector::Objects(_) => Vector::null(),
        }
    }

    pub fn pos(&self) -> Vector {
        self.clone()
    }

    pub fn not(&self) -> Vector {
        Vector::truth(!self.as_bool())
    }

    /// `v.slice(idx)`: for each element `i` of `idx` (floored to integer),
    /// pick `v[i mod n]` if `0 <= i < n`, else the element-type zero.
    pub fn slice(&self, idx: &Vector) -> Vector {
        let Vector::Numeric(idx) = idx else {
            return Vector::null();
        };
        let n = self.len() as i64;
        match self {
            Vector::Numeric(v) => {
                let mut out = NumBuf::with_capacity(idx.len());
                for raw in idx.iter() {
                    let i = raw.floor() as i64;
                    out.push(if n > 0 && i >= 0 && i < n { v[i as usize] } else { 0.0 });
                }
                Vector::Numeric(out)
            }
            Vector::Objects(v) => {
                let zero = Rc::new(Object::Num(0.0));
                let mut out = Vec::with_capacity(idx.len());
                for raw in idx.iter() {
                    let i = raw.floor() as i64;
                    out.push(if n > 0 && i >= 0 && i < n {
                        v[i as usize].clone()
                    } else {
                        zero.clone()
                    });
                }
                Vector::Objects(out.into())
            }
        }
    }

    /// `fill_range(start, stop, step)`: length `max(0, ceil((stop-start)/step))`,
    /// zero step yields `null`.
    pub fn fill_range(start: f64, stop: f64, step: f64) -> Vector {
        if step == 0.0 {
            return Vector::null();
        }
        let len = ((stop - start) / step).ceil();
        if !len.is_finite() || len <= 0.0 {
            return Vector::null();
        }
        let len = len as usize;
        let mut out = NumBuf::with_capacity(len);
        for i in 0..len {
            out.push(start + step * i as f64);
        }
        Vector::Numeric(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_spec() {
        assert!(!Vector::null().as_bool());
        assert!(Vector::true_().as_bool());
        assert!(!Vector::false_().as_bool());
        assert!(Vector::string("x").as_bool());
        assert!(!Vector::string("").as_bool());
    }

    #[test]
    fn broadcasting_cycles_shorter_operand() {
        let a = Vector::from_numbers([1.0, 2.0, 3.0, 4.0]);
        let b = Vector::from_numbers([10.0, 20.0]);
        let sum = a.add(&b);
        assert_eq!(sum.as_numbers().unwrap(), &[11.0, 22.0, 13.0, 24.0]);
    }

    #[test]
    fn incompatible_lengths_yield_null() {
        let a = Vector::from_numbers([1.0, 2.0, 3.0]);
        let b = Vector::from_numbers([1.0, 2.0]);
        assert_eq!(a.add(&b).len(), 0);
    }

    #[test]
    fn floordiv_and_mod_follow_divisor_sign() {
        let a = Vector::number(-7.0);
        let b = Vector::number(2.0);
        assert_eq!(a.floordiv(&b).as_numbers().unwrap()[0], -4.0);
        assert_eq!(a.modulo(&b).as_numbers().unwrap()[0], 1.0);
    }

    #[test]
    fn compose_preserves_numeric_packing() {
        let composed = Vector::compose(&[Vector::from_numbers([1.0, 2.0]), Vector::from_numbers([3.0])]);
        assert!(composed.is_numeric());
        assert_eq!(composed.as_numbers().unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn compose_widens_to_objects_when_mixed() {
        let composed = Vector::compose(&[Vector::from_numbers([1.0]), Vector::string("x")]);
        assert!(!composed.is_numeric());
        assert_eq!(composed.len(), 2);
    }

    #[test]
    fn slice_wraps_out_of_range_to_zero() {
        let v = Vector::from_numbers([10.0, 20.0, 30.0]);
        let idx = Vector::from_numbers([0.0, 5.0, -1.0]);
        assert_eq!(v.slice(&idx).as_numbers().unwrap(), &[10.0, 0.0, 0.0]);
    }

    #[test]
    fn fill_range_handles_negative_step() {
        let r = Vector::fill_range(5.0, 0.0, -2.0);
        assert_eq!(r.as_numbers().unwrap(), &[5.0, 3.0, 1.0]);
        assert_eq!(Vector::fill_range(0.0, 5.0, 0.0).len(), 0);
    }

    #[test]
    fn mul_add_matches_mul_then_add() {
        let s = Vector::from_numbers([2.0, 3.0]);
        let a = Vector::number(10.0);
        let b = Vector::from_numbers([1.0, 1.0]);
        let fused = s.mul_add(&a, &b);
        let separate = s.mul(&a).add(&b);
        assert_eq!(fused.as_numbers(), separate.as_numbers());
    }

    #[test]
    fn eq_vector_coerces_across_numeric_and_object() {
        let numeric = Vector::number(3.0);
        let boxed = Vector::from_objects([Object::Num(3.0)]);
        assert!(numeric.eq_vector(&boxed).as_bool());
    }

    #[test]
    fn lexicographic_ordering_mismatched_kind_is_false() {
        let numeric = Vector::number(1.0);
        let stringy = Vector::string("a");
        assert!(!numeric.lt_vector(&stringy).as_bool());
        assert!(!numeric.gt_vector(&stringy).as_bool());
    }
}
