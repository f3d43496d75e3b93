//! Compile-time locals-stack bookkeeping (§4.4 "`lvars` is a
//! `Vec<Option<Symbol>>`, `None` marking unnamed temporaries").

use crate::ast::Name;

/// Tracks which local slots are bound to which source names, in the order
/// the VM's `LocalPush`/`LocalDrop` will maintain them at runtime, so the
/// compiler can resolve a `Name` occurrence to a `LocalLoad` depth offset.
#[derive(Default)]
pub struct LocalScope {
    slots: Vec<Option<Name>>,
}

impl LocalScope {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn push(&mut self, name: Option<Name>) {
        self.slots.push(name);
    }

    pub fn push_many(&mut self, names: impl IntoIterator<Item = Option<Name>>) {
        self.slots.extend(names);
    }

    pub fn pop(&mut self, n: usize) {
        let new_len = self.slots.len().saturating_sub(n);
        self.slots.truncate(new_len);
    }

    /// Depth offset from the top of the locals stack (`0` = most recently
    /// pushed), for the nearest binding of `name`.
    pub fn depth_of(&self, name: &Name) -> Option<u32> {
        self.slots.iter().rev().position(|slot| slot.as_deref() == Some(&**name)).map(|i| i as u32)
    }

    /// Names still bound, paired with their current depth — used to spill
    /// surviving top-level locals to globals at the end of compilation.
    pub fn remaining(&self) -> impl Iterator<Item = (u32, &Name)> {
        let len = self.slots.len();
        self.slots.iter().enumerate().rev().filter_map(move |(i, slot)| {
            slot.as_ref().map(|name| ((len - 1 - i) as u32, name))
        })
    }
}
