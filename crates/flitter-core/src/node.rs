//! Scene-graph node: a mutable, singly-parented tree with copy-on-write
//! attribute maps and sibling-linked children.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::vector::Vector;

/// Attribute name → value, insertion order preserved for deterministic
/// emission.
pub type AttrMap = IndexMap<Rc<str>, Vector>;

struct NodeData {
    kind: Rc<str>,
    tags: RefCell<HashSet<Rc<str>>>,
    /// Copy-on-write: shared via `Rc`, cloned on first mutation by
    /// `Rc::make_mut`. A node whose attribute map has `strong_count() > 1`
    /// is the "shared" state described in the data model.
    attributes: RefCell<Rc<AttrMap>>,
    parent: RefCell<Option<Weak<NodeData>>>,
    first_child: RefCell<Option<NodeRef>>,
    last_child: RefCell<Option<Weak<NodeData>>>,
    next_sibling: RefCell<Option<NodeRef>>,
}

/// A reference-counted handle to a node. Cloning a `NodeRef` shares the same
/// underlying node (it does not copy the tree) — see [`NodeRef::deep_clone`]
/// for an actual copy.
#[derive(Clone)]
pub struct NodeRef(Rc<NodeData>);

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind())
            .field("tags", &self.0.tags.borrow())
            .field("attributes", &self.0.attributes.borrow().keys().collect::<Vec<_>>())
            .field("children", &self.children().count())
            .finish()
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl NodeRef {
    pub fn new(kind: impl Into<Rc<str>>) -> Self {
        NodeRef(Rc::new(NodeData {
            kind: kind.into(),
            tags: RefCell::new(HashSet::new()),
            attributes: RefCell::new(Rc::new(IndexMap::new())),
            parent: RefCell::new(None),
            first_child: RefCell::new(None),
            last_child: RefCell::new(None),
            next_sibling: RefCell::new(None),
        }))
    }

    pub fn kind(&self) -> &str {
        &self.0.kind
    }

    /// Stable identity for this node, for use as a hash/equality key where
    /// pointer identity (not structural equality) is wanted.
    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.0.tags.borrow().contains(tag)
    }

    pub fn add_tag(&self, tag: impl Into<Rc<str>>) {
        self.0.tags.borrow_mut().insert(tag.into());
    }

    pub fn tags(&self) -> HashSet<Rc<str>> {
        self.0.tags.borrow().clone()
    }

    pub fn attributes(&self) -> Rc<AttrMap> {
        self.0.attributes.borrow().clone()
    }

    pub fn get_attribute(&self, name: &str) -> Option<Vector> {
        self.0.attributes.borrow().get(name).cloned()
    }

    /// Set an attribute, cloning the attribute map first if it is shared
    /// with another node (copy-on-write).
    pub fn set_attribute(&self, name: impl Into<Rc<str>>, value: Vector) {
        let mut attrs = self.0.attributes.borrow_mut();
        Rc::make_mut(&mut attrs).insert(name.into(), value);
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.0
            .parent
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(NodeRef)
    }

    pub fn has_parent(&self) -> bool {
        self.parent().is_some()
    }

    pub fn first_child(&self) -> Option<NodeRef> {
        self.0.first_child.borrow().clone()
    }

    pub fn next_sibling(&self) -> Option<NodeRef> {
        self.0.next_sibling.borrow().clone()
    }

    /// Iterate direct children in document order.
    pub fn children(&self) -> ChildIter {
        ChildIter(self.first_child())
    }

    /// Attach `child` as the last child of `self`.
    ///
    /// # Panics
    /// Panics if `child` already has a parent; callers implementing the
    /// `Append`/`AppendRoot` asymmetry (§9 Open Question (a)) must check
    /// [`NodeRef::has_parent`] first and either skip or clone.
    pub fn append_child(&self, child: NodeRef) {
        assert!(!child.has_parent(), "node already has a parent");
        *child.0.parent.borrow_mut() = Some(Rc::downgrade(&self.0));
        match self.0.last_child.borrow().as_ref().and_then(Weak::upgrade) {
            Some(last) => *last.next_sibling.borrow_mut() = Some(child.clone()),
            None => *self.0.first_child.borrow_mut() = Some(child.clone()),
        }
        *self.0.last_child.borrow_mut() = Some(Rc::downgrade(&child.0));
    }

    /// Attach `child` as the first child of `self`.
    ///
    /// # Panics
    /// Panics if `child` already has a parent (see [`NodeRef::append_child`]).
    pub fn prepend_child(&self, child: NodeRef) {
        assert!(!child.has_parent(), "node already has a parent");
        *child.0.parent.borrow_mut() = Some(Rc::downgrade(&self.0));
        let previous_first = self.0.first_child.borrow_mut().replace(child.clone());
        if let Some(previous_first) = previous_first {
            *child.0.next_sibling.borrow_mut() = Some(previous_first);
        } else {
            *self.0.last_child.borrow_mut() = Some(Rc::downgrade(&child.0));
        }
    }

    /// Detach `child` from `self`'s child list. No-op if `child` is not a
    /// direct child of `self`.
    pub fn remove_child(&self, child: &NodeRef) {
        let mut cursor = self.0.first_child.borrow_mut();
        if let Some(first) = cursor.clone() {
            if first == *child {
                *cursor = first.next_sibling();
                if cursor.is_none() {
                    *self.0.last_child.borrow_mut() = None;
                }
                *child.0.parent.borrow_mut() = None;
                *child.0.next_sibling.borrow_mut() = None;
                return;
            }
            drop(cursor);
            let mut prev = first;
            while let Some(next) = prev.next_sibling() {
                if next == *child {
                    let after = next.next_sibling();
                    *prev.0.next_sibling.borrow_mut() = after.clone();
                    if after.is_none() {
                        *self.0.last_child.borrow_mut() = Some(Rc::downgrade(&prev.0));
                    }
                    *child.0.parent.borrow_mut() = None;
                    *child.0.next_sibling.borrow_mut() = None;
                    return;
                }
                prev = next;
            }
        }
    }

    /// A fresh, unattached deep copy: new node identity, same kind/tags, an
    /// attribute map shared via the same copy-on-write `Rc` (cheap — it will
    /// clone lazily on first mutation), and deep copies of every child.
    pub fn deep_clone(&self) -> NodeRef {
        let copy = NodeRef(Rc::new(NodeData {
            kind: self.0.kind.clone(),
            tags: RefCell::new(self.0.tags.borrow().clone()),
            attributes: RefCell::new(self.0.attributes.borrow().clone()),
            parent: RefCell::new(None),
            first_child: RefCell::new(None),
            last_child: RefCell::new(None),
            next_sibling: RefCell::new(None),
        }));
        for child in self.children() {
            copy.append_child(child.deep_clone());
        }
        copy
    }
}

pub struct ChildIter(Option<NodeRef>);

impl Iterator for ChildIter {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        let current = self.0.take()?;
        self.0 = current.next_sibling();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector;

    #[test]
    fn append_links_siblings_in_order() {
        let root = NodeRef::new("group");
        let a = NodeRef::new("shape");
        let b = NodeRef::new("shape");
        root.append_child(a.clone());
        root.append_child(b.clone());
        let kids: Vec<_> = root.children().collect();
        assert_eq!(kids.len(), 2);
        assert!(kids[0] == a);
        assert!(kids[1] == b);
        assert_eq!(a.parent().unwrap(), root);
    }

    #[test]
    fn prepend_puts_node_first() {
        let root = NodeRef::new("group");
        let a = NodeRef::new("a");
        let b = NodeRef::new("b");
        root.append_child(a.clone());
        root.prepend_child(b.clone());
        let kids: Vec<_> = root.children().collect();
        assert_eq!(kids[0], b);
        assert_eq!(kids[1], a);
    }

    #[test]
    fn attribute_write_clones_shared_map() {
        let a = NodeRef::new("a");
        a.set_attribute("x", Vector::number(1.0));
        let shared = a.attributes();
        let b = a.deep_clone();
        // both nodes currently point at the same Rc<AttrMap>
        assert!(Rc::ptr_eq(&shared, &b.attributes()));
        b.set_attribute("x", Vector::number(2.0));
        // `a` is unaffected by the write through `b` (copy-on-write).
        assert_eq!(a.get_attribute("x").unwrap().as_numbers().unwrap()[0], 1.0);
        assert_eq!(b.get_attribute("x").unwrap().as_numbers().unwrap()[0], 2.0);
    }

    #[test]
    #[should_panic]
    fn append_twice_panics() {
        let root = NodeRef::new("group");
        let other = NodeRef::new("group2");
        let child = NodeRef::new("c");
        root.append_child(child.clone());
        other.append_child(child);
    }

    #[test]
    fn remove_unlinks_middle_child() {
        let root = NodeRef::new("group");
        let a = NodeRef::new("a");
        let b = NodeRef::new("b");
        let c = NodeRef::new("c");
        root.append_child(a.clone());
        root.append_child(b.clone());
        root.append_child(c.clone());
        root.remove_child(&b);
        let kids: Vec<_> = root.children().collect();
        assert_eq!(kids.len(), 2);
        assert_eq!(kids[0], a);
        assert_eq!(kids[1], c);
        assert!(!b.has_parent());
    }
}
