//! Tree-search predicate used by the `Search` instruction.

use std::rc::Rc;

use crate::node::NodeRef;

/// A predicate over nodes: optional `kind`, a set of required `tags`,
/// `strict` (all tags must match vs. any), `stop` (do not descend into a
/// matched node), `first` (return only the first match), and an optional
/// `subquery` (applied to descendants of a match) or `altquery`
/// (alternative predicate tried when this one doesn't match).
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub kind: Option<Rc<str>>,
    pub tags: Vec<Rc<str>>,
    pub strict: bool,
    pub stop: bool,
    pub first: bool,
    pub subquery: Option<Box<Query>>,
    pub altquery: Option<Box<Query>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches_self(&self, node: &NodeRef) -> bool {
        if let Some(kind) = &self.kind {
            if node.kind() != kind.as_ref() {
                return false;
            }
        }
        if self.tags.is_empty() {
            return true;
        }
        if self.strict {
            self.tags.iter().all(|t| node.has_tag(t))
        } else {
            self.tags.iter().any(|t| node.has_tag(t))
        }
    }

    /// Does `node` match this query, or (failing that) its `altquery`?
    fn matches(&self, node: &NodeRef) -> bool {
        self.matches_self(node) || self.altquery.as_ref().is_some_and(|q| q.matches(node))
    }

    /// Depth-first, document-order search over `root`'s subtree (`root`
    /// itself is not tested). Honours `stop` (skip descending into a match)
    /// and `first` (stop the whole walk after the first match).
    pub fn search(&self, root: &NodeRef) -> Vec<NodeRef> {
        let mut out = Vec::new();
        self.search_into(root, &mut out);
        out
    }

    fn search_into(&self, root: &NodeRef, out: &mut Vec<NodeRef>) {
        for child in root.children() {
            if self.first && !out.is_empty() {
                return;
            }
            let matched = self.matches(&child);
            if matched {
                out.push(match &self.subquery {
                    Some(sub) => {
                        // A matched node with a subquery contributes its
                        // subquery's matches among its descendants instead
                        // of itself; fall through below.
                        let mut sub_out = Vec::new();
                        sub.search_into(&child, &mut sub_out);
                        out.pop();
                        out.extend(sub_out);
                        continue;
                    }
                    None => child.clone(),
                });
                if self.stop {
                    continue;
                }
            }
            self.search_into(&child, out);
            if self.first && !out.is_empty() {
                return;
            }
        }
    }
}
