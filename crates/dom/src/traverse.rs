use crate::{Document, NodeKey};

/// Parent chain of a node, nearest first, stopping at shadow boundaries.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeKey>,
}

impl<'a> Ancestors<'a> {
    pub(crate) fn new(doc: &'a Document, key: NodeKey) -> Self {
        Self {
            doc,
            next: doc.parent(key),
        }
    }
}

impl Iterator for Ancestors<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<NodeKey> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

/// Pre-order walk of a subtree, the start node included.
///
/// Shadow trees are visited right after their host, before its light children.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeKey>,
}

impl<'a> Descendants<'a> {
    pub(crate) fn new(doc: &'a Document, key: NodeKey) -> Self {
        let stack = if doc.contains(key) { vec![key] } else { Vec::new() };
        Self { doc, stack }
    }
}

impl Iterator for Descendants<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<NodeKey> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(current).iter().rev().copied());
        self.stack.extend(self.doc.shadow_root(current));
        Some(current)
    }
}
