//! Live host document.
//!
//! Invariants:
//! - The document node is created with the document and is never freed.
//! - A node has at most one parent; shadow roots have no parent, only a host.
//! - Operations never create cycles.
//! - Removing a node frees its whole subtree, including hosted shadow trees.

use crate::traverse::{Ancestors, Descendants};
use crate::types::{DomError, NodeKey, NodeKind};
use std::sync::Arc;

pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeKey,
}

struct Slot {
    generation: u32,
    record: Option<NodeRecord>,
}

struct NodeRecord {
    kind: NodeKind,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    shadow_root: Option<NodeKey>,
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeKey {
                index: 0,
                generation: 0,
            },
        };
        doc.root = doc.alloc(NodeKind::Document);
        doc
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeKey {
        let record = NodeRecord {
            kind,
            parent: None,
            children: Vec::new(),
            shadow_root: None,
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            return NodeKey {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            record: Some(record),
        });
        NodeKey {
            index,
            generation: 0,
        }
    }

    fn record(&self, key: NodeKey) -> Option<&NodeRecord> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.record.as_ref()
    }

    fn record_mut(&mut self, key: NodeKey) -> Option<&mut NodeRecord> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.record.as_mut()
    }

    fn live(&self, key: NodeKey) -> Result<&NodeRecord, DomError> {
        self.record(key).ok_or(DomError::MissingKey(key))
    }

    pub fn create_element(&mut self, name: &str) -> NodeKey {
        self.alloc(NodeKind::Element {
            name: Arc::from(name.to_ascii_lowercase()),
            attributes: Vec::new(),
        })
    }

    pub fn create_element_with(&mut self, name: &str, attributes: &[(&str, &str)]) -> NodeKey {
        self.alloc(NodeKind::Element {
            name: Arc::from(name.to_ascii_lowercase()),
            attributes: attributes
                .iter()
                .map(|(k, v)| (Arc::from(k.to_ascii_lowercase()), Some((*v).to_string())))
                .collect(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeKey {
        self.alloc(NodeKind::Text {
            text: text.to_string(),
        })
    }

    pub fn create_comment(&mut self, text: &str) -> NodeKey {
        self.alloc(NodeKind::Comment {
            text: text.to_string(),
        })
    }

    /// Attach a shadow root to an element host.
    pub fn attach_shadow(&mut self, host: NodeKey) -> Result<NodeKey, DomError> {
        let record = self.live(host)?;
        if !record.kind.is_element() {
            return Err(DomError::WrongNodeKind(host));
        }
        if record.shadow_root.is_some() {
            return Err(DomError::ShadowRootExists(host));
        }
        let shadow = self.alloc(NodeKind::ShadowRoot { host });
        if let Some(record) = self.record_mut(host) {
            record.shadow_root = Some(shadow);
        }
        Ok(shadow)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.record(key).is_some()
    }

    pub fn kind(&self, key: NodeKey) -> Option<&NodeKind> {
        self.record(key).map(|r| &r.kind)
    }

    pub fn is_element(&self, key: NodeKey) -> bool {
        self.kind(key).is_some_and(NodeKind::is_element)
    }

    pub fn is_shadow_root(&self, key: NodeKey) -> bool {
        matches!(self.kind(key), Some(NodeKind::ShadowRoot { .. }))
    }

    pub fn name(&self, key: NodeKey) -> Option<&str> {
        match self.kind(key)? {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.record(key)?.parent
    }

    /// Parent node if it is an element; `None` at document and shadow boundaries.
    pub fn parent_element(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        self.is_element(parent).then_some(parent)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.record(key).map(|r| r.children.as_slice()).unwrap_or(&[])
    }

    pub fn shadow_root(&self, host: NodeKey) -> Option<NodeKey> {
        self.record(host)?.shadow_root
    }

    pub fn shadow_host(&self, key: NodeKey) -> Option<NodeKey> {
        match self.kind(key)? {
            NodeKind::ShadowRoot { host } => Some(*host),
            _ => None,
        }
    }

    pub fn next_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let siblings = self.children(self.parent(key)?);
        let pos = siblings.iter().position(|k| *k == key)?;
        siblings.get(pos + 1).copied()
    }

    pub fn previous_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let siblings = self.children(self.parent(key)?);
        let pos = siblings.iter().position(|k| *k == key)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    pub fn ancestors(&self, key: NodeKey) -> Ancestors<'_> {
        Ancestors::new(self, key)
    }

    pub fn descendants(&self, key: NodeKey) -> Descendants<'_> {
        Descendants::new(self, key)
    }

    /// True when the node is reachable from the document root, crossing
    /// shadow boundaries through their hosts.
    pub fn is_connected(&self, key: NodeKey) -> bool {
        let mut current = key;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current).or_else(|| self.shadow_host(current)) {
                Some(next) => current = next,
                None => return false,
            }
        }
    }

    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `before` (or at the end when `None`).
    ///
    /// A child that already has a parent is moved.
    pub fn insert_before(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        before: Option<NodeKey>,
    ) -> Result<(), DomError> {
        if parent == child || self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::CycleDetected { parent, child });
        }
        if !self.live(parent)?.kind.allows_children() {
            return Err(DomError::InvalidParent(parent));
        }
        match self.live(child)?.kind {
            NodeKind::Document | NodeKind::ShadowRoot { .. } => {
                return Err(DomError::WrongNodeKind(child));
            }
            _ => {}
        }
        if let Some(before) = before {
            if before == child {
                return Ok(());
            }
            if self.live(before)?.parent != Some(parent) {
                return Err(DomError::InvalidSibling { parent, before });
            }
        }
        self.detach(child)?;
        let siblings = &mut self
            .record_mut(parent)
            .ok_or(DomError::MissingKey(parent))?
            .children;
        match before {
            Some(before) => {
                let pos = siblings
                    .iter()
                    .position(|k| *k == before)
                    .ok_or(DomError::InvalidSibling { parent, before })?;
                siblings.insert(pos, child);
            }
            None => siblings.push(child),
        }
        if let Some(record) = self.record_mut(child) {
            record.parent = Some(parent);
        }
        Ok(())
    }

    /// Unlink a node from its parent, keeping its subtree alive.
    pub fn detach(&mut self, key: NodeKey) -> Result<(), DomError> {
        let parent = self.live(key)?.parent;
        if let Some(parent) = parent {
            if let Some(record) = self.record_mut(parent) {
                record.children.retain(|k| *k != key);
            }
        }
        if let Some(record) = self.record_mut(key) {
            record.parent = None;
        }
        Ok(())
    }

    /// Detach and free a subtree. Returns every freed key, root first.
    pub fn remove(&mut self, key: NodeKey) -> Result<Vec<NodeKey>, DomError> {
        if key == self.root {
            return Err(DomError::WrongNodeKind(key));
        }
        self.detach(key)?;
        let mut freed = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index as usize) else {
                continue;
            };
            if slot.generation != current.generation {
                continue;
            }
            let Some(record) = slot.record.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
            freed.push(current);
            if let NodeKind::ShadowRoot { host } = record.kind {
                if let Some(host_record) = self.record_mut(host) {
                    host_record.shadow_root = None;
                }
            }
            stack.extend(record.children.iter().rev().copied());
            stack.extend(record.shadow_root);
        }
        log::trace!(target: "dom", "freed {} nodes under {key:?}", freed.len());
        Ok(freed)
    }

    pub fn attribute(&self, key: NodeKey, name: &str) -> Option<&str> {
        match self.kind(key)? {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_deref().unwrap_or("")),
            _ => None,
        }
    }

    pub fn set_attribute(&mut self, key: NodeKey, name: &str, value: &str) -> Result<(), DomError> {
        let record = self.record_mut(key).ok_or(DomError::MissingKey(key))?;
        let NodeKind::Element { attributes, .. } = &mut record.kind else {
            return Err(DomError::WrongNodeKind(key));
        };
        match attributes.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, existing)) => *existing = Some(value.to_string()),
            None => attributes.push((Arc::from(name.to_ascii_lowercase()), Some(value.to_string()))),
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, key: NodeKey, name: &str) -> Result<(), DomError> {
        let record = self.record_mut(key).ok_or(DomError::MissingKey(key))?;
        let NodeKind::Element { attributes, .. } = &mut record.kind else {
            return Err(DomError::WrongNodeKind(key));
        };
        attributes.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        Ok(())
    }

    /// Replace the whole attribute list, preserving order and valueless entries.
    pub fn replace_attributes(
        &mut self,
        key: NodeKey,
        attributes: Vec<(Arc<str>, Option<String>)>,
    ) -> Result<(), DomError> {
        let record = self.record_mut(key).ok_or(DomError::MissingKey(key))?;
        let NodeKind::Element { attributes: attrs, .. } = &mut record.kind else {
            return Err(DomError::WrongNodeKind(key));
        };
        *attrs = attributes;
        Ok(())
    }

    /// Whitespace-separated tokens of the `class` attribute.
    pub fn class_list(&self, key: NodeKey) -> impl Iterator<Item = &str> {
        self.attribute(key, "class")
            .unwrap_or("")
            .split_ascii_whitespace()
    }

    pub fn text(&self, key: NodeKey) -> Option<&str> {
        match self.kind(key)? {
            NodeKind::Text { text } | NodeKind::Comment { text } => Some(text),
            _ => None,
        }
    }

    /// Replace the character data of a text or comment node.
    pub fn set_text(&mut self, key: NodeKey, value: &str) -> Result<(), DomError> {
        let record = self.record_mut(key).ok_or(DomError::MissingKey(key))?;
        match &mut record.kind {
            NodeKind::Text { text } | NodeKind::Comment { text } => {
                text.clear();
                text.push_str(value);
                Ok(())
            }
            _ => Err(DomError::WrongNodeKind(key)),
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        let mut current = Some(node);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.parent(key);
        }
        false
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
