//! Rebuilds a document from change batches.
//!
//! Node ids in the stream are bound to local nodes through a [`NodeMirror`]
//! seeded with the recorded ids. Records that cannot be placed yet are
//! retried once the rest of the batch is in; records that can never be
//! placed are logged and counted, never fatal.

use bus::{AddedNodeMutation, AttributeMutation, MutationData, RemovedNodeMutation, TextMutation};
use core_types::MirrorId;
use dom::{Document, DomError, DomSnapshot, NodeKey, NodePayload};
use mirror::NodeMirror;
use record::resolve;
use std::ops::AddAssign;
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub applied: usize,
    pub dropped: usize,
}

impl AddAssign for ApplyStats {
    fn add_assign(&mut self, other: Self) {
        self.applied += other.applied;
        self.dropped += other.dropped;
    }
}

enum Placement {
    Applied,
    Deferred,
}

pub struct ReplayDocument {
    doc: Document,
    nodes: NodeMirror,
}

impl ReplayDocument {
    pub fn new() -> Self {
        Self {
            doc: Document::new(),
            nodes: NodeMirror::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn nodes(&self) -> &NodeMirror {
        &self.nodes
    }

    pub fn node(&self, id: MirrorId) -> Option<NodeKey> {
        self.nodes.get_ref(id)
    }

    pub fn snapshot(&self) -> DomSnapshot {
        DomSnapshot::new(&self.doc, self.doc.root())
    }

    /// Apply one batch: removals, then additions, then text and attribute
    /// changes.
    pub fn apply(&mut self, data: &MutationData) -> ApplyStats {
        let mut stats = self.apply_removes(&data.removes);
        stats += self.apply_adds(&data.adds);
        stats += self.apply_texts(&data.texts);
        stats += self.apply_attributes(&data.attributes);
        if stats.dropped > 0 {
            log::debug!(
                target: "replay.document",
                "batch applied with {} of {} records dropped",
                stats.dropped,
                stats.applied + stats.dropped
            );
        }
        stats
    }

    pub fn apply_removes(&mut self, removes: &[RemovedNodeMutation]) -> ApplyStats {
        let mut stats = ApplyStats::default();
        for remove in removes {
            let Some(key) = self.nodes.get_ref(remove.id) else {
                log::warn!(target: "replay.document", "remove: node {} not found", remove.id);
                stats.dropped += 1;
                continue;
            };
            if !self.nodes.has_id(remove.parent_id) {
                log::debug!(
                    target: "replay.document",
                    "remove: parent {} of node {} not found",
                    remove.parent_id,
                    remove.id
                );
            }
            match self.doc.remove(key) {
                Ok(freed) => {
                    for key in freed {
                        self.nodes.remove(key);
                    }
                    stats.applied += 1;
                }
                Err(err) => {
                    log::warn!(target: "replay.document", "remove node {}: {err}", remove.id);
                    stats.dropped += 1;
                }
            }
        }
        stats
    }

    /// Place added nodes.
    ///
    /// A record whose parent or declared next sibling is not present yet is
    /// held back. Held records are reordered with [`resolve`] and retried
    /// until a pass places nothing; one more pass then appends records whose
    /// next sibling never arrived. Whatever is still left is dropped.
    pub fn apply_adds(&mut self, adds: &[AddedNodeMutation]) -> ApplyStats {
        let mut stats = ApplyStats::default();
        let mut deferred = Vec::new();
        for add in adds {
            self.place_or_defer(add.clone(), true, &mut stats, &mut deferred);
        }

        let mut lenient = false;
        while !deferred.is_empty() {
            let before = deferred.len();
            let pending = std::mem::take(&mut deferred);
            for add in resolve(pending) {
                self.place_or_defer(add, !lenient, &mut stats, &mut deferred);
            }
            if deferred.len() < before {
                lenient = false;
            } else if lenient {
                for add in &deferred {
                    log::warn!(
                        target: "replay.document",
                        "add: node {} dropped, parent {:?} never arrived",
                        add.id(),
                        add.parent_id
                    );
                }
                stats.dropped += deferred.len();
                break;
            } else {
                lenient = true;
            }
        }
        stats
    }

    fn place_or_defer(
        &mut self,
        add: AddedNodeMutation,
        strict: bool,
        stats: &mut ApplyStats,
        deferred: &mut Vec<AddedNodeMutation>,
    ) {
        match self.place(&add, strict) {
            Ok(Placement::Applied) => stats.applied += 1,
            Ok(Placement::Deferred) => deferred.push(add),
            Err(err) => {
                log::warn!(target: "replay.document", "add node {}: {err}", add.id());
                stats.dropped += 1;
            }
        }
    }

    fn place(&mut self, add: &AddedNodeMutation, strict: bool) -> Result<Placement, DomError> {
        let id = add.id();
        let payload = &add.node.payload;
        let existing = self.nodes.get_ref(id);

        let Some(parent_id) = add.parent_id else {
            if existing.is_some() {
                return Ok(Placement::Applied);
            }
            let key = match payload {
                NodePayload::Document => self.doc.root(),
                _ => self.doc.create_from_payload(payload, None)?,
            };
            self.nodes.add_with_id(key, id);
            return Ok(Placement::Applied);
        };

        let Some(parent) = self.nodes.get_ref(parent_id) else {
            return Ok(Placement::Deferred);
        };
        let next = match add.next_id.map(|next| (next, self.nodes.get_ref(next))) {
            None => None,
            Some((_, Some(key))) => Some(key),
            Some((_, None)) if strict => return Ok(Placement::Deferred),
            Some((next, None)) => {
                log::debug!(
                    target: "replay.document",
                    "add: next {next} of node {id} missing, appending"
                );
                None
            }
        };

        if let NodePayload::Document = payload {
            return Err(DomError::WrongNodeKind(self.doc.root()));
        }
        if let NodePayload::ShadowRoot = payload {
            if existing.is_none() {
                let key = self.doc.create_from_payload(payload, Some(parent))?;
                self.nodes.add_with_id(key, id);
            }
            return Ok(Placement::Applied);
        }

        let key = match existing {
            Some(key) => key,
            None => self.doc.create_from_payload(payload, None)?,
        };
        // A next sibling that moved elsewhere cannot anchor the insertion.
        let next = next.filter(|&next| self.doc.parent(next) == Some(parent));
        if let Err(err) = self.doc.insert_before(parent, key, next) {
            if existing.is_none() {
                let _ = self.doc.remove(key);
            }
            return Err(err);
        }
        if existing.is_none() {
            self.nodes.add_with_id(key, id);
        }
        Ok(Placement::Applied)
    }

    pub fn apply_texts(&mut self, texts: &[TextMutation]) -> ApplyStats {
        let mut stats = ApplyStats::default();
        for text in texts {
            let result = match self.nodes.get_ref(text.id) {
                Some(key) => self.doc.set_text(key, &text.value),
                None => {
                    log::warn!(target: "replay.document", "text: node {} not found", text.id);
                    stats.dropped += 1;
                    continue;
                }
            };
            match result {
                Ok(()) => stats.applied += 1,
                Err(err) => {
                    log::warn!(target: "replay.document", "text node {}: {err}", text.id);
                    stats.dropped += 1;
                }
            }
        }
        stats
    }

    pub fn apply_attributes(&mut self, changes: &[AttributeMutation]) -> ApplyStats {
        let mut stats = ApplyStats::default();
        for change in changes {
            let Some(key) = self.nodes.get_ref(change.id) else {
                log::warn!(target: "replay.document", "attributes: node {} not found", change.id);
                stats.dropped += 1;
                continue;
            };
            let attributes = change
                .attributes
                .iter()
                .map(|(name, value)| (Arc::from(name.to_ascii_lowercase()), value.clone()))
                .collect();
            match self.doc.replace_attributes(key, attributes) {
                Ok(()) => stats.applied += 1,
                Err(err) => {
                    log::warn!(target: "replay.document", "attributes node {}: {err}", change.id);
                    stats.dropped += 1;
                }
            }
        }
        stats
    }

    /// Drop every node and id, keeping only the empty document.
    pub fn reset(&mut self) {
        self.doc = Document::new();
        self.nodes.reset();
    }
}

impl Default for ReplayDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::SerializedNode;
    use record::{BlockPolicy, MutationBatch};

    fn source_page() -> Document {
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        let body = doc.create_element_with("body", &[("class", "main")]);
        doc.append_child(root, html).unwrap();
        doc.append_child(html, body).unwrap();
        for i in 0..3 {
            let index = i.to_string();
            let li = doc.create_element_with("li", &[("data-i", index.as_str())]);
            let text = doc.create_text(&format!("item {i}"));
            doc.append_child(body, li).unwrap();
            doc.append_child(li, text).unwrap();
        }
        let host = doc.create_element("widget");
        doc.append_child(body, host).unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        let inner = doc.create_element("slot");
        doc.append_child(shadow, inner).unwrap();
        doc
    }

    fn snapshot_batch(doc: &Document) -> MutationData {
        let mut nodes = NodeMirror::new();
        let mut batch = MutationBatch::new();
        batch.node_added(doc.root());
        batch.finish(doc, &mut nodes, &BlockPolicy::none())
    }

    fn element(id: MirrorId, parent: Option<MirrorId>, next: Option<MirrorId>) -> AddedNodeMutation {
        AddedNodeMutation {
            parent_id: parent,
            next_id: next,
            node: SerializedNode {
                id,
                payload: NodePayload::Element {
                    tag_name: format!("e{id}"),
                    attributes: Vec::new(),
                },
            },
        }
    }

    fn document_root(id: MirrorId) -> AddedNodeMutation {
        AddedNodeMutation {
            parent_id: None,
            next_id: None,
            node: SerializedNode {
                id,
                payload: NodePayload::Document,
            },
        }
    }

    #[test]
    fn snapshot_rebuilds_in_any_arrival_order() {
        let source = source_page();
        let expected = DomSnapshot::new(&source, source.root());
        let data = snapshot_batch(&source);

        let mut orders = vec![data.adds.clone()];
        let mut reversed = data.adds.clone();
        reversed.reverse();
        orders.push(reversed);
        for shift in 1..data.adds.len() {
            let mut rotated = data.adds.clone();
            rotated.rotate_left(shift);
            orders.push(rotated);
        }

        for adds in orders {
            let mut replay = ReplayDocument::new();
            let stats = replay.apply_adds(&adds);
            assert_eq!(stats, ApplyStats { applied: adds.len(), dropped: 0 });
            assert_eq!(replay.snapshot(), expected);
        }
    }

    #[test]
    fn next_sibling_arriving_later_is_honored() {
        let mut replay = ReplayDocument::new();
        let adds = vec![
            document_root(1),
            element(2, Some(1), None),
            element(3, Some(2), Some(4)),
            element(5, Some(2), Some(3)),
            element(4, Some(2), None),
        ];
        let stats = replay.apply_adds(&adds);
        assert_eq!(stats.dropped, 0);
        assert_eq!(
            replay.snapshot().as_lines(),
            ["#document", "| <e2>", "|   <e5>", "|   <e3>", "|   <e4>"]
        );
    }

    #[test]
    fn missing_next_falls_back_to_append() {
        let mut replay = ReplayDocument::new();
        let adds = vec![
            document_root(1),
            element(2, Some(1), None),
            element(3, Some(2), Some(99)),
            element(4, Some(2), None),
        ];
        let stats = replay.apply_adds(&adds);
        assert_eq!(stats, ApplyStats { applied: 4, dropped: 0 });
        assert_eq!(
            replay.snapshot().as_lines(),
            ["#document", "| <e2>", "|   <e4>", "|   <e3>"]
        );
    }

    #[test]
    fn orphans_are_dropped() {
        let mut replay = ReplayDocument::new();
        let adds = vec![document_root(1), element(7, Some(40), None), element(8, Some(7), None)];
        let stats = replay.apply_adds(&adds);
        assert_eq!(stats, ApplyStats { applied: 1, dropped: 2 });
        assert_eq!(replay.node(7), None);
    }

    #[test]
    fn removes_texts_and_attributes() {
        let source = source_page();
        let mut replay = ReplayDocument::new();
        replay.apply(&snapshot_batch(&source));

        // ids follow preorder: 1 doc, 2 html, 3 body, 4 li, 5 text, 6 li ...
        let data = MutationData {
            removes: vec![RemovedNodeMutation { parent_id: 3, id: 6 }],
            texts: vec![TextMutation { id: 5, value: "first".into() }],
            attributes: vec![AttributeMutation {
                id: 3,
                attributes: vec![("hidden".into(), None)],
            }],
            ..MutationData::default()
        };
        let stats = replay.apply(&data);
        assert_eq!(stats, ApplyStats { applied: 3, dropped: 0 });
        assert!(!replay.nodes().has_id(6));
        assert!(!replay.nodes().has_id(7));
        let lines = replay.snapshot().as_lines().to_vec();
        assert_eq!(lines[2], "|   <body hidden>");
        assert_eq!(lines[4], "|       \"first\"");
        assert!(!lines.iter().any(|line| line.contains("item 1")));
    }

    #[test]
    fn unknown_targets_are_counted() {
        let mut replay = ReplayDocument::new();
        let data = MutationData {
            removes: vec![RemovedNodeMutation { parent_id: 1, id: 2 }],
            texts: vec![TextMutation { id: 3, value: "x".into() }],
            ..MutationData::default()
        };
        assert_eq!(replay.apply(&data), ApplyStats { applied: 0, dropped: 2 });
    }
}
