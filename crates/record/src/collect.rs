//! Turns raw change notifications into one ordered [`MutationData`] batch.

use crate::filter::{BlockPolicy, is_ancestor_removed, is_blocked};
use crate::resolver::resolve;
use bus::{
    AddedNodeMutation, AttributeMutation, MutationData, RemovedNodeMutation, SerializedNode,
    TextMutation, unique_text_mutations,
};
use core_types::{IGNORED_NODE, MirrorId, NOT_MIRRORED};
use dom::{Document, NodeKey};
use mirror::NodeMirror;
use std::collections::HashSet;

fn is_real(id: MirrorId) -> bool {
    id != NOT_MIRRORED && id != IGNORED_NODE
}

/// Structural parent as the stream sees it: shadow roots hang off their host.
fn stream_parent(doc: &Document, key: NodeKey) -> Option<NodeKey> {
    doc.parent(key).or_else(|| doc.shadow_host(key))
}

/// Shadow root first, then light children, as the document walks them.
fn stream_children(doc: &Document, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
    doc.shadow_root(key)
        .into_iter()
        .chain(doc.children(key).iter().copied())
}

fn next_mirrored_sibling(doc: &Document, nodes: &NodeMirror, key: NodeKey) -> Option<MirrorId> {
    let parent = doc.parent(key)?;
    let siblings = doc.children(parent);
    let pos = siblings.iter().position(|&k| k == key)?;
    siblings[pos + 1..]
        .iter()
        .map(|&k| nodes.get_id(k))
        .find(|&id| is_real(id))
}

/// Build add records for newly inserted subtrees.
///
/// Every node of every subtree gets its mirror id before any record is
/// built, so `next_id` may point at a sibling added later in the same call.
/// Blocked and ignored subtrees are skipped whole, as are subtrees whose
/// parent is not mirrored or that are no longer attached. Records come out
/// parent before child but otherwise in input order; run them through
/// [`resolve`] before replay.
pub fn collect_adds(
    doc: &Document,
    nodes: &mut NodeMirror,
    policy: &BlockPolicy,
    added: &[NodeKey],
) -> Vec<AddedNodeMutation> {
    let mut subtrees: Vec<Vec<NodeKey>> = Vec::new();
    let mut seen = HashSet::new();
    for &root in added {
        if !doc.contains(root) || !doc.is_connected(root) {
            log::trace!(target: "record.collect", "{root:?} gone before flush");
            continue;
        }
        if seen.contains(&root) {
            continue;
        }
        let mut subtree = Vec::new();
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            if !seen.insert(key) || nodes.is_ignored(key) || is_blocked(doc, key, policy) {
                continue;
            }
            subtree.push(key);
            let children: Vec<NodeKey> = stream_children(doc, key).collect();
            stack.extend(children.into_iter().rev());
        }
        subtrees.push(subtree);
    }

    for key in subtrees.iter().flatten() {
        nodes.add(*key);
    }

    let mut records = Vec::new();
    for subtree in &subtrees {
        let Some(&root) = subtree.first() else {
            continue;
        };
        let parent_id = match stream_parent(doc, root) {
            Some(parent) => {
                let id = nodes.get_id(parent);
                if !is_real(id) {
                    log::debug!(
                        target: "record.collect",
                        "{root:?} skipped: parent {parent:?} not mirrored"
                    );
                    continue;
                }
                Some(id)
            }
            None => None,
        };
        for (i, &key) in subtree.iter().enumerate() {
            let Some(payload) = doc.payload(key) else {
                continue;
            };
            let parent_id = if i == 0 {
                parent_id
            } else {
                stream_parent(doc, key).map(|p| nodes.get_id(p))
            };
            records.push(AddedNodeMutation {
                parent_id,
                next_id: next_mirrored_sibling(doc, nodes, key),
                node: SerializedNode {
                    id: nodes.get_id(key),
                    payload,
                },
            });
        }
    }
    records
}

/// Change notifications gathered between two flushes.
#[derive(Debug, Default)]
pub struct MutationBatch {
    added: Vec<NodeKey>,
    removed: Vec<(NodeKey, NodeKey)>,
    texts: Vec<NodeKey>,
    attributes: Vec<NodeKey>,
}

impl MutationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_added(&mut self, key: NodeKey) -> &mut Self {
        self.added.push(key);
        self
    }

    /// `parent` is the node `key` was removed from.
    pub fn node_removed(&mut self, parent: NodeKey, key: NodeKey) -> &mut Self {
        self.removed.push((parent, key));
        self
    }

    pub fn text_changed(&mut self, key: NodeKey) -> &mut Self {
        self.texts.push(key);
        self
    }

    pub fn attributes_changed(&mut self, key: NodeKey) -> &mut Self {
        self.attributes.push(key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.texts.is_empty()
            && self.attributes.is_empty()
    }

    /// Resolve the gathered notifications against the current tree.
    ///
    /// Removals are looked up before additions so a moved node keeps its id;
    /// nodes that no longer exist are dropped from the mirror. Text and
    /// attribute changes on nodes added in this batch are folded into their
    /// add records.
    pub fn finish(
        self,
        doc: &Document,
        nodes: &mut NodeMirror,
        policy: &BlockPolicy,
    ) -> MutationData {
        let mut removes = Vec::new();
        for (parent, key) in self.removed {
            let id = nodes.get_id(key);
            let parent_id = nodes.get_id(parent);
            if is_real(id) && is_real(parent_id) {
                removes.push(RemovedNodeMutation { parent_id, id });
            }
            if !doc.contains(key) {
                nodes.remove(key);
            }
        }

        let adds = resolve(collect_adds(doc, nodes, policy, &self.added));
        let fresh: HashSet<MirrorId> = adds.iter().map(AddedNodeMutation::id).collect();
        let nodes: &NodeMirror = nodes;

        let observed = |key: NodeKey, nodes: &NodeMirror| -> Option<MirrorId> {
            let id = nodes.get_id(key);
            if !is_real(id) || fresh.contains(&id) || !doc.contains(key) {
                return None;
            }
            if is_blocked(doc, key, policy) || is_ancestor_removed(doc, nodes, key) {
                return None;
            }
            Some(id)
        };

        let texts: Vec<TextMutation> = self
            .texts
            .iter()
            .filter_map(|&key| {
                let id = observed(key, nodes)?;
                let value = doc.text(key)?.to_string();
                Some(TextMutation { id, value })
            })
            .collect();

        let mut touched = HashSet::new();
        let attributes = self
            .attributes
            .iter()
            .filter(|&&key| touched.insert(key))
            .filter_map(|&key| {
                let id = observed(key, nodes)?;
                let dom::NodePayload::Element { attributes, .. } = doc.payload(key)? else {
                    return None;
                };
                Some(AttributeMutation { id, attributes })
            })
            .collect();

        MutationData {
            adds,
            removes,
            texts: unique_text_mutations(&texts),
            attributes,
        }
    }
}
