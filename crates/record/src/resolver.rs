//! Reordering of add-node records within one batch.
//!
//! Records arrive in whatever order the change source produced them and
//! may name a `next_id` that appears later in the batch. The resolver
//! arranges them into a forest that mirrors the sibling layout, then
//! flattens it so that replaying the output with "insert before next, else
//! append to parent" rebuilds that layout.

use bus::AddedNodeMutation;
use core_types::MirrorId;
use std::collections::HashMap;

#[derive(Debug)]
struct TreeNode {
    value: AddedNodeMutation,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Ephemeral forest for one batch. Nodes live in an arena and refer to
/// each other by index.
#[derive(Debug, Default)]
pub struct ResolveForest {
    nodes: Vec<TreeNode>,
    roots: Vec<usize>,
    by_id: HashMap<MirrorId, usize>,
}

impl ResolveForest {
    pub fn build(queue: impl IntoIterator<Item = AddedNodeMutation>) -> Self {
        let mut forest = Self::default();
        for mutation in queue {
            forest.insert(mutation);
        }
        forest
    }

    fn insert(&mut self, mutation: AddedNodeMutation) {
        let id = mutation.id();
        if let Some(&existing) = self.by_id.get(&id) {
            // The later record carries the newer payload; the node keeps
            // the slot and children it already has.
            log::debug!(target: "record.resolver", "node {id} added twice in one batch");
            self.nodes[existing].value = mutation;
            return;
        }

        let index = self.nodes.len();
        if let Some(&next) = mutation.next_id.and_then(|next| self.by_id.get(&next)) {
            let parent = self.nodes[next].parent;
            self.nodes.push(TreeNode {
                value: mutation,
                parent,
                children: Vec::new(),
            });
            let siblings = match parent {
                Some(parent) => &mut self.nodes[parent].children,
                None => &mut self.roots,
            };
            let at = siblings
                .iter()
                .position(|&sibling| sibling == next)
                .unwrap_or(siblings.len());
            siblings.insert(at, index);
        } else if let Some(&parent) = mutation.parent_id.and_then(|p| self.by_id.get(&p)) {
            if let Some(next) = mutation.next_id {
                log::debug!(
                    target: "record.resolver",
                    "node {id}: next {next} not in batch, appended to its parent"
                );
            }
            self.nodes.push(TreeNode {
                value: mutation,
                parent: Some(parent),
                children: Vec::new(),
            });
            self.nodes[parent].children.push(index);
        } else {
            match (mutation.parent_id, mutation.next_id) {
                (Some(parent), Some(next)) => log::debug!(
                    target: "record.resolver",
                    "node {id}: parent {parent} and next {next} not in batch, placed as root"
                ),
                (Some(parent), None) => log::debug!(
                    target: "record.resolver",
                    "node {id}: parent {parent} not in batch, placed as root"
                ),
                (None, Some(next)) => log::debug!(
                    target: "record.resolver",
                    "node {id}: next {next} not in batch, placed as root"
                ),
                (None, None) => {}
            }
            self.nodes.push(TreeNode {
                value: mutation,
                parent: None,
                children: Vec::new(),
            });
            self.roots.push(index);
        }
        self.by_id.insert(id, index);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Arena indexes of one tree in emission order: the node itself, then
    /// its children from last to first, each fully before the next.
    fn tree_order(&self, root: usize, out: &mut Vec<usize>) {
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            out.push(index);
            stack.extend(self.nodes[index].children.iter().copied());
        }
    }

    /// Call `cb` for every record in emission order.
    pub fn visit(&self, mut cb: impl FnMut(&AddedNodeMutation)) {
        let mut order = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            order.clear();
            self.tree_order(root, &mut order);
            for &index in &order {
                cb(&self.nodes[index].value);
            }
        }
    }

    /// One record sequence per tree, trees in root order.
    pub fn into_trees(self) -> Vec<Vec<AddedNodeMutation>> {
        let mut orders = Vec::with_capacity(self.roots.len());
        for &root in &self.roots {
            let mut order = Vec::new();
            self.tree_order(root, &mut order);
            orders.push(order);
        }
        let mut slots: Vec<Option<AddedNodeMutation>> =
            self.nodes.into_iter().map(|node| Some(node.value)).collect();
        orders
            .into_iter()
            .map(|order| {
                order
                    .into_iter()
                    .filter_map(|index| slots[index].take())
                    .collect()
            })
            .collect()
    }

    pub fn into_order(self) -> Vec<AddedNodeMutation> {
        self.into_trees().into_iter().flatten().collect()
    }
}

/// Reorder one batch of add records for replay.
pub fn resolve(queue: impl IntoIterator<Item = AddedNodeMutation>) -> Vec<AddedNodeMutation> {
    ResolveForest::build(queue).into_order()
}
