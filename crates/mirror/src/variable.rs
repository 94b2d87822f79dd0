use crate::Mirror;
use core_types::{MirrorId, NOT_MIRRORED};
use std::collections::HashMap;
use std::hash::Hash;

/// Per-class mirrors for opaque objects created through an observed API
/// (buffers, textures, programs, ...). Ids are indexes starting at 0 within
/// each class.
#[derive(Clone, Debug)]
pub struct VariableMirror<H> {
    classes: HashMap<String, Mirror<H>>,
}

impl<H: Copy + Eq + Hash + std::fmt::Debug> VariableMirror<H> {
    pub fn new() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    /// Register a handle; returns its index and whether it was newly minted.
    pub fn save(&mut self, class: &str, handle: H) -> (MirrorId, bool) {
        let mirror = self
            .classes
            .entry(class.to_string())
            .or_insert_with(|| Mirror::with_base(0));
        if mirror.has(handle) {
            return (mirror.get_id(handle), false);
        }
        (mirror.add(handle), true)
    }

    /// Seed a known index, as a replay consumer does from create records.
    pub fn insert(&mut self, class: &str, index: MirrorId, handle: H) {
        self.classes
            .entry(class.to_string())
            .or_insert_with(|| Mirror::with_base(0))
            .add_with_id(handle, index);
    }

    pub fn index_of(&self, class: &str, handle: H) -> MirrorId {
        self.classes
            .get(class)
            .map_or(NOT_MIRRORED, |m| m.get_id(handle))
    }

    pub fn get(&self, class: &str, index: MirrorId) -> Option<H> {
        self.classes.get(class)?.get_ref(index)
    }

    pub fn retain(&mut self, mut alive: impl FnMut(H) -> bool) {
        for mirror in self.classes.values_mut() {
            mirror.retain(&mut alive);
        }
    }

    pub fn reset(&mut self) {
        self.classes.clear();
    }
}

impl<H: Copy + Eq + Hash + std::fmt::Debug> Default for VariableMirror<H> {
    fn default() -> Self {
        Self::new()
    }
}
