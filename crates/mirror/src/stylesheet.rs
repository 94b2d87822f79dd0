use crate::Mirror;
use core_types::MirrorId;
use std::hash::Hash;

/// Auxiliary mirror for style sheets, ids starting at 1.
#[derive(Clone, Debug)]
pub struct StyleSheetMirror<S> {
    inner: Mirror<S>,
}

impl<S: Copy + Eq + Hash + std::fmt::Debug> StyleSheetMirror<S> {
    pub fn new() -> Self {
        Self {
            inner: Mirror::with_base(1),
        }
    }

    pub fn add(&mut self, sheet: S) -> MirrorId {
        self.inner.add(sheet)
    }

    pub fn add_with_id(&mut self, sheet: S, id: MirrorId) -> MirrorId {
        self.inner.add_with_id(sheet, id)
    }

    pub fn get_id(&self, sheet: S) -> MirrorId {
        self.inner.get_id(sheet)
    }

    pub fn get_style(&self, id: MirrorId) -> Option<S> {
        self.inner.get_ref(id)
    }

    pub fn has(&self, sheet: S) -> bool {
        self.inner.has(sheet)
    }

    /// Reserve an id for a sheet that is not constructed yet.
    pub fn generate_id(&mut self) -> MirrorId {
        self.inner.generate_id()
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

impl<S: Copy + Eq + Hash + std::fmt::Debug> Default for StyleSheetMirror<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a nested rule index path into the grouping-rule positions and the
/// index inside the innermost rule list.
///
/// `[2, 0, 5]` addresses rule 5 inside rule 0 inside rule 2.
pub fn nested_rule_position(path: &[usize]) -> (&[usize], Option<usize>) {
    match path.split_last() {
        Some((index, positions)) => (positions, Some(*index)),
        None => (path, None),
    }
}
