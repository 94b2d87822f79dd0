use core_types::{IGNORED_NODE, MirrorId, NOT_MIRRORED};
use std::collections::HashMap;
use std::hash::Hash;

/// Bidirectional id ↔ handle table.
///
/// Invariants:
/// - `get_id(get_ref(id)) == id` and `get_ref(get_id(k)) == k` for every
///   registered pair.
/// - An id is never handed out twice while its handle stays registered.
/// - Handles mapped to [`IGNORED_NODE`] have no id-side entry.
///
/// The table stores handles, never the objects behind them. Owners drop
/// dead handles through [`Mirror::remove`] or [`Mirror::retain`].
#[derive(Clone, Debug)]
pub struct Mirror<K> {
    base: MirrorId,
    next: MirrorId,
    by_ref: HashMap<K, MirrorId>,
    by_id: HashMap<MirrorId, K>,
}

impl<K: Copy + Eq + Hash + std::fmt::Debug> Mirror<K> {
    pub fn new() -> Self {
        Self::with_base(1)
    }

    pub fn with_base(base: MirrorId) -> Self {
        Self {
            base,
            next: base,
            by_ref: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    /// Register a handle; returns the existing id when already present.
    pub fn add(&mut self, key: K) -> MirrorId {
        if let Some(&id) = self.by_ref.get(&key) {
            return id;
        }
        let id = self.generate_id();
        self.bind(key, id);
        id
    }

    /// Register a handle under a known upstream id.
    ///
    /// An already registered handle keeps its id. If `id` is bound to a
    /// different handle, that handle loses its entry. Allocation skips past
    /// `id` so later `add` calls never collide with it.
    pub fn add_with_id(&mut self, key: K, id: MirrorId) -> MirrorId {
        if let Some(&existing) = self.by_ref.get(&key) {
            return existing;
        }
        if id == IGNORED_NODE {
            self.by_ref.insert(key, IGNORED_NODE);
            return IGNORED_NODE;
        }
        if let Some(previous) = self.by_id.get(&id).copied() {
            log::debug!(target: "mirror", "id {id} rebound from {previous:?} to {key:?}");
            self.by_ref.remove(&previous);
        }
        if id >= self.next {
            self.next = id + 1;
        }
        self.bind(key, id);
        id
    }

    /// Mark a handle as intentionally excluded from the serialized tree.
    pub fn add_ignored(&mut self, key: K) {
        if let Some(id) = self.by_ref.insert(key, IGNORED_NODE) {
            if id != IGNORED_NODE {
                self.by_id.remove(&id);
            }
        }
    }

    fn bind(&mut self, key: K, id: MirrorId) {
        self.by_ref.insert(key, id);
        self.by_id.insert(id, key);
    }

    /// Mint an id without binding it to a handle.
    pub fn generate_id(&mut self) -> MirrorId {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn get_id(&self, key: K) -> MirrorId {
        self.by_ref.get(&key).copied().unwrap_or(NOT_MIRRORED)
    }

    pub fn get_ref(&self, id: MirrorId) -> Option<K> {
        self.by_id.get(&id).copied()
    }

    pub fn has(&self, key: K) -> bool {
        self.by_ref.contains_key(&key)
    }

    pub fn has_id(&self, id: MirrorId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn is_serialized(&self, key: K) -> bool {
        self.get_id(key) != NOT_MIRRORED
    }

    pub fn is_ignored(&self, key: K) -> bool {
        self.get_id(key) == IGNORED_NODE
    }

    /// Drop a handle. Returns the id it had, or `NOT_MIRRORED`.
    pub fn remove(&mut self, key: K) -> MirrorId {
        let Some(id) = self.by_ref.remove(&key) else {
            return NOT_MIRRORED;
        };
        if self.by_id.get(&id) == Some(&key) {
            self.by_id.remove(&id);
        }
        id
    }

    /// Keep only handles the owner still reports alive.
    pub fn retain(&mut self, mut alive: impl FnMut(K) -> bool) {
        self.by_ref.retain(|key, _| alive(*key));
        let by_ref = &self.by_ref;
        self.by_id.retain(|_, key| by_ref.contains_key(key));
    }

    /// Clear every entry and restart allocation from the base id.
    pub fn reset(&mut self) {
        self.by_ref.clear();
        self.by_id.clear();
        self.next = self.base;
    }

    pub fn len(&self) -> usize {
        self.by_ref.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ref.is_empty()
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<MirrorId> {
        let mut ids: Vec<_> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl<K: Copy + Eq + Hash + std::fmt::Debug> Default for Mirror<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let mut mirror = Mirror::new();
        let a = mirror.add('a');
        assert_eq!(mirror.add('a'), a);
        assert_eq!(a, 1);
        assert_eq!(mirror.add('b'), 2);
    }

    #[test]
    fn unknown_lookups_return_sentinels() {
        let mirror: Mirror<char> = Mirror::new();
        assert_eq!(mirror.get_id('x'), NOT_MIRRORED);
        assert_eq!(mirror.get_ref(7), None);
        assert!(!mirror.has('x'));
        assert!(!mirror.is_serialized('x'));
    }

    #[test]
    fn explicit_ids_advance_allocation() {
        let mut mirror = Mirror::new();
        assert_eq!(mirror.add_with_id('a', 10), 10);
        assert_eq!(mirror.add('b'), 11);
        assert_eq!(mirror.add_with_id('a', 99), 10);
        assert_eq!(mirror.get_ref(10), Some('a'));
    }

    #[test]
    fn explicit_id_rebinds_previous_owner() {
        let mut mirror = Mirror::new();
        mirror.add_with_id('a', 5);
        mirror.add_with_id('b', 5);
        assert_eq!(mirror.get_ref(5), Some('b'));
        assert_eq!(mirror.get_id('a'), NOT_MIRRORED);
    }

    #[test]
    fn ignored_entries_have_no_reverse_mapping() {
        let mut mirror = Mirror::new();
        let id = mirror.add('a');
        mirror.add_ignored('a');
        mirror.add_ignored('b');
        assert!(mirror.is_ignored('a'));
        assert!(mirror.is_ignored('b'));
        assert!(mirror.is_serialized('b'));
        assert_eq!(mirror.get_ref(id), None);
        assert_eq!(mirror.get_ref(IGNORED_NODE), None);
    }

    #[test]
    fn reset_restarts_from_base() {
        let mut mirror = Mirror::with_base(100);
        mirror.add('a');
        mirror.add('b');
        mirror.reset();
        assert!(mirror.is_empty());
        assert_eq!(mirror.add('c'), 100);
    }

    #[test]
    fn remove_and_retain_invalidate() {
        let mut mirror = Mirror::new();
        let a = mirror.add('a');
        mirror.add('b');
        mirror.add('c');
        assert_eq!(mirror.remove('a'), a);
        assert_eq!(mirror.remove('a'), NOT_MIRRORED);
        assert!(!mirror.has_id(a));
        mirror.retain(|k| k != 'b');
        assert_eq!(mirror.ids(), vec![3]);
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn bijectivity_holds_across_operations() {
        let mut mirror = Mirror::new();
        let keys: Vec<u32> = (0..50).collect();
        for (step, key) in keys.iter().enumerate() {
            match step % 7 {
                0 => {
                    mirror.add_with_id(*key, (step as MirrorId) * 3);
                }
                5 => {
                    mirror.remove(keys[step / 2]);
                }
                6 if step == 34 => mirror.reset(),
                _ => {
                    mirror.add(*key);
                }
            }
            for id in mirror.ids() {
                let key = mirror.get_ref(id).unwrap();
                assert_eq!(mirror.get_id(key), id);
            }
            for key in &keys {
                if mirror.has(*key) && !mirror.is_ignored(*key) {
                    assert_eq!(mirror.get_ref(mirror.get_id(*key)), Some(*key));
                }
            }
        }
    }
}
