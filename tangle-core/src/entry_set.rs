//! Grow-only entry index keyed by content address
//!
//! The G-Set underneath the log: entries are only ever added, and adding an
//! already-present hash is a no-op, so union is commutative, associative
//! and idempotent. The log owns one of these by composition.

use std::collections::HashMap;
use tangle_model::Hash;

use crate::entry::Entry;

/// A monotonic, hash-keyed set of entries.
#[derive(Debug, Clone, Default)]
pub struct EntrySet {
    entries: HashMap<Hash, Entry>,
}

impl EntrySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut set = Self::new();
        set.merge(entries);
        set
    }

    /// Add an entry. Returns false (and changes nothing) when an entry with
    /// the same hash is already held.
    pub fn insert(&mut self, entry: Entry) -> bool {
        match self.entries.entry(entry.hash) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Set union: add every entry not already held.
    pub fn merge(&mut self, entries: impl IntoIterator<Item = Entry>) {
        for entry in entries {
            self.insert(entry);
        }
    }

    pub fn get(&self, hash: &Hash) -> Option<&Entry> {
        self.entries.get(hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Replace the held entries wholesale.
    ///
    /// The one escape hatch from grow-only semantics, used exclusively by
    /// the size-bounded join to truncate old history.
    pub fn rebuild_from(&mut self, keep: impl IntoIterator<Item = Entry>) {
        self.entries = keep.into_iter().map(|e| (e.hash, e)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_model::LamportClock;

    fn entry(payload: &[u8]) -> Entry {
        Entry::new("A", payload.to_vec(), vec![], LamportClock::new("A", 1), None).unwrap()
    }

    #[test]
    fn insert_is_idempotent() {
        let mut set = EntrySet::new();
        let e = entry(b"x");
        assert!(set.insert(e.clone()));
        assert!(!set.insert(e));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn merge_is_union() {
        let a = entry(b"a");
        let b = entry(b"b");

        let mut left = EntrySet::from_entries([a.clone()]);
        left.merge([a.clone(), b.clone()]);
        assert_eq!(left.len(), 2);
        assert!(left.contains(&a.hash));
        assert!(left.contains(&b.hash));
    }

    #[test]
    fn rebuild_replaces_contents() {
        let a = entry(b"a");
        let b = entry(b"b");
        let mut set = EntrySet::from_entries([a.clone(), b.clone()]);

        set.rebuild_from([b.clone()]);
        assert_eq!(set.len(), 1);
        assert!(!set.contains(&a.hash));
        assert!(set.contains(&b.hash));
    }
}
