//! Frontier analysis over entry collections
//!
//! Pure functions computing the two edges of a DAG slice: heads (tips,
//! entries nothing references) and tails (the replication frontier, entries
//! whose ancestry runs out of the collection). Each works on any entry
//! slice, not just a full log, so they hold up under partial replication.

use std::collections::{HashMap, HashSet};
use tangle_model::Hash;

use crate::entry::Entry;

/// Entries in `entries` that no other entry in `entries` references as a
/// parent. Sorted by descending log id, then descending hash, so replicas
/// holding the identical set agree on the order.
pub fn find_heads(entries: &[Entry]) -> Vec<Entry> {
    let mut referenced: HashSet<Hash> = HashSet::new();
    for entry in entries {
        for parent in &entry.next {
            referenced.insert(*parent);
        }
    }

    let mut heads: Vec<Entry> = entries
        .iter()
        .filter(|e| !referenced.contains(&e.hash))
        .cloned()
        .collect();
    heads.sort_by(|a, b| {
        b.log_id
            .cmp(&a.log_id)
            .then_with(|| b.hash.cmp(&a.hash))
    });
    heads
}

/// Entries at the replication frontier: those with no parents at all, plus
/// those referencing at least one parent absent from `entries`.
/// Deduplicated by hash and sorted by the total order.
pub fn find_tails(entries: &[Entry]) -> Vec<Entry> {
    // reverse index: referenced hash -> entries referencing it
    let mut reverse: HashMap<Hash, Vec<&Entry>> = HashMap::new();
    let mut own_hashes: HashSet<Hash> = HashSet::new();
    let mut referenced: Vec<Hash> = Vec::new();
    let mut no_parents: Vec<&Entry> = Vec::new();

    for entry in entries {
        if entry.next.is_empty() {
            no_parents.push(entry);
        }
        for parent in &entry.next {
            reverse.entry(*parent).or_default().push(entry);
            referenced.push(*parent);
        }
        own_hashes.insert(entry.hash);
    }

    let mut seen: HashSet<Hash> = HashSet::new();
    let mut tails: Vec<Entry> = Vec::new();
    for hash in referenced.iter().filter(|h| !own_hashes.contains(h)) {
        for entry in reverse.get(hash).into_iter().flatten() {
            if seen.insert(entry.hash) {
                tails.push((*entry).clone());
            }
        }
    }
    for entry in no_parents {
        if seen.insert(entry.hash) {
            tails.push(entry.clone());
        }
    }

    tails.sort();
    tails
}

/// The dangling parent hashes themselves: hashes referenced by `entries`
/// but not present in it. Front-inserted per entry so earlier-referenced
/// hashes surface first, preserving discovery order. This is exactly what
/// a replica must still fetch to extend its history.
pub fn find_tail_hashes(entries: &[Entry]) -> Vec<Hash> {
    let own_hashes: HashSet<Hash> = entries.iter().map(|e| e.hash).collect();

    let mut result: Vec<Hash> = Vec::new();
    for entry in entries {
        for parent in entry.next.iter().rev() {
            if !own_hashes.contains(parent) {
                result.insert(0, *parent);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_model::LamportClock;

    fn entry(id: &str, payload: &[u8], next: Vec<Hash>, time: u64) -> Entry {
        Entry::new(id, payload.to_vec(), next, LamportClock::new(id, time), None).unwrap()
    }

    #[test]
    fn heads_of_a_chain_is_the_tip() {
        let a = entry("A", b"a", vec![], 1);
        let b = entry("A", b"b", vec![a.hash], 2);
        let c = entry("A", b"c", vec![b.hash], 3);

        let heads = find_heads(&[a, b, c.clone()]);
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].hash, c.hash);
    }

    #[test]
    fn concurrent_entries_are_both_heads() {
        let a = entry("A", b"a", vec![], 1);
        let b = entry("B", b"b", vec![], 1);

        let heads = find_heads(&[a.clone(), b.clone()]);
        assert_eq!(heads.len(), 2);
        // descending log id
        assert_eq!(heads[0].log_id, "B");
        assert_eq!(heads[1].log_id, "A");
    }

    #[test]
    fn heads_of_empty_input_is_empty() {
        assert!(find_heads(&[]).is_empty());
    }

    #[test]
    fn tails_include_zero_parent_entries() {
        let a = entry("A", b"a", vec![], 1);
        let b = entry("A", b"b", vec![a.hash], 2);

        let tails = find_tails(&[a.clone(), b]);
        assert_eq!(tails.len(), 1);
        assert_eq!(tails[0].hash, a.hash);
    }

    #[test]
    fn tails_include_entries_with_missing_parents() {
        let missing = entry("A", b"gone", vec![], 1);
        let a = entry("A", b"a", vec![missing.hash], 2);
        let b = entry("A", b"b", vec![a.hash], 3);

        // `missing` is referenced but not part of the collection
        let tails = find_tails(&[a.clone(), b]);
        assert_eq!(tails.len(), 1);
        assert_eq!(tails[0].hash, a.hash);
    }

    #[test]
    fn tail_hashes_are_the_dangling_parents() {
        let missing_one = entry("A", b"m1", vec![], 1);
        let missing_two = entry("A", b"m2", vec![], 1);
        let a = entry("A", b"a", vec![missing_one.hash, missing_two.hash], 2);

        let hashes = find_tail_hashes(&[a]);
        assert_eq!(hashes.len(), 2);
        // front-inserted per entry: the first-referenced parent surfaces first
        assert_eq!(hashes[0], missing_one.hash);
        assert_eq!(hashes[1], missing_two.hash);
    }

    #[test]
    fn tail_hashes_empty_when_history_is_complete() {
        let a = entry("A", b"a", vec![], 1);
        let b = entry("A", b"b", vec![a.hash], 2);
        assert!(find_tail_hashes(&[a, b]).is_empty());
    }
}
