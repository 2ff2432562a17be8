//! Log - append-only, content-addressed log with causal ordering
//!
//! A `Log` is a grow-only set of entries arranged in a Merkle-DAG, plus
//! the bookkeeping to append locally and merge divergent histories from
//! other replicas. Merging (`join`) is commutative, associative and
//! idempotent on the entry set, so replicas converge regardless of the
//! order in which they reconcile.
//!
//! Joins never mutate the receiver: they return a fresh, independently
//! owned `Log`, and a rejected join is reported as a value rather than an
//! error so a replica can tolerate malformed or adversarial peers without
//! aborting.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tangle_model::{Hash, LamportClock};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::access::{self, AccessKey};
use crate::entry::{find_children, Entry, EntryError};
use crate::entry_set::EntrySet;
use crate::frontier;
use crate::identity::ReplicaIdentity;

/// Errors that can occur during log operations
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Local key is not allowed to write to this log")]
    NotAllowed,

    #[error(transparent)]
    Entry(#[from] EntryError),
}

/// Why a join was rejected. Rejections are reported, not thrown: the
/// receiving log is left untouched and nothing from the other log is
/// merged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinRejection {
    #[error("entry {hash} carries no key or signature")]
    MissingCredentials { hash: Hash },

    #[error("entry {hash} belongs to log {found:?}, not {expected:?}")]
    ForeignLogId {
        hash: Hash,
        found: String,
        expected: String,
    },

    #[error("entry {hash} was signed by a key outside the allow-list")]
    KeyNotAllowed { hash: Hash },

    #[error("entry {hash} has an invalid signature")]
    InvalidSignature { hash: Hash },

    #[error("entry {hash} could not be verified: {reason}")]
    VerifierError { hash: Hash, reason: String },
}

/// Result of a join: either a new converged log, or the reason the other
/// log's entries were refused.
#[derive(Debug)]
pub enum JoinOutcome {
    Merged(Log),
    Rejected(JoinRejection),
}

impl JoinOutcome {
    /// The merged log, if the join succeeded.
    pub fn merged(self) -> Option<Log> {
        match self {
            JoinOutcome::Merged(log) => Some(log),
            JoinOutcome::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, JoinOutcome::Rejected(_))
    }
}

/// Options for [`Log::join_with`].
#[derive(Debug, Clone, Default)]
pub struct JoinOptions {
    /// Keep only the causally-latest `size` entries after merging.
    /// `None` leaves the log unbounded.
    pub size: Option<usize>,
    /// Identity for the merged log. Defaults to the lexicographically
    /// greater of the two input ids, so both directions of a pairwise
    /// merge agree.
    pub id: Option<String>,
}

/// Configuration for constructing a [`Log`]. All fields are optional;
/// `LogConfig::default()` yields an empty, unsigned, open log with a
/// random id.
#[derive(Clone, Default)]
pub struct LogConfig {
    /// Log identity. Random when absent.
    pub id: Option<String>,
    /// Initial entries.
    pub entries: Vec<Entry>,
    /// Initial heads. Computed from `entries` when absent.
    pub heads: Option<Vec<Entry>>,
    /// Initial clock. The clock time is raised to the head maximum either way.
    pub clock: Option<LamportClock>,
    /// Signing identity for appends and join verification.
    pub identity: Option<ReplicaIdentity>,
    /// Writer allow-list; empty means open.
    pub allowed_keys: Vec<AccessKey>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_entries(mut self, entries: Vec<Entry>) -> Self {
        self.entries = entries;
        self
    }

    pub fn with_heads(mut self, heads: Vec<Entry>) -> Self {
        self.heads = Some(heads);
        self
    }

    pub fn with_clock(mut self, clock: LamportClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_identity(mut self, identity: ReplicaIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_allowed_keys(mut self, keys: Vec<AccessKey>) -> Self {
        self.allowed_keys = keys;
        self
    }
}

/// JSON view of a log: its id and head hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogJson {
    pub id: String,
    pub heads: Vec<String>,
}

/// Full snapshot of a log: id, heads and the linearized entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSnapshot {
    pub id: String,
    pub heads: Vec<Entry>,
    pub values: Vec<Entry>,
}

/// An append-only log replica. Single-owner: callers serialize appends
/// against one instance, and joins hand back fresh instances.
#[derive(Debug, Clone)]
pub struct Log {
    id: String,
    entries: EntrySet,
    heads: HashMap<Hash, Entry>,
    /// parent hash -> hash of an entry referencing it. A hash present here
    /// is by definition not a head.
    nexts: HashMap<Hash, Hash>,
    clock: LamportClock,
    identity: Option<ReplicaIdentity>,
    access: Vec<AccessKey>,
}

impl Log {
    pub fn new(config: LogConfig) -> Log {
        let LogConfig {
            id,
            entries,
            heads,
            clock,
            identity,
            allowed_keys,
        } = config;

        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let heads = heads.unwrap_or_else(|| frontier::find_heads(&entries));
        let heads: HashMap<Hash, Entry> = heads.into_iter().map(|e| (e.hash, e)).collect();

        let mut nexts = HashMap::new();
        for entry in &entries {
            for parent in &entry.next {
                nexts.insert(*parent, entry.hash);
            }
        }

        let head_time = heads.values().map(|e| e.clock.time).max().unwrap_or(0);
        let time = clock.map(|c| c.time).unwrap_or(0).max(head_time);
        let clock = LamportClock::new(id.clone(), time);

        Log {
            id,
            entries: EntrySet::from_entries(entries),
            heads,
            nexts,
            clock,
            identity,
            access: allowed_keys,
        }
    }

    /// Reconstruct a log from a snapshot, carrying over the identity and
    /// allow-list from `config` (the snapshot's id, entries and heads win).
    pub fn from_snapshot(snapshot: LogSnapshot, config: LogConfig) -> Log {
        Log::new(LogConfig {
            id: Some(snapshot.id),
            entries: snapshot.values,
            heads: Some(snapshot.heads),
            ..config
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn clock(&self) -> &LamportClock {
        &self.clock
    }

    /// Number of entries held. Always equals the entry index cardinality.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by content address.
    pub fn get(&self, hash: &Hash) -> Option<&Entry> {
        self.entries.get(hash)
    }

    pub fn has(&self, hash: &Hash) -> bool {
        self.entries.contains(hash)
    }

    pub fn contains_entry(&self, entry: &Entry) -> bool {
        self.has(&entry.hash)
    }

    /// All held entries, linearized by the total order (Lamport time,
    /// owner id, hash).
    pub fn values(&self) -> Vec<Entry> {
        let mut values: Vec<Entry> = self.entries.iter().cloned().collect();
        values.sort();
        values
    }

    /// Current DAG tips, sorted by descending log id then hash.
    pub fn heads(&self) -> Vec<Entry> {
        let mut heads: Vec<Entry> = self.heads.values().cloned().collect();
        heads.sort_by(|a, b| {
            b.log_id
                .cmp(&a.log_id)
                .then_with(|| b.hash.cmp(&a.hash))
        });
        heads
    }

    /// Entries at the replication frontier (no parents, or parents we do
    /// not hold).
    pub fn tails(&self) -> Vec<Entry> {
        frontier::find_tails(&self.values())
    }

    /// Hashes of ancestors referenced but not held; what a replica must
    /// still fetch.
    pub fn tail_hashes(&self) -> Vec<Hash> {
        frontier::find_tail_hashes(&self.values())
    }

    /// Bounded breadth-first walk over held history.
    ///
    /// Seeds the queue with the parents of every root; the roots themselves
    /// are recorded and pre-counted toward `amount`. Hashes we do not hold
    /// are silently skipped, so traversal works under partial replication.
    /// Returns hashes in discovery order.
    pub fn traverse(&self, roots: &[Entry], amount: Option<usize>) -> Vec<Hash> {
        let limit = amount.unwrap_or(usize::MAX);
        let mut queue: VecDeque<Hash> =
            roots.iter().flat_map(|e| e.next.iter().copied()).collect();
        let mut visited: HashSet<Hash> = HashSet::new();
        let mut result: Vec<Hash> = Vec::new();

        for root in roots {
            if visited.insert(root.hash) {
                result.push(root.hash);
            }
        }

        let mut count = result.len();
        while let Some(hash) = queue.pop_front() {
            if count >= limit {
                break;
            }
            let Some(entry) = self.entries.get(&hash) else {
                continue;
            };
            if !visited.insert(entry.hash) {
                continue;
            }
            count += 1;
            result.push(entry.hash);
            for parent in &entry.next {
                if !visited.contains(parent) {
                    queue.push_back(*parent);
                }
            }
        }
        result
    }

    /// Append a payload, linking it to the single most recent head.
    pub fn append(&mut self, payload: impl Into<Vec<u8>>) -> Result<Entry, LogError> {
        self.append_with_pointers(payload, 1)
    }

    /// Append a payload, letting the new entry reference up to
    /// `pointer_count` entries of the recent frontier. More pointers make
    /// convergence detection cheaper on merge at the cost of entry size.
    pub fn append_with_pointers(
        &mut self,
        payload: impl Into<Vec<u8>>,
        pointer_count: usize,
    ) -> Result<Entry, LogError> {
        let local_key = self.identity.as_ref().map(ReplicaIdentity::public_key);
        if !access::permits(&self.access, local_key.as_ref()) {
            return Err(LogError::NotAllowed);
        }

        // Advance past every current head
        let new_clock = match self.heads.values().map(|e| &e.clock).max() {
            Some(head_clock) => self.clock.merge(head_clock).tick(),
            None => self.clock.tick(),
        };

        let heads = self.heads();
        let nexts = self.traverse(&heads, Some(pointer_count));
        let entry = Entry::new(
            self.id.clone(),
            payload,
            nexts.clone(),
            new_clock.clone(),
            self.identity.as_ref(),
        )?;

        // Commit only after the entry exists; an error above leaves the
        // log untouched
        self.clock = new_clock;
        for parent in &nexts {
            self.nexts.insert(*parent, entry.hash);
        }
        self.entries.insert(entry.clone());
        self.heads.clear();
        self.heads.insert(entry.hash, entry.clone());

        debug!(hash = %entry.hash, time = entry.clock.time, "appended entry");
        Ok(entry)
    }

    /// Merge another log into this one, returning the converged result.
    /// Neither input is mutated.
    pub fn join(&self, other: &Log) -> JoinOutcome {
        self.join_with(other, JoinOptions::default())
    }

    /// [`Log::join`] with a size bound and/or an explicit result id.
    pub fn join_with(&self, other: &Log, options: JoinOptions) -> JoinOutcome {
        // Both directions of a pairwise merge must agree on the result
        // identity: take the lexicographically greater id
        let new_id = options.id.unwrap_or_else(|| {
            if other.id > self.id {
                other.id.clone()
            } else {
                self.id.clone()
            }
        });

        let delta = self.difference(other);

        // A log that signs its own entries refuses everything it cannot
        // verify. All-or-nothing: one bad entry rejects the whole join.
        if self.identity.is_some() {
            if let Err(rejection) = self.verify_delta(&delta) {
                warn!(%rejection, "join rejected, log unchanged");
                return JoinOutcome::Rejected(rejection);
            }
        }

        let mut merged = self.clone();
        merged.id = new_id.clone();

        let delta_nexts: HashSet<Hash> =
            delta.values().flat_map(|e| e.next.iter().copied()).collect();
        for entry in delta.values() {
            for parent in &entry.next {
                merged.nexts.insert(*parent, entry.hash);
            }
            merged.entries.insert(entry.clone());
        }

        // Bounded-log trade-off: drop everything but the causally-latest
        // `size` entries; trimmed parents resurface as tails
        if let Some(size) = options.size {
            let mut values = merged.values();
            let keep = values.split_off(values.len().saturating_sub(size));
            merged.entries.rebuild_from(keep);
        }

        // Candidate heads come from both logs' head sets; drop any that a
        // merged entry now references, or that we already knew to be
        // referenced
        let union: HashMap<Hash, Entry> = self
            .heads
            .values()
            .chain(other.heads.values())
            .map(|e| (e.hash, e.clone()))
            .collect();
        let union: Vec<Entry> = union.into_values().collect();
        merged.heads = frontier::find_heads(&union)
            .into_iter()
            .filter(|e| !delta_nexts.contains(&e.hash))
            .filter(|e| !merged.nexts.contains_key(&e.hash))
            .map(|e| (e.hash, e))
            .collect();

        let base = LamportClock::new(new_id, self.clock.time);
        merged.clock = match merged.heads.values().map(|e| &e.clock).max() {
            Some(head_clock) => base.merge(head_clock),
            None => base,
        };

        debug!(added = delta.len(), len = merged.len(), "joined logs");
        JoinOutcome::Merged(merged)
    }

    /// Entries reachable from `other`'s heads that we do not hold. A branch
    /// stops as soon as it reaches a locally-known hash, so the work is
    /// bounded by the size of the actually-new delta, not total history.
    fn difference(&self, other: &Log) -> HashMap<Hash, Entry> {
        let mut queue: VecDeque<Hash> = other.heads.keys().copied().collect();
        let mut visited: HashSet<Hash> = HashSet::new();
        let mut delta: HashMap<Hash, Entry> = HashMap::new();

        while let Some(hash) = queue.pop_front() {
            if !visited.insert(hash) || self.entries.contains(&hash) {
                continue;
            }
            let Some(entry) = other.get(&hash) else {
                continue;
            };
            delta.insert(entry.hash, entry.clone());
            for parent in &entry.next {
                if !visited.contains(parent) && !self.entries.contains(parent) {
                    queue.push_back(*parent);
                }
            }
        }
        delta
    }

    /// Check every delta entry's credentials and signature. The checks are
    /// order-independent; iteration is sorted by hash only so the reported
    /// rejection is deterministic.
    fn verify_delta(&self, delta: &HashMap<Hash, Entry>) -> Result<(), JoinRejection> {
        let local_key = self.identity.as_ref().map(ReplicaIdentity::public_key);
        let wildcard = self.access.iter().any(AccessKey::is_wildcard);
        // single-writer configuration: the allow-list is exactly our own key
        let single_writer = matches!(
            (&self.access[..], &local_key),
            ([AccessKey::Key(k)], Some(local)) if k == local
        );

        let mut entries: Vec<&Entry> = delta.values().collect();
        entries.sort_by_key(|e| e.hash);

        for entry in entries {
            let Some(key) = entry.key else {
                return Err(JoinRejection::MissingCredentials { hash: entry.hash });
            };
            if entry.sig.is_none() {
                return Err(JoinRejection::MissingCredentials { hash: entry.hash });
            }

            if single_writer && entry.log_id != self.id {
                return Err(JoinRejection::ForeignLogId {
                    hash: entry.hash,
                    found: entry.log_id.clone(),
                    expected: self.id.clone(),
                });
            }

            if !self.access.is_empty() && !wildcard {
                let allowed = local_key.as_ref() == Some(&key)
                    || self
                        .access
                        .iter()
                        .any(|a| matches!(a, AccessKey::Key(k) if *k == key));
                if !allowed {
                    return Err(JoinRejection::KeyNotAllowed { hash: entry.hash });
                }
            }

            match entry.verify() {
                Ok(()) => {}
                Err(EntryError::Unsigned) => {
                    return Err(JoinRejection::MissingCredentials { hash: entry.hash });
                }
                Err(EntryError::BadSignature) => {
                    return Err(JoinRejection::InvalidSignature { hash: entry.hash });
                }
                Err(e) => {
                    return Err(JoinRejection::VerifierError {
                        hash: entry.hash,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The id-and-heads view of the log.
    pub fn to_json(&self) -> LogJson {
        LogJson {
            id: self.id.clone(),
            heads: self.heads().iter().map(|e| e.hash.to_string()).collect(),
        }
    }

    /// The JSON view serialized to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.to_json())
    }

    /// Full snapshot: id, heads and linearized entries.
    pub fn to_snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            id: self.id.clone(),
            heads: self.heads(),
            values: self.values(),
        }
    }

    /// Tree-rendered view with payloads decoded as UTF-8.
    pub fn render(&self) -> String {
        self.render_with(|payload| String::from_utf8_lossy(payload).into_owned())
    }

    /// Tree-rendered view, newest entry first, with a caller-supplied
    /// payload formatter. Indentation tracks how many held entries
    /// reference each entry.
    pub fn render_with(&self, format: impl Fn(&[u8]) -> String) -> String {
        let values = self.values();
        values
            .iter()
            .rev()
            .map(|entry| {
                let children = find_children(entry, &values);
                let mut line = if children.len() > 1 {
                    "  ".repeat(children.len() - 1)
                } else {
                    String::new()
                };
                if !children.is_empty() {
                    line.push_str("└─");
                }
                line.push_str(&format(&entry.payload));
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_log(id: &str) -> Log {
        Log::new(LogConfig::new().with_id(id))
    }

    #[test]
    fn append_builds_a_chain() {
        let mut log = empty_log("A");
        let a = log.append(b"a".to_vec()).unwrap();
        let b = log.append(b"b".to_vec()).unwrap();

        assert_eq!(log.len(), 2);
        let heads = log.heads();
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].hash, b.hash);
        assert_eq!(b.next, vec![a.hash]);
        assert!(a.next.is_empty());
    }

    #[test]
    fn append_advances_clock_past_heads() {
        let mut log = empty_log("A");
        let a = log.append(b"a".to_vec()).unwrap();
        let b = log.append(b"b".to_vec()).unwrap();

        assert_eq!(a.clock.time, 1);
        assert_eq!(b.clock.time, 2);
        assert!(b.clock.time > a.clock.time);
        assert_eq!(log.clock().time, 2);
    }

    #[test]
    fn head_is_never_referenced() {
        let mut log = empty_log("A");
        for i in 0..5u8 {
            log.append(vec![i]).unwrap();
        }
        let values = log.values();
        for head in log.heads() {
            assert!(values.iter().all(|e| !e.next.contains(&head.hash)));
        }
    }

    #[test]
    fn traverse_respects_amount() {
        let mut log = empty_log("A");
        for i in 0..4u8 {
            log.append(vec![i]).unwrap();
        }
        let heads = log.heads();

        let one = log.traverse(&heads, Some(1));
        assert_eq!(one.len(), 1);
        assert_eq!(one[0], heads[0].hash);

        let two = log.traverse(&heads, Some(2));
        assert_eq!(two.len(), 2);

        let all = log.traverse(&heads, None);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn traverse_skips_missing_ancestors() {
        // build a full log, then a partial replica holding only the tip
        let mut log = empty_log("A");
        log.append(b"a".to_vec()).unwrap();
        let b = log.append(b"b".to_vec()).unwrap();

        let partial = Log::new(
            LogConfig::new()
                .with_id("A")
                .with_entries(vec![b.clone()]),
        );
        let walked = partial.traverse(&partial.heads(), None);
        assert_eq!(walked, vec![b.hash]);
    }

    #[test]
    fn multi_pointer_append_references_frontier() {
        let mut log = empty_log("A");
        log.append(b"a".to_vec()).unwrap();
        log.append(b"b".to_vec()).unwrap();
        let c = log.append_with_pointers(b"c".to_vec(), 2).unwrap();
        // head plus one ancestor
        assert_eq!(c.next.len(), 2);
    }

    #[test]
    fn append_without_permitted_key_fails() {
        let writer = ReplicaIdentity::generate();
        let stranger = ReplicaIdentity::generate();
        let mut log = Log::new(
            LogConfig::new()
                .with_id("A")
                .with_identity(stranger)
                .with_allowed_keys(vec![AccessKey::Key(writer.public_key())]),
        );

        assert!(matches!(log.append(b"x".to_vec()), Err(LogError::NotAllowed)));
        assert_eq!(log.len(), 0);
        assert_eq!(log.clock().time, 0);
    }

    #[test]
    fn wildcard_allows_any_writer() {
        let stranger = ReplicaIdentity::generate();
        let mut log = Log::new(
            LogConfig::new()
                .with_id("A")
                .with_identity(stranger)
                .with_allowed_keys(vec![AccessKey::Any]),
        );
        log.append(b"x".to_vec()).unwrap();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn constructor_recomputes_heads_and_clock() {
        let mut source = empty_log("A");
        source.append(b"a".to_vec()).unwrap();
        let b = source.append(b"b".to_vec()).unwrap();

        let rebuilt = Log::new(
            LogConfig::new()
                .with_id("A")
                .with_entries(source.values()),
        );
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt.heads().len(), 1);
        assert_eq!(rebuilt.heads()[0].hash, b.hash);
        assert_eq!(rebuilt.clock().time, 2);
    }

    #[test]
    fn json_view_lists_head_hashes() {
        let mut log = empty_log("A");
        let a = log.append(b"a".to_vec()).unwrap();

        let json = log.to_json();
        assert_eq!(json.id, "A");
        assert_eq!(json.heads, vec![a.hash.to_string()]);

        let bytes = log.to_bytes().unwrap();
        let parsed: LogJson = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, json);
    }

    #[test]
    fn snapshot_round_trips() {
        let mut log = empty_log("A");
        log.append(b"a".to_vec()).unwrap();
        log.append(b"b".to_vec()).unwrap();

        let snapshot = log.to_snapshot();
        let restored = Log::from_snapshot(snapshot, LogConfig::new());
        assert_eq!(restored.id(), "A");
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.heads(), log.heads());
        assert_eq!(restored.values(), log.values());
    }

    #[test]
    fn render_shows_newest_first() {
        let mut log = empty_log("A");
        log.append(b"one".to_vec()).unwrap();
        log.append(b"two".to_vec()).unwrap();

        let rendered = log.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "two");
        assert_eq!(lines[1], "└─one");
    }
}
