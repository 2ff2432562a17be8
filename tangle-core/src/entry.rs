//! Log entries: immutable, content-addressed, optionally signed
//!
//! An entry's hash is a pure function of its content (log id, payload,
//! parent hashes, clock stamp, writer key), so two replicas that build the
//! same entry agree on its identity without coordination. Signing covers
//! the exact bytes that were hashed.

use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tangle_model::{Hash, LamportClock, PubKey, Signature};
use thiserror::Error;

use crate::identity::{IdentityError, ReplicaIdentity};

/// Errors that can occur during entry construction and verification
#[derive(Error, Debug)]
pub enum EntryError {
    #[error("Entry carries no key or signature")]
    Unsigned,

    #[error("Entry key is not a valid Ed25519 public key")]
    MalformedKey,

    #[error("Signature does not match entry content")]
    BadSignature,

    #[error("Content encoding failed: {0}")]
    Encode(#[from] std::io::Error),
}

/// An immutable entry in the log.
///
/// Entries form a Merkle-DAG: `next` holds the content addresses of causal
/// predecessors. Once created an entry is never mutated; two entries with
/// equal `hash` are substitutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Content address, derived from every other field except `sig`.
    pub hash: Hash,
    /// Identity of the log this entry was created in.
    pub log_id: String,
    /// Opaque application data.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    /// Parent hashes (causal predecessors).
    pub next: Vec<Hash>,
    /// Lamport stamp at creation.
    pub clock: LamportClock,
    /// Writer's public key, absent for unsigned logs.
    pub key: Option<PubKey>,
    /// Signature over the content bytes, absent for unsigned logs.
    pub sig: Option<Signature>,
}

/// The fields the content address and signature commit to.
#[derive(BorshSerialize)]
struct EntryContent<'a> {
    log_id: &'a str,
    payload: &'a [u8],
    next: &'a [Hash],
    clock: &'a LamportClock,
    key: Option<PubKey>,
}

fn encode_content(
    log_id: &str,
    payload: &[u8],
    next: &[Hash],
    clock: &LamportClock,
    key: Option<PubKey>,
) -> Result<Vec<u8>, EntryError> {
    let content = EntryContent {
        log_id,
        payload,
        next,
        clock,
        key,
    };
    Ok(borsh::to_vec(&content)?)
}

impl Entry {
    /// Construct a new entry, hashing its content and signing it when an
    /// identity is given.
    pub fn new(
        log_id: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        next: Vec<Hash>,
        clock: LamportClock,
        identity: Option<&ReplicaIdentity>,
    ) -> Result<Entry, EntryError> {
        let log_id = log_id.into();
        let payload = payload.into();
        let key = identity.map(ReplicaIdentity::public_key);

        let content = encode_content(&log_id, &payload, &next, &clock, key)?;
        let hash = Hash::from(*blake3::hash(&content).as_bytes());
        let sig = identity.map(|i| i.sign(&content));

        Ok(Entry {
            hash,
            log_id,
            payload,
            next,
            clock,
            key,
            sig,
        })
    }

    /// Re-encode the content bytes this entry's hash and signature commit to.
    pub fn content_bytes(&self) -> Result<Vec<u8>, EntryError> {
        encode_content(&self.log_id, &self.payload, &self.next, &self.clock, self.key)
    }

    /// Whether this entry carries both a key and a signature.
    pub fn is_signed(&self) -> bool {
        self.key.is_some() && self.sig.is_some()
    }

    /// Verify the signature against the entry content.
    ///
    /// Distinguishes the three outcomes callers need to branch on:
    /// `Unsigned` (no credentials at all), `MalformedKey` (the verifier
    /// could not even parse the key) and `BadSignature` (a real rejection).
    pub fn verify(&self) -> Result<(), EntryError> {
        let (key, sig) = match (self.key, self.sig) {
            (Some(key), Some(sig)) => (key, sig),
            _ => return Err(EntryError::Unsigned),
        };

        let content = self.content_bytes()?;
        ReplicaIdentity::verify_with_key(&key, &content, &sig).map_err(|e| match e {
            IdentityError::MalformedKey => EntryError::MalformedKey,
            _ => EntryError::BadSignature,
        })
    }
}

// Total order: Lamport time, then owner identity, then hash. The hash
// tie-break makes the linearization deterministic even when two logs with
// the same id stamp entries at the same time.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.clock
            .cmp(&other.clock)
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Entries in `entries` whose `next` references the given entry.
/// Used only for tree rendering, never by the core algorithms.
pub fn find_children<'a>(entry: &Entry, entries: &'a [Entry]) -> Vec<&'a Entry> {
    entries
        .iter()
        .filter(|e| e.next.contains(&entry.hash))
        .collect()
}
