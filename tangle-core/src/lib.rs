//! Tangle Core
//!
//! An append-only, content-addressed log with causal ordering: the
//! grow-only-set CRDT underneath a peer-to-peer eventually consistent
//! store.
//! - **ReplicaIdentity**: Ed25519 keypair for signing entries
//! - **Entry**: immutable, content-addressed, optionally signed log entries
//! - **EntrySet**: grow-only hash-keyed entry index
//! - **frontier**: head/tail computation over entry collections
//! - **access**: writer allow-lists with wildcard support
//! - **Log**: append, join (merge), bounded traversal and total ordering
//!
//! Replicas append locally and reconcile later: `Log::join` is
//! commutative, associative and idempotent over the entry set, so any
//! merge order converges. Entries are identified by a BLAKE3 hash of
//! their content, which makes union deduplication free and histories
//! tamper-evident.

pub mod access;
pub mod entry;
pub mod entry_set;
pub mod frontier;
pub mod identity;
pub mod log;

pub use access::AccessKey;
pub use entry::{find_children, Entry, EntryError};
pub use entry_set::EntrySet;
pub use frontier::{find_heads, find_tail_hashes, find_tails};
pub use identity::{IdentityError, ReplicaIdentity};
pub use log::{
    JoinOptions, JoinOutcome, JoinRejection, Log, LogConfig, LogError, LogJson, LogSnapshot,
};
pub use tangle_model::{Hash, LamportClock, PubKey, Signature};
