//! Lamport logical clock
//!
//! Each log carries a `(id, time)` pair. Time only ever moves forward:
//! appending advances it past every head, merging takes the maximum of both
//! sides. Ordering is by time first, owner id second, which gives a total
//! order over entries that respects causality.

use std::cmp::Ordering;

/// A Lamport clock stamp: the owning log's id plus a logical time.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    borsh::BorshSerialize,
    borsh::BorshDeserialize,
)]
pub struct LamportClock {
    /// Identity of the log that produced this stamp.
    pub id: String,
    /// Logical time, non-decreasing within a log's lifetime.
    pub time: u64,
}

impl LamportClock {
    pub fn new(id: impl Into<String>, time: u64) -> Self {
        Self {
            id: id.into(),
            time,
        }
    }

    /// The next stamp for a local event.
    pub fn tick(&self) -> Self {
        Self::new(self.id.clone(), self.time + 1)
    }

    /// Combine with a remote stamp, keeping the local identity.
    pub fn merge(&self, other: &LamportClock) -> Self {
        Self::new(self.id.clone(), self.time.max(other.time))
    }
}

impl Ord for LamportClock {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for LamportClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for LamportClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.time, self.id)
    }
}
