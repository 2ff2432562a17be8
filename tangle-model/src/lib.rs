//! Tangle Model
//!
//! Pure data types for the tangle log, decoupled from hashing, signing
//! and the log algorithms themselves.

pub mod clock;
pub mod types;

// Re-exports
pub use clock::LamportClock;
pub use types::{Hash, PubKey, Signature};
