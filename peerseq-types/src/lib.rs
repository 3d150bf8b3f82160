//! Core type definitions for peerseq.
//!
//! This crate defines the identifiers shared by every replica:
//! - Replica identifiers (opaque strings, random UUIDs by default)
//! - Logical clocks (one counter per replica)
//! - Operation identifiers `(replica, clock)` with their total order
//!
//! The replicated data types themselves live in `peerseq-crdt`.

mod ids;
mod operation_id;

pub use ids::ReplicaId;
pub use operation_id::{Clock, OperationId};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when parsing identifiers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("replica id must not be empty")]
    EmptyReplicaId,

    #[error("invalid operation id: {0}")]
    InvalidOperationId(String),
}
