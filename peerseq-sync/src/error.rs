//! Error types for the sync layer.

use peerseq_crdt::RgaError;
use peerseq_types::OperationId;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// Duplicate deliveries are never errors; they are absorbed silently.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote operation or state can never be applied consistently.
    /// The offending data is discarded and the session stays usable.
    #[error("protocol violation by {op}: {reason}")]
    ProtocolViolation { op: OperationId, reason: String },

    /// A remote operation claims the local replica id with a clock the
    /// local replica never issued.
    #[error("replica id reused by a foreign operation: {0}")]
    ReplicaIdReused(OperationId),

    /// A local mutation referenced an element or index that does not exist.
    #[error("sequence error: {0}")]
    Crdt(#[from] RgaError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Peer speaks a different protocol version.
    #[error("version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },
}
