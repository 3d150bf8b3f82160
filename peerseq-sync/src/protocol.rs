//! Sync protocol messages and types.
//!
//! Replicas exchange two kinds of payload:
//! 1. Single operations, broadcast as soon as they are created locally
//! 2. Full state snapshots, sent on request to repair gaps or bootstrap
//!    a replica that joined late
//!
//! Operations may arrive in any order and any number of times; the merge
//! engine buffers what it cannot apply yet and drops what it has seen.

use crate::error::{SyncError, SyncResult};
use peerseq_crdt::{Element, Operation, VectorClock};
use peerseq_types::ReplicaId;
use serde::{Deserialize, Serialize};

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u32 = 1;

/// A sync protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum SyncMessage<T> {
    /// One operation issued by some replica.
    Operation(Operation<T>),

    /// Full state of the sender.
    State(StateSnapshot<T>),

    /// Ask the receiver for its full state.
    StateRequest {
        /// Who is asking.
        replica: ReplicaId,
    },
}

impl<T> SyncMessage<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    /// Encodes the message as JSON bytes.
    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a message from JSON bytes.
    pub fn decode(bytes: &[u8]) -> SyncResult<Self> {
        let message: Self = serde_json::from_slice(bytes)?;
        if let SyncMessage::State(snapshot) = &message {
            snapshot.check_version()?;
        }
        Ok(message)
    }
}

/// Complete state of one replica: every element it holds, tombstones
/// included, and the vector clock that covers them.
///
/// Elements are listed in sequence order, so every anchor precedes the
/// elements attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot<T> {
    /// Protocol version of the sender.
    pub version: u32,
    /// Sender's replica id.
    pub replica: ReplicaId,
    /// Sender's vector clock.
    pub clock: VectorClock,
    /// All elements in sequence order.
    pub elements: Vec<Element<T>>,
}

impl<T> StateSnapshot<T> {
    /// Creates a snapshot at the current protocol version.
    pub fn new(replica: ReplicaId, clock: VectorClock, elements: Vec<Element<T>>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            replica,
            clock,
            elements,
        }
    }

    /// Fails if the snapshot was produced by an incompatible peer.
    pub fn check_version(&self) -> SyncResult<()> {
        if self.version != PROTOCOL_VERSION {
            return Err(SyncError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: self.version,
            });
        }
        Ok(())
    }
}
