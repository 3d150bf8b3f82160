//! Operation id allocation.

use crate::VectorClock;
use peerseq_types::{OperationId, ReplicaId};

/// Hands out fresh operation ids for one replica.
///
/// Each id pairs the replica with the value its vector clock entry reaches
/// after a tick, so ids are unique and increase in issue order.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    replica: ReplicaId,
}

impl IdAllocator {
    /// Creates an allocator for `replica`.
    #[must_use]
    pub fn new(replica: ReplicaId) -> Self {
        Self { replica }
    }

    /// The replica this allocator issues ids for.
    #[must_use]
    pub fn replica(&self) -> &ReplicaId {
        &self.replica
    }

    /// Ticks the replica's entry in `clock` and returns the matching id.
    pub fn next(&self, clock: &mut VectorClock) -> OperationId {
        let value = clock.tick(&self.replica);
        OperationId::new(self.replica.clone(), value)
    }
}
