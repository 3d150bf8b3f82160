//! Replicated operations.
//!
//! Every local mutation of a sequence produces one [`Operation`]. Operations
//! are what the transport ships between replicas, and applying the same set
//! of operations on any replica yields the same sequence.

use crate::rga::{Element, Rga, RgaResult};
use peerseq_types::OperationId;
use serde::{Deserialize, Serialize};

/// What an operation does to the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OpKind<T> {
    /// Insert `value` immediately after `anchor`.
    Insert { anchor: OperationId, value: T },
    /// Tombstone the element inserted by `target`.
    Remove { target: OperationId },
}

/// A single mutation, tagged with the id of the replica/clock that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation<T> {
    pub id: OperationId,
    #[serde(flatten)]
    pub kind: OpKind<T>,
}

impl<T: Clone> Operation<T> {
    /// Creates an insert operation.
    #[must_use]
    pub fn insert(id: OperationId, anchor: OperationId, value: T) -> Self {
        Self {
            id,
            kind: OpKind::Insert { anchor, value },
        }
    }

    /// Creates a remove operation.
    #[must_use]
    pub fn remove(id: OperationId, target: OperationId) -> Self {
        Self {
            id,
            kind: OpKind::Remove { target },
        }
    }

    /// The element this operation refers to: the anchor of an insert or the
    /// target of a remove. It must be present before the operation applies.
    #[must_use]
    pub fn dependency(&self) -> &OperationId {
        match &self.kind {
            OpKind::Insert { anchor, .. } => anchor,
            OpKind::Remove { target } => target,
        }
    }

    /// Returns true for inserts.
    #[must_use]
    pub fn is_insert(&self) -> bool {
        matches!(self.kind, OpKind::Insert { .. })
    }

    /// Applies the operation to a sequence. Returns true if it changed.
    ///
    /// Idempotent: re-applying an insert or a remove changes nothing.
    pub fn apply_to(&self, rga: &mut Rga<T>) -> RgaResult<bool> {
        match &self.kind {
            OpKind::Insert { anchor, value } => {
                rga.merge(Element::new(self.id.clone(), anchor.clone(), value.clone()))
            }
            OpKind::Remove { target } => rga.remove(target),
        }
    }
}
