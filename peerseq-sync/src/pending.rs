//! Buffer for operations that arrived before their dependencies.
//!
//! An operation waits on exactly one id at a time: either the previous
//! operation of its own replica (a gap in that replica's stream) or the
//! element it anchors to / removes. Both cases are keyed by the awaited id,
//! so merging one operation releases everything that was waiting on it.

use peerseq_crdt::Operation;
use peerseq_types::OperationId;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// A buffered operation and the instant it first arrived.
#[derive(Debug, Clone)]
pub struct Held<T> {
    /// The waiting operation.
    pub op: Operation<T>,
    /// Kept across re-buffering, so an operation that moves from one
    /// awaited id to another still reports its full wait.
    pub since: Instant,
}

/// Operations waiting for a dependency, keyed by the id they wait on.
#[derive(Debug, Clone)]
pub struct PendingBuffer<T> {
    waiting: HashMap<OperationId, Vec<Held<T>>>,
    held: HashSet<OperationId>,
}

impl<T> Default for PendingBuffer<T> {
    fn default() -> Self {
        Self {
            waiting: HashMap::new(),
            held: HashSet::new(),
        }
    }
}

impl<T> PendingBuffer<T> {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds `op` until `awaited` is merged.
    ///
    /// Returns false if the operation is already held.
    pub fn hold(&mut self, awaited: OperationId, op: Operation<T>) -> bool {
        self.hold_since(awaited, op, Instant::now())
    }

    /// Holds `op` until `awaited` is merged, counting its wait from `since`.
    ///
    /// Used when an operation that was already waiting goes back into the
    /// buffer. Returns false if the operation is already held.
    pub fn hold_since(&mut self, awaited: OperationId, op: Operation<T>, since: Instant) -> bool {
        if !self.held.insert(op.id.clone()) {
            return false;
        }
        self.waiting
            .entry(awaited)
            .or_default()
            .push(Held { op, since });
        true
    }

    /// Removes and returns every operation waiting on `merged`.
    pub fn release(&mut self, merged: &OperationId) -> Vec<Held<T>> {
        let Some(released) = self.waiting.remove(merged) else {
            return Vec::new();
        };
        for held in &released {
            self.held.remove(&held.op.id);
        }
        released
    }

    /// Removes and returns every held operation, oldest first.
    pub fn drain(&mut self) -> Vec<Held<T>> {
        self.held.clear();
        let mut all: Vec<Held<T>> = self.waiting.drain().flat_map(|(_, ops)| ops).collect();
        all.sort_by_key(|held| held.since);
        all
    }

    /// Returns true if an operation with this id is held.
    #[must_use]
    pub fn contains(&self, id: &OperationId) -> bool {
        self.held.contains(id)
    }

    /// Number of held operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Returns true if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// How long the oldest held operation has been waiting.
    #[must_use]
    pub fn oldest_age(&self) -> Option<Duration> {
        self.waiting
            .values()
            .flatten()
            .map(|held| held.since)
            .min()
            .map(|since| since.elapsed())
    }

    /// Ids of all held operations, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<OperationId> {
        let mut ids: Vec<OperationId> = self.held.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids the buffer is waiting on, sorted. Useful for requesting
    /// retransmission of a missing range.
    #[must_use]
    pub fn awaited(&self) -> Vec<OperationId> {
        let mut ids: Vec<OperationId> = self.waiting.keys().cloned().collect();
        ids.sort();
        ids
    }
}
