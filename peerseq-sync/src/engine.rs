//! Merge engine: causal delivery of operations into a sequence.
//!
//! The engine is a pure state machine without I/O. It owns the sequence,
//! the local vector clock and the buffer of operations that arrived too
//! early. Remote operations are admitted once
//!
//! 1. every earlier operation of the same replica has been merged, and
//! 2. the element they anchor to (insert) or target (remove) is present.
//!
//! Anything else waits in the [`PendingBuffer`] and is retried as soon as
//! the operation it waits on is merged.

use crate::error::{SyncError, SyncResult};
use crate::pending::PendingBuffer;
use crate::protocol::StateSnapshot;
use peerseq_crdt::{IdAllocator, Operation, Rga, RgaError, VectorClock};
use peerseq_types::{OperationId, ReplicaId};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default number of buffered operations above which the engine warns.
pub const DEFAULT_PENDING_WARN_THRESHOLD: usize = 1_000;

/// Outcome of delivering a remote operation or snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The state changed. `merged` counts every operation merged by this
    /// delivery, including buffered ones it released.
    Merged { merged: usize },
    /// Held until a missing dependency arrives.
    Buffered,
    /// Already known. Nothing changed.
    Duplicate,
}

impl Delivery {
    /// Returns true if the state changed.
    pub fn changed(&self) -> bool {
        matches!(self, Delivery::Merged { .. })
    }
}

enum Admission {
    Merged,
    Buffered,
    Duplicate,
}

/// Applies local and remote operations to one replicated sequence.
#[derive(Debug)]
pub struct MergeEngine<T: Clone> {
    ids: IdAllocator,
    clock: VectorClock,
    rga: Rga<T>,
    pending: PendingBuffer<T>,
    pending_warn_threshold: usize,
}

impl<T: Clone> MergeEngine<T> {
    /// Creates an engine for the given local replica.
    pub fn new(replica: ReplicaId) -> Self {
        Self::with_threshold(replica, DEFAULT_PENDING_WARN_THRESHOLD)
    }

    /// Creates an engine that warns once more than `pending_warn_threshold`
    /// operations are buffered.
    pub fn with_threshold(replica: ReplicaId, pending_warn_threshold: usize) -> Self {
        Self {
            clock: VectorClock::for_replica(replica.clone()),
            ids: IdAllocator::new(replica),
            rga: Rga::new(),
            pending: PendingBuffer::new(),
            pending_warn_threshold,
        }
    }

    /// The local replica id.
    pub fn replica(&self) -> &ReplicaId {
        self.ids.replica()
    }

    /// The local vector clock.
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    /// The replicated sequence.
    pub fn sequence(&self) -> &Rga<T> {
        &self.rga
    }

    // ── Local mutations ─────────────────────────────────────────

    /// Appends `value` after the last visible element.
    pub fn local_push(&mut self, value: T) -> SyncResult<Operation<T>> {
        let anchor = self
            .rga
            .last_visible_id()
            .cloned()
            .unwrap_or_else(OperationId::root);
        self.local_insert_after(anchor, value)
    }

    /// Inserts `value` so that it lands at visible position `index`.
    pub fn local_insert_at(&mut self, index: usize, value: T) -> SyncResult<Operation<T>> {
        let anchor = self.rga.anchor_for_index(index)?;
        self.local_insert_after(anchor, value)
    }

    /// Inserts `value` right after `anchor`.
    pub fn local_insert_after(&mut self, anchor: OperationId, value: T) -> SyncResult<Operation<T>> {
        if !self.rga.contains(&anchor) {
            return Err(RgaError::UnknownAnchor(anchor).into());
        }
        let op = Operation::insert(self.ids.next(&mut self.clock), anchor, value);
        op.apply_to(&mut self.rga)?;
        debug!("Inserted local element {}", op.id);
        Ok(op)
    }

    /// Removes the element at visible position `index`.
    pub fn local_remove_at(&mut self, index: usize) -> SyncResult<Operation<T>> {
        let target = self
            .rga
            .id_at(index)
            .cloned()
            .ok_or(RgaError::IndexOutOfBounds {
                index,
                len: self.rga.len(),
            })?;
        let op = Operation::remove(self.ids.next(&mut self.clock), target);
        op.apply_to(&mut self.rga)?;
        debug!("Removed local element at {}", index);
        Ok(op)
    }

    /// Removes the element inserted by `target`.
    ///
    /// Returns `None` without issuing an operation if it is already removed.
    pub fn local_remove(&mut self, target: OperationId) -> SyncResult<Option<Operation<T>>> {
        if self.rga.element(&target).is_none() {
            return Err(RgaError::UnknownElement(target).into());
        }
        if self.rga.is_tombstoned(&target) {
            return Ok(None);
        }
        let op = Operation::remove(self.ids.next(&mut self.clock), target);
        op.apply_to(&mut self.rga)?;
        Ok(Some(op))
    }

    // ── Remote delivery ─────────────────────────────────────────

    /// Delivers an operation from another replica.
    ///
    /// Duplicates are absorbed. Operations whose dependencies are missing
    /// are buffered. Merging an operation releases everything buffered
    /// behind it, transitively.
    pub fn receive(&mut self, op: Operation<T>) -> SyncResult<Delivery> {
        if self.clock.contains(&op.id) || self.pending.contains(&op.id) {
            debug!("Ignoring duplicate operation {}", op.id);
            return Ok(Delivery::Duplicate);
        }
        if op.id.replica() == self.replica() {
            warn!("Operation {} claims the local replica id", op.id);
            return Err(SyncError::ReplicaIdReused(op.id));
        }

        let id = op.id.clone();
        match self.admit(op, Instant::now())? {
            Admission::Merged => {
                let merged = 1 + self.cascade(id);
                Ok(Delivery::Merged { merged })
            }
            Admission::Buffered => {
                self.check_pending();
                Ok(Delivery::Buffered)
            }
            Admission::Duplicate => Ok(Delivery::Duplicate),
        }
    }

    /// Merges the full state of another replica.
    ///
    /// The snapshot's elements are merged as a whole, its clock is folded
    /// into the local one, and buffered operations are retried.
    pub fn receive_state(&mut self, snapshot: StateSnapshot<T>) -> SyncResult<Delivery> {
        snapshot.check_version()?;
        let local = self.replica().clone();
        let claimed = snapshot.clock.get(&local);
        if snapshot.replica != local && claimed > self.clock.get(&local) {
            warn!(
                "Snapshot from {} claims {} local operations, only {} were issued",
                snapshot.replica,
                claimed,
                self.clock.get(&local)
            );
            return Err(SyncError::ReplicaIdReused(OperationId::new(local, claimed)));
        }

        let remote = Rga::try_from(snapshot.elements).map_err(|e| SyncError::ProtocolViolation {
            op: OperationId::root(),
            reason: format!("malformed snapshot from {}: {e}", snapshot.replica),
        })?;

        let before = self.clock.clone();
        let mut changed = self.rga.merge_state(&remote)?;
        self.clock.merge(&snapshot.clock);
        changed |= !before.dominates(&self.clock);

        let mut merged = 0;
        for held in self.pending.drain() {
            let id = held.op.id.clone();
            match self.admit(held.op, held.since) {
                Ok(Admission::Merged) => merged += 1 + self.cascade(id),
                Ok(_) => {}
                Err(e) => warn!("Dropped buffered operation {}: {}", id, e),
            }
        }

        if changed || merged > 0 {
            info!(
                "Merged state from {} ({} buffered operations released, {} still pending)",
                snapshot.replica,
                merged,
                self.pending.len()
            );
            Ok(Delivery::Merged { merged })
        } else {
            Ok(Delivery::Duplicate)
        }
    }

    /// Full local state.
    pub fn snapshot(&self) -> StateSnapshot<T> {
        StateSnapshot::new(
            self.replica().clone(),
            self.clock.clone(),
            self.rga.elements_in_order().cloned().collect(),
        )
    }

    // ── Pending buffer ──────────────────────────────────────────

    /// Number of buffered operations.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// How long the oldest buffered operation has been waiting.
    pub fn oldest_pending_age(&self) -> Option<Duration> {
        self.pending.oldest_age()
    }

    /// Ids of buffered operations.
    pub fn pending_ids(&self) -> Vec<OperationId> {
        self.pending.ids()
    }

    /// Ids the buffered operations are waiting on.
    pub fn awaited_ids(&self) -> Vec<OperationId> {
        self.pending.awaited()
    }

    // ── Internals ───────────────────────────────────────────────

    /// Merges `op` if it is causally ready, otherwise buffers it.
    ///
    /// `since` is when the operation first arrived; a buffered operation
    /// keeps it however often it is retried.
    fn admit(&mut self, op: Operation<T>, since: Instant) -> SyncResult<Admission> {
        if self.clock.contains(&op.id) {
            return Ok(Admission::Duplicate);
        }
        if !self.clock.is_ready(&op.id) {
            // Not ready and not contained means clock >= 2, so a predecessor exists.
            let Some(previous) = op.id.predecessor() else {
                return Err(violation(&op.id, "operation has no predecessor"));
            };
            debug!("Buffering {} until {} arrives", op.id, previous);
            self.pending.hold_since(previous, op, since);
            return Ok(Admission::Buffered);
        }

        let dependency = op.dependency();
        if !self.rga.contains(dependency) {
            if dependency.replica() == op.id.replica() && dependency.clock() >= op.id.clock() {
                // A replica cannot reference what it issues later.
                let reason = format!("depends on {dependency}, issued no earlier than itself");
                warn!("Discarding operation {}: {}", op.id, reason);
                return Err(violation(&op.id, &reason));
            }
            if self.clock.contains(dependency) {
                // Everything the dependency's replica issued up to it is
                // merged, yet it is not an element: it never will be.
                let reason = format!("depends on {dependency}, which is not an element");
                warn!("Discarding operation {}: {}", op.id, reason);
                return Err(violation(&op.id, &reason));
            }
            debug!("Buffering {} until {} arrives", op.id, dependency);
            self.pending.hold_since(dependency.clone(), op, since);
            return Ok(Admission::Buffered);
        }

        if let Err(e) = op.apply_to(&mut self.rga) {
            warn!("Discarding operation {}: {}", op.id, e);
            return Err(violation(&op.id, &e.to_string()));
        }
        self.clock.observe(op.id.replica(), op.id.clock());
        debug!("Merged remote operation {}", op.id);
        Ok(Admission::Merged)
    }

    /// Retries everything buffered behind `merged`. Returns how many
    /// operations were merged along the way.
    fn cascade(&mut self, merged: OperationId) -> usize {
        let mut count = 0;
        let mut queue = VecDeque::from([merged]);
        while let Some(id) = queue.pop_front() {
            for held in self.pending.release(&id) {
                let released = held.op.id.clone();
                match self.admit(held.op, held.since) {
                    Ok(Admission::Merged) => {
                        count += 1;
                        queue.push_back(released);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Dropped buffered operation {}: {}", released, e),
                }
            }
        }
        count
    }

    fn check_pending(&self) {
        let pending = self.pending.len();
        if pending > self.pending_warn_threshold {
            warn!(
                "{} operations buffered on {} (threshold {}), oldest waiting {:?}",
                pending,
                self.replica(),
                self.pending_warn_threshold,
                self.pending.oldest_age()
            );
        }
    }
}

fn violation(op: &OperationId, reason: &str) -> SyncError {
    SyncError::ProtocolViolation {
        op: op.clone(),
        reason: reason.to_string(),
    }
}
