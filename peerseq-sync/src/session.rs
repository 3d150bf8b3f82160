//! Collaboration session: one replica of one named shared sequence.
//!
//! The session wraps a [`MergeEngine`] with membership tracking and change
//! notifications. It performs no I/O: local mutations return the operation
//! to broadcast, and the transport hands every received message to
//! [`Session::handle_message`].

use crate::engine::{Delivery, MergeEngine, DEFAULT_PENDING_WARN_THRESHOLD};
use crate::error::SyncResult;
use crate::observer::{ChangeCause, Observers, StateChanged, Subscription};
use crate::protocol::{StateSnapshot, SyncMessage};
use crate::state::MembershipState;
use peerseq_crdt::{Operation, Rga, VectorClock};
use peerseq_types::{OperationId, ReplicaId};
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name of the shared object.
    pub name: String,
    /// Buffered operation count above which the engine logs warnings.
    pub pending_warn_threshold: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "shared".to_string(),
            pending_warn_threshold: DEFAULT_PENDING_WARN_THRESHOLD,
        }
    }
}

impl SessionConfig {
    /// Creates a config for the named object with default limits.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A replica's view of a collaboratively edited sequence.
#[derive(Debug)]
pub struct Session<T: Clone> {
    config: SessionConfig,
    engine: MergeEngine<T>,
    membership: MembershipState,
    observers: Observers<T>,
    version: u64,
}

impl<T: Clone> Session<T> {
    /// Creates a session with the default config.
    pub fn new(replica: ReplicaId) -> Self {
        Self::with_config(replica, SessionConfig::default())
    }

    /// Creates a session with a custom config.
    pub fn with_config(replica: ReplicaId, config: SessionConfig) -> Self {
        info!("Opening session '{}' as {}", config.name, replica);
        let mut membership = MembershipState::new();
        membership.add_member(replica.clone());
        Self {
            engine: MergeEngine::with_threshold(replica, config.pending_warn_threshold),
            config,
            membership,
            observers: Observers::new(),
            version: 0,
        }
    }

    /// The local replica id.
    pub fn replica_id(&self) -> &ReplicaId {
        self.engine.replica()
    }

    /// Name of the shared object.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Number of state changes so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    // ── Reading ─────────────────────────────────────────────────

    /// The visible values in order.
    pub fn value(&self) -> &[T] {
        self.engine.sequence().value()
    }

    /// An owned copy of the visible values.
    pub fn to_vec(&self) -> Vec<T> {
        self.engine.sequence().to_vec()
    }

    /// Number of visible values.
    pub fn len(&self) -> usize {
        self.engine.sequence().len()
    }

    /// Returns true if no value is visible.
    pub fn is_empty(&self) -> bool {
        self.engine.sequence().is_empty()
    }

    /// The underlying sequence, tombstones included.
    pub fn sequence(&self) -> &Rga<T> {
        self.engine.sequence()
    }

    /// The local vector clock.
    pub fn clock(&self) -> &VectorClock {
        self.engine.clock()
    }

    /// Progress report for a replica.
    ///
    /// For the local replica this is the local clock, with an explicit
    /// (possibly zero) entry for every member. For a remote replica it is
    /// the last clock that replica advertised in a snapshot, if any.
    pub fn vector_clock(&self, replica: &ReplicaId) -> Option<VectorClock> {
        if replica == self.replica_id() {
            return Some(self.membership.with_member_entries(self.engine.clock()));
        }
        self.membership.peer_clock(replica).cloned()
    }

    // ── Local mutations ─────────────────────────────────────────

    /// Appends a value. Returns the operation to broadcast.
    pub fn push(&mut self, value: T) -> SyncResult<Operation<T>> {
        let op = self.engine.local_push(value)?;
        self.changed(ChangeCause::Local);
        Ok(op)
    }

    /// Inserts a value at a visible position. Returns the operation to
    /// broadcast.
    pub fn insert_at(&mut self, index: usize, value: T) -> SyncResult<Operation<T>> {
        let op = self.engine.local_insert_at(index, value)?;
        self.changed(ChangeCause::Local);
        Ok(op)
    }

    /// Inserts a value right after an existing element.
    pub fn insert_after(&mut self, anchor: OperationId, value: T) -> SyncResult<Operation<T>> {
        let op = self.engine.local_insert_after(anchor, value)?;
        self.changed(ChangeCause::Local);
        Ok(op)
    }

    /// Removes the value at a visible position. Returns the operation to
    /// broadcast.
    pub fn remove_at(&mut self, index: usize) -> SyncResult<Operation<T>> {
        let op = self.engine.local_remove_at(index)?;
        self.changed(ChangeCause::Local);
        Ok(op)
    }

    /// Removes an element by id. Returns `None` if it was already removed.
    pub fn remove(&mut self, target: OperationId) -> SyncResult<Option<Operation<T>>> {
        let op = self.engine.local_remove(target)?;
        if op.is_some() {
            self.changed(ChangeCause::Local);
        }
        Ok(op)
    }

    // ── Remote input ────────────────────────────────────────────

    /// Delivers an operation from another replica.
    pub fn receive(&mut self, op: Operation<T>) -> SyncResult<Delivery> {
        let source = op.id.replica().clone();
        let delivery = self.engine.receive(op)?;
        if delivery.changed() {
            self.changed(ChangeCause::Remote(source));
        }
        Ok(delivery)
    }

    /// Merges a full state snapshot from another replica.
    pub fn receive_state(&mut self, snapshot: StateSnapshot<T>) -> SyncResult<Delivery> {
        let source = snapshot.replica.clone();
        let advertised = snapshot.clock.clone();
        let delivery = self.engine.receive_state(snapshot)?;
        if source != *self.replica_id() {
            self.membership.add_member(source.clone());
            self.membership.record_clock(&source, &advertised);
        }
        if delivery.changed() {
            self.changed(ChangeCause::Snapshot(source));
        }
        Ok(delivery)
    }

    /// The full local state, for a peer that asked for it.
    pub fn snapshot(&self) -> StateSnapshot<T> {
        self.engine.snapshot()
    }

    /// Handles one message from the transport. Returns the reply to send
    /// back, if any.
    pub fn handle_message(&mut self, message: SyncMessage<T>) -> SyncResult<Option<SyncMessage<T>>> {
        match message {
            SyncMessage::Operation(op) => {
                self.receive(op)?;
                Ok(None)
            }
            SyncMessage::State(snapshot) => {
                self.receive_state(snapshot)?;
                Ok(None)
            }
            SyncMessage::StateRequest { replica } => {
                debug!("Sending state to {}", replica);
                Ok(Some(SyncMessage::State(self.snapshot())))
            }
        }
    }

    /// A request for the full state of whoever receives it.
    pub fn state_request(&self) -> SyncMessage<T> {
        SyncMessage::StateRequest {
            replica: self.replica_id().clone(),
        }
    }

    // ── Membership ──────────────────────────────────────────────

    /// Replaces the member list. The local replica is always a member.
    pub fn set_members(&mut self, members: impl IntoIterator<Item = ReplicaId>) {
        let local = self.replica_id().clone();
        self.membership
            .set_members(members.into_iter().chain(std::iter::once(local)));
    }

    /// Members in id order.
    pub fn members(&self) -> Vec<ReplicaId> {
        self.membership.members().cloned().collect()
    }

    // ── Observers ───────────────────────────────────────────────

    /// Registers a listener called after every state change, with the
    /// visible value at that point.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StateChanged, &[T]) + Send + Sync + 'static,
        T: 'static,
    {
        self.observers.subscribe(listener)
    }

    /// The listener set, shareable with other threads.
    pub fn observers(&self) -> &Observers<T> {
        &self.observers
    }

    // ── Pending buffer ──────────────────────────────────────────

    /// Number of buffered remote operations.
    pub fn pending_len(&self) -> usize {
        self.engine.pending_len()
    }

    /// How long the oldest buffered operation has been waiting.
    pub fn oldest_pending_age(&self) -> Option<Duration> {
        self.engine.oldest_pending_age()
    }

    /// Ids of buffered operations.
    pub fn pending_ids(&self) -> Vec<OperationId> {
        self.engine.pending_ids()
    }

    fn changed(&mut self, cause: ChangeCause) {
        self.version += 1;
        let event = StateChanged {
            version: self.version,
            len: self.len(),
            clock: self.engine.clock().clone(),
            cause,
        };
        self.observers.notify(&event, self.engine.sequence().value());
    }
}
