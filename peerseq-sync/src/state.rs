//! Membership and peer progress tracking.
//!
//! A session knows which replicas participate in the collaboration and the
//! last vector clock each of them advertised in a state snapshot. Neither
//! affects merging; both feed progress reports.

use peerseq_crdt::VectorClock;
use peerseq_types::ReplicaId;
use std::collections::{BTreeSet, HashMap};

/// Tracks the members of a collaboration and what each has reported.
#[derive(Debug, Clone, Default)]
pub struct MembershipState {
    members: BTreeSet<ReplicaId>,
    peers: HashMap<ReplicaId, PeerStatus>,
}

impl MembershipState {
    /// Creates an empty membership.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the member list.
    pub fn set_members(&mut self, members: impl IntoIterator<Item = ReplicaId>) {
        self.members = members.into_iter().collect();
    }

    /// Adds one member. Returns false if it was already listed.
    pub fn add_member(&mut self, replica: ReplicaId) -> bool {
        self.members.insert(replica)
    }

    /// Returns true if the replica is a listed member.
    pub fn is_member(&self, replica: &ReplicaId) -> bool {
        self.members.contains(replica)
    }

    /// Members in id order.
    pub fn members(&self) -> impl Iterator<Item = &ReplicaId> {
        self.members.iter()
    }

    /// Records a clock advertised by a peer. Clocks only grow, so an older
    /// advertisement arriving late is merged rather than taken as is.
    pub fn record_clock(&mut self, replica: &ReplicaId, clock: &VectorClock) {
        self.peers
            .entry(replica.clone())
            .or_insert_with(|| PeerStatus::new(replica.clone()))
            .record(clock);
    }

    /// Gets the status of a peer, if it ever reported.
    pub fn peer(&self, replica: &ReplicaId) -> Option<&PeerStatus> {
        self.peers.get(replica)
    }

    /// Gets the last clock a peer advertised.
    pub fn peer_clock(&self, replica: &ReplicaId) -> Option<&VectorClock> {
        self.peers.get(replica).map(|status| &status.clock)
    }

    /// Returns a copy of `clock` with an explicit entry for every member.
    pub fn with_member_entries(&self, clock: &VectorClock) -> VectorClock {
        let mut full = clock.clone();
        for member in &self.members {
            full.observe(member, 0);
        }
        full
    }
}

/// What is known about a remote replica.
#[derive(Debug, Clone)]
pub struct PeerStatus {
    /// The peer's id.
    pub replica: ReplicaId,
    /// Highest clock the peer has advertised.
    pub clock: VectorClock,
    /// Number of snapshots received from the peer.
    pub snapshots: u64,
}

impl PeerStatus {
    /// Creates a status with an empty clock.
    pub fn new(replica: ReplicaId) -> Self {
        Self {
            replica,
            clock: VectorClock::new(),
            snapshots: 0,
        }
    }

    fn record(&mut self, clock: &VectorClock) {
        self.clock.merge(clock);
        self.snapshots += 1;
    }
}
