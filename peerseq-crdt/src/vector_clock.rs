//! Vector Clock for causality tracking.
//!
//! A vector clock summarizes everything a replica has seen: for each replica
//! it records the highest clock value merged from that replica. Because every
//! replica's operations are applied in issue order, an entry `r → n` means
//! "operations `1..=n` from `r` have all been applied here".
//!
//! Use cases:
//! - Admitting remote operations in per-replica issue order
//! - Discarding duplicate deliveries
//! - Telling whether one replica has seen everything another has

use peerseq_types::{Clock, OperationId, ReplicaId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A Vector Clock mapping replica ids to logical clocks.
///
/// Entries only grow. Missing entries read as 0, and two clocks that differ
/// only by explicit zero entries compare equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorClock {
    /// Map from replica ID to the highest clock seen from it.
    clocks: HashMap<ReplicaId, Clock>,
}

impl VectorClock {
    /// Creates a new empty vector clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clocks: HashMap::new(),
        }
    }

    /// Creates a vector clock with a single replica at time 0.
    #[must_use]
    pub fn for_replica(replica: ReplicaId) -> Self {
        let mut clocks = HashMap::new();
        clocks.insert(replica, 0);
        Self { clocks }
    }

    /// Returns the clock for a replica (0 if not present).
    #[must_use]
    pub fn get(&self, replica: &ReplicaId) -> Clock {
        self.clocks.get(replica).copied().unwrap_or(0)
    }

    /// Returns all replicas and their clocks.
    pub fn peers(&self) -> impl Iterator<Item = (&ReplicaId, &Clock)> {
        self.clocks.iter()
    }

    /// Returns the number of replicas in the clock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    /// Returns true if the clock has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    /// Increments the local replica's clock and returns the new value.
    ///
    /// Called exactly once per local operation.
    ///
    /// # Panics
    ///
    /// Panics if the counter would overflow.
    pub fn tick(&mut self, local: &ReplicaId) -> Clock {
        let entry = self.clocks.entry(local.clone()).or_insert(0);
        *entry = entry.checked_add(1).expect("clock overflow");
        *entry
    }

    /// Records that `replica` has reached `value`.
    ///
    /// Only raises the entry; observing the same or an older value is a
    /// no-op. Observing 0 registers the replica without advancing it.
    pub fn observe(&mut self, replica: &ReplicaId, value: Clock) {
        match self.clocks.get_mut(replica) {
            Some(entry) => {
                if value > *entry {
                    *entry = value;
                }
            }
            None => {
                self.clocks.insert(replica.clone(), value);
            }
        }
    }

    /// Merges another vector clock into this one.
    ///
    /// For each replica, takes the maximum of the two clocks.
    /// This operation is commutative, associative, and idempotent.
    pub fn merge(&mut self, other: &Self) {
        for (replica, &value) in &other.clocks {
            self.observe(replica, value);
        }
    }

    /// Creates a new clock that is the merge of this and another.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    /// Returns true if `op` is the next operation expected from its replica.
    ///
    /// This is the admission test for remote operations: a replica's
    /// operations are applied strictly in the order they were issued.
    #[must_use]
    pub fn is_ready(&self, op: &OperationId) -> bool {
        self.get(op.replica()).checked_add(1) == Some(op.clock())
    }

    /// Returns true if `op` has already been applied (or is the root).
    #[must_use]
    pub fn contains(&self, op: &OperationId) -> bool {
        op.clock() <= self.get(op.replica())
    }

    /// Returns a sorted snapshot of all entries.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<ReplicaId, Clock> {
        self.clocks
            .iter()
            .map(|(replica, &clock)| (replica.clone(), clock))
            .collect()
    }

    /// Returns true if every entry of `other` is at or below this clock,
    /// i.e. everything `other` has seen, this clock has seen too.
    #[must_use]
    pub fn dominates(&self, other: &Self) -> bool {
        other
            .clocks
            .iter()
            .all(|(replica, &clock)| self.get(replica) >= clock)
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.dominates(other) && other.dominates(self)
    }
}

impl Eq for VectorClock {}
