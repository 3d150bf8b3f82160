//! Logical clocks and operation identifiers.

use crate::{Error, ReplicaId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A replica's logical counter. Starts at 0 and is ticked once per local
/// operation, so the first operation a replica issues carries clock 1.
pub type Clock = u64;

/// Identifier of a single operation: the replica that issued it and the
/// clock value it was issued at.
///
/// At most one operation is ever issued per `(replica, clock)` pair, so the
/// id is globally unique. Ids are totally ordered by clock first and replica
/// second; the same order breaks ties between concurrent insertions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawOperationId")]
pub struct OperationId {
    replica: ReplicaId,
    clock: Clock,
}

/// Unchecked wire form. The root travels as `{"replica": "", "clock": 0}`.
#[derive(Deserialize)]
struct RawOperationId {
    replica: String,
    clock: Clock,
}

impl TryFrom<RawOperationId> for OperationId {
    type Error = Error;

    fn try_from(raw: RawOperationId) -> Result<Self, Self::Error> {
        match (raw.replica.is_empty(), raw.clock) {
            (true, 0) => Ok(Self::root()),
            (false, clock) if clock > 0 => Ok(Self {
                replica: ReplicaId::try_from(raw.replica)?,
                clock,
            }),
            _ => Err(Error::InvalidOperationId(format!(
                "replica {:?} at clock {}",
                raw.replica, raw.clock
            ))),
        }
    }
}

impl OperationId {
    /// Creates an operation id.
    ///
    /// # Panics
    ///
    /// Panics on clock 0 or on the reserved root replica; both indicate a
    /// broken allocator.
    #[must_use]
    pub fn new(replica: ReplicaId, clock: Clock) -> Self {
        assert!(clock > 0, "operation clocks start at 1");
        assert!(!replica.is_sentinel(), "replica id must not be empty");
        Self { replica, clock }
    }

    /// The root anchor ("before the first element").
    #[must_use]
    pub const fn root() -> Self {
        Self {
            replica: ReplicaId::sentinel(),
            clock: 0,
        }
    }

    /// Returns true if this is the root anchor.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.clock == 0 && self.replica.is_sentinel()
    }

    /// The replica that issued the operation.
    #[must_use]
    pub fn replica(&self) -> &ReplicaId {
        &self.replica
    }

    /// The issuing replica's clock at issue time.
    #[must_use]
    pub const fn clock(&self) -> Clock {
        self.clock
    }

    /// The id of the previous operation from the same replica, if any.
    #[must_use]
    pub fn predecessor(&self) -> Option<Self> {
        (self.clock > 1).then(|| Self {
            replica: self.replica.clone(),
            clock: self.clock - 1,
        })
    }
}

impl PartialOrd for OperationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OperationId {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.clock.cmp(&other.clock) {
            Ordering::Equal => self.replica.cmp(&other.replica),
            ord => ord,
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("root");
        }
        write!(f, "{}@{}", self.clock, self.replica)
    }
}

impl FromStr for OperationId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "root" {
            return Ok(Self::root());
        }

        let (clock, replica) = s
            .split_once('@')
            .ok_or_else(|| Error::InvalidOperationId(s.to_owned()))?;
        let clock: Clock = clock
            .parse()
            .map_err(|_| Error::InvalidOperationId(s.to_owned()))?;
        if clock == 0 {
            return Err(Error::InvalidOperationId(s.to_owned()));
        }
        let replica = ReplicaId::parse(replica)?;

        Ok(Self { replica, clock })
    }
}
