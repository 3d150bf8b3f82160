//! Replica identifiers.
//!
//! A replica id names one participant of a collaboration. It is opaque to the
//! core: any non-empty string works, and random UUIDs are used when the
//! membership layer does not supply one.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a replica (peer) taking part in a collaboration.
///
/// Ordered lexicographically; that order is the tie-break between operations
/// issued with the same clock value. Serialized as a plain string; the empty
/// string is rejected on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReplicaId(String);

impl ReplicaId {
    /// Creates a replica id from a caller-supplied string.
    ///
    /// # Panics
    ///
    /// Panics if `id` is empty. The empty id is reserved for the root anchor,
    /// so handing it out to a replica is an allocator bug.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        assert!(!id.is_empty(), "replica id must not be empty");
        Self(id)
    }

    /// Creates a random replica id.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parses a replica id received from outside the process.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s.is_empty() {
            return Err(Error::EmptyReplicaId);
        }
        Ok(Self(s.to_owned()))
    }

    /// The reserved id carried by the root anchor.
    pub(crate) const fn sentinel() -> Self {
        Self(String::new())
    }

    /// Returns true for the id reserved by the root anchor.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReplicaId {
    fn default() -> Self {
        Self::random()
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReplicaId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ReplicaId {
    type Error = Error;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        if id.is_empty() {
            return Err(Error::EmptyReplicaId);
        }
        Ok(Self(id))
    }
}

impl From<ReplicaId> for String {
    fn from(id: ReplicaId) -> Self {
        id.0
    }
}

impl From<&str> for ReplicaId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
