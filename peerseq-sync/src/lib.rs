//! Causal merge engine and collaboration sessions for peerseq.
//!
//! This crate turns the sequence CRDT into something replicas can share
//! over an unreliable transport:
//!
//! - [`MergeEngine`]: Admits remote operations in causal order, buffering
//!   early arrivals and absorbing duplicates
//! - [`Session`]: One replica of a named shared sequence, with membership,
//!   progress reports and change notifications
//! - [`SyncMessage`]: What replicas send each other
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  local edit   ┌────────────┐  SyncMessage  ┌───────────┐
//! │ Application│ ────────────> │  Session   │ ────────────> │ Transport │
//! │            │ <──────────── │  (engine)  │ <──────────── │ (yours)   │
//! └────────────┘ StateChanged  └────────────┘  SyncMessage  └───────────┘
//! ```
//!
//! Transport is out of scope: any channel that eventually delivers every
//! message at least once, in any order, is enough for replicas to converge.

mod engine;
mod error;
mod observer;
mod pending;
mod protocol;
mod session;
mod state;

pub use engine::{Delivery, MergeEngine, DEFAULT_PENDING_WARN_THRESHOLD};
pub use error::{SyncError, SyncResult};
pub use observer::{ChangeCause, Observers, StateChanged, Subscription};
pub use pending::{Held, PendingBuffer};
pub use protocol::{StateSnapshot, SyncMessage, PROTOCOL_VERSION};
pub use session::{Session, SessionConfig};
pub use state::{MembershipState, PeerStatus};
