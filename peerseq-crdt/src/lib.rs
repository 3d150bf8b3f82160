//! CRDT implementations for peerseq.
//!
//! This crate provides the replicated data types behind a collaboration:
//!
//! - [`VectorClock`]: Causality tracking across replicas
//! - [`IdAllocator`]: Unique, totally ordered operation ids
//! - [`Rga<T>`]: Replicated Growable Array for sequences/text
//! - [`Operation<T>`]: The unit replicas exchange
//!
//! State merges in this crate satisfy the following properties:
//! - **Commutative**: merge(a, b) == merge(b, a)
//! - **Associative**: merge(merge(a, b), c) == merge(a, merge(b, c))
//! - **Idempotent**: merge(a, a) == a
//!
//! These properties ensure that replicas will converge to the same state
//! regardless of the order in which operations are received.

mod allocator;
mod op;
mod rga;
mod vector_clock;

pub use allocator::IdAllocator;
pub use op::{OpKind, Operation};
pub use rga::{Element, Rga, RgaError, RgaResult};
pub use vector_clock::VectorClock;
