//! Chord Ring
//!
//! Nodes and keys share a circular identifier space `[0, 2^bits)`. A key
//! belongs to the first node clockwise from its hash; lookups follow
//! finger tables and reach the owner in O(log n) hops.
//!
//! The ring is an arena of [`Node`]s keyed by position. Membership changes
//! rebuild every pointer and finger table eagerly, then migrate the
//! affected key range.

pub mod hasher;
pub mod node;
pub mod replication;
pub mod routing;
pub mod shared;
pub mod snapshot;
pub mod topology;
pub mod verify;

pub use hasher::{hash_key, in_open_closed, in_open_open, Position, RingHasher, MAX_BIT_WIDTH};
pub use node::Node;
pub use replication::ReplicationCoordinator;
pub use routing::{Lookup, Route};
pub use shared::SharedRing;
pub use snapshot::{FingerEntry, NodeSnapshot, RingSnapshot};
pub use topology::Ring;

use std::fmt::Display;
use std::hash::Hash;

/// Anything usable as a ring key.
///
/// Keys are hashed through their `Display` form.
pub trait RingKey: Display + Eq + Hash + Clone {}

impl<T: Display + Eq + Hash + Clone> RingKey for T {}
