//! In-process Chord distributed hash table.
//!
//! Nodes and keys are placed on a `2^bits` identifier ring by SHA-1. Each
//! node keeps predecessor/successor links and a finger table, so a key's
//! owner is reached in O(log n) hops. Joins and leaves rebuild routing
//! state and move the affected keys; writes are copied to the owner's
//! predecessors.

pub mod config;
pub mod error;
pub mod observability;
pub mod ring;
pub mod simulator;

pub use config::{RingConfig, Settings, TelemetryConfig};
pub use error::{ConfigError, RingError};
pub use ring::{Lookup, Position, Ring, RingSnapshot, Route, SharedRing};
