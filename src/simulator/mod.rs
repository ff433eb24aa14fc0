//! Deterministic simulation of ring membership and routing.
//!
//! Every run is driven by a seeded `ChaCha8Rng`, so a failing seed can be
//! replayed exactly.

pub mod dst;

pub use dst::{
    log2_ceil, BatchResult, BatchRunner, DSTConfig, DSTSimulation, OperationType,
    SimulationResult,
};
