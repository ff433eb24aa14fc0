//! Predecessor-side replication.
//!
//! Every store is copied to up to `replication_factor` predecessors of the
//! owner, filed under the owner's position. Replicas are advisory: lookups
//! never read them, and membership changes neither migrate nor prune them,
//! so a replica can outlive the owner relationship it was written for.

use super::hasher::Position;
use super::topology::Ring;
use super::RingKey;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationCoordinator {
    replication_factor: usize,
}

impl ReplicationCoordinator {
    pub fn new(replication_factor: usize) -> Self {
        ReplicationCoordinator { replication_factor }
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// Predecessors of `owner` that receive copies, nearest first.
    ///
    /// The walk stops early if it comes back around to `owner`.
    pub fn targets<K, V>(&self, ring: &Ring<K, V>, owner: Position) -> Vec<Position> {
        let mut targets = Vec::with_capacity(self.replication_factor);
        let mut current = ring.node(owner).and_then(|n| n.predecessor());

        while targets.len() < self.replication_factor {
            match current {
                Some(pos) if pos != owner => {
                    targets.push(pos);
                    current = ring.node(pos).and_then(|n| n.predecessor());
                }
                _ => break,
            }
        }
        targets
    }

    /// Copy `key`/`value` into each target's replica map for `owner`.
    ///
    /// Returns the positions written, nearest first.
    pub fn replicate<K: RingKey, V: Clone>(
        &self,
        ring: &Ring<K, V>,
        owner: Position,
        key: &K,
        value: &V,
    ) -> Vec<Position> {
        let targets = self.targets(ring, owner);
        for &pos in &targets {
            if let Some(node) = ring.node(pos) {
                node.put_replica(owner, key.clone(), value.clone());
            }
        }

        debug!(owner, key = %key, copies = targets.len(), "Replicated write");
        ring.metrics.record_replication(targets.len());
        targets
    }
}
