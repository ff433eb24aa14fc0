//! Thread-safe ring handle.
//!
//! Membership changes hold the ring-wide write lock for the whole rebuild
//! and migration. Stores and lookups share the read lock, so a request
//! either completes before a membership change starts or waits for it to
//! finish. Per-node data locks serialize concurrent writes to one node.

use super::hasher::Position;
use super::routing::{Lookup, Route};
use super::snapshot::RingSnapshot;
use super::topology::Ring;
use super::RingKey;
use crate::error::RingError;
use parking_lot::RwLock;
use std::sync::Arc;

pub struct SharedRing<K, V> {
    inner: Arc<RwLock<Ring<K, V>>>,
}

impl<K, V> Clone for SharedRing<K, V> {
    fn clone(&self) -> Self {
        SharedRing {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: RingKey, V: Clone> SharedRing<K, V> {
    pub fn new(ring: Ring<K, V>) -> Self {
        SharedRing {
            inner: Arc::new(RwLock::new(ring)),
        }
    }

    /// Add a node; returns its position once the ring is consistent again
    pub fn add_node(&self, position: Position) -> Result<Position, RingError> {
        let mut ring = self.inner.write();
        ring.add_node(position).map(|node| node.position())
    }

    pub fn remove_node(&self, position: Position) -> bool {
        self.inner.write().remove_node(position)
    }

    pub fn store(&self, key: K, value: V, start: Option<Position>) -> Result<Route, RingError> {
        self.inner.read().store(key, value, start)
    }

    pub fn lookup(&self, key: &K, start: Option<Position>) -> Result<Lookup<V>, RingError> {
        self.inner.read().lookup(key, start)
    }

    pub fn snapshot(&self) -> RingSnapshot {
        self.inner.read().snapshot()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Run `f` against the ring under the read lock
    pub fn with_ring<R>(&self, f: impl FnOnce(&Ring<K, V>) -> R) -> R {
        f(&self.inner.read())
    }
}
