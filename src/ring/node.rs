//! Ring participant: links, finger table and local data.
//!
//! Pointers to other nodes are positions resolved through the owning
//! [`Ring`](super::Ring), never references. Each node's data sits behind
//! its own mutex so reads and writes only need `&Node`.

use super::hasher::{in_open_closed, in_open_open, Position};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::hash::Hash;

/// Data held by one node
pub(crate) struct NodeStore<K, V> {
    /// Keys this node is the canonical owner of
    pub(crate) owned: AHashMap<K, V>,
    /// Copies held on behalf of successors, keyed by owner position
    pub(crate) replicas: AHashMap<Position, AHashMap<K, V>>,
}

impl<K, V> Default for NodeStore<K, V> {
    fn default() -> Self {
        NodeStore {
            owned: AHashMap::new(),
            replicas: AHashMap::new(),
        }
    }
}

pub struct Node<K, V> {
    position: Position,
    predecessor: Option<Position>,
    successor: Option<Position>,
    /// `fingers[i]` = first node at or after `(position + 2^i) mod ring_size`
    fingers: Vec<Option<Position>>,
    store: Mutex<NodeStore<K, V>>,
}

impl<K, V> std::fmt::Debug for Node<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("position", &self.position)
            .field("predecessor", &self.predecessor)
            .field("successor", &self.successor)
            .field("fingers", &self.fingers)
            .finish()
    }
}

impl<K, V> Node<K, V> {
    pub(crate) fn new(position: Position, bits: u32) -> Self {
        Node {
            position,
            predecessor: None,
            successor: None,
            fingers: vec![None; bits as usize],
            store: Mutex::new(NodeStore::default()),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn predecessor(&self) -> Option<Position> {
        self.predecessor
    }

    pub fn successor(&self) -> Option<Position> {
        self.successor
    }

    pub fn fingers(&self) -> &[Option<Position>] {
        &self.fingers
    }

    pub fn finger(&self, i: usize) -> Option<Position> {
        self.fingers.get(i).copied().flatten()
    }

    /// True iff `pos` is in `(predecessor, self]`.
    ///
    /// A node without a predecessor is responsible for the whole ring.
    pub fn is_responsible_for(&self, pos: Position) -> bool {
        // A single node is its own predecessor; the degenerate arc is the whole ring
        match self.predecessor {
            None => true,
            Some(pred) => in_open_closed(pos, pred, self.position),
        }
    }

    /// Highest finger strictly between this node and `pos`
    pub fn closest_preceding_finger(&self, pos: Position) -> Option<Position> {
        self.fingers
            .iter()
            .rev()
            .flatten()
            .copied()
            .find(|&finger| in_open_open(finger, self.position, pos))
    }

    pub(crate) fn set_links(&mut self, predecessor: Position, successor: Position) {
        self.predecessor = Some(predecessor);
        self.successor = Some(successor);
    }

    pub(crate) fn set_finger(&mut self, i: usize, target: Option<Position>) {
        self.fingers[i] = target;
    }

    pub(crate) fn store(&self) -> &Mutex<NodeStore<K, V>> {
        &self.store
    }

    pub fn owned_len(&self) -> usize {
        self.store.lock().owned.len()
    }

    /// Owner positions this node holds replicas for
    pub fn replica_owners(&self) -> Vec<Position> {
        let mut owners: Vec<Position> = self.store.lock().replicas.keys().copied().collect();
        owners.sort_unstable();
        owners
    }
}

impl<K, V> Node<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Value owned by this node for `key`
    pub fn get(&self, key: &K) -> Option<V> {
        self.store.lock().owned.get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.store.lock().owned.contains_key(key)
    }

    pub fn owned_keys(&self) -> Vec<K> {
        self.store.lock().owned.keys().cloned().collect()
    }

    /// Replica of `key` held on behalf of the node at `owner`
    pub fn replica(&self, owner: Position, key: &K) -> Option<V> {
        self.store
            .lock()
            .replicas
            .get(&owner)
            .and_then(|data| data.get(key))
            .cloned()
    }

    pub fn replica_keys(&self, owner: Position) -> Vec<K> {
        self.store
            .lock()
            .replicas
            .get(&owner)
            .map(|data| data.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// True if any replica map on this node holds `key`
    pub fn holds_replica(&self, key: &K) -> bool {
        self.store
            .lock()
            .replicas
            .values()
            .any(|data| data.contains_key(key))
    }

    pub(crate) fn insert(&self, key: K, value: V) {
        self.store.lock().owned.insert(key, value);
    }

    pub(crate) fn put_replica(&self, owner: Position, key: K, value: V) {
        self.store
            .lock()
            .replicas
            .entry(owner)
            .or_default()
            .insert(key, value);
    }

    /// Remove and return every owned entry whose key matches `pred`
    pub(crate) fn take_owned_where<F>(&self, mut pred: F) -> Vec<(K, V)>
    where
        F: FnMut(&K) -> bool,
    {
        let mut store = self.store.lock();
        let keys: Vec<K> = store.owned.keys().filter(|&k| pred(k)).cloned().collect();
        keys.into_iter()
            .filter_map(|k| store.owned.remove_entry(&k))
            .collect()
    }

    pub(crate) fn drain_owned(&self) -> AHashMap<K, V> {
        std::mem::take(&mut self.store.lock().owned)
    }

    pub(crate) fn absorb(&self, entries: impl IntoIterator<Item = (K, V)>) {
        self.store.lock().owned.extend(entries);
    }
}
