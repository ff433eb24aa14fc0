//! Topology manager: node arena, membership and data migration.

use super::hasher::{Position, RingHasher, MAX_BIT_WIDTH};
use super::node::Node;
use super::replication::ReplicationCoordinator;
use super::RingKey;
use crate::config::RingConfig;
use crate::error::RingError;
use crate::observability::{membership_span, noop_metrics, SharedMetrics};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A Chord ring of nodes holding `K -> V` data.
///
/// Membership changes take `&mut self`; stores and lookups take `&self`
/// and lock only the node data they touch.
pub struct Ring<K, V> {
    hasher: RingHasher,
    replication: ReplicationCoordinator,
    max_hops: Option<usize>,
    /// Sorted by position
    nodes: BTreeMap<Position, Node<K, V>>,
    /// Incremented on every membership change
    version: u64,
    pub(crate) metrics: SharedMetrics,
}

impl<K, V> std::fmt::Debug for Ring<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ring")
            .field("bits", &self.hasher.bits())
            .field("replication_factor", &self.replication.replication_factor())
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("version", &self.version)
            .finish()
    }
}

impl<K, V> Ring<K, V> {
    /// Empty ring with `2^bit_width` positions
    pub fn new(bit_width: u32, replication_factor: usize) -> Result<Self, RingError> {
        if bit_width == 0 || bit_width > MAX_BIT_WIDTH {
            return Err(RingError::InvalidBitWidth { bits: bit_width });
        }
        Ok(Ring {
            hasher: RingHasher::new(bit_width),
            replication: ReplicationCoordinator::new(replication_factor),
            max_hops: None,
            nodes: BTreeMap::new(),
            version: 0,
            metrics: noop_metrics(),
        })
    }

    pub fn from_config(config: &RingConfig) -> Result<Self, RingError> {
        let mut ring = Self::new(config.bit_width, config.replication_factor)?;
        ring.max_hops = config.max_hops;
        Ok(ring)
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = Some(max_hops);
        self
    }

    pub fn hasher(&self) -> &RingHasher {
        &self.hasher
    }

    pub fn bit_width(&self) -> u32 {
        self.hasher.bits()
    }

    pub fn ring_size(&self) -> u64 {
        self.hasher.ring_size()
    }

    pub fn replication_factor(&self) -> usize {
        self.replication.replication_factor()
    }

    pub(crate) fn replication(&self) -> &ReplicationCoordinator {
        &self.replication
    }

    /// Routing budget: configured cap, else node count + 1
    pub fn hop_budget(&self) -> usize {
        self.max_hops.unwrap_or(self.nodes.len() + 1)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_node(&self, position: Position) -> bool {
        self.nodes.contains_key(&position)
    }

    pub fn node(&self, position: Position) -> Option<&Node<K, V>> {
        self.nodes.get(&position)
    }

    /// Nodes in ascending position order
    pub fn nodes(&self) -> impl Iterator<Item = &Node<K, V>> {
        self.nodes.values()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.nodes.keys().copied().collect()
    }

    /// First node at or after `pos`, wrapping to the lowest node.
    ///
    /// `None` only when the ring is empty.
    pub fn find_physical_node(&self, pos: Position) -> Option<Position> {
        self.nodes
            .range(pos..)
            .next()
            .or_else(|| self.nodes.iter().next())
            .map(|(position, _)| *position)
    }

    /// Recompute every node's predecessor, successor and fingers from
    /// ring order. O(n * bits).
    pub(crate) fn rebuild_topology(&mut self) {
        let positions = self.positions();
        let n = positions.len();
        if n == 0 {
            return;
        }

        let hasher = self.hasher;
        for (i, node) in self.nodes.values_mut().enumerate() {
            node.set_links(positions[(i + n - 1) % n], positions[(i + 1) % n]);
            for bit in 0..hasher.bits() {
                let start = hasher.finger_start(node.position(), bit);
                node.set_finger(bit as usize, successor_in(&positions, start));
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn nodes_mut_for_test(&mut self, position: Position) -> &mut Node<K, V> {
        self.nodes.get_mut(&position).expect("node exists")
    }

    fn validate_new_position(&self, position: Position) -> Result<(), RingError> {
        if position >= self.ring_size() {
            return Err(RingError::OutOfRange {
                position,
                ring_size: self.ring_size(),
            });
        }
        if self.nodes.contains_key(&position) {
            return Err(RingError::DuplicatePosition { position });
        }
        Ok(())
    }
}

impl<K: RingKey, V: Clone> Ring<K, V> {
    /// Add a node at `position`, rebuild the topology and pull the keys it
    /// now owns from its successor.
    pub fn add_node(&mut self, position: Position) -> Result<&Node<K, V>, RingError> {
        self.validate_new_position(position)?;
        let _span = membership_span("join", position).entered();

        self.nodes
            .insert(position, Node::new(position, self.hasher.bits()));
        self.rebuild_topology();
        self.version += 1;

        let moved = self.migrate_on_join(position);
        info!(
            position,
            nodes = self.nodes.len(),
            moved_keys = moved,
            "Node joined ring"
        );
        self.metrics.record_membership("join", self.nodes.len());
        self.metrics.record_migration("join", moved);

        self.nodes
            .get(&position)
            .ok_or(RingError::NodeNotFound { position })
    }

    /// Remove the node at `position`, handing its data to its successor.
    ///
    /// Returns `false` if no node sits there.
    pub fn remove_node(&mut self, position: Position) -> bool {
        let Some(node) = self.nodes.get(&position) else {
            debug!(position, "Remove ignored, no node at position");
            return false;
        };
        let _span = membership_span("leave", position).entered();

        // Successor's interval extends over the departing range, no rehash
        let mut moved = 0;
        if let Some(successor) = node.successor().filter(|s| *s != position) {
            let entries = node.drain_owned();
            moved = entries.len();
            if let Some(target) = self.nodes.get(&successor) {
                target.absorb(entries);
            }
        }

        self.nodes.remove(&position);
        if !self.nodes.is_empty() {
            self.rebuild_topology();
        }
        self.version += 1;

        info!(
            position,
            nodes = self.nodes.len(),
            moved_keys = moved,
            "Node left ring"
        );
        self.metrics.record_membership("leave", self.nodes.len());
        self.metrics.record_migration("leave", moved);
        true
    }

    /// Move keys from the new node's successor that now hash into the new
    /// node's interval. Returns the number of keys moved.
    fn migrate_on_join(&self, position: Position) -> usize {
        let Some(new_node) = self.nodes.get(&position) else {
            return 0;
        };
        let Some(successor) = new_node
            .successor()
            .filter(|s| *s != position)
            .and_then(|s| self.nodes.get(&s))
        else {
            return 0;
        };

        let hasher = self.hasher;
        let moved = successor.take_owned_where(|key| new_node.is_responsible_for(hasher.position(key)));
        let count = moved.len();
        if count > 0 {
            debug!(
                from = successor.position(),
                to = position,
                keys = count,
                "Migrated keys on join"
            );
        }
        new_node.absorb(moved);
        count
    }
}

/// First position `>= target` in sorted `positions`, wrapping to the first
fn successor_in(positions: &[Position], target: Position) -> Option<Position> {
    let idx = positions.partition_point(|&p| p < target);
    positions.get(idx).or_else(|| positions.first()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handout_ring() -> Ring<String, String> {
        let mut ring = Ring::new(4, 3).unwrap();
        for pos in [0, 4, 7, 11, 14] {
            ring.add_node(pos).unwrap();
        }
        ring
    }

    fn fingers(ring: &Ring<String, String>, pos: Position) -> Vec<Position> {
        ring.node(pos)
            .unwrap()
            .fingers()
            .iter()
            .map(|f| f.unwrap())
            .collect()
    }

    /// A key whose hash lands on `target` in a ring of `ring_size`
    fn key_at(target: Position, ring_size: u64) -> String {
        (0..100_000)
            .map(|i| format!("key_{}", i))
            .find(|k| crate::ring::hash_key(k, ring_size) == target)
            .unwrap()
    }

    #[test]
    fn test_invalid_bit_width() {
        assert_eq!(
            Ring::<String, String>::new(0, 3).unwrap_err(),
            RingError::InvalidBitWidth { bits: 0 }
        );
        assert!(Ring::<String, String>::new(64, 3).is_err());
        assert!(Ring::<String, String>::new(63, 3).is_ok());
    }

    #[test]
    fn test_pointers_follow_ring_order() {
        let ring = handout_ring();
        let s0 = ring.node(0).unwrap();
        assert_eq!(s0.predecessor(), Some(14));
        assert_eq!(s0.successor(), Some(4));
        let s14 = ring.node(14).unwrap();
        assert_eq!(s14.predecessor(), Some(11));
        assert_eq!(s14.successor(), Some(0));
    }

    #[test]
    fn test_handout_finger_tables() {
        let ring = handout_ring();
        assert_eq!(fingers(&ring, 11), vec![14, 14, 0, 4]);
        assert_eq!(fingers(&ring, 0), vec![4, 4, 4, 11]);
        assert_eq!(fingers(&ring, 7), vec![11, 11, 11, 0]);
    }

    #[test]
    fn test_find_physical_node_wraps() {
        let ring = handout_ring();
        assert_eq!(ring.find_physical_node(5), Some(7));
        assert_eq!(ring.find_physical_node(7), Some(7));
        assert_eq!(ring.find_physical_node(15), Some(0));

        let empty: Ring<String, String> = Ring::new(4, 3).unwrap();
        assert_eq!(empty.find_physical_node(3), None);
    }

    #[test]
    fn test_add_node_validation_leaves_ring_untouched() {
        let mut ring = handout_ring();
        let version = ring.version();

        assert_eq!(
            ring.add_node(16).unwrap_err(),
            RingError::OutOfRange {
                position: 16,
                ring_size: 16
            }
        );
        assert_eq!(
            ring.add_node(7).unwrap_err(),
            RingError::DuplicatePosition { position: 7 }
        );
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.version(), version);
    }

    #[test]
    fn test_single_node_points_at_itself() {
        let mut ring: Ring<String, String> = Ring::new(4, 3).unwrap();
        let node = ring.add_node(9).unwrap();
        assert_eq!(node.predecessor(), Some(9));
        assert_eq!(node.successor(), Some(9));
        assert!(node.fingers().iter().all(|f| *f == Some(9)));
    }

    #[test]
    fn test_join_migrates_keys_from_successor() {
        let mut ring = handout_ring();
        let on_two = key_at(2, 16);
        let on_three = key_at(3, 16);
        ring.store(on_two.clone(), "a".to_string(), None).unwrap();
        ring.store(on_three.clone(), "b".to_string(), None).unwrap();
        assert!(ring.node(4).unwrap().contains_key(&on_two));

        let s2 = ring.add_node(2).unwrap();
        assert_eq!(s2.predecessor(), Some(0));
        assert_eq!(s2.successor(), Some(4));
        assert_eq!(s2.get(&on_two), Some("a".to_string()));
        assert!(!s2.contains_key(&on_three));

        let s4 = ring.node(4).unwrap();
        assert!(!s4.contains_key(&on_two));
        assert!(s4.contains_key(&on_three));
    }

    #[test]
    fn test_leave_hands_data_to_successor() {
        let mut ring = handout_ring();
        let on_six = key_at(6, 16);
        ring.store(on_six.clone(), "v".to_string(), Some(7)).unwrap();
        assert!(ring.node(7).unwrap().contains_key(&on_six));

        assert!(ring.remove_node(7));
        assert!(!ring.remove_node(7));
        assert_eq!(ring.positions(), vec![0, 4, 11, 14]);
        assert_eq!(ring.node(11).unwrap().get(&on_six), Some("v".to_string()));
        assert_eq!(ring.node(11).unwrap().predecessor(), Some(4));
        assert_eq!(fingers(&ring, 4), vec![11, 11, 11, 14]);
    }

    #[test]
    fn test_remove_last_node_empties_ring() {
        let mut ring: Ring<String, String> = Ring::new(4, 3).unwrap();
        ring.add_node(3).unwrap();
        assert!(ring.remove_node(3));
        assert!(ring.is_empty());
        assert_eq!(ring.version(), 2);
    }

    #[test]
    fn test_successor_in() {
        let positions = [0, 4, 7, 11, 14];
        assert_eq!(successor_in(&positions, 12), Some(14));
        assert_eq!(successor_in(&positions, 15), Some(0));
        assert_eq!(successor_in(&positions, 4), Some(4));
        assert_eq!(successor_in(&[], 4), None);
    }
}
