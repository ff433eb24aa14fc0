//! Ring invariant checks.
//!
//! Each check returns a list of human-readable violations; an empty list
//! means the invariant holds. Used by tests and the simulator after every
//! membership change.

use super::hasher::{clockwise_distance, Position};
use super::topology::Ring;
use super::RingKey;

/// Rings up to this size have coverage checked position by position
pub const COVERAGE_SCAN_LIMIT: u64 = 1 << 16;

/// Predecessor/successor are the circular ring-order neighbours and agree
/// with each other. A single node points at itself.
pub fn check_pointers<K, V>(ring: &Ring<K, V>) -> Vec<String> {
    let positions = ring.positions();
    let n = positions.len();
    let mut violations = Vec::new();

    for (i, &pos) in positions.iter().enumerate() {
        let Some(node) = ring.node(pos) else { continue };
        let expected_pred = positions[(i + n - 1) % n];
        let expected_succ = positions[(i + 1) % n];

        if node.predecessor() != Some(expected_pred) {
            violations.push(format!(
                "S{}: predecessor {:?}, expected S{}",
                pos,
                node.predecessor(),
                expected_pred
            ));
        }
        if node.successor() != Some(expected_succ) {
            violations.push(format!(
                "S{}: successor {:?}, expected S{}",
                pos,
                node.successor(),
                expected_succ
            ));
        }
        if let Some(succ) = node.successor().and_then(|s| ring.node(s)) {
            if succ.predecessor() != Some(pos) {
                violations.push(format!("S{}: successor's predecessor is not self", pos));
            }
        }
        if let Some(pred) = node.predecessor().and_then(|p| ring.node(p)) {
            if pred.successor() != Some(pos) {
                violations.push(format!("S{}: predecessor's successor is not self", pos));
            }
        }
    }
    violations
}

/// `fingers[i]` is the lowest node at or after `(position + 2^i) mod ring_size`,
/// wrapping to the lowest node.
pub fn check_fingers<K, V>(ring: &Ring<K, V>) -> Vec<String> {
    let positions = ring.positions();
    let hasher = ring.hasher();
    let mut violations = Vec::new();

    for node in ring.nodes() {
        if node.fingers().len() != hasher.bits() as usize {
            violations.push(format!(
                "S{}: finger table has {} entries, expected {}",
                node.position(),
                node.fingers().len(),
                hasher.bits()
            ));
            continue;
        }
        for i in 0..hasher.bits() {
            let start = hasher.finger_start(node.position(), i);
            let expected = positions
                .iter()
                .copied()
                .find(|&p| p >= start)
                .or_else(|| positions.first().copied());
            let actual = node.finger(i as usize);
            if actual != expected {
                violations.push(format!(
                    "S{}: finger[{}] = {:?}, expected {:?}",
                    node.position(),
                    i,
                    actual,
                    expected
                ));
            }
        }
    }
    violations
}

/// Every position is owned by exactly one node
pub fn check_coverage<K, V>(ring: &Ring<K, V>) -> Vec<String> {
    if ring.is_empty() {
        return Vec::new();
    }
    let ring_size = ring.ring_size();

    if ring_size <= COVERAGE_SCAN_LIMIT {
        return (0..ring_size)
            .filter_map(|pos| {
                let owners = ring
                    .nodes()
                    .filter(|n| n.is_responsible_for(pos))
                    .count();
                (owners != 1).then(|| format!("position {} has {} owners", pos, owners))
            })
            .collect();
    }

    // Arcs (pred, self] must tile the ring exactly
    let covered: u128 = ring
        .nodes()
        .map(|node| match node.predecessor() {
            Some(pred) if pred != node.position() => {
                clockwise_distance(pred, node.position(), ring_size) as u128
            }
            _ => ring_size as u128,
        })
        .sum();
    if covered != ring_size as u128 {
        vec![format!(
            "arcs cover {} positions, ring has {}",
            covered, ring_size
        )]
    } else {
        Vec::new()
    }
}

/// Every owned key hashes into its holder's interval
pub fn check_data_placement<K: RingKey, V>(ring: &Ring<K, V>) -> Vec<String> {
    let hasher = ring.hasher();
    let mut violations = Vec::new();
    for node in ring.nodes() {
        let store = node.store().lock();
        for key in store.owned.keys() {
            let pos: Position = hasher.position(key);
            if !node.is_responsible_for(pos) {
                violations.push(format!(
                    "key {} (position {}) held by S{} outside its interval",
                    key,
                    pos,
                    node.position()
                ));
            }
        }
    }
    violations
}

/// All checks combined
pub fn check_all<K: RingKey, V>(ring: &Ring<K, V>) -> Vec<String> {
    let mut violations = check_pointers(ring);
    violations.extend(check_fingers(ring));
    violations.extend(check_coverage(ring));
    violations.extend(check_data_placement(ring));
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistent_ring_has_no_violations() {
        let mut ring: Ring<String, i32> = Ring::new(4, 3).unwrap();
        for pos in [0, 4, 7, 11, 14] {
            ring.add_node(pos).unwrap();
        }
        for i in 0..50 {
            ring.store(format!("key_{}", i), i, None).unwrap();
        }
        assert!(check_all(&ring).is_empty());
    }

    #[test]
    fn test_detects_stale_fingers() {
        let mut ring: Ring<String, i32> = Ring::new(4, 3).unwrap();
        for pos in [0, 4, 7] {
            ring.add_node(pos).unwrap();
        }
        ring.nodes_mut_for_test(4).set_finger(0, Some(0));
        let violations = check_fingers(&ring);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("S4: finger[0]"));
    }

    #[test]
    fn test_detects_broken_pointers() {
        let mut ring: Ring<String, i32> = Ring::new(4, 3).unwrap();
        for pos in [0, 4, 7] {
            ring.add_node(pos).unwrap();
        }
        ring.nodes_mut_for_test(4).set_links(4, 7);
        let violations = check_pointers(&ring);
        assert!(violations.iter().any(|v| v.starts_with("S4: predecessor")));
        // Coverage breaks too: S4 now claims the whole ring
        assert!(!check_coverage(&ring).is_empty());
    }

    #[test]
    fn test_large_ring_coverage_uses_arcs() {
        let mut ring: Ring<String, i32> = Ring::new(40, 3).unwrap();
        for pos in [5, 1 << 20, 1 << 39] {
            ring.add_node(pos).unwrap();
        }
        assert!(check_coverage(&ring).is_empty());
        assert!(check_fingers(&ring).is_empty());
    }
}
