//! Finger-table routing, store and lookup.
//!
//! Routing is an explicit hop loop rather than recursion. Each hop reads
//! only topology, never node data, so no node lock is held while moving to
//! the next node.

use super::hasher::{in_open_closed, Position};
use super::topology::Ring;
use super::RingKey;
use crate::error::RingError;
use crate::observability::route_span;
use serde::Serialize;
use tracing::{debug, warn};

/// Outcome of routing a position to its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    /// Position that was routed
    pub target: Position,
    /// Node responsible for `target`
    pub owner: Position,
    /// Nodes visited in order, starting with the start node
    pub path: Vec<Position>,
}

impl Route {
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn start(&self) -> Position {
        self.path[0]
    }
}

/// A lookup result: the value (if the owner holds one) and the route taken
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<V> {
    pub value: Option<V>,
    pub route: Route,
}

impl<K, V> Ring<K, V> {
    /// Route `target` from the node at `start` to its owner.
    ///
    /// At each node: stop if it owns `target`; hand off to the successor if
    /// `target` falls in `(node, successor]`; otherwise jump to the highest
    /// finger strictly between node and `target`, or fall through to the
    /// successor when no finger qualifies.
    pub fn find_successor(&self, start: Position, target: Position) -> Result<Route, RingError> {
        let mut current = self
            .node(start)
            .ok_or(RingError::NodeNotFound { position: start })?;
        let mut path = vec![start];
        let budget = self.hop_budget();

        loop {
            let here = current.position();
            if current.is_responsible_for(target) {
                return Ok(Route {
                    target,
                    owner: here,
                    path,
                });
            }

            let successor = current.successor();
            if let Some(succ) = successor {
                if in_open_closed(target, here, succ) {
                    push_hop(&mut path, succ, target, budget)?;
                    return Ok(Route {
                        target,
                        owner: succ,
                        path,
                    });
                }
            }

            let next = current
                .closest_preceding_finger(target)
                .filter(|&finger| finger != here);
            let Some(next) = next else {
                // No better candidate than ourselves
                let owner = match successor {
                    Some(succ) => {
                        push_hop(&mut path, succ, target, budget)?;
                        succ
                    }
                    None => here,
                };
                return Ok(Route {
                    target,
                    owner,
                    path,
                });
            };

            push_hop(&mut path, next, target, budget)?;
            current = self
                .node(next)
                .ok_or(RingError::NodeNotFound { position: next })?;
        }
    }

    /// Start node for a request: the given one, else the lowest-positioned node
    fn resolve_start(&self, start: Option<Position>) -> Result<Position, RingError> {
        let first = self
            .nodes()
            .next()
            .map(|node| node.position())
            .ok_or(RingError::EmptyRing)?;
        match start {
            Some(pos) if self.contains_node(pos) => Ok(pos),
            Some(pos) => Err(RingError::NodeNotFound { position: pos }),
            None => Ok(first),
        }
    }
}

/// Append `next` to the path unless the hop budget is already spent
fn push_hop(
    path: &mut Vec<Position>,
    next: Position,
    target: Position,
    budget: usize,
) -> Result<(), RingError> {
    let hops = path.len() - 1;
    if hops >= budget {
        warn!(target, start = path[0], hops, "Routing exceeded hop budget");
        return Err(RingError::HopLimitExceeded { target, hops });
    }
    path.push(next);
    Ok(())
}

impl<K: RingKey, V: Clone> Ring<K, V> {
    /// Write `key` on its owner and replicate it to the owner's predecessors.
    ///
    /// Fails with `EmptyRing` when there are no nodes.
    pub fn store(&self, key: K, value: V, start: Option<Position>) -> Result<Route, RingError> {
        let start = self.resolve_start(start)?;
        let target = self.hasher().position(&key);
        let _span = route_span("store", start, target).entered();

        let route = match self.find_successor(start, target) {
            Ok(route) => route,
            Err(e) => {
                self.metrics.record_route("store", 0, false);
                return Err(e);
            }
        };
        let owner = self
            .node(route.owner)
            .ok_or(RingError::NodeNotFound { position: route.owner })?;

        owner.insert(key.clone(), value.clone());
        self.replication().replicate(self, route.owner, &key, &value);

        debug!(key = %key, target, owner = route.owner, hops = route.hops(), "Stored key");
        self.metrics.record_route("store", route.hops(), true);
        Ok(route)
    }

    /// Read `key` from its owner. A missing key is `value: None`, not an error.
    pub fn lookup(&self, key: &K, start: Option<Position>) -> Result<Lookup<V>, RingError> {
        let start = self.resolve_start(start)?;
        let target = self.hasher().position(key);
        let _span = route_span("lookup", start, target).entered();

        let route = match self.find_successor(start, target) {
            Ok(route) => route,
            Err(e) => {
                self.metrics.record_route("lookup", 0, false);
                return Err(e);
            }
        };
        let value = self.node(route.owner).and_then(|owner| owner.get(key));

        debug!(
            key = %key,
            target,
            owner = route.owner,
            hops = route.hops(),
            found = value.is_some(),
            "Looked up key"
        );
        self.metrics.record_route("lookup", route.hops(), true);
        Ok(Lookup { value, route })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::hash_key;

    fn handout_ring() -> Ring<String, String> {
        let mut ring = Ring::new(4, 3).unwrap();
        for pos in [0, 4, 7, 11, 14] {
            ring.add_node(pos).unwrap();
        }
        ring
    }

    #[test]
    fn test_handout_search_from_s11() {
        let ring = handout_ring();
        let route = ring.find_successor(11, 6).unwrap();
        assert_eq!(route.owner, 7);
        // 11 -> finger 4 -> successor 7
        assert_eq!(route.path, vec![11, 4, 7]);
        assert_eq!(route.hops(), 2);
        assert_eq!(route.start(), 11);
    }

    #[test]
    fn test_successor_shortcut() {
        let ring = handout_ring();
        let route = ring.find_successor(11, 12).unwrap();
        assert_eq!(route.owner, 14);
        assert_eq!(route.path, vec![11, 14]);
    }

    #[test]
    fn test_start_node_owns_target() {
        let ring = handout_ring();
        let route = ring.find_successor(7, 5).unwrap();
        assert_eq!(route.owner, 7);
        assert_eq!(route.path, vec![7]);
        assert_eq!(route.hops(), 0);
    }

    #[test]
    fn test_every_start_reaches_every_owner() {
        let ring = handout_ring();
        for start in ring.positions() {
            for target in 0..16 {
                let route = ring.find_successor(start, target).unwrap();
                assert_eq!(Some(route.owner), ring.find_physical_node(target));
                assert_eq!(route.path[0], start);
                assert_eq!(*route.path.last().unwrap(), route.owner);
            }
        }
    }

    #[test]
    fn test_two_node_ring() {
        let mut ring: Ring<String, String> = Ring::new(4, 3).unwrap();
        ring.add_node(3).unwrap();
        ring.add_node(10).unwrap();
        assert_eq!(ring.find_successor(3, 5).unwrap().path, vec![3, 10]);
        assert_eq!(ring.find_successor(3, 12).unwrap().path, vec![3]);
        assert_eq!(ring.find_successor(10, 0).unwrap().owner, 3);
    }

    #[test]
    fn test_unknown_start_node() {
        let ring = handout_ring();
        assert_eq!(
            ring.find_successor(5, 1).unwrap_err(),
            RingError::NodeNotFound { position: 5 }
        );
        assert_eq!(
            ring.lookup(&"k".to_string(), Some(5)).unwrap_err(),
            RingError::NodeNotFound { position: 5 }
        );
    }

    #[test]
    fn test_hop_budget_enforced() {
        let mut ring: Ring<String, String> = Ring::new(4, 3).unwrap().with_max_hops(1);
        for pos in [0, 4, 7, 11, 14] {
            ring.add_node(pos).unwrap();
        }
        // 11 -> 4 -> 7 needs an intermediate hop past the budget
        assert_eq!(
            ring.find_successor(11, 6).unwrap_err(),
            RingError::HopLimitExceeded { target: 6, hops: 1 }
        );
        assert!(ring.find_successor(11, 12).is_ok());
    }

    #[test]
    fn test_empty_ring_store_and_lookup() {
        let ring: Ring<String, String> = Ring::new(4, 3).unwrap();
        assert_eq!(
            ring.store("k".into(), "v".into(), None).unwrap_err(),
            RingError::EmptyRing
        );
        assert_eq!(
            ring.lookup(&"k".to_string(), None).unwrap_err(),
            RingError::EmptyRing
        );
    }

    #[test]
    fn test_store_then_lookup_from_any_node() {
        let ring = handout_ring();
        let route = ring
            .store("key_54".to_string(), "value_for_54".to_string(), None)
            .unwrap();
        assert_eq!(route.start(), 0);
        assert_eq!(route.target, hash_key("key_54", 16));

        for start in ring.positions() {
            let found = ring.lookup(&"key_54".to_string(), Some(start)).unwrap();
            assert_eq!(found.value.as_deref(), Some("value_for_54"));
            assert_eq!(found.route.owner, route.owner);
            assert_eq!(found.route.start(), start);
        }
    }

    #[test]
    fn test_missing_key_is_not_an_error() {
        let ring = handout_ring();
        let found = ring.lookup(&"nope".to_string(), Some(11)).unwrap();
        assert_eq!(found.value, None);
        assert_eq!(found.route.start(), 11);
    }

    #[test]
    fn test_integer_keys() {
        let mut ring: Ring<u32, &str> = Ring::new(4, 3).unwrap();
        for pos in [0, 4, 7, 11, 14] {
            ring.add_node(pos).unwrap();
        }
        let route = ring.store(54, "v", None).unwrap();
        assert_eq!(route.target, hash_key("54", 16));
        assert_eq!(ring.lookup(&54, Some(14)).unwrap().value, Some("v"));
    }
}
