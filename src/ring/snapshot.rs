//! Read-only views of ring state.
//!
//! Snapshots copy positions, pointers, finger entries and key sets out of
//! the ring so renderers and tests can inspect topology without holding
//! any locks. The text renderers here are presentation helpers only.

use super::hasher::Position;
use super::node::Node;
use super::topology::Ring;
use super::RingKey;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FingerEntry {
    pub index: u32,
    /// `(position + 2^index) mod ring_size`
    pub start: Position,
    pub node: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub position: Position,
    pub predecessor: Option<Position>,
    pub successor: Option<Position>,
    pub fingers: Vec<FingerEntry>,
    /// Owned keys, rendered and sorted
    pub data_keys: Vec<String>,
    /// Replica keys by owner position
    pub replicas: BTreeMap<Position, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RingSnapshot {
    pub bit_width: u32,
    pub ring_size: u64,
    pub replication_factor: usize,
    pub version: u64,
    pub nodes: Vec<NodeSnapshot>,
}

impl<K: RingKey, V> Ring<K, V> {
    pub fn snapshot(&self) -> RingSnapshot {
        RingSnapshot {
            bit_width: self.bit_width(),
            ring_size: self.ring_size(),
            replication_factor: self.replication_factor(),
            version: self.version(),
            nodes: self.nodes().map(|node| self.snapshot_node(node)).collect(),
        }
    }

    fn snapshot_node(&self, node: &Node<K, V>) -> NodeSnapshot {
        let hasher = self.hasher();
        let fingers = node
            .fingers()
            .iter()
            .enumerate()
            .map(|(i, finger)| FingerEntry {
                index: i as u32,
                start: hasher.finger_start(node.position(), i as u32),
                node: *finger,
            })
            .collect();

        let store = node.store().lock();
        let mut data_keys: Vec<String> = store.owned.keys().map(|k| k.to_string()).collect();
        data_keys.sort();
        let replicas = store
            .replicas
            .iter()
            .map(|(owner, data)| {
                let mut keys: Vec<String> = data.keys().map(|k| k.to_string()).collect();
                keys.sort();
                (*owner, keys)
            })
            .collect();

        NodeSnapshot {
            position: node.position(),
            predecessor: node.predecessor(),
            successor: node.successor(),
            fingers,
            data_keys,
            replicas,
        }
    }
}

fn label(position: Option<Position>) -> String {
    match position {
        Some(p) => format!("S{}", p),
        None => "None".to_string(),
    }
}

impl NodeSnapshot {
    /// Finger table as an aligned text table
    pub fn render_finger_table(&self) -> String {
        let mut out = String::new();
        let rule = "-".repeat(40);
        let _ = writeln!(out, "Finger Table for S{}:", self.position);
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "{:<5} {:<20} {:<10}", "i", "Start (pos + 2^i)", "Successor");
        let _ = writeln!(out, "{}", rule);
        for finger in &self.fingers {
            let _ = writeln!(
                out,
                "{:<5} {:<20} {:<10}",
                finger.index,
                finger.start,
                label(finger.node)
            );
        }
        out
    }
}

impl RingSnapshot {
    pub fn node(&self, position: Position) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.position == position)
    }

    pub fn positions(&self) -> Vec<Position> {
        self.nodes.iter().map(|n| n.position).collect()
    }

    /// Node list with pointers and owned keys
    pub fn render_ring(&self) -> String {
        let mut out = String::new();
        let banner = "=".repeat(50);
        let _ = writeln!(out, "{}", banner);
        let _ = writeln!(
            out,
            "Chord Ring (2^{} = {} positions)",
            self.bit_width, self.ring_size
        );
        let _ = writeln!(out, "{}", banner);
        let _ = writeln!(out, "Physical nodes: {}", self.nodes.len());
        let labels: Vec<String> = self.nodes.iter().map(|n| format!("S{}", n.position)).collect();
        let _ = writeln!(out, "Positions: [{}]", labels.join(", "));
        let _ = writeln!(out);
        for node in &self.nodes {
            let _ = writeln!(
                out,
                "S{}: predecessor={}, successor={}, data_keys=[{}]",
                node.position,
                label(node.predecessor),
                label(node.successor),
                node.data_keys.join(", ")
            );
        }
        out
    }

    /// One line per ring position, marking physical nodes
    pub fn render_ascii(&self) -> String {
        let by_position: BTreeMap<Position, &NodeSnapshot> =
            self.nodes.iter().map(|n| (n.position, n)).collect();
        let width = (self.ring_size - 1).to_string().len().max(2);

        let mut out = String::new();
        for pos in 0..self.ring_size {
            match by_position.get(&pos) {
                Some(node) => {
                    let _ = writeln!(
                        out,
                        "[S{:>width$}] ◆ Physical Node (data: {} keys)",
                        pos,
                        node.data_keys.len(),
                        width = width
                    );
                }
                None => {
                    let _ = writeln!(out, " {:>width$}   ○ (virtual)", pos, width = width);
                }
            }
        }
        out
    }
}
