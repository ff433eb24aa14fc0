//! Deterministic Simulation Testing (DST) Harness
//!
//! Drives a ring through a seeded random mix of joins, leaves, stores and
//! lookups. After every membership change the full invariant suite runs;
//! every lookup is checked against the last value written for its key.
//! The same seed always replays the same run.
//!
//! # Example
//!
//! ```ignore
//! let mut sim = DSTSimulation::new(DSTConfig::churn(42))?;
//! let result = sim.run_operations(1_000);
//! assert!(result.is_success(), "{}", result.summary());
//! ```

use crate::error::RingError;
use crate::observability::{simulated_metrics, SimulatedMetrics};
use crate::ring::verify::check_all;
use crate::ring::{Position, Ring};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DSTConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    pub bit_width: u32,
    pub replication_factor: usize,
    /// Nodes placed before the first operation
    pub initial_nodes: usize,
    /// Joins are skipped once the ring reaches this size
    pub max_nodes: usize,
    /// Distinct keys the workload draws from
    pub key_space: usize,
    /// Relative operation weights
    pub join_weight: u32,
    pub leave_weight: u32,
    pub store_weight: u32,
    pub lookup_weight: u32,
}

impl Default for DSTConfig {
    fn default() -> Self {
        DSTConfig {
            seed: 0,
            bit_width: 8,
            replication_factor: 3,
            initial_nodes: 8,
            max_nodes: 64,
            key_space: 500,
            join_weight: 5,
            leave_weight: 5,
            store_weight: 45,
            lookup_weight: 45,
        }
    }
}

impl DSTConfig {
    pub fn new(seed: u64) -> Self {
        DSTConfig {
            seed,
            ..Default::default()
        }
    }

    pub fn with_bit_width(mut self, bits: u32) -> Self {
        self.bit_width = bits;
        self
    }

    pub fn with_initial_nodes(mut self, count: usize) -> Self {
        self.initial_nodes = count;
        self
    }

    pub fn with_max_nodes(mut self, count: usize) -> Self {
        self.max_nodes = count;
        self
    }

    pub fn with_replication_factor(mut self, rf: usize) -> Self {
        self.replication_factor = rf;
        self
    }

    /// Preset: fixed membership, routing only
    pub fn calm(seed: u64) -> Self {
        DSTConfig {
            seed,
            initial_nodes: 32,
            join_weight: 0,
            leave_weight: 0,
            ..Default::default()
        }
    }

    /// Preset: heavy membership churn on a small ring
    pub fn churn(seed: u64) -> Self {
        DSTConfig {
            seed,
            bit_width: 6,
            initial_nodes: 4,
            max_nodes: 40,
            key_space: 200,
            join_weight: 20,
            leave_weight: 20,
            store_weight: 30,
            lookup_weight: 30,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Join,
    Leave,
    Store,
    Lookup,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationResult {
    pub seed: u64,
    pub total_operations: u64,
    pub operations_by_type: HashMap<String, u64>,
    /// Routed lookups and the hops they took
    pub lookups_routed: u64,
    pub total_hops: u64,
    pub max_hops: usize,
    /// Largest `hops - ceil(log2(n))` seen across lookups
    pub max_excess_hops: i64,
    pub final_nodes: usize,
    pub errors: Vec<String>,
}

impl SimulationResult {
    pub fn new(seed: u64) -> Self {
        SimulationResult {
            seed,
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn average_hops(&self) -> f64 {
        if self.lookups_routed == 0 {
            0.0
        } else {
            self.total_hops as f64 / self.lookups_routed as f64
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} ops, {} nodes at end, avg hops {:.2}, max hops {}, errors={}",
            self.seed,
            self.total_operations,
            self.final_nodes,
            self.average_hops(),
            self.max_hops,
            self.errors.len()
        )
    }
}

/// `ceil(log2(n))`, 0 for n <= 1
pub fn log2_ceil(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

pub struct DSTSimulation {
    config: DSTConfig,
    rng: ChaCha8Rng,
    ring: Ring<String, u64>,
    /// Last value written per key
    expected: HashMap<String, u64>,
    metrics: Arc<SimulatedMetrics>,
    operation_counter: u64,
    result: SimulationResult,
}

impl DSTSimulation {
    pub fn new(config: DSTConfig) -> Result<Self, RingError> {
        let metrics = simulated_metrics();
        let ring = Ring::new(config.bit_width, config.replication_factor)?
            .with_metrics(metrics.clone());
        let mut sim = DSTSimulation {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            ring,
            expected: HashMap::new(),
            metrics,
            operation_counter: 0,
            result: SimulationResult::new(config.seed),
            config,
        };

        for _ in 0..sim.config.initial_nodes {
            sim.join_random();
        }
        sim.verify_topology("initial placement");
        Ok(sim)
    }

    pub fn ring(&self) -> &Ring<String, u64> {
        &self.ring
    }

    pub fn metrics(&self) -> &Arc<SimulatedMetrics> {
        &self.metrics
    }

    pub fn result(&self) -> &SimulationResult {
        &self.result
    }

    fn pick_operation(&mut self) -> OperationType {
        let c = &self.config;
        let weights = [
            (OperationType::Join, c.join_weight),
            (OperationType::Leave, c.leave_weight),
            (OperationType::Store, c.store_weight),
            (OperationType::Lookup, c.lookup_weight),
        ];
        let total: u32 = weights.iter().map(|(_, w)| w).sum();
        if total == 0 {
            return OperationType::Lookup;
        }
        let mut roll = self.rng.gen_range(0..total);
        for (op, weight) in weights {
            if roll < weight {
                return op;
            }
            roll -= weight;
        }
        OperationType::Lookup
    }

    fn random_node(&mut self) -> Option<Position> {
        let positions = self.ring.positions();
        if positions.is_empty() {
            None
        } else {
            Some(positions[self.rng.gen_range(0..positions.len())])
        }
    }

    fn random_key(&mut self) -> String {
        format!("key:{}", self.rng.gen_range(0..self.config.key_space.max(1)))
    }

    /// Join at a random free position. Returns false if the ring is full.
    fn join_random(&mut self) -> bool {
        let ring_size = self.ring.ring_size();
        if self.ring.len() as u64 >= ring_size || self.ring.len() >= self.config.max_nodes {
            return false;
        }
        loop {
            let pos = self.rng.gen_range(0..ring_size);
            if !self.ring.contains_node(pos) {
                if let Err(e) = self.ring.add_node(pos) {
                    self.result.errors.push(format!("join at {} failed: {}", pos, e));
                }
                return true;
            }
        }
    }

    fn record(&mut self, op: OperationType) {
        *self
            .result
            .operations_by_type
            .entry(format!("{:?}", op))
            .or_insert(0) += 1;
        self.result.total_operations += 1;
    }

    fn verify_topology(&mut self, context: &str) {
        for violation in check_all(&self.ring) {
            self.result
                .errors
                .push(format!("after {}: {}", context, violation));
        }
    }

    /// Run a single random operation
    pub fn step(&mut self) {
        self.operation_counter += 1;
        let op = self.pick_operation();
        self.record(op);
        match op {
            OperationType::Join => {
                if !self.join_random() {
                    return;
                }
                self.verify_topology("join");
            }
            OperationType::Leave => {
                // Keep one node so owned data always has a home
                if self.ring.len() <= 1 {
                    return;
                }
                let Some(pos) = self.random_node() else { return };
                if !self.ring.remove_node(pos) {
                    self.result.errors.push(format!("leave of S{} reported absent", pos));
                }
                self.verify_topology("leave");
            }
            OperationType::Store => {
                let key = self.random_key();
                let start = self.random_node();
                let value = self.operation_counter;
                match self.ring.store(key.clone(), value, start) {
                    Ok(route) => {
                        if let Some(owner) = self.ring.node(route.owner) {
                            if !owner.is_responsible_for(route.target) {
                                self.result
                                    .errors
                                    .push(format!("store of {} routed to wrong owner S{}", key, route.owner));
                            }
                        }
                        self.expected.insert(key, value);
                    }
                    Err(e) => self.result.errors.push(format!("store {} failed: {}", key, e)),
                }
            }
            OperationType::Lookup => {
                let key = self.random_key();
                let start = self.random_node();
                match self.ring.lookup(&key, start) {
                    Ok(found) => {
                        let hops = found.route.hops();
                        let bound = log2_ceil(self.ring.len()) as i64;
                        self.result.lookups_routed += 1;
                        self.result.total_hops += hops as u64;
                        self.result.max_hops = self.result.max_hops.max(hops);
                        self.result.max_excess_hops =
                            self.result.max_excess_hops.max(hops as i64 - bound);

                        let expected = self.expected.get(&key).copied();
                        if found.value != expected {
                            self.result.errors.push(format!(
                                "lookup {} returned {:?}, expected {:?}",
                                key, found.value, expected
                            ));
                        }
                    }
                    Err(e) => self.result.errors.push(format!("lookup {} failed: {}", key, e)),
                }
            }
        }
    }

    pub fn run_operations(&mut self, count: usize) -> &SimulationResult {
        for _ in 0..count {
            self.step();
        }
        self.finalize()
    }

    /// Read back every key ever written and close out the result
    pub fn finalize(&mut self) -> &SimulationResult {
        let mut expected: Vec<(String, u64)> =
            self.expected.iter().map(|(k, v)| (k.clone(), *v)).collect();
        expected.sort();
        for (key, value) in expected {
            match self.ring.lookup(&key, None) {
                Ok(found) if found.value == Some(value) => {}
                Ok(found) => self.result.errors.push(format!(
                    "final read of {} returned {:?}, expected {}",
                    key, found.value, value
                )),
                Err(e) => self
                    .result
                    .errors
                    .push(format!("final read of {} failed: {}", key, e)),
            }
        }
        self.result.final_nodes = self.ring.len();
        &self.result
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub total_runs: usize,
    pub total_operations: u64,
    pub total_lookups: u64,
    pub total_hops: u64,
    pub max_hops: usize,
    pub failed_seeds: Vec<u64>,
    /// First error of each failed seed
    pub failures: Vec<String>,
}

impl BatchResult {
    pub fn all_passed(&self) -> bool {
        self.failed_seeds.is_empty()
    }

    pub fn average_hops(&self) -> f64 {
        if self.total_lookups == 0 {
            0.0
        } else {
            self.total_hops as f64 / self.total_lookups as f64
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} runs, {} ops, avg hops {:.2}, max hops {}, {} failed",
            self.total_runs,
            self.total_operations,
            self.average_hops(),
            self.max_hops,
            self.failed_seeds.len()
        )
    }
}

/// Runs one simulation per seed in `start_seed..start_seed + count`
pub struct BatchRunner {
    start_seed: u64,
    count: usize,
    config: DSTConfig,
}

impl BatchRunner {
    pub fn new(start_seed: u64, count: usize) -> Self {
        BatchRunner {
            start_seed,
            count,
            config: DSTConfig::default(),
        }
    }

    /// Template config; the seed is replaced per run
    pub fn with_config(mut self, config: DSTConfig) -> Self {
        self.config = config;
        self
    }

    pub fn run(&self, ops_per_run: usize) -> BatchResult {
        let mut batch = BatchResult::default();
        for seed in self.start_seed..self.start_seed + self.count as u64 {
            let config = DSTConfig {
                seed,
                ..self.config.clone()
            };
            batch.total_runs += 1;
            let mut sim = match DSTSimulation::new(config) {
                Ok(sim) => sim,
                Err(e) => {
                    batch.failed_seeds.push(seed);
                    batch.failures.push(format!("invalid config: {}", e));
                    continue;
                }
            };
            let result = sim.run_operations(ops_per_run);

            batch.total_operations += result.total_operations;
            batch.total_lookups += result.lookups_routed;
            batch.total_hops += result.total_hops;
            batch.max_hops = batch.max_hops.max(result.max_hops);
            if !result.is_success() {
                batch.failed_seeds.push(seed);
                batch.failures.push(result.errors[0].clone());
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log2_ceil() {
        assert_eq!(log2_ceil(0), 0);
        assert_eq!(log2_ceil(1), 0);
        assert_eq!(log2_ceil(2), 1);
        assert_eq!(log2_ceil(5), 3);
        assert_eq!(log2_ceil(32), 5);
        assert_eq!(log2_ceil(33), 6);
    }

    #[test]
    fn test_same_seed_replays_identically() {
        let a = DSTSimulation::new(DSTConfig::churn(7)).unwrap().run_operations(300).clone();
        let b = DSTSimulation::new(DSTConfig::churn(7)).unwrap().run_operations(300).clone();
        assert_eq!(a.total_hops, b.total_hops);
        assert_eq!(a.final_nodes, b.final_nodes);
        assert_eq!(a.operations_by_type, b.operations_by_type);
    }

    #[test]
    fn test_churn_run_is_clean() {
        let mut sim = DSTSimulation::new(DSTConfig::churn(99)).unwrap();
        let result = sim.run_operations(500);
        assert!(result.is_success(), "{}: {:?}", result.summary(), result.errors);
        assert!(result.operations_by_type.get("Join").copied().unwrap_or(0) > 0);
        assert!(result.operations_by_type.get("Leave").copied().unwrap_or(0) > 0);
        assert!(sim.metrics().membership_count() > 0);
    }

    #[test]
    fn test_calm_run_keeps_membership() {
        let mut sim = DSTSimulation::new(DSTConfig::calm(3)).unwrap();
        assert_eq!(sim.ring().len(), 32);
        let result = sim.run_operations(200);
        assert!(result.is_success());
        assert_eq!(result.final_nodes, 32);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(DSTSimulation::new(DSTConfig::new(1).with_bit_width(0)).is_err());

        let batch = BatchRunner::new(0, 2)
            .with_config(DSTConfig::default().with_bit_width(64))
            .run(10);
        assert_eq!(batch.failed_seeds, vec![0, 1]);
    }

    #[test]
    fn test_batch_aggregates_runs() {
        let batch = BatchRunner::new(100, 3).run(200);
        assert_eq!(batch.total_runs, 3);
        assert_eq!(batch.total_operations, 600);
        assert!(batch.all_passed(), "{}: {:?}", batch.summary(), batch.failures);
        assert!(batch.total_lookups > 0);
    }
}
