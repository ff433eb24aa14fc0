//! DST Batch Verification Test
//!
//! Runs many seeds through random join/leave/store/lookup sequences and
//! checks every ring invariant after each membership change.

use chord_sim::simulator::{BatchRunner, DSTConfig, DSTSimulation};

#[test]
fn test_200_seeds_default_mix() {
    let stats = BatchRunner::new(10_000, 200).run(300);

    println!("\n=== 200 Seeds (Default) ===");
    println!("{}", stats.summary());

    assert!(
        stats.all_passed(),
        "Failed seeds: {:?}\n{:?}",
        stats.failed_seeds,
        stats.failures
    );
    assert_eq!(stats.total_operations, 60_000);
}

#[test]
fn test_100_seeds_heavy_churn() {
    let stats = BatchRunner::new(20_000, 100)
        .with_config(DSTConfig::churn(0))
        .run(400);

    println!("\n=== 100 Seeds (Churn) ===");
    println!("{}", stats.summary());

    assert!(
        stats.all_passed(),
        "Failed seeds: {:?}\n{:?}",
        stats.failed_seeds,
        stats.failures
    );
    // 6-bit ring: no route can need more than bits + 1 hops
    assert!(stats.max_hops <= 7, "max hops {}", stats.max_hops);
}

#[test]
fn test_static_rings_route_in_log_hops() {
    let stats = BatchRunner::new(30_000, 50)
        .with_config(DSTConfig::calm(0))
        .run(300);

    println!("\n=== 50 Seeds (Calm) ===");
    println!("{}", stats.summary());

    assert!(stats.all_passed(), "Failed seeds: {:?}", stats.failed_seeds);
    // 32 nodes: ceil(log2(32)) = 5
    assert!(
        stats.average_hops() <= 6.0,
        "average hops {}",
        stats.average_hops()
    );
}

#[test]
fn test_determinism_verification() {
    let seed = 42_424_242;
    let config = DSTConfig::churn(seed).with_replication_factor(2);

    let mut first = DSTSimulation::new(config.clone()).unwrap();
    let mut second = DSTSimulation::new(config).unwrap();
    let a = first.run_operations(500).clone();
    let b = second.run_operations(500).clone();

    assert_eq!(a.total_hops, b.total_hops);
    assert_eq!(a.max_hops, b.max_hops);
    assert_eq!(a.final_nodes, b.final_nodes);
    assert_eq!(a.operations_by_type, b.operations_by_type);
    assert_eq!(first.ring().positions(), second.ring().positions());
    assert_eq!(first.ring().snapshot(), second.ring().snapshot());
}

#[test]
fn test_large_ring_simulation() {
    let config = DSTConfig::new(7)
        .with_bit_width(32)
        .with_initial_nodes(100)
        .with_max_nodes(200);
    let mut sim = DSTSimulation::new(config).unwrap();
    let result = sim.run_operations(1_000);

    println!("{}", result.summary());
    assert!(result.is_success(), "{:?}", result.errors);
    assert!(result.max_hops <= 33);
}
