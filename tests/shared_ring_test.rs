//! Concurrent readers and writers through `SharedRing`.

use chord_sim::observability::simulated_metrics;
use chord_sim::ring::verify::check_all;
use chord_sim::{Ring, RingConfig, SharedRing};
use std::thread;

#[test]
fn test_readers_see_writes_across_joins() {
    let metrics = simulated_metrics();
    let ring: Ring<String, u64> = Ring::from_config(&RingConfig::new(10))
        .unwrap()
        .with_metrics(metrics.clone());
    let shared = SharedRing::new(ring);
    shared.add_node(512).unwrap();

    for i in 0..300u64 {
        shared.store(format!("pre:{}", i), i, None).unwrap();
    }

    let joiner = {
        let shared = shared.clone();
        thread::spawn(move || {
            for pos in (0..1024).step_by(64).filter(|p| *p != 512) {
                shared.add_node(pos).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || {
                for round in 0..5 {
                    for i in 0..300u64 {
                        let found = shared.lookup(&format!("pre:{}", i), None).unwrap();
                        assert_eq!(found.value, Some(i), "round {}", round);
                    }
                }
            })
        })
        .collect();

    joiner.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(shared.len(), 16);
    assert_eq!(metrics.membership_count(), 16);
    assert!(shared.with_ring(|ring| check_all(ring)).is_empty());

    let snapshot = shared.snapshot();
    let held: usize = snapshot.nodes.iter().map(|n| n.data_keys.len()).sum();
    assert_eq!(held, 300);
}
