//! Routing benchmark
//!
//! Builds rings of increasing size, stores a fixed key set, then measures
//! hop counts and lookup throughput from random start nodes.
//!
//! Usage: routing-benchmark [lookups-per-ring]

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use chord_sim::ring::{Position, Ring};
use chord_sim::simulator::log2_ceil;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

const BIT_WIDTH: u32 = 16;
const KEYS: usize = 10_000;
const RING_SIZES: [usize; 6] = [8, 32, 128, 512, 2048, 8192];

struct RunStats {
    nodes: usize,
    avg_hops: f64,
    max_hops: usize,
    lookups_per_sec: f64,
    join_ms: f64,
}

fn bench_ring(nodes: usize, lookups: usize, rng: &mut ChaCha8Rng) -> Result<RunStats, Box<dyn std::error::Error>> {
    let mut ring: Ring<String, u64> = Ring::new(BIT_WIDTH, 3)?;
    let positions: Vec<Position> = sample(rng, ring.ring_size() as usize, nodes)
        .into_iter()
        .map(|p| p as Position)
        .collect();

    let start = Instant::now();
    for pos in &positions {
        ring.add_node(*pos)?;
    }
    let join_ms = start.elapsed().as_secs_f64() * 1000.0;

    for i in 0..KEYS {
        ring.store(format!("key:{}", i), i as u64, None)?;
    }

    let keys: Vec<String> = (0..lookups)
        .map(|_| format!("key:{}", rng.gen_range(0..KEYS)))
        .collect();
    let starts: Vec<Position> = (0..lookups)
        .map(|_| positions[rng.gen_range(0..positions.len())])
        .collect();

    let mut total_hops = 0usize;
    let mut max_hops = 0usize;
    let start = Instant::now();
    for (key, from) in keys.iter().zip(&starts) {
        let found = ring.lookup(key, Some(*from))?;
        total_hops += found.route.hops();
        max_hops = max_hops.max(found.route.hops());
    }
    let elapsed = start.elapsed().as_secs_f64();

    Ok(RunStats {
        nodes,
        avg_hops: total_hops as f64 / lookups as f64,
        max_hops,
        lookups_per_sec: lookups as f64 / elapsed.max(f64::EPSILON),
        join_ms,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let lookups: usize = match std::env::args().nth(1) {
        Some(raw) => raw.parse()?,
        None => 20_000,
    };

    println!("Chord routing benchmark");
    println!("  Ring: 2^{} positions, {} keys, {} lookups per ring\n", BIT_WIDTH, KEYS, lookups);
    println!(
        "{:>7} {:>10} {:>9} {:>10} {:>14} {:>12}",
        "nodes", "avg hops", "max hops", "log2(n)", "lookups/sec", "joins (ms)"
    );
    println!("{}", "-".repeat(67));

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for nodes in RING_SIZES {
        let stats = bench_ring(nodes, lookups, &mut rng)?;
        println!(
            "{:>7} {:>10.2} {:>9} {:>10} {:>14.0} {:>12.1}",
            stats.nodes,
            stats.avg_hops,
            stats.max_hops,
            log2_ceil(stats.nodes),
            stats.lookups_per_sec,
            stats.join_ms
        );
    }

    println!("\nBenchmark complete.");
    Ok(())
}
