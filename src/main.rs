//! Chord ring demo
//!
//! Walks through routing, membership changes, replication and a small
//! record store, printing ring views along the way.
//!
//! Usage: chord-sim
//!
//! Logging honours RUST_LOG and the CHORD_* variables read by `Settings`.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use chord_sim::observability::init_tracing;
use chord_sim::ring::{hash_key, Position, Ring};
use chord_sim::{RingConfig, Settings};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use tracing::info;

type DemoResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const HANDOUT_NODES: [Position; 5] = [0, 4, 7, 11, 14];

fn banner(title: &str) {
    let rule = "=".repeat(70);
    println!("\n{}\n{}\n{}", rule, title, rule);
}

fn path_label(path: &[Position]) -> String {
    path.iter()
        .map(|p| format!("S{}", p))
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn main() -> DemoResult {
    let settings = Settings::from_env()?;
    init_tracing(&settings.telemetry)?;
    info!(bits = settings.ring.bit_width, "Starting chord-sim demo");

    demo_search(&settings.ring)?;
    demo_membership(&settings.ring)?;
    demo_replication(&settings.ring)?;
    demo_records()?;

    println!("\nAll demos completed.");
    Ok(())
}

/// Routing on the 16-position handout ring
fn demo_search(config: &RingConfig) -> DemoResult {
    banner("SEARCH: S11 looking for position 6");

    let mut ring: Ring<String, String> =
        Ring::from_config(&RingConfig::new(4).with_replication_factor(config.replication_factor))?;
    for pos in HANDOUT_NODES {
        ring.add_node(pos)?;
    }

    let snapshot = ring.snapshot();
    print!("{}", snapshot.render_ring());
    println!();
    if let Some(node) = snapshot.node(11) {
        print!("{}", node.render_finger_table());
    }

    let route = ring.find_successor(11, 6)?;
    println!("\nPath: {}", path_label(&route.path));
    println!("Hops: {}", route.hops());
    println!("Position 6 is owned by S{}", route.owner);

    println!();
    print!("{}", snapshot.render_ascii());
    Ok(())
}

/// Key migration on join and absorption on leave
fn demo_membership(config: &RingConfig) -> DemoResult {
    banner("MEMBERSHIP: join and leave");

    let mut ring: Ring<String, String> =
        Ring::from_config(&RingConfig::new(4).with_replication_factor(config.replication_factor))?;
    for pos in HANDOUT_NODES {
        ring.add_node(pos)?;
    }
    for i in 0..10 {
        ring.store(format!("key_{}", i), format!("value_{}", i), None)?;
    }
    print!("{}", ring.snapshot().render_ring());

    println!("\nAdding node S9...");
    let joined = ring.add_node(9)?;
    println!(
        "  S9 predecessor: S{}, successor: S{}, keys taken over: {:?}",
        joined.predecessor().unwrap_or(9),
        joined.successor().unwrap_or(9),
        joined.owned_keys()
    );

    println!("\nRemoving node S4...");
    ring.remove_node(4);
    print!("{}", ring.snapshot().render_ring());

    for i in 0..10 {
        let key = format!("key_{}", i);
        let found = ring.lookup(&key, None)?;
        println!(
            "  {} -> {:?} via {}",
            key,
            found.value,
            path_label(&found.route.path)
        );
    }
    Ok(())
}

/// Predecessor copies of a single write
fn demo_replication(config: &RingConfig) -> DemoResult {
    banner("REPLICATION");

    let mut ring: Ring<String, String> = Ring::from_config(
        &RingConfig::new(4).with_replication_factor(config.replication_factor.max(1)),
    )?;
    for pos in HANDOUT_NODES {
        ring.add_node(pos)?;
    }

    let key = "critical_data".to_string();
    let route = ring.store(key.clone(), "important".to_string(), None)?;
    println!(
        "'{}' hashes to {} and is owned by S{}",
        key, route.target, route.owner
    );
    for node in ring.nodes() {
        if node.replica(route.owner, &key).is_some() {
            println!("  S{} holds a replica", node.position());
        }
    }
    Ok(())
}

fn sample_records() -> Vec<(String, Value)> {
    let products = [
        ("P001", "Laptop Pro", "TechCo", 1299.99),
        ("P002", "Smartphone X", "PhoneCorp", 899.99),
        ("P003", "Tablet Ultra", "TechCo", 599.99),
        ("P004", "Headphones Max", "AudioInc", 299.99),
        ("P005", "Smartwatch Pro", "WearTech", 399.99),
    ];
    let clients = [
        ("C001", "Alice", "Smith"),
        ("C002", "Bob", "Johnson"),
        ("C003", "Charlie", "Williams"),
    ];
    let orders = [
        ("O001", "C001", "P001", 1, "2024-01-15"),
        ("O002", "C002", "P002", 2, "2024-01-16"),
        ("O003", "C001", "P003", 1, "2024-01-17"),
        ("O004", "C003", "P004", 3, "2024-01-18"),
    ];

    let mut records = Vec::new();
    for (id, name, brand, price) in products {
        records.push((
            format!("product:{}", id),
            json!({"IDP": id, "name": name, "brand": brand, "price": price}),
        ));
    }
    for (id, first, last) in clients {
        records.push((
            format!("client:{}", id),
            json!({
                "IDC": id,
                "fn": first,
                "ln": last,
                "email": format!("{}@example.com", first.to_lowercase()),
            }),
        ));
    }
    for (id, client, product, quantity, date) in orders {
        records.push((
            format!("order:{}", id),
            json!({"IDO": id, "IDC": client, "IDP": product, "quantity": quantity, "date": date}),
        ));
    }
    records
}

/// JSON records spread over 20 servers on a 1024-position ring
fn demo_records() -> DemoResult {
    banner("DISTRIBUTED RECORDS");

    let mut ring: Ring<String, Value> = Ring::new(10, 3)?;
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut positions: Vec<Position> = sample(&mut rng, ring.ring_size() as usize, 20)
        .into_iter()
        .map(|p| p as Position)
        .collect();
    positions.sort_unstable();
    for pos in &positions {
        ring.add_node(*pos)?;
    }
    print!("{}", ring.snapshot().render_ring());

    println!("\nStoring records...");
    for (key, record) in sample_records() {
        let route = ring.store(key.clone(), record, None)?;
        println!(
            "  {} -> position {} -> S{}",
            key,
            hash_key(&key, ring.ring_size()),
            route.owner
        );
    }

    let start = positions[positions.len() / 2];
    for key in ["product:P001", "client:C002", "order:O003", "product:P005"] {
        let found = ring.lookup(&key.to_string(), Some(start))?;
        println!("\nLooking up '{}' from S{}:", key, start);
        println!("  Path: {}", path_label(&found.route.path));
        println!("  Hops: {}", found.route.hops());
        match found.value {
            Some(value) => println!("  Found: {}", value),
            None => println!("  Not found"),
        }
    }

    let snapshot = ring.snapshot();
    let busiest = snapshot
        .nodes
        .iter()
        .max_by_key(|n| n.data_keys.len())
        .map(|n| (n.position, n.data_keys.clone()));
    if let Some((owner, keys)) = busiest {
        println!("\nS{} owns {:?}", owner, keys);
        for node in &snapshot.nodes {
            if let Some(replica) = node.replicas.get(&owner) {
                println!("  S{} has replica: {:?}", node.position, replica);
            }
        }
    }
    Ok(())
}
