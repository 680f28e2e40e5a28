//! # PeerCloud Locality Benchmarks
//!
//! | Component | Operation | Expected cost |
//! |-----------|-----------|---------------|
//! | pc-02 DomainTable | `choose_random` with exclusion | linear in peers |
//! | pc-02 DomainTable | `distance` | O(1) lookups |
//! | pc-02 NeighborMap | evidence `apply` | O(set size) prune |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pc_01_membership::{derive_peer_id, PeerId, Timestamp};
use pc_02_locality::{DomainSelector, DomainTable, NeighborMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

const DOMAINS: usize = 8;

fn peers(count: usize) -> Vec<PeerId> {
    (0..count)
        .map(|i| derive_peer_id("bench", &format!("p{i}")))
        .collect()
}

fn table(peers: &[PeerId]) -> DomainTable {
    let mut table = DomainTable::new();
    for (i, peer_id) in peers.iter().enumerate() {
        table.add(peer_id, &(i % DOMAINS).to_string(), Timestamp::from_millis(0));
    }
    table
}

// ============================================================================
// pc-02: Broadcast-Domain Topology
// ============================================================================

fn bench_choose_random(c: &mut Criterion) {
    let mut group = c.benchmark_group("pc-02-choose-random");
    group.measurement_time(Duration::from_secs(5));

    let Some(selector) = DomainSelector::parse("~1") else {
        return;
    };
    for size in [16, 256, 4096] {
        let peers = peers(size);
        let table = table(&peers);
        let mut rng = StdRng::seed_from_u64(7);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("excluding_one", size), &table, |b, table| {
            b.iter(|| black_box(table.choose_random(&selector, &mut rng)))
        });
    }

    group.finish();
}

fn bench_distance(c: &mut Criterion) {
    let peers = peers(1024);
    let table = table(&peers);
    let mut rng = StdRng::seed_from_u64(11);

    c.bench_function("pc-02-distance", |b| {
        b.iter(|| {
            let a = &peers[rng.gen_range(0..peers.len())];
            let z = &peers[rng.gen_range(0..peers.len())];
            black_box(table.distance(a, z))
        })
    });
}

// ============================================================================
// pc-02: Domain Merge
// ============================================================================

fn bench_neighbor_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("pc-02-neighbor-apply");

    for size in [8, 64, 512] {
        let peers = peers(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("chain", size), &peers, |b, peers| {
            b.iter(|| {
                let mut map = NeighborMap::new();
                for (step, pair) in peers.windows(2).enumerate() {
                    let now = Timestamp::from_millis(step as u64);
                    black_box(map.apply(&pair[0], &pair[1], now, 1_000));
                }
                black_box(map.num_sets())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_choose_random, bench_distance, bench_neighbor_apply);
criterion_main!(benches);
