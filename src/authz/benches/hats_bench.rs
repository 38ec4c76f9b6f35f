//! Hats benchmarks
//!
//! Ancestry decoding and admin checks should stay flat regardless of tree
//! depth; wearing checks cost one lock acquisition plus any live queries.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hats_authz::{HatId, Hats, HatsConfig, Identity, NewHat, MAX_LEVELS};
use tokio::runtime::Runtime;

/// Hat at `depth` below a fresh top hat, every segment index 7
fn deep_hat(depth: usize) -> HatId {
    let mut hat = HatId::top_hat(1).unwrap();
    for _ in 0..depth {
        hat = hat.build_child(7).unwrap();
    }
    hat
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for depth in [1usize, 8, MAX_LEVELS] {
        let hat = deep_hat(depth);
        let ancestor = hat.admin_at_level(depth / 2);

        group.bench_with_input(BenchmarkId::new("level", depth), &hat, |b, hat| {
            b.iter(|| black_box(hat).level())
        });

        group.bench_with_input(BenchmarkId::new("is_admin_of", depth), &hat, |b, hat| {
            b.iter(|| black_box(ancestor).is_admin_of(black_box(hat)))
        });

        group.bench_with_input(BenchmarkId::new("admins", depth), &hat, |b, hat| {
            b.iter(|| black_box(hat).admins().count())
        });
    }

    group.finish();
}

fn bench_wearing_checks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("wearing_checks");

    for depth in [1usize, 8, MAX_LEVELS] {
        let (hats, owner, leaf) = rt.block_on(async {
            let hats = Hats::new(HatsConfig {
                enable_metrics: false,
                ..Default::default()
            });
            let owner = Identity::new("user:owner");
            let mut hat = hats.create_top_hat(&owner, "Bench", "").await.unwrap();
            for _ in 0..depth {
                hat = hats
                    .create_hat(&owner, NewHat::new(hat, "level", 10))
                    .await
                    .unwrap();
            }
            (hats, owner, hat)
        });

        group.bench_with_input(BenchmarkId::new("is_admin_of_hat", depth), &leaf, |b, leaf| {
            b.to_async(&rt).iter(|| async {
                black_box(hats.is_admin_of_hat(&owner, *leaf).await.unwrap());
            });
        });

        group.bench_with_input(BenchmarkId::new("is_wearer_of_hat", depth), &leaf, |b, leaf| {
            b.to_async(&rt).iter(|| async {
                black_box(hats.is_wearer_of_hat(&owner, *leaf).await.unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codec, bench_wearing_checks);
criterion_main!(benches);
