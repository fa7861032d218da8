// benches/world_bench.rs
//! World tick and pool throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use exploding_elves_engine::pool::{ObjectPool, PoolConfig, PoolId};
use exploding_elves_engine::simulation::CollisionRegistry;
use exploding_elves_engine::utils::math::Color;
use exploding_elves_engine::{ElfKind, Elf, EngineConfig, Vec3, World};

const FRAME: f32 = 1.0 / 60.0;

fn crowded_world(per_kind: usize) -> World {
    let mut config = EngineConfig::default();
    config.session.seed = Some(0xE1F);
    for spawner in &mut config.spawners {
        spawner.enabled = false;
        spawner.max_entities = per_kind as u32 * 4;
    }
    let mut world = World::new(config).expect("default config is valid");

    for (k, kind) in ElfKind::ALL.iter().enumerate() {
        for i in 0..per_kind {
            let x = -20.0 + (i % 20) as f32 * 2.0;
            let z = -20.0 + k as f32 * 10.0 + (i / 20) as f32 * 2.0;
            world.spawn_at(*kind, Vec3::flat(x, z));
        }
    }
    world
}

fn bench_world_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_tick");
    for per_kind in [25_usize, 100] {
        group.bench_function(format!("60_ticks_{}_per_kind", per_kind), |b| {
            b.iter_batched(
                || crowded_world(per_kind),
                |mut world| {
                    for _ in 0..60 {
                        black_box(world.tick(FRAME));
                    }
                    world.drain_events().len()
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_pool(c: &mut Criterion) {
    c.bench_function("pool_get_release", |b| {
        let mut pool = ObjectPool::new(PoolId(2), PoolConfig::new("bench", 64), |id| {
            Elf::new(id, ElfKind::Red, Color::RED)
        });
        b.iter(|| {
            let elf = pool.get().expect("unbounded pool");
            pool.release(black_box(elf)).expect("own instance");
        });
    });
}

fn bench_collision_dedup(c: &mut Criterion) {
    c.bench_function("dedup_claim_expire", |b| {
        let mut registry = CollisionRegistry::new(0.1, 5.0);
        let ids: Vec<_> = (0..64)
            .map(|slot| exploding_elves_engine::pool::InstanceId::new(PoolId(2), slot))
            .collect();
        let mut now = 0.0;
        b.iter(|| {
            now += f64::from(FRAME);
            for pair in ids.chunks(2) {
                black_box(registry.try_claim(pair[0], pair[1], now));
            }
            registry.expire(now)
        });
    });
}

criterion_group!(benches, bench_world_tick, bench_pool, bench_collision_dedup);
criterion_main!(benches);
