//! Broad-phase benchmark: coherent incremental updates against full rebuilds.
//!
//! Boxes drift a little every tick, which is the frame-to-frame coherence the
//! insertion-sort update relies on. The rebuild baseline forces a layout
//! change every iteration.
//!
//! Run with: `cargo bench --bench broad_phase`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use quickstep_engine::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Scene {
    centers: Vec<Vec2>,
    velocities: Vec<Vec2>,
    halves: Vec<Vec2>,
}

/// `count` boxes scattered over a room sized so each box has a few neighbours.
fn scene(count: usize) -> Scene {
    let mut rng = Pcg64::seed_from_u64(0x5eed);
    let side = (count as f32).sqrt() * 24.0;
    let mut centers = Vec::with_capacity(count);
    let mut velocities = Vec::with_capacity(count);
    let mut halves = Vec::with_capacity(count);
    for _ in 0..count {
        centers.push(Vec2::new(rng.gen_range(0.0..side), rng.gen_range(0.0..side)));
        velocities.push(Vec2::new(rng.gen_range(-1.5..1.5), rng.gen_range(-1.5..1.5)));
        halves.push(Vec2::new(rng.gen_range(4.0..12.0), rng.gen_range(4.0..12.0)));
    }
    Scene {
        centers,
        velocities,
        halves,
    }
}

impl Scene {
    fn step(&mut self) {
        for (center, velocity) in self.centers.iter_mut().zip(&self.velocities) {
            *center += *velocity;
        }
    }

    fn sources(&self, first: EntityId) -> Vec<AabbSource> {
        self.centers
            .iter()
            .zip(&self.halves)
            .enumerate()
            .map(|(i, (&center, &half))| {
                AabbSource::new(
                    EntityId::new(first.to_raw() + i as u32),
                    SourceKind::Collision,
                    Rect::from_center(center, half),
                )
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_coherent_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("broad_phase_update");
    for count in [100usize, 500, 1000] {
        group.bench_with_input(BenchmarkId::new("incremental", count), &count, |b, &count| {
            let mut scene = scene(count);
            let mut sap = SweepAndPrune::new();
            sap.set_sources(scene.sources(EntityId::new(0)));
            sap.update();
            b.iter(|| {
                scene.step();
                sap.set_sources(scene.sources(EntityId::new(0)));
                sap.update();
                black_box((sap.overlap_count(), sap.last_swap_count()))
            });
        });

        group.bench_with_input(BenchmarkId::new("rebuild", count), &count, |b, &count| {
            let mut scene = scene(count);
            let mut sap = SweepAndPrune::new();
            let mut shift = 0u32;
            b.iter(|| {
                scene.step();
                // A different id range is a different layout.
                shift ^= 1;
                sap.set_sources(scene.sources(EntityId::new(shift)));
                sap.update();
                black_box(sap.overlap_count())
            });
        });
    }
    group.finish();
}

fn bench_simulation_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_tick");
    for count in [50usize, 200] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut rng = Pcg64::seed_from_u64(42);
            let config = SimConfig {
                max_entities: count,
                ..Default::default()
            };
            let mut sim = Simulation::new(config, Box::new(FlatRoom::new(600.0, 0.0, 4000.0)))
                .expect("default config is valid");
            for _ in 0..count {
                let x = rng.gen_range(16.0..3984.0);
                sim.spawn_character(&CharacterTemplate::default(), Vec2::new(x, 586.0));
            }
            sim.run_ticks(10);
            b.iter(|| black_box(sim.step()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_coherent_update, bench_simulation_tick);
criterion_main!(benches);
