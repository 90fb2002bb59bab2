//! Benchmarks for the distillation controller
//!
//! Run with: cargo bench -p harch-core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use harch_core::{CatchTime, Controller, PairPhysics, PhysicsSet, Purification, SimConfig};
use rand::{Rng, RngCore};

/// Fidelity-only model with exponential decay and a sampled purification.
#[derive(Debug)]
struct DecayModel {
    coherence_ns: f64,
}

impl PairPhysics for DecayModel {
    type State = f64;

    fn decohere(&self, state: &f64, duration_ns: u64) -> f64 {
        0.25 + (state - 0.25) * (-(duration_ns as f64) / self.coherence_ns).exp()
    }

    fn fidelity(&self, state: &f64) -> f64 {
        *state
    }

    fn purify(&self, control: &f64, target: &f64, rng: &mut dyn RngCore) -> Purification<f64> {
        let p = control * target + (1.0 - control) * (1.0 - target) / 3.0;
        if rng.gen_bool(p.clamp(0.0, 1.0)) {
            Purification::success((control * target / p).min(1.0), p)
        } else {
            Purification::failure(p)
        }
    }

    fn generate(&self, _rng: &mut dyn RngCore) -> f64 {
        0.95
    }
}

fn config(cells: usize) -> SimConfig {
    let mut config = SimConfig::default();
    config.cycles = 1000;
    config.memory.cells = cells;
    config.distilled_memory.cells = cells;
    config.distillation.cells = cells / 2;
    config.input.generators = cells / 2;
    config.input.catch_time = CatchTime::Uniform { min_ns: 15, max_ns: 30 };
    config
}

/// Benchmark single controller ticks on a warmed-up pipeline
fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("controller_step");

    for cells in &[4, 16, 64] {
        group.bench_with_input(BenchmarkId::new("cells", cells), cells, |b, &n| {
            let physics = PhysicsSet::uniform(DecayModel { coherence_ns: 1e5 });
            let mut controller = Controller::from_config(&config(n), physics).unwrap();
            for _ in 0..500 {
                controller.step().unwrap();
            }
            b.iter(|| black_box(controller.step().unwrap()));
        });
    }

    group.finish();
}

/// Benchmark a full 1000-cycle run
fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("controller_run");
    group.sample_size(20);

    group.bench_function("default_1000", |b| {
        b.iter(|| {
            let physics = PhysicsSet::uniform(DecayModel { coherence_ns: 1e5 });
            let mut controller = Controller::from_config(black_box(&config(4)), physics).unwrap();
            controller.run().unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_step, bench_run);
criterion_main!(benches);
