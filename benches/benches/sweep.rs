// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use cardscript_dirty::{
    Age, AgeClock, Dependency, DependencyRegistry, DependencySink, DependencySource,
    DependencyType, Sweep,
};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

#[derive(Clone)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u32(&mut self) -> u32 {
        // Numerical Recipes LCG parameters.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 32) as u32
    }

    /// A field index read by `field`, always lower than it.
    fn field_read_by(&mut self, field: u32) -> u32 {
        if field == 0 {
            return 0;
        }
        self.next_u32() % field
    }
}

/// Field `f` reads `reads_per_field` random fields below it, so the registry
/// is acyclic and field 0 reaches most of it.
fn build_registry(fields: u32, reads_per_field: u32, seed: u64) -> DependencyRegistry {
    let mut registry = DependencyRegistry::new();
    let mut rng = Lcg::new(seed);
    for field in 1..fields {
        let dep = Dependency::new(DependencyType::CardField, field);
        for _ in 0..reads_per_field.min(field) {
            let read = rng.field_read_by(field);
            registry.mark(DependencySource::CardField(read), dep);
        }
    }
    registry
}

/// Runs one sweep from field 0, stamping each evaluated field with a fresh
/// age. Returns the number of evaluations.
fn propagate(registry: &DependencyRegistry, ages: &mut [Age], clock: &AgeClock) -> usize {
    let mut sweep = Sweep::new(clock.now());
    ages[0] = clock.now();
    sweep.extend(registry.dependents(DependencySource::CardField(0)).iter().copied());
    while let Some(dep) = sweep.pop() {
        let field = dep.index() as usize;
        if sweep.is_fresh(ages[field]) {
            sweep.record_skipped();
            continue;
        }
        ages[field] = clock.now();
        sweep.record_evaluated(true);
        sweep.extend(
            registry
                .dependents(DependencySource::CardField(dep.index()))
                .iter()
                .copied(),
        );
    }
    sweep.stats().evaluated
}

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("cardscript_dirty/registry");
    group.sample_size(50);

    for &(fields, reads) in &[(64_u32, 2_u32), (1_024_u32, 2_u32), (1_024_u32, 8_u32)] {
        group.bench_function(format!("build(fields={fields},reads={reads})"), |b| {
            b.iter(|| black_box(build_registry(fields, reads, 0xC0DE_0000_0000_0001)));
        });

        let registry = build_registry(fields, reads, 0xC0DE_0000_0000_0002);
        group.bench_function(format!("dependents(fields={fields},reads={reads})"), |b| {
            b.iter(|| {
                let mut total = 0_usize;
                for field in 0..fields {
                    total += registry
                        .dependents(DependencySource::CardField(field))
                        .len();
                }
                black_box(total);
            });
        });
    }

    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("cardscript_dirty/sweep");
    group.sample_size(50);

    for &(fields, reads) in &[
        (64_u32, 1_u32),
        (64_u32, 4_u32),
        (1_024_u32, 1_u32),
        (1_024_u32, 4_u32),
    ] {
        let registry = build_registry(fields, reads, 0xC0DE_0000_0000_0003);
        group.bench_function(format!("propagate(fields={fields},reads={reads})"), |b| {
            b.iter_batched(
                || (vec![Age::BEFORE_TIME; fields as usize], AgeClock::new()),
                |(mut ages, clock)| {
                    black_box(propagate(&registry, &mut ages, &clock));
                },
                BatchSize::SmallInput,
            );
        });

        // Second sweep over ages left by the first: nothing is fresh yet.
        group.bench_function(
            format!("propagate_twice(fields={fields},reads={reads})"),
            |b| {
                b.iter_batched(
                    || (vec![Age::BEFORE_TIME; fields as usize], AgeClock::new()),
                    |(mut ages, clock)| {
                        let first = propagate(&registry, &mut ages, &clock);
                        let second = propagate(&registry, &mut ages, &clock);
                        black_box(first + second);
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_registry, bench_sweep);
criterion_main!(benches);
