//! Benchmarks for the boid flock.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use gpgpu_boids::{
    compute::{BoidState, CpuFlock, gpu::GpuFlock},
    schema::{FlockConfig, Pattern, Seed, SimulationConfig},
};

fn config(size: usize, neighbor_radius: u32) -> SimulationConfig {
    SimulationConfig {
        grid_width: size,
        grid_height: size,
        flock: FlockConfig {
            neighbor_radius,
            ..FlockConfig::default()
        },
        ..SimulationConfig::default()
    }
}

fn seed() -> Seed {
    Seed {
        pattern: Pattern::RandomScatter {
            extent: 1.0,
            max_speed: 0.2,
            seed: 7,
        },
    }
}

fn bench_cpu_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_step");

    for size in [32, 64, 128, 256] {
        let config = config(size, 2);
        let mut flock = CpuFlock::new(config.clone()).unwrap();
        let mut state = BoidState::from_seed(&seed(), &config);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", size, size)),
            &size,
            |b, _| {
                b.iter(|| {
                    flock.step(black_box(&mut state));
                });
            },
        );
    }

    group.finish();
}

fn bench_neighbor_radius(c: &mut Criterion) {
    let mut group = c.benchmark_group("neighbor_radius");

    for radius in [1, 2, 4, 8] {
        let config = config(64, radius);
        let mut flock = CpuFlock::new(config.clone()).unwrap();
        let mut state = BoidState::from_seed(&seed(), &config);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("r{}", radius)),
            &radius,
            |b, _| {
                b.iter(|| {
                    flock.step(black_box(&mut state));
                });
            },
        );
    }

    group.finish();
}

fn bench_gpu_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("gpu_step");

    for size in [64, 256, 512] {
        let mut flock = match pollster::block_on(GpuFlock::new(config(size, 2), &seed())) {
            Ok(flock) => flock,
            Err(e) => {
                eprintln!("Skipping GPU benchmark: {e}");
                return;
            }
        };

        // Readback forces the queued passes to finish inside the measurement.
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", size, size)),
            &size,
            |b, _| {
                b.iter(|| {
                    flock.step().unwrap();
                    black_box(flock.read_state().unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_cpu_step, bench_neighbor_radius, bench_gpu_step);
criterion_main!(benches);
