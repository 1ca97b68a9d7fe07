//! GPGPU Boids CLI - Run a flock from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use gpgpu_boids::{
    compute::{BoidState, CpuFlock, SimulationStats, gpu::GpuError},
    schema::{Seed, SimulationConfig},
    GpuFlock,
};

/// Simulation backend for one run.
enum Backend {
    Cpu(CpuFlock, BoidState),
    Gpu(Box<GpuFlock>),
}

impl Backend {
    fn step(&mut self) -> Result<(), GpuError> {
        match self {
            Self::Cpu(flock, state) => {
                flock.step(state);
                Ok(())
            }
            Self::Gpu(flock) => flock.tick(),
        }
    }

    fn state(&self) -> Result<BoidState, GpuError> {
        match self {
            Self::Cpu(_, state) => Ok(state.clone()),
            Self::Gpu(flock) => flock.read_state(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Cpu(..) => "CPU",
            Self::Gpu(_) => "GPU",
        }
    }
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [steps] [--cpu]", args[0]);
        eprintln!();
        eprintln!("Run a GPGPU boids simulation from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to simulation configuration file");
        eprintln!("  steps        Number of simulation steps (default: 100)");
        eprintln!("  --cpu        Use the CPU reference flock instead of the GPU");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let steps: u64 = args
        .iter()
        .skip(2)
        .find_map(|s| s.parse().ok())
        .unwrap_or(100);
    let force_cpu = args.iter().skip(2).any(|a| a == "--cpu");

    let config = SimulationConfig::from_path(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    // Load or create seed
    let seed_path = config_path.with_extension("seed.json");
    let seed: Seed = if seed_path.exists() {
        let seed_str = fs::read_to_string(&seed_path).unwrap_or_else(|e| {
            eprintln!("Error reading seed file: {}", e);
            std::process::exit(1);
        });
        serde_json::from_str(&seed_str).unwrap_or_else(|e| {
            eprintln!("Error parsing seed: {}", e);
            std::process::exit(1);
        })
    } else {
        Seed::default()
    };

    println!("GPGPU Boids Simulation");
    println!("======================");
    println!(
        "Grid: {}x{} ({} boids)",
        config.grid_width,
        config.grid_height,
        config.boid_count()
    );
    println!(
        "Neighborhood radius: {}, max speed: {}",
        config.flock.neighbor_radius, config.flock.max_speed
    );
    println!("dt: {}", config.dt);
    println!("Steps: {}", steps);
    println!();

    let mut backend = create_backend(&config, &seed, force_cpu).unwrap_or_else(|e| {
        eprintln!("Error creating simulation: {}", e);
        std::process::exit(1);
    });

    let initial_stats = SimulationStats::from_state(&BoidState::from_seed(&seed, &config));
    println!("Initial state:");
    print_stats(&initial_stats);
    println!();

    println!("Running simulation on {}...", backend.name());
    let start = Instant::now();

    for i in 0..steps {
        if let Err(e) = backend.step() {
            eprintln!("Step {} failed: {}", i + 1, e);
            std::process::exit(1);
        }

        // Print progress every 10%
        if (i + 1) % (steps / 10).max(1) == 0 {
            let elapsed = start.elapsed().as_secs_f32();
            println!(
                "  Step {}/{}: {:.1} steps/s",
                i + 1,
                steps,
                (i + 1) as f32 / elapsed
            );
        }
    }

    let elapsed = start.elapsed();
    let final_state = backend.state().unwrap_or_else(|e| {
        eprintln!("Error reading state: {}", e);
        std::process::exit(1);
    });

    println!();
    println!("Final state:");
    print_stats(&SimulationStats::from_state(&final_state));
    println!();
    println!(
        "Time: {:.2}s ({:.1} steps/s)",
        elapsed.as_secs_f32(),
        steps as f32 / elapsed.as_secs_f32()
    );
}

fn create_backend(
    config: &SimulationConfig,
    seed: &Seed,
    force_cpu: bool,
) -> Result<Backend, GpuError> {
    let cpu = || -> Result<Backend, GpuError> {
        let flock = CpuFlock::new(config.clone())?;
        Ok(Backend::Cpu(flock, BoidState::from_seed(seed, config)))
    };

    if force_cpu {
        return cpu();
    }

    match pollster::block_on(GpuFlock::new(config.clone(), seed)) {
        Ok(flock) => Ok(Backend::Gpu(Box::new(flock))),
        Err(e) if e.is_unavailable() => {
            log::warn!("{e}, falling back to CPU");
            cpu()
        }
        Err(e) => Err(e),
    }
}

fn print_stats(stats: &SimulationStats) {
    println!(
        "  Mean position: ({:.4}, {:.4})",
        stats.mean_position[0], stats.mean_position[1]
    );
    println!(
        "  Mean velocity: ({:.4}, {:.4})",
        stats.mean_velocity[0], stats.mean_velocity[1]
    );
    println!(
        "  Speed: mean {:.4}, max {:.4}",
        stats.mean_speed, stats.max_speed
    );
    println!(
        "  Bounds: [{:.3}, {:.3}] x [{:.3}, {:.3}]",
        stats.min_position[0], stats.max_position[0], stats.min_position[1], stats.max_position[1]
    );
}

fn print_example_config() {
    let config = SimulationConfig::default();
    let seed = Seed::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error serializing config: {e}"),
    }
    println!();
    println!("Example seed (config.seed.json):");
    match serde_json::to_string_pretty(&seed) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error serializing seed: {e}"),
    }
}
