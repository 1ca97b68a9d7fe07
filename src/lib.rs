//! GPGPU Boids - Flocking simulation on fragment shaders and float textures.
//!
//! The GPU backend is a small GPGPU layer over wgpu: RGBA float textures used
//! as render targets, WGSL programs with named uniforms, and a ping-pong
//! stepper that runs one fragment pass per tick. Each texel of the state
//! texture is one boid, `(pos.x, pos.y, vel.x, vel.y)`.
//!
//! # Architecture
//!
//! - `schema`: Configuration types and seeding
//! - `compute`: Boid state, the CPU reference flock and the `gpu` backend
//!
//! # Example
//!
//! ```rust,no_run
//! use gpgpu_boids::{
//!     compute::{BoidState, CpuFlock, SimulationStats},
//!     schema::{Seed, SimulationConfig},
//! };
//!
//! let config = SimulationConfig::default();
//! let mut state = BoidState::from_seed(&Seed::default(), &config);
//!
//! let mut flock = CpuFlock::new(config).expect("valid configuration");
//! flock.run(&mut state, 100);
//!
//! let stats = SimulationStats::from_state(&state);
//! println!("Mean speed after 100 steps: {}", stats.mean_speed);
//! ```

pub mod compute;
pub mod schema;

// WebAssembly bindings (only for wasm32 target)
#[cfg(target_arch = "wasm32")]
pub mod wasm;

// Re-export commonly used types
pub use compute::gpu::{GpgpuContext, GpuError, GpuFlock};
pub use compute::{BoidState, CpuFlock, SimulationStats};
pub use schema::{Pattern, Seed, SimulationConfig};
