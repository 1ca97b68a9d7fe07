//! Compute module - Boid state, the CPU reference flock and the GPU backend.

mod flock;
mod state;

pub mod gpu;

pub use flock::*;
pub use state::*;
