//! Schema module - Configuration and seeding types for boid simulations.

mod config;
mod seed;

pub use config::*;
pub use seed::*;
