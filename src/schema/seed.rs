//! Seed types for initializing boid state textures.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// Complete seed specification for simulation initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seed {
    /// Pattern to use for seeding.
    pub pattern: Pattern,
}

impl Default for Seed {
    fn default() -> Self {
        Self {
            pattern: Pattern::RandomScatter {
                extent: 1.0,
                max_speed: 0.1,
                seed: 42,
            },
        }
    }
}

/// Predefined patterns for initialization.
///
/// Every pattern produces RGBA texels laid out as
/// `(pos.x, pos.y, vel.x, vel.y)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    /// Uniformly random positions in `[-extent, extent]^2`.
    RandomScatter {
        /// Half-width of the square positions are drawn from.
        extent: f32,
        /// Velocity components are drawn from `[-max_speed, max_speed]`.
        /// Zero gives boids at rest.
        max_speed: f32,
        /// Random seed.
        seed: u64,
    },
    /// Vertical bands: texel `(1, 0, 0, 1)` in even bands of `period`
    /// columns, `(0, 0, 0, 1)` in odd bands.
    Stripes {
        /// Band width in texels.
        period: usize,
    },
    /// Boids evenly spread over `[-1, 1]^2` in texel order, at rest.
    Lattice,
    /// Custom texel values (sparse representation).
    Custom {
        /// List of (x, y, rgba) entries.
        values: Vec<(usize, usize, [f32; 4])>,
    },
}

impl Seed {
    /// Generate initial state as row-major RGBA floats (`4 * width * height`).
    pub fn generate(&self, width: usize, height: usize) -> Vec<f32> {
        let mut data = vec![0.0f32; 4 * width * height];

        match &self.pattern {
            Pattern::RandomScatter {
                extent,
                max_speed,
                seed,
            } => apply_scatter(&mut data, *extent, *max_speed, *seed),
            Pattern::Stripes { period } => apply_stripes(&mut data, width, *period),
            Pattern::Lattice => apply_lattice(&mut data, width, height),
            Pattern::Custom { values } => {
                for &(x, y, rgba) in values {
                    if x < width && y < height {
                        let i = 4 * (y * width + x);
                        data[i..i + 4].copy_from_slice(&rgba);
                    }
                }
            }
        }

        data
    }
}

fn apply_scatter(data: &mut [f32], extent: f32, max_speed: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let extent = extent.abs();
    let max_speed = max_speed.abs();

    for texel in data.chunks_exact_mut(4) {
        texel[0] = sample_symmetric(&mut rng, extent);
        texel[1] = sample_symmetric(&mut rng, extent);
        texel[2] = sample_symmetric(&mut rng, max_speed);
        texel[3] = sample_symmetric(&mut rng, max_speed);
    }
}

fn sample_symmetric(rng: &mut StdRng, half_width: f32) -> f32 {
    if half_width > 0.0 {
        rng.gen_range(-half_width..=half_width)
    } else {
        0.0
    }
}

fn apply_stripes(data: &mut [f32], width: usize, period: usize) {
    let period = period.max(1);
    for (i, texel) in data.chunks_exact_mut(4).enumerate() {
        let x = i % width;
        texel[0] = if (x / period) % 2 == 0 { 1.0 } else { 0.0 };
        texel[3] = 1.0;
    }
}

fn apply_lattice(data: &mut [f32], width: usize, height: usize) {
    for (i, texel) in data.chunks_exact_mut(4).enumerate() {
        let x = i % width;
        let y = i / width;
        texel[0] = 2.0 * (x as f32 + 0.5) / width as f32 - 1.0;
        texel[1] = 1.0 - 2.0 * (y as f32 + 0.5) / height as f32;
    }
}
