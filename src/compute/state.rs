//! Boid state container and summary statistics.

use crate::schema::{Seed, SimulationConfig};

/// A single boid decoded from one RGBA texel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Boid {
    pub pos: [f32; 2],
    pub vel: [f32; 2],
}

impl Boid {
    #[inline]
    pub fn speed(&self) -> f32 {
        (self.vel[0] * self.vel[0] + self.vel[1] * self.vel[1]).sqrt()
    }
}

/// Simulation state container.
///
/// Data is stored exactly as it lives in the state texture: row-major RGBA
/// floats with indexing `[4 * (y * width + x) + channel]`.
#[derive(Debug, Clone)]
pub struct BoidState {
    /// Texel data, `4 * width * height` floats.
    pub data: Vec<f32>,
    /// Grid width in texels.
    pub width: usize,
    /// Grid height in texels.
    pub height: usize,
    /// Current simulation time.
    pub time: f32,
    /// Step count.
    pub step: u64,
}

impl BoidState {
    /// Create new state from seed.
    pub fn from_seed(seed: &Seed, config: &SimulationConfig) -> Self {
        Self::from_data(
            seed.generate(config.grid_width, config.grid_height),
            config.grid_width,
            config.grid_height,
        )
    }

    /// Wrap existing texel data. `data.len()` must be `4 * width * height`.
    pub fn from_data(data: Vec<f32>, width: usize, height: usize) -> Self {
        assert_eq!(
            data.len(),
            4 * width * height,
            "state data does not match {width}x{height} grid"
        );
        Self {
            data,
            width,
            height,
            time: 0.0,
            step: 0,
        }
    }

    /// Number of boids.
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert (x, y) coordinates to the first float of that texel.
    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        4 * (y * self.width + x)
    }

    /// Get the boid at texel (x, y).
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Boid {
        let i = self.idx(x, y);
        Boid {
            pos: [self.data[i], self.data[i + 1]],
            vel: [self.data[i + 2], self.data[i + 3]],
        }
    }

    /// Iterate over all boids in texel order.
    pub fn boids(&self) -> impl Iterator<Item = Boid> + '_ {
        self.data.chunks_exact(4).map(|t| Boid {
            pos: [t[0], t[1]],
            vel: [t[2], t[3]],
        })
    }
}

/// Simulation statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SimulationStats {
    pub boid_count: usize,
    pub mean_position: [f32; 2],
    pub mean_velocity: [f32; 2],
    pub mean_speed: f32,
    pub max_speed: f32,
    pub min_position: [f32; 2],
    pub max_position: [f32; 2],
}

impl SimulationStats {
    /// Compute statistics from state.
    pub fn from_state(state: &BoidState) -> Self {
        let mut sum_pos = [0.0f64; 2];
        let mut sum_vel = [0.0f64; 2];
        let mut sum_speed = 0.0f64;
        let mut max_speed = 0.0f32;
        let mut min_position = [f32::INFINITY; 2];
        let mut max_position = [f32::NEG_INFINITY; 2];

        for boid in state.boids() {
            for axis in 0..2 {
                sum_pos[axis] += boid.pos[axis] as f64;
                sum_vel[axis] += boid.vel[axis] as f64;
                min_position[axis] = min_position[axis].min(boid.pos[axis]);
                max_position[axis] = max_position[axis].max(boid.pos[axis]);
            }
            let speed = boid.speed();
            sum_speed += speed as f64;
            max_speed = max_speed.max(speed);
        }

        let n = state.len().max(1) as f64;
        Self {
            boid_count: state.len(),
            mean_position: [(sum_pos[0] / n) as f32, (sum_pos[1] / n) as f32],
            mean_velocity: [(sum_vel[0] / n) as f32, (sum_vel[1] / n) as f32],
            mean_speed: (sum_speed / n) as f32,
            max_speed,
            min_position,
            max_position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Pattern;

    #[test]
    fn test_state_from_seed() {
        let config = SimulationConfig {
            grid_width: 8,
            grid_height: 4,
            ..Default::default()
        };
        let state = BoidState::from_seed(&Seed::default(), &config);

        assert_eq!(state.len(), 32);
        assert_eq!(state.data.len(), 4 * 32);
        assert_eq!(state.step, 0);
    }

    #[test]
    fn test_get_decodes_texel() {
        let seed = Seed {
            pattern: Pattern::Custom {
                values: vec![(2, 1, [0.25, -0.5, 0.1, 0.2])],
            },
        };
        let config = SimulationConfig {
            grid_width: 4,
            grid_height: 2,
            ..Default::default()
        };
        let state = BoidState::from_seed(&seed, &config);
        let boid = state.get(2, 1);

        assert_eq!(boid.pos, [0.25, -0.5]);
        assert_eq!(boid.vel, [0.1, 0.2]);
    }

    #[test]
    fn test_stats_at_rest() {
        let seed = Seed {
            pattern: Pattern::Lattice,
        };
        let config = SimulationConfig {
            grid_width: 10,
            grid_height: 10,
            ..Default::default()
        };
        let state = BoidState::from_seed(&seed, &config);
        let stats = SimulationStats::from_state(&state);

        assert_eq!(stats.boid_count, 100);
        assert_eq!(stats.max_speed, 0.0);
        assert!(stats.mean_position[0].abs() < 1e-5);
        assert!(stats.mean_position[1].abs() < 1e-5);
        assert!(stats.min_position[0] >= -1.0 && stats.max_position[0] <= 1.0);
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_from_data_rejects_wrong_length() {
        let _ = BoidState::from_data(vec![0.0; 7], 1, 2);
    }
}
