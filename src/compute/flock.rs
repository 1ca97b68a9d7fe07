//! CPU Flock - Reference implementation of the boid update rule.
//!
//! Evaluates exactly the rule encoded in `gpu/shaders/boid_step.frag.wgsl`,
//! one texel at a time, so GPU output can be checked against it.

use crate::schema::{ConfigError, FlockConfig, SimulationConfig};

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use super::BoidState;

/// Rule parameters in the form the step shader receives them.
#[derive(Debug, Clone, Copy)]
pub struct FlockParams {
    pub dt: f32,
    pub neighbor_radius: i32,
    pub separation_distance: f32,
    pub separation_scale: f32,
    pub alignment_scale: f32,
    pub cohesion_scale: f32,
    pub max_speed: f32,
}

impl FlockParams {
    pub fn new(dt: f32, flock: &FlockConfig) -> Self {
        Self {
            dt,
            neighbor_radius: flock.neighbor_radius as i32,
            separation_distance: flock.separation_distance,
            separation_scale: flock.separation_scale,
            alignment_scale: flock.alignment_scale,
            cohesion_scale: flock.cohesion_scale,
            max_speed: flock.max_speed,
        }
    }
}

/// Compute the next RGBA texel for the boid at (x, y).
pub fn step_texel(
    input: &[f32],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    params: &FlockParams,
) -> [f32; 4] {
    let fetch = |tx: usize, ty: usize| -> [f32; 4] {
        let i = 4 * (ty * width + tx);
        [input[i], input[i + 1], input[i + 2], input[i + 3]]
    };

    let me = fetch(x, y);
    let pos = [me[0], me[1]];
    let mut vel = [me[2], me[3]];

    let mut separation = [0.0f32; 2];
    let mut sum_vel = [0.0f32; 2];
    let mut sum_pos = [0.0f32; 2];
    let mut count = 0.0f32;

    let r = params.neighbor_radius;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = (x as i64 + dx as i64).rem_euclid(width as i64) as usize;
            let ny = (y as i64 + dy as i64).rem_euclid(height as i64) as usize;
            let other = fetch(nx, ny);

            let offset = [pos[0] - other[0], pos[1] - other[1]];
            let dist = (offset[0] * offset[0] + offset[1] * offset[1]).sqrt();
            if dist > 0.0 && dist < params.separation_distance {
                separation[0] += offset[0];
                separation[1] += offset[1];
            }
            sum_vel[0] += other[2];
            sum_vel[1] += other[3];
            sum_pos[0] += other[0];
            sum_pos[1] += other[1];
            count += 1.0;
        }
    }

    if count > 0.0 {
        for axis in 0..2 {
            let mean_vel = sum_vel[axis] / count;
            let mean_pos = sum_pos[axis] / count;
            vel[axis] += separation[axis] * params.separation_scale
                + (mean_vel - me[2 + axis]) * params.alignment_scale
                + (mean_pos - pos[axis]) * params.cohesion_scale;
        }
    }

    let speed = (vel[0] * vel[0] + vel[1] * vel[1]).sqrt();
    if speed > params.max_speed && speed > 0.0 {
        let scale = params.max_speed / speed;
        vel[0] *= scale;
        vel[1] *= scale;
    }

    let wrap = |p: f32| {
        let t = 0.5 + 0.5 * p;
        2.0 * (t - t.floor()) - 1.0
    };

    [
        wrap(pos[0] + vel[0] * params.dt),
        wrap(pos[1] + vel[1] * params.dt),
        vel[0],
        vel[1],
    ]
}

/// CPU reference flock, one boid per texel.
pub struct CpuFlock {
    config: SimulationConfig,
    params: FlockParams,
    /// Pre-allocated buffer for the next state (swapped with the input).
    next: Vec<f32>,
}

impl CpuFlock {
    /// Create a flock from a validated configuration.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let params = FlockParams::new(config.dt, &config.flock);
        let next = vec![0.0f32; 4 * config.boid_count()];
        Ok(Self {
            config,
            params,
            next,
        })
    }

    /// Perform one simulation step.
    pub fn step(&mut self, state: &mut BoidState) {
        if state.is_empty() {
            state.time += self.config.dt;
            state.step += 1;
            return;
        }
        let width = state.width;
        let height = state.height;
        let params = self.params;
        self.next.resize(state.data.len(), 0.0);

        let input = &state.data;
        let row_len = 4 * width;

        #[cfg(not(target_arch = "wasm32"))]
        self.next
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| fill_row(row, input, width, height, y, &params));

        #[cfg(target_arch = "wasm32")]
        self.next
            .chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| fill_row(row, input, width, height, y, &params));

        std::mem::swap(&mut state.data, &mut self.next);
        state.time += self.config.dt;
        state.step += 1;
    }

    /// Run simulation for specified number of steps.
    pub fn run(&mut self, state: &mut BoidState, steps: u64) {
        for _ in 0..steps {
            self.step(state);
        }
    }

    /// Get configuration reference.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

fn fill_row(
    row: &mut [f32],
    input: &[f32],
    width: usize,
    height: usize,
    y: usize,
    params: &FlockParams,
) {
    for (x, texel) in row.chunks_exact_mut(4).enumerate() {
        texel.copy_from_slice(&step_texel(input, width, height, x, y, params));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Pattern, Seed};

    fn test_config() -> SimulationConfig {
        SimulationConfig {
            grid_width: 32,
            grid_height: 32,
            dt: 0.05,
            ..Default::default()
        }
    }

    #[test]
    fn test_isolated_boid_moves_in_straight_line() {
        let params = FlockParams {
            neighbor_radius: 0,
            ..FlockParams::new(0.5, &FlockConfig::default())
        };
        let input = [0.0, 0.0, 0.2, -0.1];
        let out = step_texel(&input, 1, 1, 0, 0, &params);

        assert!((out[0] - 0.1).abs() < 1e-6);
        assert!((out[1] + 0.05).abs() < 1e-6);
        assert_eq!(&out[2..], &[0.2, -0.1]);
    }

    #[test]
    fn test_empty_state_steps_without_work() {
        let mut flock = CpuFlock::new(test_config()).unwrap();
        let mut state = BoidState::from_data(Vec::new(), 0, 5);

        flock.run(&mut state, 2);
        assert!(state.data.is_empty());
        assert_eq!(state.step, 2);
    }

    #[test]
    fn test_position_wraps_around_boundary() {
        let params = FlockParams {
            neighbor_radius: 0,
            ..FlockParams::new(1.0, &FlockConfig::default())
        };
        let input = [0.95, -0.95, 0.1, -0.1];
        let out = step_texel(&input, 1, 1, 0, 0, &params);

        assert!((out[0] - (-0.95)).abs() < 1e-5, "x wrapped to {}", out[0]);
        assert!((out[1] - 0.95).abs() < 1e-5, "y wrapped to {}", out[1]);
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut flock = FlockConfig::default();
        flock.max_speed = 0.1;
        let params = FlockParams {
            neighbor_radius: 0,
            ..FlockParams::new(0.0, &flock)
        };
        let input = [0.0, 0.0, 3.0, 4.0];
        let out = step_texel(&input, 1, 1, 0, 0, &params);
        let speed = (out[2] * out[2] + out[3] * out[3]).sqrt();

        assert!((speed - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_alignment_pulls_toward_neighbor_velocity() {
        let mut flock = FlockConfig::default();
        flock.alignment_scale = 0.5;
        flock.cohesion_scale = 0.0;
        flock.separation_scale = 0.0;
        flock.max_speed = 10.0;
        let params = FlockParams::new(0.0, &flock);

        // 3x1 grid, radius 2 sees both other boids (and wraps onto them).
        let input = [
            -0.5, 0.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.5, 0.0, 1.0, 0.0,
        ];
        let out = step_texel(&input, 3, 1, 0, 0, &params);
        assert!(out[2] > 0.0, "velocity should align toward +x, got {}", out[2]);
    }

    #[test]
    fn test_step_advances_time() {
        let config = test_config();
        let mut flock = CpuFlock::new(config.clone()).unwrap();
        let mut state = BoidState::from_seed(&Seed::default(), &config);

        flock.run(&mut state, 3);

        assert_eq!(state.step, 3);
        assert!((state.time - 0.15).abs() < 1e-6);
        assert_eq!(state.data.len(), 4 * config.boid_count());
    }

    #[test]
    fn test_positions_stay_in_bounds() {
        let config = test_config();
        let mut flock = CpuFlock::new(config.clone()).unwrap();
        let seed = Seed {
            pattern: Pattern::RandomScatter {
                extent: 1.0,
                max_speed: 0.5,
                seed: 3,
            },
        };
        let mut state = BoidState::from_seed(&seed, &config);

        flock.run(&mut state, 50);

        for boid in state.boids() {
            assert!(boid.pos[0] >= -1.0 && boid.pos[0] <= 1.0);
            assert!(boid.pos[1] >= -1.0 && boid.pos[1] <= 1.0);
            assert!(boid.speed() <= config.flock.max_speed + 1e-5);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimulationConfig {
            dt: -1.0,
            ..Default::default()
        };
        assert!(CpuFlock::new(config).is_err());
    }
}
