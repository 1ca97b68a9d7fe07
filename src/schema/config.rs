//! Configuration types for boid simulation parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Largest neighborhood radius the step shader will unroll.
pub const MAX_NEIGHBOR_RADIUS: u32 = 8;

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// State grid width in texels (one boid per texel).
    pub grid_width: usize,
    /// State grid height in texels.
    pub grid_height: usize,
    /// Presentation surface width in pixels.
    pub surface_width: u32,
    /// Presentation surface height in pixels.
    pub surface_height: u32,
    /// Time step size.
    pub dt: f32,
    /// Flocking rule parameters.
    pub flock: FlockConfig,
    /// How texture uniforms are assigned to texture units.
    #[serde(default)]
    pub texture_units: TextureUnitPolicy,
    /// How the state is drawn to the surface.
    #[serde(default)]
    pub presentation: PresentationMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_width: 256,
            grid_height: 256,
            surface_width: 400,
            surface_height: 400,
            dt: 0.016,
            flock: FlockConfig::default(),
            texture_units: TextureUnitPolicy::default(),
            presentation: PresentationMode::default(),
        }
    }
}

/// Parameters of the boid update rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlockConfig {
    /// Texel radius of the neighborhood each boid inspects.
    pub neighbor_radius: u32,
    /// Neighbors closer than this push the boid away.
    pub separation_distance: f32,
    /// Strength of the separation push.
    pub separation_scale: f32,
    /// Rate at which velocity converges to the neighborhood mean.
    pub alignment_scale: f32,
    /// Pull toward the neighborhood center of mass.
    pub cohesion_scale: f32,
    /// Speed clamp in units per second.
    pub max_speed: f32,
}

impl Default for FlockConfig {
    fn default() -> Self {
        Self {
            neighbor_radius: 2,
            separation_distance: 0.025,
            separation_scale: 0.05,
            alignment_scale: 0.02,
            cohesion_scale: 0.005,
            max_speed: 0.5,
        }
    }
}

/// Texture-unit assignment strategy for sampler uniforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureUnitPolicy {
    /// Units are numbered from 0 on every `set_uniforms` call. A later call
    /// may rebind a unit that an earlier sampler still refers to.
    Counting,
    /// Each sampler name keeps the unit it was first given until the
    /// program is destroyed.
    #[default]
    Cached,
}

/// Visual representation used by the presenter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationMode {
    /// One point per boid.
    #[default]
    Points,
    /// Full-screen velocity field.
    Field,
}

impl SimulationConfig {
    /// Number of boids (one per state texel).
    #[inline]
    pub fn boid_count(&self) -> usize {
        self.grid_width * self.grid_height
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.surface_width == 0 || self.surface_height == 0 {
            return Err(ConfigError::InvalidSurface);
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ConfigError::InvalidTimeStep);
        }
        if self.flock.neighbor_radius > MAX_NEIGHBOR_RADIUS {
            return Err(ConfigError::NeighborRadiusTooLarge {
                radius: self.flock.neighbor_radius,
                max: MAX_NEIGHBOR_RADIUS,
            });
        }
        let scalars = [
            ("separation_distance", self.flock.separation_distance),
            ("separation_scale", self.flock.separation_scale),
            ("alignment_scale", self.flock.alignment_scale),
            ("cohesion_scale", self.flock.cohesion_scale),
            ("max_speed", self.flock.max_speed),
        ];
        for (name, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidFlockParameter { name, value });
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions (grid_width, grid_height) must be non-zero")]
    InvalidDimensions,
    #[error("Surface dimensions must be non-zero")]
    InvalidSurface,
    #[error("Time step must be positive")]
    InvalidTimeStep,
    #[error("Neighbor radius {radius} exceeds maximum of {max}")]
    NeighborRadiusTooLarge { radius: u32, max: u32 },
    #[error("Flock parameter {name} must be finite and non-negative, got {value}")]
    InvalidFlockParameter { name: &'static str, value: f32 },
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
