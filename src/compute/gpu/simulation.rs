//! GPU Flock - the step/present loop over a GPGPU context.

use crate::compute::BoidState;
use crate::schema::{Seed, SimulationConfig};

use super::{
    GpgpuContext, GpuError, Presenter, ShaderConstant, ShaderDefines, ShaderStage,
    SimulationStepper, Uniforms,
};

/// Sampler name every step and presentation shader reads state through.
pub(crate) const STATE_SAMPLER: &str = "boidData";

const BOID_STEP_SHADER: &str = include_str!("shaders/boid_step.frag.wgsl");
const IDENTITY_SHADER: &str = include_str!("shaders/identity.frag.wgsl");

/// Fragment program run by the stepper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StepProgram {
    /// Separation, alignment and cohesion.
    #[default]
    Flock,
    /// Copies state unchanged.
    Identity,
}

/// GPU-based boid simulation.
pub struct GpuFlock {
    ctx: GpgpuContext,
    config: SimulationConfig,
    stepper: SimulationStepper,
    presenter: Presenter,
    params: Uniforms,
    time: f32,
    step: u64,
}

impl GpuFlock {
    /// Create a flock on an offscreen surface.
    pub async fn new(config: SimulationConfig, seed: &Seed) -> Result<Self, GpuError> {
        Self::with_program(config, seed, StepProgram::Flock).await
    }

    pub async fn with_program(
        config: SimulationConfig,
        seed: &Seed,
        program: StepProgram,
    ) -> Result<Self, GpuError> {
        config.validate()?;
        let ctx = GpgpuContext::new_headless(config.surface_width, config.surface_height).await?;
        Self::from_context(ctx, config, seed, program)
    }

    /// Create a flock presenting to a browser canvas.
    #[cfg(target_arch = "wasm32")]
    pub async fn from_canvas(
        canvas: web_sys::HtmlCanvasElement,
        config: SimulationConfig,
        seed: &Seed,
    ) -> Result<Self, GpuError> {
        config.validate()?;
        let ctx = GpgpuContext::from_canvas(canvas).await?;
        Self::from_context(ctx, config, seed, StepProgram::Flock)
    }

    pub fn from_context(
        mut ctx: GpgpuContext,
        config: SimulationConfig,
        seed: &Seed,
        program: StepProgram,
    ) -> Result<Self, GpuError> {
        config.validate()?;
        ctx.set_texture_unit_policy(config.texture_units);

        let vs = ctx.standard_vertex_shader()?;
        let fs = match program {
            StepProgram::Flock => {
                let defines = ShaderDefines::new().define(
                    "NEIGHBOR_RADIUS",
                    ShaderConstant::I32(config.flock.neighbor_radius as i32),
                );
                ctx.compile_shader_with(BOID_STEP_SHADER, ShaderStage::Fragment, &defines)?
            }
            StepProgram::Identity => ctx.compile_fragment_shader(IDENTITY_SHADER)?,
        };
        let step_program = ctx.compile_program(vs, fs)?;

        // Checked before the seed allocates `4 * W * H` floats.
        let max_side = ctx.device().limits().max_texture_dimension_2d;
        let width = grid_side(config.grid_width, max_side)?;
        let height = grid_side(config.grid_height, max_side)?;

        let initial = seed.generate(config.grid_width, config.grid_height);
        let stepper = SimulationStepper::new(
            &mut ctx,
            step_program,
            width,
            height,
            &initial,
            STATE_SAMPLER,
        )?;
        let presenter = Presenter::new(&mut ctx, config.presentation, config.flock.max_speed)?;

        let params = match program {
            StepProgram::Flock => flock_uniforms(&config),
            StepProgram::Identity => Uniforms::new(),
        };

        log::info!(
            "GPU flock ready: {} boids ({}x{}), {:?} step, {:?} presentation",
            config.boid_count(),
            config.grid_width,
            config.grid_height,
            program,
            config.presentation
        );

        Ok(Self {
            ctx,
            config,
            stepper,
            presenter,
            params,
            time: 0.0,
            step: 0,
        })
    }

    /// Advance the state by one step without drawing.
    pub fn step(&mut self) -> Result<(), GpuError> {
        self.stepper.step(&mut self.ctx, &self.params)?;
        self.time += self.config.dt;
        self.step += 1;
        Ok(())
    }

    /// Draw the latest state to the screen.
    pub fn present(&mut self) -> Result<(), GpuError> {
        self.presenter
            .present(&mut self.ctx, self.stepper.current().texture)
    }

    /// One frame: step, present, end the frame.
    pub fn tick(&mut self) -> Result<(), GpuError> {
        self.step()?;
        self.present()?;
        self.ctx.present();
        Ok(())
    }

    /// Run the specified number of frames.
    pub fn run(&mut self, frames: u64) -> Result<(), GpuError> {
        for _ in 0..frames {
            self.tick()?;
        }
        Ok(())
    }

    /// Replace the current state.
    pub fn upload_state(&mut self, state: &BoidState) -> Result<(), GpuError> {
        if state.width != self.config.grid_width || state.height != self.config.grid_height {
            return Err(GpuError::ResourceCreation(format!(
                "state is {}x{}, flock grid is {}x{}",
                state.width, state.height, self.config.grid_width, self.config.grid_height
            )));
        }
        self.stepper.upload(&mut self.ctx, &state.data)?;
        self.time = state.time;
        self.step = state.step;
        Ok(())
    }

    /// Read the current state back from the GPU.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn read_state(&self) -> Result<BoidState, GpuError> {
        let data = self.ctx.read_texture(self.stepper.current().texture)?;
        Ok(self.wrap_state(data))
    }

    #[cfg(target_arch = "wasm32")]
    pub async fn read_state_async(&self) -> Result<BoidState, GpuError> {
        let data = self
            .ctx
            .read_texture_async(self.stepper.current().texture)
            .await?;
        Ok(self.wrap_state(data))
    }

    fn wrap_state(&self, data: Vec<f32>) -> BoidState {
        let mut state = BoidState::from_data(data, self.config.grid_width, self.config.grid_height);
        state.time = self.time;
        state.step = self.step;
        state
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn context(&self) -> &GpgpuContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut GpgpuContext {
        &mut self.ctx
    }

    pub fn stepper(&self) -> &SimulationStepper {
        &self.stepper
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.step
    }
}

fn grid_side(side: usize, max_side: u32) -> Result<u32, GpuError> {
    u32::try_from(side)
        .ok()
        .filter(|&side| side <= max_side)
        .ok_or_else(|| {
            GpuError::ResourceCreation(format!(
                "grid side {side} exceeds the device texture limit of {max_side}"
            ))
        })
}

fn flock_uniforms(config: &SimulationConfig) -> Uniforms {
    let flock = &config.flock;
    Uniforms::new()
        .float("dt", config.dt)
        .float("maxSpeed", flock.max_speed)
        .float("separationDistance", flock.separation_distance)
        .float("separationScale", flock.separation_scale)
        .float("alignmentScale", flock.alignment_scale)
        .float("cohesionScale", flock.cohesion_scale)
}
