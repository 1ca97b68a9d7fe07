//! Simulation Stepper - one fragment pass per tick over ping-pong state slots.

use super::{
    FramebufferHandle, GpgpuContext, GpuError, ProgramHandle, RenderTarget, TextureHandle,
    UniformValue, Uniforms,
};

/// Two slots with alternating input/output roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingPong<T> {
    slots: [T; 2],
    front: usize,
}

impl<T> PingPong<T> {
    /// `input` starts as the input slot.
    pub fn new(input: T, output: T) -> Self {
        Self {
            slots: [input, output],
            front: 0,
        }
    }

    pub fn input(&self) -> &T {
        &self.slots[self.front]
    }

    pub fn output(&self) -> &T {
        &self.slots[1 - self.front]
    }

    /// Exchange roles. Swapping twice restores the original roles.
    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }

    pub fn slots(&self) -> &[T; 2] {
        &self.slots
    }
}

/// A state texture and the framebuffer that renders into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSlot {
    pub texture: TextureHandle,
    pub framebuffer: FramebufferHandle,
}

impl StateSlot {
    fn create(
        ctx: &mut GpgpuContext,
        width: u32,
        height: u32,
        data: Option<&[f32]>,
    ) -> Result<Self, GpuError> {
        let texture = ctx.create_texture(width, height, data)?;
        let framebuffer = ctx.create_framebuffer(texture)?;
        Ok(Self {
            texture,
            framebuffer,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperState {
    Idle,
    Bound {
        input: TextureHandle,
        output: FramebufferHandle,
    },
    Rendered,
}

/// Drives a step program over a ping-pong pair of state slots.
///
/// Each step binds the input texture under the program's state sampler
/// together with `width` and `height`, draws the standard quad into the
/// output framebuffer and swaps the slots.
pub struct SimulationStepper {
    program: ProgramHandle,
    slots: PingPong<StateSlot>,
    width: u32,
    height: u32,
    sampler: String,
    state: StepperState,
    steps: u64,
}

impl SimulationStepper {
    pub fn new(
        ctx: &mut GpgpuContext,
        program: ProgramHandle,
        width: u32,
        height: u32,
        initial: &[f32],
        sampler: &str,
    ) -> Result<Self, GpuError> {
        ctx.bind_standard_geometry(program)?;
        let input = StateSlot::create(ctx, width, height, Some(initial))?;
        let output = StateSlot::create(ctx, width, height, None)?;
        log::debug!("Stepper over {width}x{height} state, sampler {sampler}");

        Ok(Self {
            program,
            slots: PingPong::new(input, output),
            width,
            height,
            sampler: sampler.to_string(),
            state: StepperState::Idle,
            steps: 0,
        })
    }

    /// Run one pass. On failure the slots stay unswapped and the stepper
    /// returns to `Idle`.
    pub fn step(&mut self, ctx: &mut GpgpuContext, params: &Uniforms) -> Result<(), GpuError> {
        let input = self.slots.input().texture;
        let output = self.slots.output().framebuffer;
        self.state = StepperState::Bound { input, output };

        let mut uniforms = params.clone();
        uniforms
            .set(self.sampler.as_str(), UniformValue::Texture(input))
            .set("width", UniformValue::Float(self.width as f32))
            .set("height", UniformValue::Float(self.height as f32));

        let result = ctx
            .set_uniforms(self.program, &uniforms)
            .and_then(|()| ctx.standard_render(self.program, RenderTarget::Framebuffer(output)));

        match result {
            Ok(()) => {
                self.state = StepperState::Rendered;
                self.slots.swap();
                self.steps += 1;
                Ok(())
            }
            Err(e) => {
                self.state = StepperState::Idle;
                Err(e)
            }
        }
    }

    /// Slot holding the latest state.
    pub fn current(&self) -> StateSlot {
        *self.slots.input()
    }

    pub fn slots(&self) -> &PingPong<StateSlot> {
        &self.slots
    }

    pub fn state(&self) -> StepperState {
        self.state
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Replace the latest state with `data`.
    pub fn upload(&mut self, ctx: &mut GpgpuContext, data: &[f32]) -> Result<(), GpuError> {
        let fresh = StateSlot::create(ctx, self.width, self.height, Some(data))?;
        let old = self.current();
        let output = *self.slots.output();
        ctx.destroy_texture(old.texture)?;
        self.slots = PingPong::new(fresh, output);
        self.state = StepperState::Idle;
        Ok(())
    }

    /// Release both state slots.
    pub fn destroy(self, ctx: &mut GpgpuContext) -> Result<(), GpuError> {
        for slot in self.slots.slots() {
            ctx.destroy_texture(slot.texture)?;
        }
        Ok(())
    }
}
