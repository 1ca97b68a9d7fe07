//! Presenter - draws the latest state to the visible surface.

use crate::schema::PresentationMode;

use super::simulation::STATE_SAMPLER;
use super::{GpgpuContext, GpuError, ProgramHandle, RenderTarget, TextureHandle, Uniforms};

const POINTS_SHADER: &str = include_str!("shaders/present_points.wgsl");
const FIELD_SHADER: &str = include_str!("shaders/present_field.frag.wgsl");

pub struct Presenter {
    mode: PresentationMode,
    program: ProgramHandle,
    max_speed: f32,
}

impl Presenter {
    pub fn new(
        ctx: &mut GpgpuContext,
        mode: PresentationMode,
        max_speed: f32,
    ) -> Result<Self, GpuError> {
        let program = match mode {
            PresentationMode::Points => {
                let vs = ctx.compile_vertex_shader(POINTS_SHADER)?;
                let fs = ctx.compile_fragment_shader(POINTS_SHADER)?;
                ctx.compile_program(vs, fs)?
            }
            PresentationMode::Field => {
                let vs = ctx.standard_vertex_shader()?;
                let fs = ctx.compile_fragment_shader(FIELD_SHADER)?;
                let program = ctx.compile_program(vs, fs)?;
                ctx.bind_standard_geometry(program)?;
                program
            }
        };

        Ok(Self {
            mode,
            program,
            max_speed,
        })
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    /// Clear the screen to black and draw `state` on it.
    pub fn present(&self, ctx: &mut GpgpuContext, state: TextureHandle) -> Result<(), GpuError> {
        let (width, height) = ctx.texture_size(state)?;
        ctx.clear(RenderTarget::Screen, [0.0, 0.0, 0.0, 1.0])?;

        let uniforms = Uniforms::new()
            .texture(STATE_SAMPLER, state)
            .float("width", width as f32)
            .float("maxSpeed", self.max_speed);

        match self.mode {
            PresentationMode::Points => {
                ctx.set_uniforms(self.program, &uniforms)?;
                ctx.render_points(self.program, RenderTarget::Screen, width * height)
            }
            PresentationMode::Field => {
                ctx.set_uniforms(self.program, &uniforms.float("height", height as f32))?;
                ctx.standard_render(self.program, RenderTarget::Screen)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_pixels(ctx: &GpgpuContext) -> usize {
        ctx.read_screen()
            .unwrap()
            .chunks_exact(4)
            .filter(|px| px[0] > 0 || px[1] > 0 || px[2] > 0)
            .count()
    }

    #[test]
    fn test_points_and_field_draw_to_screen() {
        let mut ctx = match pollster::block_on(GpgpuContext::new_headless(32, 32)) {
            Ok(ctx) => ctx,
            Err(e) if e.is_unavailable() => {
                eprintln!("Skipping GPU test: {e}");
                return;
            }
            Err(e) => panic!("Failed to create GPU context: {:?}", e),
        };

        // Two boids near the center, one moving.
        let data = [0.1, 0.1, 0.0, 0.0, -0.1, -0.1, 0.3, 0.0];
        let state = ctx.create_texture(2, 1, Some(&data)).unwrap();

        let points = Presenter::new(&mut ctx, PresentationMode::Points, 0.5).unwrap();
        points.present(&mut ctx, state).unwrap();
        let lit = lit_pixels(&ctx);
        assert!(lit > 0 && lit <= 2, "expected one pixel per boid, got {lit}");

        let field = Presenter::new(&mut ctx, PresentationMode::Field, 0.5).unwrap();
        field.present(&mut ctx, state).unwrap();
        assert_eq!(lit_pixels(&ctx), 32 * 32);
        assert_eq!(ctx.active_target(), RenderTarget::Screen);
    }
}
