//! GPU Compute Backend
//!
//! A thin GPGPU layer over WebGPU (wgpu): float textures, framebuffers,
//! shader programs with named uniforms, and the ping-pong stepper built on
//! top of them.

mod context;
mod geometry;
mod preprocess;
mod presenter;
mod reflect;
mod simulation;
mod stepper;
mod uniforms;

pub use context::{
    FramebufferHandle, GpgpuContext, ProgramHandle, RenderTarget, ShaderHandle, TextureHandle,
};
pub use geometry::{STANDARD_QUAD, STANDARD_VERTEX_COUNT, StandardVertex};
pub use preprocess::{ShaderConstant, ShaderDefines};
pub use presenter::Presenter;
pub use reflect::{AttributeSlot, ShaderStage, UniformKind, UniformSlot};
pub use simulation::{GpuFlock, StepProgram};
pub use stepper::{PingPong, SimulationStepper, StateSlot, StepperState};
pub use uniforms::{MAX_TEXTURE_UNITS, TextureUnits, UniformValue, Uniforms};

/// Error type for GPU operations.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("GPU adapter does not support {0}")]
    Unsupported(String),

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    #[error("Shader compile failed with: {log}")]
    ShaderCompile { log: String },

    #[error("Program link failed with: {log}")]
    ProgramLink { log: String },

    #[error("Can not find binding {name}")]
    BindingNotFound { name: String },

    #[error("Uniform {name} expects {expected}, got {found}")]
    UniformTypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("More than {limit} textures bound to one program")]
    TextureUnitsExhausted { limit: usize },

    #[error("Sampler {name} has no texture bound")]
    UnboundTexture { name: String },

    #[error("Program has no standard geometry bound")]
    MissingGeometry,

    #[error("Texture bound to {name} is also the render target")]
    FeedbackLoop { name: String },

    #[error("Unknown or destroyed {0} handle")]
    InvalidHandle(&'static str),

    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    #[error(transparent)]
    Config(#[from] crate::schema::ConfigError),
}

impl GpuError {
    /// No usable GPU: either no adapter at all or one that can not run the
    /// simulation. Callers fall back to the CPU flock on these.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NoAdapter | Self::Unsupported(_))
    }
}
