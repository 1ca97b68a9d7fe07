//! GPGPU Context - Float textures, framebuffers and shader programs over wgpu.
//!
//! The context owns every GPU resource it creates and hands out small `Copy`
//! handles. Programs keep their own uniform blocks, texture-unit table and a
//! pipeline cache keyed by target format and topology.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use wgpu::util::DeviceExt;

use crate::schema::TextureUnitPolicy;

use super::geometry::{
    GeometryBinding, POSITION_ATTRIBUTE, STANDARD_QUAD, STANDARD_STRIDE, STANDARD_VERTEX_COUNT,
    TEXTURE_COORD_ATTRIBUTE,
};
use super::reflect::{self, BindingKind, ProgramInterface, StageInterface};
use super::{
    AttributeSlot, GpuError, ShaderDefines, ShaderStage, TextureUnits, UniformSlot, Uniforms,
};

const STANDARD_VERTEX_SHADER: &str = include_str!("shaders/standard.vert.wgsl");

/// Format of every simulation texture.
pub(crate) const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Bytes per RGBA float texel.
const STATE_TEXEL_BYTES: u32 = 16;
/// Format of the offscreen stand-in for the visible surface.
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u32);

/// Where a draw writes its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderTarget {
    /// The visible surface (or its offscreen stand-in).
    #[default]
    Screen,
    Framebuffer(FramebufferHandle),
}

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct ShaderEntry {
    module: wgpu::ShaderModule,
    interface: StageInterface,
}

struct UniformBlockState {
    buffer: wgpu::Buffer,
    data: Vec<u8>,
    dirty: bool,
}

struct ProgramEntry {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    interface: ProgramInterface,
    layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    blocks: Vec<UniformBlockState>,
    units: TextureUnits,
    geometry: Option<GeometryBinding>,
    pipelines: HashMap<(wgpu::TextureFormat, wgpu::PrimitiveTopology), wgpu::RenderPipeline>,
}

enum Screen {
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
        width: u32,
        height: u32,
    },
    #[cfg(target_arch = "wasm32")]
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        frame: Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
    },
}

/// Resolved color attachment for one draw.
struct TargetView {
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    texture: Option<TextureHandle>,
}

#[derive(Clone, Copy)]
enum DrawMode {
    Quad,
    Points(u32),
}

/// Row layout of a texture copied into a mappable buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadbackLayout {
    height: u32,
    row_bytes: u32,
    padded_row_bytes: u32,
}

impl ReadbackLayout {
    fn new(width: u32, height: u32, bytes_per_texel: u32) -> Self {
        let row_bytes = width * bytes_per_texel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row_bytes = row_bytes.div_ceil(align) * align;
        Self {
            height,
            row_bytes,
            padded_row_bytes,
        }
    }

    fn buffer_size(&self) -> u64 {
        self.padded_row_bytes as u64 * self.height as u64
    }

    /// Strip row padding.
    fn unpad(&self, padded: &[u8]) -> Vec<u8> {
        let row = self.row_bytes as usize;
        let stride = self.padded_row_bytes as usize;
        let mut out = Vec::with_capacity(row * self.height as usize);
        for y in 0..self.height as usize {
            out.extend_from_slice(&padded[y * stride..y * stride + row]);
        }
        out
    }
}

/// Thin GPGPU layer over a wgpu device.
pub struct GpgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    screen: Screen,
    quad: wgpu::Buffer,

    textures: HashMap<u32, TextureEntry>,
    framebuffers: HashMap<u32, TextureHandle>,
    shaders: HashMap<u32, ShaderEntry>,
    programs: HashMap<u32, ProgramEntry>,
    next_id: u32,

    unit_policy: TextureUnitPolicy,
    active_target: RenderTarget,
    device_lost: Arc<Mutex<Option<String>>>,
}

async fn request_adapter(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<wgpu::Adapter, GpuError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|_| GpuError::NoAdapter)?;

    let info = adapter.get_info();
    log::info!("Using GPU adapter {} ({:?})", info.name, info.backend);
    Ok(adapter)
}

async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("GPGPU Boids"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            ..Default::default()
        })
        .await?;
    Ok((device, queue))
}

/// The state format must be both renderable and sampleable. Downlevel
/// adapters (GL, WebGL2) commonly allow only sampling.
fn check_state_format(features: wgpu::TextureFormatFeatures) -> Result<(), GpuError> {
    let required = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    let missing = required.difference(features.allowed_usages);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(GpuError::Unsupported(format!(
            "{STATE_FORMAT:?} textures with {missing:?} usage"
        )))
    }
}

/// Run `f` inside a validation error scope and return what the scope caught.
fn validated<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> (T, Option<String>) {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    (value, scope_error(scope))
}

#[cfg(not(target_arch = "wasm32"))]
fn scope_error(scope: wgpu::ErrorScopeGuard) -> Option<String> {
    pollster::block_on(scope.pop()).map(|e| e.to_string())
}

/// The browser resolves scopes asynchronously; errors are logged when they
/// arrive.
#[cfg(target_arch = "wasm32")]
fn scope_error(scope: wgpu::ErrorScopeGuard) -> Option<String> {
    let pending = scope.pop();
    wasm_bindgen_futures::spawn_local(async move {
        if let Some(e) = pending.await {
            log::error!("GPU validation error: {e}");
        }
    });
    None
}

impl GpgpuContext {
    /// Create a context rendering to an offscreen surface of the given size.
    pub async fn new_headless(surface_width: u32, surface_height: u32) -> Result<Self, GpuError> {
        if surface_width == 0 || surface_height == 0 {
            return Err(GpuError::ResourceCreation(format!(
                "invalid surface size {surface_width}x{surface_height}"
            )));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = request_adapter(&instance, None).await?;
        check_state_format(adapter.get_texture_format_features(STATE_FORMAT))?;
        let (device, queue) = request_device(&adapter).await?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Surface"),
            size: wgpu::Extent3d {
                width: surface_width,
                height: surface_height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self::with_screen(
            device,
            queue,
            Screen::Offscreen {
                texture,
                view,
                width: surface_width,
                height: surface_height,
            },
        ))
    }

    /// Create a context presenting to a browser canvas.
    ///
    /// The canvas width and height must be set before calling.
    #[cfg(target_arch = "wasm32")]
    pub async fn from_canvas(canvas: web_sys::HtmlCanvasElement) -> Result<Self, GpuError> {
        let width = canvas.width().max(1);
        let height = canvas.height().max(1);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas))
            .map_err(|e| GpuError::ResourceCreation(e.to_string()))?;

        let adapter = request_adapter(&instance, Some(&surface)).await?;
        check_state_format(adapter.get_texture_format_features(STATE_FORMAT))?;
        let caps = surface.get_capabilities(&adapter);
        let (device, queue) = request_device(&adapter).await?;

        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .unwrap_or(wgpu::TextureFormat::Bgra8Unorm);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        Ok(Self::with_screen(
            device,
            queue,
            Screen::Surface {
                surface,
                config,
                frame: None,
            },
        ))
    }

    fn with_screen(device: wgpu::Device, queue: wgpu::Queue, screen: Screen) -> Self {
        let device_lost = Arc::new(Mutex::new(None));
        let flag = Arc::clone(&device_lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("GPU device lost ({reason:?}): {message}");
            if let Ok(mut lost) = flag.lock() {
                *lost = Some(format!("{reason:?} {message}").trim_end().to_string());
            }
        });

        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Standard Quad"),
            contents: bytemuck::cast_slice(&STANDARD_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            device,
            queue,
            screen,
            quad,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            next_id: 1,
            unit_policy: TextureUnitPolicy::default(),
            active_target: RenderTarget::Screen,
            device_lost,
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Fail with `DeviceLost` once the device is gone.
    pub fn check_device(&self) -> Result<(), GpuError> {
        match self.device_lost.lock() {
            Ok(lost) => match lost.as_ref() {
                Some(message) => Err(GpuError::DeviceLost(message.clone())),
                None => Ok(()),
            },
            Err(_) => Err(GpuError::DeviceLost("device state poisoned".to_string())),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Size of the visible surface in pixels.
    pub fn screen_size(&self) -> (u32, u32) {
        match &self.screen {
            Screen::Offscreen { width, height, .. } => (*width, *height),
            #[cfg(target_arch = "wasm32")]
            Screen::Surface { config, .. } => (config.width, config.height),
        }
    }

    /// Texture-unit policy applied to programs compiled from now on.
    pub fn set_texture_unit_policy(&mut self, policy: TextureUnitPolicy) {
        self.unit_policy = policy;
    }

    /// Target of the most recent draw or clear.
    pub fn active_target(&self) -> RenderTarget {
        self.active_target
    }

    // ---------------------------------------------------------------------
    // Textures and framebuffers
    // ---------------------------------------------------------------------

    /// Allocate an RGBA float texture, optionally filled with `initial_data`.
    pub fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        initial_data: Option<&[f32]>,
    ) -> Result<TextureHandle, GpuError> {
        self.check_device()?;

        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(GpuError::ResourceCreation(format!(
                "invalid texture size {width}x{height} (max {max})"
            )));
        }
        if let Some(data) = initial_data {
            let expected = 4 * width as usize * height as usize;
            if data.len() != expected {
                return Err(GpuError::ResourceCreation(format!(
                    "texture data has {} floats, expected {expected}",
                    data.len()
                )));
            }
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let (texture, error) = validated(&self.device, || {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("State Texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: STATE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        });
        if let Some(error) = error {
            return Err(GpuError::ResourceCreation(error));
        }

        if let Some(data) = initial_data {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(data),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(STATE_TEXEL_BYTES * width),
                    rows_per_image: Some(height),
                },
                size,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = self.next_id();
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                view,
                width,
                height,
            },
        );
        log::debug!("Created {width}x{height} texture #{id}");
        Ok(TextureHandle(id))
    }

    pub fn texture_size(&self, texture: TextureHandle) -> Result<(u32, u32), GpuError> {
        self.textures
            .get(&texture.0)
            .map(|t| (t.width, t.height))
            .ok_or(GpuError::InvalidHandle("texture"))
    }

    /// Bind `texture` as the color target of a new framebuffer.
    ///
    /// Resets the active render target to the screen.
    pub fn create_framebuffer(
        &mut self,
        texture: TextureHandle,
    ) -> Result<FramebufferHandle, GpuError> {
        self.check_device()?;
        if !self.textures.contains_key(&texture.0) {
            return Err(GpuError::InvalidHandle("texture"));
        }

        let id = self.next_id();
        self.framebuffers.insert(id, texture);
        self.active_target = RenderTarget::Screen;
        log::debug!("Created framebuffer #{id} over texture #{}", texture.0);
        Ok(FramebufferHandle(id))
    }

    pub fn framebuffer_texture(
        &self,
        framebuffer: FramebufferHandle,
    ) -> Result<TextureHandle, GpuError> {
        self.framebuffers
            .get(&framebuffer.0)
            .copied()
            .ok_or(GpuError::InvalidHandle("framebuffer"))
    }

    /// Destroy a texture along with every framebuffer that targets it.
    pub fn destroy_texture(&mut self, texture: TextureHandle) -> Result<(), GpuError> {
        let entry = self
            .textures
            .remove(&texture.0)
            .ok_or(GpuError::InvalidHandle("texture"))?;
        entry.texture.destroy();

        self.framebuffers.retain(|_, t| *t != texture);
        for program in self.programs.values_mut() {
            program.units.release(texture);
        }
        if let RenderTarget::Framebuffer(fb) = self.active_target {
            if !self.framebuffers.contains_key(&fb.0) {
                self.active_target = RenderTarget::Screen;
            }
        }
        Ok(())
    }

    pub fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) -> Result<(), GpuError> {
        self.framebuffers
            .remove(&framebuffer.0)
            .ok_or(GpuError::InvalidHandle("framebuffer"))?;
        if self.active_target == RenderTarget::Framebuffer(framebuffer) {
            self.active_target = RenderTarget::Screen;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Shaders and programs
    // ---------------------------------------------------------------------

    /// Compile one WGSL stage.
    pub fn compile_shader(
        &mut self,
        source: &str,
        stage: ShaderStage,
    ) -> Result<ShaderHandle, GpuError> {
        self.check_device()?;
        let interface = reflect::compile(source, stage)?;
        interface.check_limits(&self.device.limits())?;
        let (module, error) = validated(&self.device, || {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(stage.name()),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });
        if let Some(log) = error {
            return Err(GpuError::ShaderCompile { log });
        }

        let id = self.next_id();
        self.shaders.insert(id, ShaderEntry { module, interface });
        log::debug!("Compiled {} shader #{id}", stage.name());
        Ok(ShaderHandle(id))
    }

    /// Substitute `defines` into `source`, then compile it.
    pub fn compile_shader_with(
        &mut self,
        source: &str,
        stage: ShaderStage,
        defines: &ShaderDefines,
    ) -> Result<ShaderHandle, GpuError> {
        let source = defines.apply(source)?;
        self.compile_shader(&source, stage)
    }

    pub fn compile_vertex_shader(&mut self, source: &str) -> Result<ShaderHandle, GpuError> {
        self.compile_shader(source, ShaderStage::Vertex)
    }

    pub fn compile_fragment_shader(&mut self, source: &str) -> Result<ShaderHandle, GpuError> {
        self.compile_shader(source, ShaderStage::Fragment)
    }

    /// The built-in vertex stage for the standard quad.
    ///
    /// Reads `position` and `textureCoord`, writes `vTextureCoord` at location 0.
    pub fn standard_vertex_shader(&mut self) -> Result<ShaderHandle, GpuError> {
        self.compile_vertex_shader(STANDARD_VERTEX_SHADER)
    }

    pub fn destroy_shader(&mut self, shader: ShaderHandle) -> Result<(), GpuError> {
        self.shaders
            .remove(&shader.0)
            .map(|_| ())
            .ok_or(GpuError::InvalidHandle("shader"))
    }

    /// Link a vertex and a fragment stage into a program.
    pub fn compile_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, GpuError> {
        self.check_device()?;
        let vs = self
            .shaders
            .get(&vertex.0)
            .ok_or(GpuError::InvalidHandle("shader"))?;
        let fs = self
            .shaders
            .get(&fragment.0)
            .ok_or(GpuError::InvalidHandle("shader"))?;
        let interface = reflect::link(&vs.interface, &fs.interface, &self.device.limits())?;

        let ((layouts, pipeline_layout), error) =
            validated(&self.device, || create_layouts(&self.device, &interface));
        if let Some(log) = error {
            return Err(GpuError::ProgramLink { log });
        }

        let blocks = interface
            .blocks
            .iter()
            .map(|block| {
                // Uniform bindings are sized in 16-byte units.
                let size = block.size.max(16).next_multiple_of(16);
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(block.name.as_str()),
                    size,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                UniformBlockState {
                    buffer,
                    data: vec![0; size as usize],
                    dirty: true,
                }
            })
            .collect();

        let entry = ProgramEntry {
            vertex: vs.module.clone(),
            fragment: fs.module.clone(),
            interface,
            layouts,
            pipeline_layout,
            blocks,
            units: TextureUnits::new(self.unit_policy),
            geometry: None,
            pipelines: HashMap::new(),
        };

        let id = self.next_id();
        self.programs.insert(id, entry);
        log::debug!("Linked program #{id}");
        Ok(ProgramHandle(id))
    }

    /// Destroy a program and its uniform state.
    pub fn destroy_program(&mut self, program: ProgramHandle) -> Result<(), GpuError> {
        self.programs
            .remove(&program.0)
            .map(|_| ())
            .ok_or(GpuError::InvalidHandle("program"))
    }

    fn program(&self, program: ProgramHandle) -> Result<&ProgramEntry, GpuError> {
        self.programs
            .get(&program.0)
            .ok_or(GpuError::InvalidHandle("program"))
    }

    fn program_mut(&mut self, program: ProgramHandle) -> Result<&mut ProgramEntry, GpuError> {
        self.programs
            .get_mut(&program.0)
            .ok_or(GpuError::InvalidHandle("program"))
    }

    pub fn attribute_location(
        &self,
        program: ProgramHandle,
        name: &str,
    ) -> Result<AttributeSlot, GpuError> {
        self.program(program)?.interface.attribute(name)
    }

    pub fn uniform_location(
        &self,
        program: ProgramHandle,
        name: &str,
    ) -> Result<UniformSlot, GpuError> {
        self.program(program)?.interface.uniform(name)
    }

    pub fn texture_units(&self, program: ProgramHandle) -> Result<&TextureUnits, GpuError> {
        Ok(&self.program(program)?.units)
    }

    // ---------------------------------------------------------------------
    // Binding
    // ---------------------------------------------------------------------

    /// Attach the standard quad layout to `program`.
    pub fn bind_standard_geometry(&mut self, program: ProgramHandle) -> Result<(), GpuError> {
        let entry = self.program_mut(program)?;
        let position = entry.interface.attribute(POSITION_ATTRIBUTE)?;
        let texture_coord = entry.interface.attribute(TEXTURE_COORD_ATTRIBUTE)?;
        entry.geometry = Some(GeometryBinding {
            position: position.location,
            texture_coord: texture_coord.location,
        });
        Ok(())
    }

    /// Store uniform values and assign textures to units.
    ///
    /// Every name is checked before anything is written.
    pub fn set_uniforms(
        &mut self,
        program: ProgramHandle,
        uniforms: &Uniforms,
    ) -> Result<(), GpuError> {
        self.check_device()?;
        for (_, texture) in uniforms.textures() {
            if !self.textures.contains_key(&texture.0) {
                return Err(GpuError::InvalidHandle("texture"));
            }
        }

        let entry = self
            .programs
            .get_mut(&program.0)
            .ok_or(GpuError::InvalidHandle("program"))?;

        let mut slots = Vec::with_capacity(uniforms.len());
        for (name, value) in uniforms.iter() {
            let slot = entry.interface.uniform(name)?;
            if slot.kind() != value.kind() {
                return Err(GpuError::UniformTypeMismatch {
                    name: name.to_string(),
                    expected: slot.kind().name(),
                    found: value.kind().name(),
                });
            }
            slots.push((slot, *value));
        }

        entry.units.bind(uniforms.textures())?;

        for (slot, value) in slots {
            if let UniformSlot::Value { block, offset, .. } = slot {
                let state = &mut entry.blocks[block];
                value.write_to(&mut state.data, offset as usize);
                state.dirty = true;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Drawing
    // ---------------------------------------------------------------------

    /// Draw the standard quad with `program` into `target`.
    pub fn standard_render(
        &mut self,
        program: ProgramHandle,
        target: RenderTarget,
    ) -> Result<(), GpuError> {
        self.draw(program, target, DrawMode::Quad)
    }

    /// Draw `count` points with `program`; the vertex stage positions them
    /// from `@builtin(vertex_index)`.
    pub fn render_points(
        &mut self,
        program: ProgramHandle,
        target: RenderTarget,
        count: u32,
    ) -> Result<(), GpuError> {
        self.draw(program, target, DrawMode::Points(count))
    }

    /// Fill `target` with `color`.
    pub fn clear(&mut self, target: RenderTarget, color: [f64; 4]) -> Result<(), GpuError> {
        self.check_device()?;
        let target_view = self.resolve_target(target)?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color[0],
                            g: color[1],
                            b: color[2],
                            a: color[3],
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.active_target = target;
        Ok(())
    }

    fn resolve_target(&mut self, target: RenderTarget) -> Result<TargetView, GpuError> {
        match target {
            RenderTarget::Framebuffer(fb) => {
                let texture = self.framebuffer_texture(fb)?;
                let entry = self
                    .textures
                    .get(&texture.0)
                    .ok_or(GpuError::InvalidHandle("texture"))?;
                Ok(TargetView {
                    view: entry.view.clone(),
                    format: STATE_FORMAT,
                    width: entry.width,
                    height: entry.height,
                    texture: Some(texture),
                })
            }
            RenderTarget::Screen => match &mut self.screen {
                Screen::Offscreen {
                    view,
                    width,
                    height,
                    ..
                } => Ok(TargetView {
                    view: view.clone(),
                    format: OFFSCREEN_FORMAT,
                    width: *width,
                    height: *height,
                    texture: None,
                }),
                #[cfg(target_arch = "wasm32")]
                Screen::Surface {
                    surface,
                    config,
                    frame,
                } => {
                    if frame.is_none() {
                        let texture = surface.get_current_texture()?;
                        let view = texture
                            .texture
                            .create_view(&wgpu::TextureViewDescriptor::default());
                        *frame = Some((texture, view));
                    }
                    let view = frame
                        .as_ref()
                        .map(|(_, view)| view.clone())
                        .ok_or(GpuError::InvalidHandle("surface frame"))?;
                    Ok(TargetView {
                        view,
                        format: config.format,
                        width: config.width,
                        height: config.height,
                        texture: None,
                    })
                }
            },
        }
    }

    fn draw(
        &mut self,
        program: ProgramHandle,
        target: RenderTarget,
        mode: DrawMode,
    ) -> Result<(), GpuError> {
        self.check_device()?;
        let target_view = self.resolve_target(target)?;

        let entry = self
            .programs
            .get_mut(&program.0)
            .ok_or(GpuError::InvalidHandle("program"))?;

        let (topology, vertex_count, geometry) = match mode {
            DrawMode::Quad => (
                wgpu::PrimitiveTopology::TriangleStrip,
                STANDARD_VERTEX_COUNT,
                Some(entry.geometry.ok_or(GpuError::MissingGeometry)?),
            ),
            DrawMode::Points(count) => {
                if entry.interface.attribute_count() > 0 {
                    return Err(GpuError::ResourceCreation(
                        "point draws take no vertex attributes".to_string(),
                    ));
                }
                (wgpu::PrimitiveTopology::PointList, count, None)
            }
        };

        let mut views = Vec::with_capacity(entry.interface.textures.len());
        for binding in &entry.interface.textures {
            let texture = entry.units.texture_for(&binding.name).ok_or_else(|| {
                GpuError::UnboundTexture {
                    name: binding.name.clone(),
                }
            })?;
            if target_view.texture == Some(texture) {
                return Err(GpuError::FeedbackLoop {
                    name: binding.name.clone(),
                });
            }
            let texture = self
                .textures
                .get(&texture.0)
                .ok_or(GpuError::InvalidHandle("texture"))?;
            views.push(texture.view.clone());
        }

        for block in &mut entry.blocks {
            if block.dirty {
                self.queue.write_buffer(&block.buffer, 0, &block.data);
                block.dirty = false;
            }
        }

        let key = (target_view.format, topology);
        if !entry.pipelines.contains_key(&key) {
            let (pipeline, error) = validated(&self.device, || {
                create_render_pipeline(&self.device, entry, target_view.format, topology, geometry)
            });
            if let Some(log) = error {
                return Err(GpuError::ProgramLink { log });
            }
            entry.pipelines.insert(key, pipeline);
        }
        let pipeline = entry
            .pipelines
            .get(&key)
            .ok_or(GpuError::InvalidHandle("pipeline"))?;

        let (bind_groups, error) = validated(&self.device, || {
            entry
                .interface
                .groups()
                .iter()
                .zip(&entry.layouts)
                .map(|(bindings, layout)| {
                    let entries: Vec<wgpu::BindGroupEntry> = bindings
                        .iter()
                        .map(|(binding, kind)| wgpu::BindGroupEntry {
                            binding: *binding,
                            resource: match kind {
                                BindingKind::Uniform { block } => {
                                    entry.blocks[*block].buffer.as_entire_binding()
                                }
                                BindingKind::Texture { texture } => {
                                    wgpu::BindingResource::TextureView(&views[*texture])
                                }
                            },
                        })
                        .collect();
                    self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Program Bind Group"),
                        layout,
                        entries: &entries,
                    })
                })
                .collect::<Vec<wgpu::BindGroup>>()
        });
        if let Some(error) = error {
            return Err(GpuError::ResourceCreation(error));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Draw Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Draw Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_viewport(
                0.0,
                0.0,
                target_view.width as f32,
                target_view.height as f32,
                0.0,
                1.0,
            );
            pass.set_pipeline(pipeline);
            for (index, group) in bind_groups.iter().enumerate() {
                pass.set_bind_group(index as u32, group, &[]);
            }
            if geometry.is_some() {
                pass.set_vertex_buffer(0, self.quad.slice(..));
            }
            pass.draw(0..vertex_count, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        self.active_target = target;
        Ok(())
    }

    /// End the frame, presenting the acquired surface texture if any.
    pub fn present(&mut self) {
        match &mut self.screen {
            Screen::Offscreen { .. } => {}
            #[cfg(target_arch = "wasm32")]
            Screen::Surface { frame, .. } => {
                if let Some((texture, _)) = frame.take() {
                    texture.present();
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Readback
    // ---------------------------------------------------------------------

    fn copy_to_staging(
        &self,
        texture: &wgpu::Texture,
        width: u32,
        height: u32,
        bytes_per_texel: u32,
    ) -> (wgpu::Buffer, ReadbackLayout) {
        let layout = ReadbackLayout::new(width, height, bytes_per_texel);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size: layout.buffer_size(),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(layout.padded_row_bytes),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        (staging, layout)
    }

    /// Synchronous map for native targets.
    #[cfg(not(target_arch = "wasm32"))]
    fn map_staging(
        &self,
        staging: &wgpu::Buffer,
        layout: ReadbackLayout,
    ) -> Result<Vec<u8>, GpuError> {
        let slice = staging.slice(..);

        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device.poll(wgpu::PollType::wait_indefinitely()).ok();
        rx.recv()
            .map_err(|_| GpuError::DeviceLost("readback callback dropped".to_string()))??;

        let bytes = layout.unpad(&slice.get_mapped_range());
        staging.unmap();
        Ok(bytes)
    }

    /// Async map for WASM; the browser drives the GPU.
    #[cfg(target_arch = "wasm32")]
    async fn map_staging_async(
        &self,
        staging: &wgpu::Buffer,
        layout: ReadbackLayout,
    ) -> Result<Vec<u8>, GpuError> {
        let slice = staging.slice(..);

        let (sender, receiver) = futures_channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        receiver
            .await
            .map_err(|_| GpuError::DeviceLost("readback callback dropped".to_string()))??;

        let bytes = layout.unpad(&slice.get_mapped_range());
        staging.unmap();
        Ok(bytes)
    }

    fn texture_for_readback(
        &self,
        texture: TextureHandle,
    ) -> Result<(wgpu::Buffer, ReadbackLayout), GpuError> {
        self.check_device()?;
        let entry = self
            .textures
            .get(&texture.0)
            .ok_or(GpuError::InvalidHandle("texture"))?;
        Ok(self.copy_to_staging(&entry.texture, entry.width, entry.height, STATE_TEXEL_BYTES))
    }

    fn screen_for_readback(&self) -> Result<(wgpu::Buffer, ReadbackLayout), GpuError> {
        self.check_device()?;
        match &self.screen {
            Screen::Offscreen {
                texture,
                width,
                height,
                ..
            } => Ok(self.copy_to_staging(texture, *width, *height, 4)),
            #[cfg(target_arch = "wasm32")]
            Screen::Surface { .. } => Err(GpuError::ResourceCreation(
                "canvas surface can not be read back".to_string(),
            )),
        }
    }

    /// Read a texture back as row-major RGBA floats (`4 * W * H` values).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn read_texture(&self, texture: TextureHandle) -> Result<Vec<f32>, GpuError> {
        let (staging, layout) = self.texture_for_readback(texture)?;
        let bytes = self.map_staging(&staging, layout)?;
        Ok(floats_from_bytes(&bytes))
    }

    #[cfg(target_arch = "wasm32")]
    pub async fn read_texture_async(&self, texture: TextureHandle) -> Result<Vec<f32>, GpuError> {
        let (staging, layout) = self.texture_for_readback(texture)?;
        let bytes = self.map_staging_async(&staging, layout).await?;
        Ok(floats_from_bytes(&bytes))
    }

    /// Read the offscreen surface back as RGBA8 (`4 * W * H` bytes).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn read_screen(&self) -> Result<Vec<u8>, GpuError> {
        let (staging, layout) = self.screen_for_readback()?;
        self.map_staging(&staging, layout)
    }
}

fn floats_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Bind group layouts for every group the program declares, and the
/// pipeline layout over them.
fn create_layouts(
    device: &wgpu::Device,
    interface: &ProgramInterface,
) -> (Vec<wgpu::BindGroupLayout>, wgpu::PipelineLayout) {
    let layouts: Vec<wgpu::BindGroupLayout> = interface
        .groups()
        .iter()
        .map(|bindings| {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
                .iter()
                .map(|(binding, kind)| wgpu::BindGroupLayoutEntry {
                    binding: *binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: match kind {
                        BindingKind::Uniform { .. } => wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        BindingKind::Texture { .. } => wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                    },
                    count: None,
                })
                .collect();
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Program Bind Group Layout"),
                entries: &entries,
            })
        })
        .collect();

    let layout_refs: Vec<&wgpu::BindGroupLayout> = layouts.iter().collect();
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Program Pipeline Layout"),
        bind_group_layouts: &layout_refs,
        ..Default::default()
    });
    (layouts, pipeline_layout)
}

fn create_render_pipeline(
    device: &wgpu::Device,
    program: &ProgramEntry,
    format: wgpu::TextureFormat,
    topology: wgpu::PrimitiveTopology,
    geometry: Option<GeometryBinding>,
) -> wgpu::RenderPipeline {
    let attributes = geometry.map(|g| g.attributes());
    let buffers: Vec<wgpu::VertexBufferLayout> = attributes
        .iter()
        .map(|attributes| wgpu::VertexBufferLayout {
            array_stride: STANDARD_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Program Pipeline"),
        layout: Some(&program.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &program.vertex,
            entry_point: Some(program.interface.vertex_entry.as_str()),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.fragment,
            entry_point: Some(program.interface.fragment_entry.as_str()),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::gpu::UniformValue;

    const IDENTITY_FS: &str = include_str!("shaders/identity.frag.wgsl");

    fn headless(width: u32, height: u32) -> Option<GpgpuContext> {
        match pollster::block_on(GpgpuContext::new_headless(width, height)) {
            Ok(ctx) => Some(ctx),
            Err(e) if e.is_unavailable() => {
                eprintln!("Skipping GPU test: {e}");
                None
            }
            Err(e) => panic!("Failed to create GPU context: {:?}", e),
        }
    }

    fn identity_program(ctx: &mut GpgpuContext) -> ProgramHandle {
        let vs = ctx.standard_vertex_shader().unwrap();
        let fs = ctx.compile_fragment_shader(IDENTITY_FS).unwrap();
        let program = ctx.compile_program(vs, fs).unwrap();
        ctx.bind_standard_geometry(program).unwrap();
        program
    }

    #[test]
    fn test_readback_layout_unpads_rows() {
        let layout = ReadbackLayout::new(3, 2, 4);
        assert_eq!(layout.row_bytes, 12);
        assert_eq!(layout.padded_row_bytes, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let stride = layout.padded_row_bytes as usize;
        let mut padded = vec![0xFFu8; stride * 2];
        padded[..12].copy_from_slice(&[1; 12]);
        padded[stride..stride + 12].copy_from_slice(&[2; 12]);

        let tight = layout.unpad(&padded);
        assert_eq!(tight.len(), 24);
        assert!(tight[..12].iter().all(|&b| b == 1));
        assert!(tight[12..].iter().all(|&b| b == 2));
    }

    #[test]
    fn test_clear_framebuffer_readback() {
        let Some(mut ctx) = headless(16, 16) else {
            return;
        };

        for (w, h) in [(1, 1), (3, 5), (64, 17)] {
            let texture = ctx.create_texture(w, h, None).unwrap();
            let fb = ctx.create_framebuffer(texture).unwrap();
            assert_eq!(ctx.active_target(), RenderTarget::Screen);

            ctx.clear(RenderTarget::Framebuffer(fb), [0.25, -1.0, 2.0, 1.0])
                .unwrap();
            let data = ctx.read_texture(texture).unwrap();

            assert_eq!(data.len(), 4 * (w * h) as usize);
            for texel in data.chunks_exact(4) {
                assert_eq!(texel, &[0.25, -1.0, 2.0, 1.0]);
            }
        }
    }

    #[test]
    fn test_initial_data_round_trip() {
        let Some(mut ctx) = headless(8, 8) else {
            return;
        };
        let data: Vec<f32> = (0..4 * 5 * 3).map(|i| i as f32 * 0.5 - 3.0).collect();
        let texture = ctx.create_texture(5, 3, Some(&data)).unwrap();
        assert_eq!(ctx.read_texture(texture).unwrap(), data);
    }

    #[test]
    fn test_texture_size_validation() {
        let Some(mut ctx) = headless(8, 8) else {
            return;
        };
        assert!(matches!(
            ctx.create_texture(0, 4, None),
            Err(GpuError::ResourceCreation(_))
        ));
        assert!(matches!(
            ctx.create_texture(2, 2, Some(&[0.0; 15])),
            Err(GpuError::ResourceCreation(_))
        ));
        let max = ctx.device().limits().max_texture_dimension_2d;
        assert!(ctx.create_texture(max + 1, 1, None).is_err());
    }

    #[test]
    fn test_invalid_fragment_shader_reports_log() {
        let Some(mut ctx) = headless(8, 8) else {
            return;
        };
        match ctx.compile_fragment_shader("@fragment fn fs_main() -> { nope }") {
            Err(GpuError::ShaderCompile { log }) => assert!(!log.is_empty()),
            other => panic!("expected compile error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_identity_copies_input() {
        let Some(mut ctx) = headless(8, 8) else {
            return;
        };
        let (w, h) = (7u32, 4u32);
        let data: Vec<f32> = (0..4 * w * h).map(|i| (i as f32).sin()).collect();
        let input = ctx.create_texture(w, h, Some(&data)).unwrap();
        let output = ctx.create_texture(w, h, None).unwrap();
        let fb = ctx.create_framebuffer(output).unwrap();
        let program = identity_program(&mut ctx);

        let uniforms = Uniforms::new()
            .texture("boidData", input)
            .float("width", w as f32)
            .float("height", h as f32);
        ctx.set_uniforms(program, &uniforms).unwrap();
        ctx.standard_render(program, RenderTarget::Framebuffer(fb))
            .unwrap();

        assert_eq!(ctx.active_target(), RenderTarget::Framebuffer(fb));
        assert_eq!(ctx.read_texture(output).unwrap(), data);
    }

    #[test]
    fn test_draw_errors() {
        let Some(mut ctx) = headless(8, 8) else {
            return;
        };
        let texture = ctx.create_texture(4, 4, None).unwrap();
        let fb = ctx.create_framebuffer(texture).unwrap();

        let vs = ctx.standard_vertex_shader().unwrap();
        let fs = ctx.compile_fragment_shader(IDENTITY_FS).unwrap();
        let program = ctx.compile_program(vs, fs).unwrap();

        assert!(matches!(
            ctx.standard_render(program, RenderTarget::Screen),
            Err(GpuError::MissingGeometry)
        ));

        ctx.bind_standard_geometry(program).unwrap();
        assert!(matches!(
            ctx.standard_render(program, RenderTarget::Screen),
            Err(GpuError::UnboundTexture { .. })
        ));

        ctx.set_uniforms(program, &Uniforms::new().texture("boidData", texture))
            .unwrap();
        assert!(matches!(
            ctx.standard_render(program, RenderTarget::Framebuffer(fb)),
            Err(GpuError::FeedbackLoop { .. })
        ));

        assert!(matches!(
            ctx.set_uniforms(program, &Uniforms::new().int("width", 4)),
            Err(GpuError::UniformTypeMismatch { .. })
        ));
        assert!(matches!(
            ctx.set_uniforms(
                program,
                &Uniforms::new().with("nope", UniformValue::Float(1.0))
            ),
            Err(GpuError::BindingNotFound { .. })
        ));
    }

    #[test]
    fn test_destroyed_handles_are_rejected() {
        let Some(mut ctx) = headless(8, 8) else {
            return;
        };
        let texture = ctx.create_texture(2, 2, None).unwrap();
        let fb = ctx.create_framebuffer(texture).unwrap();
        ctx.destroy_texture(texture).unwrap();

        assert!(matches!(
            ctx.read_texture(texture),
            Err(GpuError::InvalidHandle("texture"))
        ));
        assert!(matches!(
            ctx.clear(RenderTarget::Framebuffer(fb), [0.0; 4]),
            Err(GpuError::InvalidHandle(_))
        ));

        let program = identity_program(&mut ctx);
        ctx.destroy_program(program).unwrap();
        assert!(ctx.uniform_location(program, "width").is_err());
    }

    #[test]
    fn test_locations_resolve_by_name() {
        let Some(mut ctx) = headless(8, 8) else {
            return;
        };
        let program = identity_program(&mut ctx);
        assert!(ctx.attribute_location(program, "position").is_ok());
        assert!(matches!(
            ctx.attribute_location(program, "normal"),
            Err(GpuError::BindingNotFound { .. })
        ));
        assert!(matches!(
            ctx.uniform_location(program, "boidData"),
            Ok(UniformSlot::Texture { .. })
        ));
    }

    const THREE_SAMPLERS_FS: &str = r#"
        @group(0) @binding(0) var a: texture_2d<f32>;
        @group(0) @binding(1) var b: texture_2d<f32>;
        @group(0) @binding(2) var c: texture_2d<f32>;

        @fragment
        fn fs_main(@location(0) vTextureCoord: vec2<f32>) -> @location(0) vec4<f32> {
            let t = vec2<i32>(0, 0);
            return textureLoad(a, t, 0) + 10.0 * textureLoad(b, t, 0) + 100.0 * textureLoad(c, t, 0);
        }
    "#;

    /// Bind {a, b} in one call and {c} in the next, then read what `a` saw.
    fn sampled_sum(policy: TextureUnitPolicy) -> Option<f32> {
        let mut ctx = headless(4, 4)?;
        ctx.set_texture_unit_policy(policy);

        let ones = ctx.create_texture(1, 1, Some(&[1.0; 4])).unwrap();
        let twos = ctx.create_texture(1, 1, Some(&[2.0; 4])).unwrap();
        let threes = ctx.create_texture(1, 1, Some(&[3.0; 4])).unwrap();
        let output = ctx.create_texture(1, 1, None).unwrap();
        let fb = ctx.create_framebuffer(output).unwrap();

        let vs = ctx.standard_vertex_shader().unwrap();
        let fs = ctx.compile_fragment_shader(THREE_SAMPLERS_FS).unwrap();
        let program = ctx.compile_program(vs, fs).unwrap();
        ctx.bind_standard_geometry(program).unwrap();

        ctx.set_uniforms(program, &Uniforms::new().texture("a", ones).texture("b", twos))
            .unwrap();
        ctx.set_uniforms(program, &Uniforms::new().texture("c", threes))
            .unwrap();
        ctx.standard_render(program, RenderTarget::Framebuffer(fb))
            .unwrap();

        Some(ctx.read_texture(output).unwrap()[0])
    }

    #[test]
    fn test_counting_policy_aliases_first_sampler() {
        let Some(sum) = sampled_sum(TextureUnitPolicy::Counting) else {
            return;
        };
        // `a` shares unit 0 with `c` and reads 3.0.
        assert_eq!(sum, 3.0 + 20.0 + 300.0);
    }

    #[test]
    fn test_cached_policy_keeps_units() {
        let Some(sum) = sampled_sum(TextureUnitPolicy::Cached) else {
            return;
        };
        assert_eq!(sum, 1.0 + 20.0 + 300.0);
    }

    #[test]
    fn test_state_format_needs_render_and_sample_usage() {
        let downlevel = wgpu::TextureFormatFeatures {
            allowed_usages: wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING,
            flags: wgpu::TextureFormatFeatureFlags::empty(),
        };
        match check_state_format(downlevel) {
            Err(e @ GpuError::Unsupported(_)) => {
                assert!(e.is_unavailable());
                assert!(e.to_string().contains("RENDER_ATTACHMENT"));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let full = wgpu::TextureFormatFeatures {
            allowed_usages: downlevel.allowed_usages | wgpu::TextureUsages::RENDER_ATTACHMENT,
            flags: wgpu::TextureFormatFeatureFlags::empty(),
        };
        assert!(check_state_format(full).is_ok());
    }

    #[test]
    fn test_group_beyond_device_limit_is_compile_error() {
        let Some(mut ctx) = headless(4, 4) else {
            return;
        };
        let group = ctx.device().limits().max_bind_groups;
        let src = format!(
            "@group({group}) @binding(0) var<uniform> tint: vec4<f32>;
            @fragment
            fn main() -> @location(0) vec4<f32> {{ return tint; }}"
        );

        match ctx.compile_fragment_shader(&src) {
            Err(GpuError::ShaderCompile { log }) => {
                assert!(log.contains(&format!("@group({group})")))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_operations_fail_after_device_loss() {
        let Some(mut ctx) = headless(4, 4) else {
            return;
        };
        let program = identity_program(&mut ctx);
        let input = ctx.create_texture(2, 2, None).unwrap();
        ctx.set_uniforms(program, &Uniforms::new().texture("boidData", input))
            .unwrap();
        ctx.device().poll(wgpu::PollType::wait_indefinitely()).ok();

        ctx.device().destroy();
        ctx.device().poll(wgpu::PollType::Poll).ok();

        assert!(matches!(
            ctx.create_texture(2, 2, None),
            Err(GpuError::DeviceLost(_))
        ));
        assert!(matches!(
            ctx.standard_render(program, RenderTarget::Screen),
            Err(GpuError::DeviceLost(_))
        ));
        assert!(matches!(
            ctx.compile_fragment_shader(IDENTITY_FS),
            Err(GpuError::DeviceLost(_))
        ));
    }
}
