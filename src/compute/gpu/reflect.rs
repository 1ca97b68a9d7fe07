//! Shader reflection - WGSL parsing, validation and interface matching.
//!
//! wgpu reports shader problems asynchronously through its error sink. Running
//! naga up front turns them into synchronous `ShaderCompile` / `ProgramLink`
//! errors with a readable log, and gives us the names, locations and byte
//! offsets needed to resolve attributes and uniforms by name.

use std::collections::{BTreeMap, HashMap};

use naga::{AddressSpace, Binding, ImageClass, ImageDimension, ScalarKind, TypeInner, VectorSize};

use super::GpuError;

/// Pipeline stage of a single shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn naga(self) -> naga::ShaderStage {
        match self {
            Self::Vertex => naga::ShaderStage::Vertex,
            Self::Fragment => naga::ShaderStage::Fragment,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

/// Type of a uniform as declared in WGSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    UInt,
    Vec2,
    Vec3,
    Vec4,
    Texture,
}

impl UniformKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Float => "f32",
            Self::Int => "i32",
            Self::UInt => "u32",
            Self::Vec2 => "vec2<f32>",
            Self::Vec3 => "vec3<f32>",
            Self::Vec4 => "vec4<f32>",
            Self::Texture => "texture_2d<f32>",
        }
    }

    /// Bytes occupied in a uniform block.
    pub fn size(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::UInt => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
            Self::Texture => 0,
        }
    }

    fn from_inner(inner: &TypeInner) -> Option<Self> {
        match *inner {
            TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
                ScalarKind::Float => Some(Self::Float),
                ScalarKind::Sint => Some(Self::Int),
                ScalarKind::Uint => Some(Self::UInt),
                _ => None,
            },
            TypeInner::Vector { size, scalar }
                if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
            {
                Some(match size {
                    VectorSize::Bi => Self::Vec2,
                    VectorSize::Tri => Self::Vec3,
                    VectorSize::Quad => Self::Vec4,
                })
            }
            _ => None,
        }
    }
}

/// Resolved vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSlot {
    /// `@location` in the vertex stage.
    pub location: u32,
    /// Number of components (1-4).
    pub components: u32,
}

/// Resolved uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformSlot {
    /// Member of a uniform block.
    Value {
        block: usize,
        offset: u32,
        kind: UniformKind,
    },
    /// Sampled texture binding.
    Texture { texture: usize },
}

impl UniformSlot {
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::Value { kind, .. } => *kind,
            Self::Texture { .. } => UniformKind::Texture,
        }
    }
}

/// Shape of an inter-stage value: scalar kind and component count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IoType {
    kind: ScalarKind,
    width: u8,
    components: u32,
}

impl IoType {
    fn from_inner(inner: &TypeInner) -> Option<Self> {
        match *inner {
            TypeInner::Scalar(scalar) => Some(Self {
                kind: scalar.kind,
                width: scalar.width,
                components: 1,
            }),
            TypeInner::Vector { size, scalar } => Some(Self {
                kind: scalar.kind,
                width: scalar.width,
                components: match size {
                    VectorSize::Bi => 2,
                    VectorSize::Tri => 3,
                    VectorSize::Quad => 4,
                },
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Varying {
    name: String,
    location: u32,
    ty: IoType,
}

/// A `var<uniform>` declaration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UniformBlock {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    /// Size in bytes as laid out by WGSL.
    pub size: u64,
    pub members: Vec<(String, u32, UniformKind)>,
}

/// A `texture_2d<f32>` declaration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextureBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
}

/// Reflected interface of one compiled stage.
#[derive(Debug, Clone)]
pub(crate) struct StageInterface {
    pub stage: ShaderStage,
    pub entry_point: String,
    inputs: Vec<Varying>,
    outputs: Vec<Varying>,
    writes_position: bool,
    blocks: Vec<UniformBlock>,
    textures: Vec<TextureBinding>,
    unsupported: Vec<String>,
}

/// Parse and validate `source`, then reflect the entry point for `stage`.
pub(crate) fn compile(source: &str, stage: ShaderStage) -> Result<StageInterface, GpuError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| GpuError::ShaderCompile {
        log: e.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| GpuError::ShaderCompile {
        log: e.as_inner().to_string(),
    })?;

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage.naga())
        .ok_or_else(|| GpuError::ShaderCompile {
            log: format!("no @{} entry point in module", stage.name()),
        })?;

    let mut interface = StageInterface {
        stage,
        entry_point: entry.name.clone(),
        inputs: Vec::new(),
        outputs: Vec::new(),
        writes_position: false,
        blocks: Vec::new(),
        textures: Vec::new(),
        unsupported: Vec::new(),
    };

    let mut input_builtins = false;
    for arg in &entry.function.arguments {
        collect_io(
            &module,
            arg.ty,
            arg.binding.as_ref(),
            arg.name.as_deref(),
            &mut interface.inputs,
            &mut input_builtins,
        );
    }
    if let Some(result) = &entry.function.result {
        let mut writes_position = false;
        collect_io(
            &module,
            result.ty,
            result.binding.as_ref(),
            None,
            &mut interface.outputs,
            &mut writes_position,
        );
        interface.writes_position = writes_position;
    }

    for (_, var) in module.global_variables.iter() {
        let Some(rb) = &var.binding else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();
        let inner = &module.types[var.ty].inner;
        match var.space {
            AddressSpace::Uniform => match inner {
                TypeInner::Struct { members, span } => {
                    let mut block = UniformBlock {
                        name: name.clone(),
                        group: rb.group,
                        binding: rb.binding,
                        size: *span as u64,
                        members: Vec::with_capacity(members.len()),
                    };
                    for member in members {
                        let member_name = member.name.clone().unwrap_or_default();
                        match UniformKind::from_inner(&module.types[member.ty].inner) {
                            Some(kind) => block.members.push((member_name, member.offset, kind)),
                            None => interface
                                .unsupported
                                .push(format!("uniform member {name}.{member_name}")),
                        }
                    }
                    interface.blocks.push(block);
                }
                other => match UniformKind::from_inner(other) {
                    Some(kind) => interface.blocks.push(UniformBlock {
                        name: name.clone(),
                        group: rb.group,
                        binding: rb.binding,
                        size: kind.size() as u64,
                        members: vec![(name, 0, kind)],
                    }),
                    None => interface.unsupported.push(format!("uniform {name}")),
                },
            },
            AddressSpace::Handle => match inner {
                TypeInner::Image {
                    dim: ImageDimension::D2,
                    arrayed: false,
                    class:
                        ImageClass::Sampled {
                            kind: ScalarKind::Float,
                            multi: false,
                        },
                } => interface.textures.push(TextureBinding {
                    name,
                    group: rb.group,
                    binding: rb.binding,
                }),
                _ => interface.unsupported.push(format!("resource {name}")),
            },
            _ => interface.unsupported.push(format!("resource {name}")),
        }
    }

    Ok(interface)
}

impl StageInterface {
    /// Check bind group and binding indices against the device limits.
    ///
    /// naga validates without a device, so these would otherwise only
    /// surface as wgpu validation errors.
    pub(crate) fn check_limits(&self, limits: &wgpu::Limits) -> Result<(), GpuError> {
        let bindings = self
            .blocks
            .iter()
            .map(|b| (b.name.as_str(), b.group, b.binding))
            .chain(
                self.textures
                    .iter()
                    .map(|t| (t.name.as_str(), t.group, t.binding)),
            );
        let problems = binding_problems(bindings, limits);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(GpuError::ShaderCompile {
                log: problems.join("\n"),
            })
        }
    }
}

fn binding_problems<'a>(
    bindings: impl Iterator<Item = (&'a str, u32, u32)>,
    limits: &wgpu::Limits,
) -> Vec<String> {
    let mut problems = Vec::new();
    for (name, group, binding) in bindings {
        if group >= limits.max_bind_groups {
            problems.push(format!(
                "{name} uses @group({group}), device allows {} bind groups",
                limits.max_bind_groups
            ));
        }
        if binding >= limits.max_bindings_per_bind_group {
            problems.push(format!(
                "{name} uses @binding({binding}), device allows {} bindings per group",
                limits.max_bindings_per_bind_group
            ));
        }
    }
    problems
}

fn collect_io(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    name: Option<&str>,
    out: &mut Vec<Varying>,
    writes_position: &mut bool,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            if let Some(io) = IoType::from_inner(&module.types[ty].inner) {
                out.push(Varying {
                    name: name.unwrap_or_default().to_string(),
                    location: *location,
                    ty: io,
                });
            }
        }
        Some(Binding::BuiltIn(builtin)) => {
            if matches!(builtin, naga::BuiltIn::Position { .. }) {
                *writes_position = true;
            }
        }
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_io(
                        module,
                        member.ty,
                        member.binding.as_ref(),
                        member.name.as_deref(),
                        out,
                        writes_position,
                    );
                }
            }
        }
    }
}

/// Resource declarations of a linked program, plus the name lookup table.
#[derive(Debug, Clone)]
pub(crate) struct ProgramInterface {
    pub vertex_entry: String,
    pub fragment_entry: String,
    attributes: Vec<Varying>,
    pub blocks: Vec<UniformBlock>,
    pub textures: Vec<TextureBinding>,
    uniforms: HashMap<String, UniformSlot>,
}

/// Binding kind used to build bind group layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindingKind {
    Uniform { block: usize },
    Texture { texture: usize },
}

/// Match the vertex outputs against the fragment inputs and merge resources.
pub(crate) fn link(
    vertex: &StageInterface,
    fragment: &StageInterface,
    limits: &wgpu::Limits,
) -> Result<ProgramInterface, GpuError> {
    let mut problems = Vec::new();

    if vertex.stage != ShaderStage::Vertex {
        problems.push("first shader is not a vertex stage".to_string());
    }
    if fragment.stage != ShaderStage::Fragment {
        problems.push("second shader is not a fragment stage".to_string());
    }
    if !vertex.writes_position {
        problems.push("vertex stage does not write @builtin(position)".to_string());
    }
    if !fragment.outputs.iter().any(|o| o.location == 0) {
        problems.push("fragment stage has no output at @location(0)".to_string());
    }

    for input in &fragment.inputs {
        match vertex.outputs.iter().find(|o| o.location == input.location) {
            Some(output) if output.ty == input.ty => {}
            Some(output) => problems.push(format!(
                "fragment input {} at @location({}) does not match vertex output {}",
                input.name, input.location, output.name
            )),
            None => problems.push(format!(
                "fragment input {} at @location({}) is not written by the vertex stage",
                input.name, input.location
            )),
        }
    }

    for item in vertex.unsupported.iter().chain(&fragment.unsupported) {
        problems.push(format!("unsupported {item}"));
    }

    // (group, binding) -> description, shared between stages.
    let mut slots: BTreeMap<(u32, u32), String> = BTreeMap::new();
    let mut blocks: Vec<UniformBlock> = Vec::new();
    let mut textures: Vec<TextureBinding> = Vec::new();

    for block in vertex.blocks.iter().chain(&fragment.blocks) {
        let key = (block.group, block.binding);
        match blocks.iter().find(|b| (b.group, b.binding) == key) {
            Some(existing) if existing == block => continue,
            Some(existing) => problems.push(format!(
                "uniform {} conflicts with {} at @group({}) @binding({})",
                block.name, existing.name, key.0, key.1
            )),
            None => {
                if let Some(other) = slots.insert(key, block.name.clone()) {
                    problems.push(format!(
                        "uniform {} conflicts with {} at @group({}) @binding({})",
                        block.name, other, key.0, key.1
                    ));
                }
                blocks.push(block.clone());
            }
        }
    }
    for texture in vertex.textures.iter().chain(&fragment.textures) {
        let key = (texture.group, texture.binding);
        if textures.contains(texture) {
            continue;
        }
        if let Some(other) = slots.insert(key, texture.name.clone()) {
            problems.push(format!(
                "texture {} conflicts with {} at @group({}) @binding({})",
                texture.name, other, key.0, key.1
            ));
        }
        textures.push(texture.clone());
    }

    // Every resource is visible to both stages.
    problems.extend(binding_problems(
        blocks
            .iter()
            .map(|b| (b.name.as_str(), b.group, b.binding))
            .chain(textures.iter().map(|t| (t.name.as_str(), t.group, t.binding))),
        limits,
    ));
    if blocks.len() as u32 > limits.max_uniform_buffers_per_shader_stage {
        problems.push(format!(
            "{} uniform buffers, device allows {} per stage",
            blocks.len(),
            limits.max_uniform_buffers_per_shader_stage
        ));
    }
    if textures.len() as u32 > limits.max_sampled_textures_per_shader_stage {
        problems.push(format!(
            "{} textures, device allows {} per stage",
            textures.len(),
            limits.max_sampled_textures_per_shader_stage
        ));
    }

    let mut uniforms = HashMap::new();
    for (index, block) in blocks.iter().enumerate() {
        for (name, offset, kind) in &block.members {
            let slot = UniformSlot::Value {
                block: index,
                offset: *offset,
                kind: *kind,
            };
            if uniforms.insert(name.clone(), slot).is_some() {
                problems.push(format!("uniform name {name} is declared more than once"));
            }
        }
    }
    for (index, texture) in textures.iter().enumerate() {
        let slot = UniformSlot::Texture { texture: index };
        if uniforms.insert(texture.name.clone(), slot).is_some() {
            problems.push(format!("uniform name {} is declared more than once", texture.name));
        }
    }

    if !problems.is_empty() {
        return Err(GpuError::ProgramLink {
            log: problems.join("\n"),
        });
    }

    Ok(ProgramInterface {
        vertex_entry: vertex.entry_point.clone(),
        fragment_entry: fragment.entry_point.clone(),
        attributes: vertex.inputs.clone(),
        blocks,
        textures,
        uniforms,
    })
}

impl ProgramInterface {
    pub fn attribute(&self, name: &str) -> Result<AttributeSlot, GpuError> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| AttributeSlot {
                location: a.location,
                components: a.ty.components,
            })
            .ok_or_else(|| GpuError::BindingNotFound {
                name: name.to_string(),
            })
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn uniform(&self, name: &str) -> Result<UniformSlot, GpuError> {
        self.uniforms
            .get(name)
            .copied()
            .ok_or_else(|| GpuError::BindingNotFound {
                name: name.to_string(),
            })
    }

    /// Bindings grouped by bind group index, covering `0..=max_group`.
    pub fn groups(&self) -> Vec<Vec<(u32, BindingKind)>> {
        let max_group = self
            .blocks
            .iter()
            .map(|b| b.group)
            .chain(self.textures.iter().map(|t| t.group))
            .max();
        let Some(max_group) = max_group else {
            return Vec::new();
        };

        let mut groups = vec![Vec::new(); max_group as usize + 1];
        for (block, b) in self.blocks.iter().enumerate() {
            groups[b.group as usize].push((b.binding, BindingKind::Uniform { block }));
        }
        for (texture, t) in self.textures.iter().enumerate() {
            groups[t.group as usize].push((t.binding, BindingKind::Texture { texture }));
        }
        for group in &mut groups {
            group.sort_by_key(|(binding, _)| *binding);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARD_VS: &str = include_str!("shaders/standard.vert.wgsl");
    const IDENTITY_FS: &str = include_str!("shaders/identity.frag.wgsl");

    fn limits() -> wgpu::Limits {
        wgpu::Limits::downlevel_defaults()
    }

    #[test]
    fn test_standard_vertex_attributes() {
        let vs = compile(STANDARD_VS, ShaderStage::Vertex).unwrap();
        let fs = compile(IDENTITY_FS, ShaderStage::Fragment).unwrap();
        let program = link(&vs, &fs, &limits()).unwrap();

        let position = program.attribute("position").unwrap();
        let tex = program.attribute("textureCoord").unwrap();
        assert_eq!(position.components, 3);
        assert_eq!(tex.components, 2);
        assert_ne!(position.location, tex.location);
    }

    #[test]
    fn test_identity_uniforms_resolved() {
        let vs = compile(STANDARD_VS, ShaderStage::Vertex).unwrap();
        let fs = compile(IDENTITY_FS, ShaderStage::Fragment).unwrap();
        let program = link(&vs, &fs, &limits()).unwrap();

        assert_eq!(program.uniform("width").unwrap().kind(), UniformKind::Float);
        assert_eq!(
            program.uniform("height").unwrap().kind(),
            UniformKind::Float
        );
        assert_eq!(
            program.uniform("boidData").unwrap().kind(),
            UniformKind::Texture
        );
        match program.uniform("missing") {
            Err(GpuError::BindingNotFound { name }) => assert_eq!(name, "missing"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_member_offsets_follow_wgsl_layout() {
        let src = r#"
            struct Params { a: f32, b: vec2<f32>, c: u32, d: vec4<f32> }
            @group(0) @binding(0) var<uniform> params: Params;
            @fragment
            fn main() -> @location(0) vec4<f32> {
                return params.d * params.a + vec4<f32>(params.b, f32(params.c), 0.0);
            }
        "#;
        let fs = compile(src, ShaderStage::Fragment).unwrap();
        let block = &fs.blocks[0];

        // vec2 aligns to 8, vec4 to 16.
        assert_eq!(block.size, 48);
        assert_eq!(block.members[0], ("a".to_string(), 0, UniformKind::Float));
        assert_eq!(block.members[1], ("b".to_string(), 8, UniformKind::Vec2));
        assert_eq!(block.members[2], ("c".to_string(), 16, UniformKind::UInt));
        assert_eq!(block.members[3], ("d".to_string(), 32, UniformKind::Vec4));
    }

    #[test]
    fn test_syntax_error_has_log() {
        let err = compile("@fragment fn main( -> {", ShaderStage::Fragment).unwrap_err();
        match err {
            GpuError::ShaderCompile { log } => assert!(!log.is_empty()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_entry_point_for_stage() {
        let err = compile(IDENTITY_FS, ShaderStage::Vertex).unwrap_err();
        assert!(matches!(err, GpuError::ShaderCompile { .. }));
    }

    #[test]
    fn test_link_rejects_unmatched_varying() {
        let vs = compile(STANDARD_VS, ShaderStage::Vertex).unwrap();
        let fs = compile(
            r#"
            @fragment
            fn main(@location(3) extra: vec3<f32>) -> @location(0) vec4<f32> {
                return vec4<f32>(extra, 1.0);
            }
            "#,
            ShaderStage::Fragment,
        )
        .unwrap();

        match link(&vs, &fs, &limits()) {
            Err(GpuError::ProgramLink { log }) => assert!(log.contains("extra")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_link_rejects_stage_swap() {
        let vs = compile(STANDARD_VS, ShaderStage::Vertex).unwrap();
        let fs = compile(IDENTITY_FS, ShaderStage::Fragment).unwrap();
        assert!(matches!(link(&fs, &vs, &limits()), Err(GpuError::ProgramLink { .. })));
    }

    #[test]
    fn test_link_rejects_binding_conflict() {
        let vs_src = r#"
            @group(0) @binding(0) var<uniform> scale: f32;
            @vertex
            fn main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
                return vec4<f32>(f32(i) * scale, 0.0, 0.0, 1.0);
            }
        "#;
        let fs_src = r#"
            @group(0) @binding(0) var<uniform> tint: vec4<f32>;
            @fragment
            fn main() -> @location(0) vec4<f32> {
                return tint;
            }
        "#;
        let vs = compile(vs_src, ShaderStage::Vertex).unwrap();
        let fs = compile(fs_src, ShaderStage::Fragment).unwrap();

        match link(&vs, &fs, &limits()) {
            Err(GpuError::ProgramLink { log }) => assert!(log.contains("conflicts")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_groups_cover_all_bindings() {
        let vs = compile(STANDARD_VS, ShaderStage::Vertex).unwrap();
        let fs = compile(IDENTITY_FS, ShaderStage::Fragment).unwrap();
        let program = link(&vs, &fs, &limits()).unwrap();
        let groups = program.groups();

        let total: usize = groups.iter().map(Vec::len).sum();
        assert_eq!(total, program.blocks.len() + program.textures.len());
    }

    #[test]
    fn test_link_requires_position_output() {
        // naga already rejects such a module, so drop the flag by hand.
        let mut vs = compile(STANDARD_VS, ShaderStage::Vertex).unwrap();
        vs.writes_position = false;
        let fs = compile(IDENTITY_FS, ShaderStage::Fragment).unwrap();

        match link(&vs, &fs, &limits()) {
            Err(GpuError::ProgramLink { log }) => assert!(log.contains("builtin(position)")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_link_requires_color_output() {
        let vs = compile(STANDARD_VS, ShaderStage::Vertex).unwrap();
        let fs = compile(
            r#"
            @fragment
            fn main(@location(0) vTextureCoord: vec2<f32>) -> @location(1) vec4<f32> {
                return vec4<f32>(vTextureCoord, 0.0, 1.0);
            }
            "#,
            ShaderStage::Fragment,
        )
        .unwrap();

        match link(&vs, &fs, &limits()) {
            Err(GpuError::ProgramLink { log }) => assert!(log.contains("@location(0)")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_group_beyond_device_limit() {
        let fs = compile(
            r#"
            @group(6) @binding(0) var<uniform> tint: vec4<f32>;
            @fragment
            fn main() -> @location(0) vec4<f32> {
                return tint;
            }
            "#,
            ShaderStage::Fragment,
        )
        .unwrap();

        match fs.check_limits(&limits()) {
            Err(GpuError::ShaderCompile { log }) => assert!(log.contains("@group(6)")),
            other => panic!("unexpected result: {other:?}"),
        }

        let vs = compile(STANDARD_VS, ShaderStage::Vertex).unwrap();
        match link(&vs, &fs, &limits()) {
            Err(GpuError::ProgramLink { log }) => assert!(log.contains("@group(6)")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_texture_count_beyond_device_limit() {
        let small = wgpu::Limits {
            max_sampled_textures_per_shader_stage: 1,
            ..limits()
        };
        let fs = compile(
            r#"
            @group(1) @binding(0) var a: texture_2d<f32>;
            @group(1) @binding(1) var b: texture_2d<f32>;
            @fragment
            fn main() -> @location(0) vec4<f32> {
                return textureLoad(a, vec2<i32>(0), 0) + textureLoad(b, vec2<i32>(0), 0);
            }
            "#,
            ShaderStage::Fragment,
        )
        .unwrap();
        let vs = compile(STANDARD_VS, ShaderStage::Vertex).unwrap();

        match link(&vs, &fs, &small) {
            Err(GpuError::ProgramLink { log }) => assert!(log.contains("2 textures")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
