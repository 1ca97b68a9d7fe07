//! Standard full-screen quad used by every compute pass.

/// One interleaved vertex: position `(x, y, z)` then texture coordinate `(s, t)`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StandardVertex {
    pub position: [f32; 3],
    pub texture_coord: [f32; 2],
}

/// Vertices drawn as a triangle strip.
pub const STANDARD_VERTEX_COUNT: u32 = 4;

/// Covers clip space from (-1, -1) to (1, 1). Texture coordinates run from
/// (0, 0) at the upper left to (1, 1) at the lower right, so texel (0, 0)
/// of a render target receives texture coordinate (0, 0).
pub const STANDARD_QUAD: [StandardVertex; 4] = [
    // upper left
    StandardVertex {
        position: [-1.0, 1.0, 0.0],
        texture_coord: [0.0, 0.0],
    },
    // lower left
    StandardVertex {
        position: [-1.0, -1.0, 0.0],
        texture_coord: [0.0, 1.0],
    },
    // upper right
    StandardVertex {
        position: [1.0, 1.0, 0.0],
        texture_coord: [1.0, 0.0],
    },
    // lower right
    StandardVertex {
        position: [1.0, -1.0, 0.0],
        texture_coord: [1.0, 1.0],
    },
];

/// Attribute name of the 3-float position in the standard vertex stage.
pub(crate) const POSITION_ATTRIBUTE: &str = "position";
/// Attribute name of the 2-float texture coordinate.
pub(crate) const TEXTURE_COORD_ATTRIBUTE: &str = "textureCoord";

/// Every vertex has 5 float components of 4 bytes each.
pub(crate) const STANDARD_STRIDE: u64 = 5 * 4;
pub(crate) const POSITION_OFFSET: u64 = 0;
/// Follows the 3 position floats.
pub(crate) const TEXTURE_COORD_OFFSET: u64 = 3 * 4;

/// Shader locations resolved for one program's standard geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GeometryBinding {
    pub position: u32,
    pub texture_coord: u32,
}

impl GeometryBinding {
    pub fn attributes(&self) -> [wgpu::VertexAttribute; 2] {
        [
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: POSITION_OFFSET,
                shader_location: self.position,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: TEXTURE_COORD_OFFSET,
                shader_location: self.texture_coord,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_struct() {
        assert_eq!(
            std::mem::size_of::<StandardVertex>() as u64,
            STANDARD_STRIDE
        );
        assert_eq!(
            std::mem::offset_of!(StandardVertex, texture_coord) as u64,
            TEXTURE_COORD_OFFSET
        );
    }

    #[test]
    fn test_quad_texture_coords_follow_positions() {
        for v in STANDARD_QUAD {
            let s = 0.5 * (v.position[0] + 1.0);
            let t = 0.5 * (1.0 - v.position[1]);
            assert_eq!(v.texture_coord, [s, t]);
        }
    }
}
