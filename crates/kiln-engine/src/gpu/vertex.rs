use bytemuck::{Pod, Zeroable};

use crate::render::{Quad, SHADER_PARAM_COUNT, ViewTransform};

/// One corner of a sprite quad.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl SpriteVertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
        2 => Float32x4,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Per-pass uniform block (`Globals` in the prelude shader).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct Globals {
    pub view_proj: [[f32; 4]; 4],
    pub params: [f32; SHADER_PARAM_COUNT],
}

impl Globals {
    pub(crate) fn new(transform: &ViewTransform, params: [f32; SHADER_PARAM_COUNT]) -> Self {
        Self {
            view_proj: transform.view_projection().to_cols_array_2d(),
            params,
        }
    }
}

/// Expands a quad into four vertices in corner order TL, TR, BR, BL.
pub(crate) fn quad_vertices(quad: &Quad, texture_width: u32, texture_height: u32) -> [SpriteVertex; 4] {
    let [u0, v0, u1, v1] = quad.uv_bounds(texture_width, texture_height);
    let uvs = [[u0, v0], [u1, v0], [u1, v1], [u0, v1]];
    let color = quad.color.to_f32_array();
    let corners = quad.corners();
    std::array::from_fn(|i| SpriteVertex {
        pos: [corners[i].x, corners[i].y],
        uv: uvs[i],
        color,
    })
}

/// Index list for `quads` consecutive quads.
pub(crate) fn quad_indices(quads: u32) -> Vec<u32> {
    (0..quads)
        .flat_map(|q| {
            let b = q * 4;
            [b, b + 1, b + 2, b, b + 2, b + 3]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Color, Rect, Vec2};
    use crate::render::TextureId;

    #[test]
    fn vertices_follow_corner_order() {
        let mut quad = Quad::new(TextureId(1), Rect::new(16.0, 0.0, 16.0, 8.0), Vec2::new(10.0, 20.0));
        quad.color = Color::rgba(255, 0, 0, 255);
        let v = quad_vertices(&quad, 32, 16);

        assert_eq!(v[0].pos, [10.0, 20.0]);
        assert_eq!(v[2].pos, [26.0, 28.0]);
        assert_eq!(v[0].uv, [0.5, 0.0]);
        assert_eq!(v[2].uv, [1.0, 0.5]);
        assert_eq!(v[3].color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn indices_offset_per_quad() {
        assert_eq!(quad_indices(2), vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
        assert!(quad_indices(0).is_empty());
    }

    #[test]
    fn globals_match_shader_layout() {
        assert_eq!(std::mem::size_of::<Globals>(), 80);
    }
}
