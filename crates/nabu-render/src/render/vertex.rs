use bytemuck::{Pod, Zeroable};

use crate::atlas::UvRect;
use crate::coords::Rect;
use crate::paint::Color;

/// Vertex layout shared by every draw (32 bytes):
///
///  offset  0  pos    [f32; 2]   logical px
///  offset  8  uv     [f32; 2]   normalized surface coords
///  offset 16  color  [f32; 4]   premultiplied
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    #[inline]
    pub const fn new(pos: [f32; 2], uv: [f32; 2], color: [f32; 4]) -> Self {
        Self { pos, uv, color }
    }

    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2, // pos
        1 => Float32x2, // uv
        2 => Float32x4  // color
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Two counter-clockwise triangles covering `rect`, sampling `uv`.
pub(crate) fn quad_vertices(rect: Rect, uv: UvRect, color: Color) -> [Vertex; 6] {
    let Rect { min, max } = rect;
    let c = color.to_array();
    let tl = Vertex::new([min.x, min.y], [uv.u0, uv.v0], c);
    let tr = Vertex::new([max.x, min.y], [uv.u1, uv.v0], c);
    let br = Vertex::new([max.x, max.y], [uv.u1, uv.v1], c);
    let bl = Vertex::new([min.x, max.y], [uv.u0, uv.v1], c);
    [tl, tr, br, tl, br, bl]
}
