use core::ops::Range;

use anyhow::Result;

use crate::atlas::{AtlasRect, PixelFormat};
use crate::scene::RenderState;

use super::Vertex;

/// Device-side handle of an atlas surface (or the executor's fallback texture).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Boundary to the graphics device.
///
/// The pipeline only needs these operations; buffer rotation, shader binding
/// and presentation stay behind the implementation. Calls for one frame arrive
/// strictly in this order: surface creation/uploads, `begin_frame`, then
/// `upload_vertices`/`draw` pairs per batch, then `end_frame`.
pub trait GraphicsDevice {
    /// Allocates a GPU-resident texture.
    fn create_surface(&mut self, width: u32, height: u32, format: PixelFormat) -> Result<SurfaceHandle>;

    /// Writes tightly packed `pixels` into `region` of a surface.
    fn upload_texture_region(&mut self, surface: SurfaceHandle, region: AtlasRect, pixels: &[u8]) -> Result<()>;

    /// Prepares storage for `vertex_count` vertices of the coming frame.
    fn begin_frame(&mut self, vertex_count: u32) -> Result<()>;

    /// Copies `vertices` to position `first` of the frame's vertex storage.
    fn upload_vertices(&mut self, first: u32, vertices: &[Vertex]) -> Result<()>;

    /// Issues one draw call for `vertices` with `state`, sampling `texture`.
    fn draw(&mut self, vertices: Range<u32>, state: &RenderState, texture: SurfaceHandle) -> Result<()>;

    /// Ends the frame; every draw issued since `begin_frame` is submitted.
    fn end_frame(&mut self) -> Result<()>;
}
