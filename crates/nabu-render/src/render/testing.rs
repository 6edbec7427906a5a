//! In-memory `GraphicsDevice` for unit tests.

use core::ops::Range;

use anyhow::{bail, Result};

use crate::atlas::{AtlasRect, PixelFormat};
use crate::scene::RenderState;

use super::{GraphicsDevice, SurfaceHandle, Vertex};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedDraw {
    pub vertices: Range<u32>,
    pub state: RenderState,
    pub texture: SurfaceHandle,
}

/// Records every call. Handles are handed out sequentially from 1.
#[derive(Debug, Default)]
pub(crate) struct RecordingDevice {
    pub surfaces_created: Vec<(u32, u32, PixelFormat)>,
    /// (surface, region, byte length)
    pub uploads: Vec<(SurfaceHandle, AtlasRect, usize)>,
    pub frames_begun: usize,
    pub frames_ended: usize,
    pub vertex_count: u32,
    pub vertices: Vec<Vertex>,
    pub draws: Vec<RecordedDraw>,

    /// Fail every `create_surface` call.
    pub fail_create: bool,
    /// Fail the draw with this zero-based index (per device lifetime).
    pub fail_draw_at: Option<usize>,

    next_handle: u64,
    draw_calls: usize,
}

impl RecordingDevice {
    /// Device whose every `create_surface` call fails.
    pub fn failing_create() -> Self {
        Self { fail_create: true, ..Self::default() }
    }

    /// Device whose draw call number `index` (zero-based, per device) fails.
    pub fn failing_draw(index: usize) -> Self {
        Self { fail_draw_at: Some(index), ..Self::default() }
    }

    /// Vertices drawn by `draw`, in draw order.
    pub fn drawn_vertices(&self) -> Vec<Vertex> {
        self.draws
            .iter()
            .flat_map(|d| self.vertices[d.vertices.start as usize..d.vertices.end as usize].to_vec())
            .collect()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_surface(&mut self, width: u32, height: u32, format: PixelFormat) -> Result<SurfaceHandle> {
        if self.fail_create {
            bail!("create_surface: injected failure");
        }
        self.next_handle += 1;
        self.surfaces_created.push((width, height, format));
        Ok(SurfaceHandle(self.next_handle))
    }

    fn upload_texture_region(&mut self, surface: SurfaceHandle, region: AtlasRect, pixels: &[u8]) -> Result<()> {
        self.uploads.push((surface, region, pixels.len()));
        Ok(())
    }

    fn begin_frame(&mut self, vertex_count: u32) -> Result<()> {
        self.frames_begun += 1;
        self.vertex_count = vertex_count;
        self.vertices.clear();
        self.vertices.resize(vertex_count as usize, Vertex::default());
        self.draws.clear();
        Ok(())
    }

    fn upload_vertices(&mut self, first: u32, vertices: &[Vertex]) -> Result<()> {
        let start = first as usize;
        let Some(dst) = self.vertices.get_mut(start..start + vertices.len()) else {
            bail!("upload_vertices: {}..{} outside frame storage", start, start + vertices.len());
        };
        dst.copy_from_slice(vertices);
        Ok(())
    }

    fn draw(&mut self, vertices: Range<u32>, state: &RenderState, texture: SurfaceHandle) -> Result<()> {
        let index = self.draw_calls;
        self.draw_calls += 1;
        if self.fail_draw_at == Some(index) {
            bail!("draw: injected failure");
        }
        self.draws.push(RecordedDraw { vertices, state: *state, texture });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.frames_ended += 1;
        Ok(())
    }
}
