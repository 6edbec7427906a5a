use crate::atlas::{AtlasManager, AtlasRect, PixelFormat};
use crate::error::RenderError;
use crate::scene::{RenderState, TextureRef};

use super::{DrawBatch, GraphicsDevice, SurfaceHandle, Vertex};

/// Per-frame counters returned by [`Renderer::end_frame`](crate::Renderer::end_frame).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub batches: usize,
    pub draw_calls: usize,
    pub vertices: usize,
    /// Batches whose texture was released after recording; drawn with the fallback.
    pub stale_textures: usize,
    /// Batches clipped away by a zero-area scissor.
    pub skipped_batches: usize,
    /// Glyphs that could not be cached this frame and were drawn as blank advances.
    pub dropped_glyphs: usize,
    pub device_errors: usize,
}

/// Walks a frame's batches against a [`GraphicsDevice`].
///
/// A frame is never abandoned halfway: once a device or resource error is
/// seen, every remaining batch is drawn with a 1x1 white fallback texture,
/// and the batch whose draw failed is drawn once more with it.
#[derive(Debug, Default)]
pub struct FrameExecutor {
    fallback: Option<SurfaceHandle>,
}

impl FrameExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(
        &mut self,
        batches: &[DrawBatch],
        vertices: &[Vertex],
        atlas: &mut AtlasManager,
        device: &mut dyn GraphicsDevice,
    ) -> FrameStats {
        let mut stats = FrameStats {
            batches: batches.len(),
            vertices: vertices.len(),
            ..FrameStats::default()
        };
        let mut degraded = false;

        if let Err(err) = atlas.sync(device) {
            log::error!("atlas upload failed, drawing frame with fallback texture: {err:#}");
            stats.device_errors += 1;
            degraded = true;
        }

        let fallback = match self.ensure_fallback(device) {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::error!("failed to create fallback texture: {err:#}");
                stats.device_errors += 1;
                None
            }
        };

        if let Err(err) = device.begin_frame(vertices.len() as u32) {
            log::error!("begin_frame failed, frame dropped: {err:#}");
            stats.device_errors += 1;
            stats.skipped_batches = batches.len();
            return stats;
        }

        for batch in batches {
            if batch.state.scissor.is_some_and(|s| s.is_empty()) {
                stats.skipped_batches += 1;
                continue;
            }

            let texture = if degraded {
                fallback
            } else {
                match resolve(&batch.state, atlas, fallback) {
                    Ok(handle) => Some(handle),
                    Err(err) => {
                        log::warn!("batch {}: {err}; using fallback texture", batch.ordinal);
                        stats.stale_textures += 1;
                        fallback
                    }
                }
            };
            let Some(texture) = texture else {
                stats.skipped_batches += 1;
                continue;
            };

            match submit(device, batch, vertices, texture) {
                Ok(()) => stats.draw_calls += 1,
                Err(err) => {
                    log::error!("batch {} failed: {err:#}", batch.ordinal);
                    stats.device_errors += 1;
                    degraded = true;
                    // One more attempt with the fallback so the batch is not lost.
                    match fallback.filter(|&fb| fb != texture).map(|fb| submit(device, batch, vertices, fb)) {
                        Some(Ok(())) => stats.draw_calls += 1,
                        Some(Err(err)) => {
                            log::error!("batch {} failed with fallback texture: {err:#}", batch.ordinal);
                            stats.device_errors += 1;
                        }
                        None => {}
                    }
                }
            }
        }

        if let Err(err) = device.end_frame() {
            log::error!("end_frame failed: {err:#}");
            stats.device_errors += 1;
        }
        stats
    }

    fn ensure_fallback(&mut self, device: &mut dyn GraphicsDevice) -> anyhow::Result<SurfaceHandle> {
        if let Some(handle) = self.fallback {
            return Ok(handle);
        }
        let handle = device.create_surface(1, 1, PixelFormat::Rgba8)?;
        device.upload_texture_region(handle, AtlasRect::new(0, 0, 1, 1), &[255; 4])?;
        self.fallback = Some(handle);
        Ok(handle)
    }
}

/// Uploads the batch's vertex range and issues its draw call.
fn submit(
    device: &mut dyn GraphicsDevice,
    batch: &DrawBatch,
    vertices: &[Vertex],
    texture: SurfaceHandle,
) -> anyhow::Result<()> {
    let range = batch.vertices.start as usize..batch.vertices.end as usize;
    device.upload_vertices(batch.vertices.start, &vertices[range])?;
    device.draw(batch.vertices.clone(), &batch.state, texture)
}

/// Device handle for the batch's texture. Solid draws map to the fallback.
fn resolve(
    state: &RenderState,
    atlas: &AtlasManager,
    fallback: Option<SurfaceHandle>,
) -> Result<SurfaceHandle, RenderError> {
    let handle = match state.texture {
        TextureRef::Solid => fallback,
        TextureRef::Atlas(id) => atlas.texture_surface(id).ok().and_then(|sid| atlas.surface_handle(sid)),
        TextureRef::Surface(sid) => atlas.surface_handle(sid),
    };
    handle.ok_or(RenderError::StaleTexture(state.texture))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::TextureId;
    use crate::config::AtlasConfig;
    use crate::coords::ScissorRect;
    use crate::render::testing::RecordingDevice;

    fn atlas() -> AtlasManager {
        AtlasManager::new(AtlasConfig { default_surface_size: 64, max_surface_size: 64, ..AtlasConfig::default() })
    }

    fn batch(state: RenderState, start: u32, end: u32, ordinal: u32) -> DrawBatch {
        DrawBatch { state, vertices: start..end, ordinal }
    }

    fn verts(n: usize) -> Vec<Vertex> {
        (0..n).map(|i| Vertex::new([i as f32, 0.0], [0.0, 0.0], [1.0; 4])).collect()
    }

    // ── happy path ────────────────────────────────────────────────────────

    #[test]
    fn one_draw_per_batch_in_order() {
        let mut atlas = atlas();
        let tex = atlas.add_texture(4, 4, PixelFormat::Rgba8, &[255; 64]).unwrap();
        let mut device = RecordingDevice::default();
        let vertices = verts(12);
        let batches = [
            batch(RenderState::solid(), 0, 6, 0),
            batch(RenderState::textured(tex), 6, 12, 1),
        ];

        let stats = FrameExecutor::new().execute(&batches, &vertices, &mut atlas, &mut device);

        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.vertices, 12);
        assert_eq!(device.frames_begun, 1);
        assert_eq!(device.frames_ended, 1);
        assert_eq!(device.vertex_count, 12);
        assert_eq!(device.drawn_vertices(), vertices);

        let atlas_handle = atlas.surface_handle(atlas.texture_surface(tex).unwrap()).unwrap();
        assert_eq!(device.draws[1].texture, atlas_handle);
        assert_ne!(device.draws[0].texture, atlas_handle);
    }

    #[test]
    fn fallback_is_created_once() {
        let mut atlas = atlas();
        let mut device = RecordingDevice::default();
        let mut exec = FrameExecutor::new();
        let vertices = verts(3);
        let batches = [batch(RenderState::solid(), 0, 3, 0)];
        exec.execute(&batches, &vertices, &mut atlas, &mut device);
        exec.execute(&batches, &vertices, &mut atlas, &mut device);
        assert_eq!(device.surfaces_created, vec![(1, 1, PixelFormat::Rgba8)]);
        assert_eq!(device.frames_ended, 2);
    }

    // ── degradation ───────────────────────────────────────────────────────

    #[test]
    fn removed_texture_is_reported_stale_and_drawn_with_fallback() {
        let mut atlas = atlas();
        let tex = atlas.add_texture(4, 4, PixelFormat::Rgba8, &[255; 64]).unwrap();
        atlas.remove_texture(tex).unwrap();
        let mut device = RecordingDevice::default();
        let vertices = verts(6);
        let batches = [
            batch(RenderState::textured(tex), 0, 3, 0),
            batch(RenderState::textured(TextureId(77)), 3, 6, 1),
        ];

        let stats = FrameExecutor::new().execute(&batches, &vertices, &mut atlas, &mut device);

        assert_eq!(stats.stale_textures, 2);
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(device.draws[0].texture, device.draws[1].texture);
    }

    #[test]
    fn zero_area_scissor_batches_are_skipped() {
        let mut atlas = atlas();
        let mut device = RecordingDevice::default();
        let vertices = verts(6);
        let clipped = RenderState::solid().with_scissor(Some(ScissorRect::new(5, 5, 0, 0)));
        let batches = [batch(clipped, 0, 3, 0), batch(RenderState::solid(), 3, 6, 1)];

        let stats = FrameExecutor::new().execute(&batches, &vertices, &mut atlas, &mut device);

        assert_eq!(stats.skipped_batches, 1);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(device.draws[0].vertices, 3..6);
    }

    #[test]
    fn failed_draw_is_redrawn_with_fallback_and_rest_follow() {
        let mut atlas = atlas();
        let tex = atlas.add_texture(4, 4, PixelFormat::Rgba8, &[255; 64]).unwrap();
        let mut device = RecordingDevice::failing_draw(0);
        let vertices = verts(9);
        let batches = [
            batch(RenderState::textured(tex), 0, 3, 0),
            batch(RenderState::textured(tex), 3, 6, 1),
            batch(RenderState::solid(), 6, 9, 2),
        ];

        let stats = FrameExecutor::new().execute(&batches, &vertices, &mut atlas, &mut device);

        assert_eq!(stats.device_errors, 1);
        assert_eq!(stats.draw_calls, 3);
        assert_eq!(device.frames_ended, 1);
        let drawn: Vec<_> = device.draws.iter().map(|d| d.vertices.clone()).collect();
        assert_eq!(drawn, vec![0..3, 3..6, 6..9]);
        let atlas_handle = atlas.surface_handle(atlas.texture_surface(tex).unwrap()).unwrap();
        assert!(device.draws.iter().all(|d| d.texture != atlas_handle));
    }

    #[test]
    fn failed_fallback_draw_is_not_retried() {
        let mut atlas = atlas();
        let mut device = RecordingDevice::failing_draw(0);
        let vertices = verts(6);
        let batches = [batch(RenderState::solid(), 0, 3, 0), batch(RenderState::solid(), 3, 6, 1)];

        let stats = FrameExecutor::new().execute(&batches, &vertices, &mut atlas, &mut device);

        assert_eq!(stats.device_errors, 1);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(device.draws[0].vertices, 3..6);
    }

    #[test]
    fn surface_creation_failure_still_ends_the_frame() {
        let mut atlas = atlas();
        atlas.add_texture(4, 4, PixelFormat::Rgba8, &[255; 64]).unwrap();
        let mut device = RecordingDevice::failing_create();
        let vertices = verts(3);
        let batches = [batch(RenderState::solid(), 0, 3, 0)];

        let stats = FrameExecutor::new().execute(&batches, &vertices, &mut atlas, &mut device);

        assert_eq!(stats.device_errors, 2);
        assert_eq!(stats.skipped_batches, 1);
        assert_eq!(device.frames_ended, 1);
        assert!(atlas.has_pending_uploads());
    }
}
