use std::collections::{HashMap, VecDeque};

use crate::config::AtlasConfig;
use crate::error::{RenderError, RenderResult};
use crate::render::{GraphicsDevice, SurfaceHandle};

use super::packer::AtlasRect;
use super::surface::AtlasSurface;
use super::{PixelFormat, SurfaceId, TextureId, UvRect};

/// Upload queued by a mutation, flushed by [`AtlasManager::sync`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PendingUpload {
    Region(SurfaceId, AtlasRect),
    Full(SurfaceId),
}

/// Snapshot of atlas occupancy.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct AtlasStats {
    pub surfaces: usize,
    pub textures: usize,
    pub live_pixels: u64,
    pub freed_pixels: u64,
}

/// Owns every atlas surface and maps texture ids to their UVs.
///
/// Surfaces are format-homogeneous and never resized after creation, so a UV
/// stays valid until its texture is removed or the surface is defragmented.
/// GPU work is deferred: mutations only queue uploads, and the frame executor
/// applies them through [`sync`](Self::sync) before drawing.
#[derive(Debug)]
pub struct AtlasManager {
    config: AtlasConfig,
    surfaces: Vec<AtlasSurface>,
    textures: HashMap<TextureId, SurfaceId>,
    most_recent: HashMap<PixelFormat, SurfaceId>,
    next_texture: u32,
    pending: VecDeque<PendingUpload>,
    scratch: Vec<u8>,
}

impl AtlasManager {
    pub fn new(config: AtlasConfig) -> Self {
        Self {
            config,
            surfaces: Vec::new(),
            textures: HashMap::new(),
            most_recent: HashMap::new(),
            next_texture: 0,
            pending: VecDeque::new(),
            scratch: Vec::new(),
        }
    }

    /// Stores a `width` x `height` image and returns its id.
    ///
    /// Tries the most recently used surface of the same format, then every
    /// other surface of that format, then a new surface. Fails with
    /// `AtlasExhausted` if even a maximum-sized surface cannot hold it.
    pub fn add_texture(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: &[u8],
    ) -> RenderResult<TextureId> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(RenderError::InvalidPixelData { expected, actual: pixels.len() });
        }
        let max = self.config.max_surface_size;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::AtlasExhausted { width, height });
        }

        let id = TextureId(self.next_texture);

        let recent = self.most_recent.get(&format).copied();
        let candidates = recent.into_iter().chain(
            self.surfaces
                .iter()
                .filter(|s| s.format() == format && Some(s.id()) != recent)
                .map(|s| s.id()),
        );
        let mut placed = None;
        for sid in candidates.collect::<Vec<_>>() {
            if let Some(rect) = self.surface_mut(sid).try_insert(id, width, height, pixels) {
                placed = Some((sid, rect));
                break;
            }
        }

        let (sid, rect) = match placed {
            Some(hit) => hit,
            None => {
                let sid = self.create_surface(format, width.max(height));
                let Some(rect) = self.surface_mut(sid).try_insert(id, width, height, pixels) else {
                    return Err(RenderError::AtlasExhausted { width, height });
                };
                (sid, rect)
            }
        };

        self.next_texture += 1;
        self.textures.insert(id, sid);
        self.most_recent.insert(format, sid);
        self.pending.push_back(PendingUpload::Region(sid, rect));
        Ok(id)
    }

    /// Frees the texture's slot. Space is reclaimed by reuse of the freed
    /// leaf or by a later [`defragment`](Self::defragment).
    pub fn remove_texture(&mut self, id: TextureId) -> RenderResult<()> {
        let sid = self
            .textures
            .remove(&id)
            .ok_or_else(|| RenderError::not_found(format!("texture {id:?}")))?;
        self.surface_mut(sid).remove(id);
        Ok(())
    }

    pub fn get_uv(&self, id: TextureId) -> RenderResult<UvRect> {
        let sid = self.texture_surface(id)?;
        self.surfaces[sid.0 as usize]
            .uv(id)
            .ok_or_else(|| RenderError::not_found(format!("texture {id:?}")))
    }

    /// Surface holding `id`.
    pub fn texture_surface(&self, id: TextureId) -> RenderResult<SurfaceId> {
        self.textures
            .get(&id)
            .copied()
            .ok_or_else(|| RenderError::not_found(format!("texture {id:?}")))
    }

    /// Texel rectangle of `id` inside its surface.
    pub fn texture_rect(&self, id: TextureId) -> RenderResult<AtlasRect> {
        let sid = self.texture_surface(id)?;
        self.surfaces[sid.0 as usize]
            .rect(id)
            .ok_or_else(|| RenderError::not_found(format!("texture {id:?}")))
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&AtlasSurface> {
        self.surfaces.get(id.0 as usize)
    }

    pub fn surfaces(&self) -> &[AtlasSurface] {
        &self.surfaces
    }

    /// GPU handle of a surface, once [`sync`](Self::sync) has created it.
    pub fn surface_handle(&self, id: SurfaceId) -> Option<SurfaceHandle> {
        self.surface(id).and_then(|s| s.device_handle)
    }

    /// Rebuilds every surface whose freed share exceeds the configured
    /// threshold. Returns the number of surfaces rebuilt.
    ///
    /// Must run between frames: geometry recorded earlier still carries the
    /// old UVs.
    pub fn defragment(&mut self) -> usize {
        let threshold = self.config.defrag_threshold;
        let mut rebuilt = 0;
        for surface in &mut self.surfaces {
            if surface.free_ratio() <= threshold {
                continue;
            }
            let ratio = surface.free_ratio();
            if surface.rebuild() {
                log::debug!(
                    "atlas: defragmented surface {:?} ({:.0}% freed, {} textures kept)",
                    surface.id(),
                    ratio * 100.0,
                    surface.texture_count()
                );
                self.pending.push_back(PendingUpload::Full(surface.id()));
                rebuilt += 1;
            }
        }
        rebuilt
    }

    pub fn stats(&self) -> AtlasStats {
        AtlasStats {
            surfaces: self.surfaces.len(),
            textures: self.textures.len(),
            live_pixels: self.surfaces.iter().map(AtlasSurface::live_pixels).sum(),
            freed_pixels: self.surfaces.iter().map(AtlasSurface::freed_pixels).sum(),
        }
    }

    /// Creates missing GPU surfaces and flushes queued uploads.
    ///
    /// A newly created surface is uploaded whole, which covers any region
    /// uploads queued for it. On device failure the remaining uploads stay
    /// queued for the next call.
    pub fn sync(&mut self, device: &mut dyn GraphicsDevice) -> anyhow::Result<()> {
        for idx in 0..self.surfaces.len() {
            if self.surfaces[idx].device_handle.is_some() {
                continue;
            }
            let surface = &self.surfaces[idx];
            let (w, h) = surface.size();
            let handle = device.create_surface(w, h, surface.format())?;
            self.surfaces[idx].device_handle = Some(handle);
            let sid = self.surfaces[idx].id();
            self.pending.retain(|p| {
                !matches!(p, PendingUpload::Region(s, _) | PendingUpload::Full(s) if *s == sid)
            });
            self.pending.push_back(PendingUpload::Full(sid));
        }

        while let Some(&upload) = self.pending.front() {
            let (sid, region) = match upload {
                PendingUpload::Region(sid, rect) => (sid, Some(rect)),
                PendingUpload::Full(sid) => (sid, None),
            };
            let surface = &self.surfaces[sid.0 as usize];
            let Some(handle) = surface.device_handle else {
                self.pending.pop_front();
                continue;
            };
            let rect = region.unwrap_or_else(|| {
                let (w, h) = surface.size();
                AtlasRect::new(0, 0, w, h)
            });
            surface.copy_region(rect, &mut self.scratch);
            device.upload_texture_region(handle, rect, &self.scratch)?;
            self.pending.pop_front();
        }
        Ok(())
    }

    /// True if uploads are waiting for [`sync`](Self::sync).
    pub fn has_pending_uploads(&self) -> bool {
        !self.pending.is_empty()
    }

    fn create_surface(&mut self, format: PixelFormat, needed: u32) -> SurfaceId {
        let max = self.config.max_surface_size;
        let mut size = self.config.default_surface_size.min(max);
        while size < needed {
            size = size.saturating_mul(2).min(max);
        }

        let id = SurfaceId(self.surfaces.len() as u32);
        log::debug!("atlas: creating {format:?} surface {id:?} at {size}x{size}");
        self.surfaces
            .push(AtlasSurface::new(id, format, size, size, self.config.padding));
        id
    }

    fn surface_mut(&mut self, id: SurfaceId) -> &mut AtlasSurface {
        &mut self.surfaces[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::RecordingDevice;

    fn config(default: u32, max: u32, padding: u32) -> AtlasConfig {
        AtlasConfig {
            default_surface_size: default,
            max_surface_size: max,
            padding,
            defrag_threshold: 0.5,
        }
    }

    fn rgba(w: u32, h: u32) -> Vec<u8> {
        vec![255; (w * h * 4) as usize]
    }

    fn add(atlas: &mut AtlasManager, w: u32, h: u32) -> RenderResult<TextureId> {
        atlas.add_texture(w, h, PixelFormat::Rgba8, &rgba(w, h))
    }

    // ── add / get_uv ──────────────────────────────────────────────────────

    #[test]
    fn uvs_stay_in_unit_square_and_never_overlap() {
        let mut atlas = AtlasManager::new(config(256, 256, 2));
        let sizes = [(64, 64), (10, 100), (100, 10), (33, 33), (70, 20), (5, 5), (48, 80)];
        let ids: Vec<_> = sizes.iter().map(|&(w, h)| add(&mut atlas, w, h).unwrap()).collect();
        assert_eq!(atlas.stats().surfaces, 1);

        let rects: Vec<_> = ids.iter().map(|&id| atlas.texture_rect(id).unwrap()).collect();
        for (i, id) in ids.iter().enumerate() {
            let uv = atlas.get_uv(*id).unwrap();
            for v in [uv.u0, uv.v0, uv.u1, uv.v1] {
                assert!((0.0..=1.0).contains(&v), "{uv:?}");
            }
            for other in &rects[i + 1..] {
                assert!(!rects[i].overlaps(*other));
            }
        }
    }

    #[test]
    fn uv_round_trips_to_texel_size() {
        let mut atlas = AtlasManager::new(config(128, 128, 2));
        add(&mut atlas, 20, 20).unwrap();
        let id = add(&mut atlas, 40, 24).unwrap();
        let rect = atlas.texture_rect(id).unwrap();
        let uv = atlas.get_uv(id).unwrap();
        assert_eq!(uv, UvRect::from_texels(rect, 128, 128));
        assert_eq!(((uv.u1 - uv.u0) * 128.0).round(), 40.0);
        assert_eq!(((uv.v1 - uv.v0) * 128.0).round(), 24.0);
    }

    #[test]
    fn scenario_c_fourth_texture_opens_a_new_surface() {
        let mut atlas = AtlasManager::new(config(128, 128, 2));
        let a = add(&mut atlas, 32, 32).unwrap();
        let b = add(&mut atlas, 32, 32).unwrap();
        let c = add(&mut atlas, 64, 64).unwrap();
        assert_eq!(atlas.stats().surfaces, 1);
        for (x, y) in [(a, b), (a, c), (b, c)] {
            assert!(!atlas.texture_rect(x).unwrap().overlaps(atlas.texture_rect(y).unwrap()));
        }

        // The first surface cannot take a full-size request any more.
        let first = SurfaceId(0);
        let mut reference = AtlasSurface::new(first, PixelFormat::Rgba8, 128, 128, 2);
        for id in [a, b, c] {
            let r = atlas.texture_rect(id).unwrap();
            reference.try_insert(id, r.width, r.height, &rgba(r.width, r.height)).unwrap();
        }
        assert!(reference.try_insert(TextureId(99), 128, 128, &rgba(128, 128)).is_none());

        let d = add(&mut atlas, 128, 128).unwrap();
        assert_eq!(atlas.stats().surfaces, 2);
        assert_eq!(atlas.texture_surface(d).unwrap(), SurfaceId(1));
        assert_eq!(atlas.get_uv(d).unwrap(), UvRect { u0: 0.0, v0: 0.0, u1: 1.0, v1: 1.0 });
    }

    #[test]
    fn request_above_max_is_exhausted() {
        let mut atlas = AtlasManager::new(config(64, 128, 2));
        assert_eq!(
            add(&mut atlas, 129, 8),
            Err(RenderError::AtlasExhausted { width: 129, height: 8 })
        );
        assert_eq!(atlas.stats().surfaces, 0);
    }

    #[test]
    fn large_request_sizes_new_surface_up_to_max() {
        let mut atlas = AtlasManager::new(config(64, 512, 0));
        let id = add(&mut atlas, 200, 10).unwrap();
        let sid = atlas.texture_surface(id).unwrap();
        assert_eq!(atlas.surface(sid).unwrap().size(), (256, 256));
    }

    #[test]
    fn formats_never_share_a_surface() {
        let mut atlas = AtlasManager::new(config(64, 64, 0));
        let a = add(&mut atlas, 8, 8).unwrap();
        let b = atlas.add_texture(8, 8, PixelFormat::R8, &[0; 64]).unwrap();
        assert_ne!(atlas.texture_surface(a).unwrap(), atlas.texture_surface(b).unwrap());
    }

    #[test]
    fn mismatched_pixel_data_is_rejected() {
        let mut atlas = AtlasManager::new(config(64, 64, 0));
        assert_eq!(
            atlas.add_texture(4, 4, PixelFormat::Rgba8, &[0; 15]),
            Err(RenderError::InvalidPixelData { expected: 64, actual: 15 })
        );
    }

    // ── remove ────────────────────────────────────────────────────────────

    #[test]
    fn removed_texture_is_not_found() {
        let mut atlas = AtlasManager::new(config(64, 64, 2));
        let id = add(&mut atlas, 8, 8).unwrap();
        atlas.remove_texture(id).unwrap();
        assert!(matches!(atlas.get_uv(id), Err(RenderError::NotFound(_))));
        assert!(matches!(atlas.remove_texture(id), Err(RenderError::NotFound(_))));
        assert_eq!(atlas.stats().textures, 0);
        assert!(atlas.stats().freed_pixels > 0);
    }

    // ── defragment ────────────────────────────────────────────────────────

    #[test]
    fn defragment_keeps_ids_and_is_idempotent() {
        let mut atlas = AtlasManager::new(config(128, 128, 2));
        let ids: Vec<_> = (0..6).map(|i| add(&mut atlas, 10 + i * 4, 12).unwrap()).collect();
        for &id in &ids[..4] {
            atlas.remove_texture(id).unwrap();
        }

        assert_eq!(atlas.defragment(), 1);
        let first: Vec<_> = ids[4..].iter().map(|&id| atlas.get_uv(id).unwrap()).collect();
        assert_eq!(atlas.stats().freed_pixels, 0);

        assert_eq!(atlas.defragment(), 0);
        let second: Vec<_> = ids[4..].iter().map(|&id| atlas.get_uv(id).unwrap()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn slot_reused_in_place_does_not_trigger_defragment() {
        let mut atlas = AtlasManager::new(config(64, 64, 0));
        let mut id = add(&mut atlas, 64, 64).unwrap();
        for _ in 0..3 {
            atlas.remove_texture(id).unwrap();
            id = add(&mut atlas, 64, 64).unwrap();
        }
        let stats = atlas.stats();
        assert_eq!((stats.surfaces, stats.live_pixels, stats.freed_pixels), (1, 4096, 0));
        assert_eq!(atlas.defragment(), 0);
    }

    #[test]
    fn defragment_skips_surfaces_below_threshold() {
        let mut atlas = AtlasManager::new(config(128, 128, 0));
        let a = add(&mut atlas, 10, 10).unwrap();
        add(&mut atlas, 40, 40).unwrap();
        atlas.remove_texture(a).unwrap();
        assert_eq!(atlas.defragment(), 0);
    }

    // ── sync ──────────────────────────────────────────────────────────────

    #[test]
    fn sync_creates_surface_then_uploads_regions() {
        let mut atlas = AtlasManager::new(config(64, 64, 0));
        let mut device = RecordingDevice::default();

        add(&mut atlas, 8, 8).unwrap();
        atlas.sync(&mut device).unwrap();
        assert_eq!(device.surfaces_created, vec![(64, 64, PixelFormat::Rgba8)]);
        // Creation implies a whole-surface upload.
        assert_eq!(device.uploads.len(), 1);
        assert_eq!(device.uploads[0].1, AtlasRect::new(0, 0, 64, 64));
        assert!(!atlas.has_pending_uploads());

        let id = add(&mut atlas, 4, 4).unwrap();
        atlas.sync(&mut device).unwrap();
        assert_eq!(device.uploads.len(), 2);
        assert_eq!(device.uploads[1].1, atlas.texture_rect(id).unwrap());
        assert_eq!(device.uploads[1].2, 4 * 4 * 4);
        assert!(atlas.surface_handle(SurfaceId(0)).is_some());
    }
}
