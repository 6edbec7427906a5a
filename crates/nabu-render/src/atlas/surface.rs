use std::collections::HashMap;

use crate::render::SurfaceHandle;

use super::packer::{AtlasRect, NodeHandle, PackTree};
use super::{PixelFormat, SurfaceId, TextureId, UvRect};

#[derive(Debug, Copy, Clone)]
struct Placement {
    node: NodeHandle,
    /// Texels handed to the caller.
    rect: AtlasRect,
    /// Packed slot including the trailing gutter.
    slot: AtlasRect,
}

/// One fixed-size atlas image: packing tree, CPU pixel copy and the
/// texture id → rectangle mapping.
///
/// The tree covers `(size + padding)` on each axis and every request is packed
/// as `(w + padding, h + padding)`. Neighbours end up `padding` texels apart
/// while a rectangle may still touch the surface edge.
#[derive(Debug)]
pub struct AtlasSurface {
    id: SurfaceId,
    format: PixelFormat,
    width: u32,
    height: u32,
    padding: u32,
    tree: PackTree,
    pixels: Vec<u8>,
    placements: HashMap<TextureId, Placement>,
    live_pixels: u64,
    pub(crate) device_handle: Option<SurfaceHandle>,
}

impl AtlasSurface {
    pub fn new(id: SurfaceId, format: PixelFormat, width: u32, height: u32, padding: u32) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self {
            id,
            format,
            width,
            height,
            padding,
            tree: PackTree::new(width + padding, height + padding),
            pixels: vec![0; len],
            placements: HashMap::new(),
            live_pixels: 0,
            device_handle: None,
        }
    }

    #[inline]
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn texture_count(&self) -> usize {
        self.placements.len()
    }

    #[inline]
    pub fn live_pixels(&self) -> u64 {
        self.live_pixels
    }

    #[inline]
    pub fn freed_pixels(&self) -> u64 {
        self.tree.released_area()
    }

    /// Share of the allocated slot area that is released and still empty.
    /// Space taken again by a later insert no longer counts as freed.
    pub fn free_ratio(&self) -> f32 {
        let freed = self.freed_pixels();
        let total = self.live_pixels + freed;
        if total == 0 {
            0.0
        } else {
            freed as f32 / total as f32
        }
    }

    /// Packs and copies a `width` x `height` image. `data` must already be
    /// validated against the surface format.
    ///
    /// Returns the texel rectangle, or `None` when no free leaf fits.
    pub fn try_insert(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Option<AtlasRect> {
        let (node, slot) = self.tree.pack(width + self.padding, height + self.padding, texture)?;
        let rect = AtlasRect::new(slot.x, slot.y, width, height);

        self.blit(rect, data);
        self.placements.insert(texture, Placement { node, rect, slot });
        self.live_pixels += slot.area();
        Some(rect)
    }

    /// Releases the slot owned by `texture`. Pixels are left in place.
    pub fn remove(&mut self, texture: TextureId) -> Option<AtlasRect> {
        let placement = self.placements.remove(&texture)?;
        self.tree.free(placement.node);
        self.live_pixels -= placement.slot.area();
        Some(placement.rect)
    }

    pub fn rect(&self, texture: TextureId) -> Option<AtlasRect> {
        self.placements.get(&texture).map(|p| p.rect)
    }

    pub fn uv(&self, texture: TextureId) -> Option<UvRect> {
        self.rect(texture).map(|r| UvRect::from_texels(r, self.width, self.height))
    }

    /// Repacks every live texture into a fresh tree, largest area first,
    /// and moves their pixels to the new positions.
    ///
    /// Texture ids are kept; only rectangles change. If the new layout
    /// cannot hold every texture the surface is left untouched and `false`
    /// is returned.
    pub fn rebuild(&mut self) -> bool {
        let mut live: Vec<(TextureId, Placement)> =
            self.placements.iter().map(|(&id, &p)| (id, p)).collect();
        live.sort_by(|a, b| b.1.slot.area().cmp(&a.1.slot.area()).then(a.0.cmp(&b.0)));

        let mut tree = PackTree::new(self.width + self.padding, self.height + self.padding);
        let mut placements = HashMap::with_capacity(live.len());
        for (id, old) in &live {
            let Some((node, slot)) = tree.pack(old.slot.width, old.slot.height, *id) else {
                log::warn!(
                    "atlas: rebuild of surface {:?} could not place {:?}; keeping old layout",
                    self.id, id
                );
                return false;
            };
            let rect = AtlasRect::new(slot.x, slot.y, old.rect.width, old.rect.height);
            placements.insert(*id, Placement { node, rect, slot });
        }

        let mut pixels = vec![0; self.pixels.len()];
        let bpp = self.format.bytes_per_pixel();
        let stride = self.width as usize * bpp;
        for (id, old) in &live {
            let new = placements[id].rect;
            let row_len = old.rect.width as usize * bpp;
            for row in 0..old.rect.height as usize {
                let src = (old.rect.y as usize + row) * stride + old.rect.x as usize * bpp;
                let dst = (new.y as usize + row) * stride + new.x as usize * bpp;
                pixels[dst..dst + row_len].copy_from_slice(&self.pixels[src..src + row_len]);
            }
        }

        self.tree = tree;
        self.pixels = pixels;
        self.placements = placements;
        true
    }

    /// Copies the pixels of `rect` into `out` as tightly packed rows.
    pub fn copy_region(&self, rect: AtlasRect, out: &mut Vec<u8>) {
        let bpp = self.format.bytes_per_pixel();
        let stride = self.width as usize * bpp;
        let row_len = rect.width as usize * bpp;

        out.clear();
        out.reserve(row_len * rect.height as usize);
        for row in 0..rect.height as usize {
            let start = (rect.y as usize + row) * stride + rect.x as usize * bpp;
            out.extend_from_slice(&self.pixels[start..start + row_len]);
        }
    }

    fn blit(&mut self, rect: AtlasRect, data: &[u8]) {
        let bpp = self.format.bytes_per_pixel();
        let stride = self.width as usize * bpp;
        let row_len = rect.width as usize * bpp;
        for row in 0..rect.height as usize {
            let dst = (rect.y as usize + row) * stride + rect.x as usize * bpp;
            let src = row * row_len;
            self.pixels[dst..dst + row_len].copy_from_slice(&data[src..src + row_len]);
        }
    }
}
