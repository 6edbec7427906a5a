use std::collections::HashMap;

use crate::atlas::{AtlasManager, PixelFormat};

use super::glyph_cache::{Glyph, GlyphCache, GlyphKey};
use super::rasterizer::{LineMetrics, OutlineRasterizer, RasterizedGlyph};

/// Cumulative glyph cache counters of one font.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FontStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Glyphs drawn as blank advances because the cache or atlas had no room.
    pub dropped: u64,
    pub rasterize_failures: u64,
}

impl core::ops::AddAssign for FontStats {
    fn add_assign(&mut self, rhs: Self) {
        self.hits += rhs.hits;
        self.misses += rhs.misses;
        self.evictions += rhs.evictions;
        self.dropped += rhs.dropped;
        self.rasterize_failures += rhs.rasterize_failures;
    }
}

/// A loaded font: outline rasterizer, vertical metrics, bounded glyph cache
/// and kerning-pair cache.
pub struct Font {
    rasterizer: Box<dyn OutlineRasterizer>,
    metrics: LineMetrics,
    cache: GlyphCache,
    /// Ordered pair -> adjustment in em. Pairs without an entry in the font
    /// are cached as 0.
    kerning: HashMap<(char, char), f32>,
    stats: FontStats,
    warned_pinned: bool,
}

impl Font {
    pub fn new(rasterizer: Box<dyn OutlineRasterizer>, cache_capacity: usize) -> Self {
        let metrics = rasterizer.line_metrics();
        Self {
            rasterizer,
            metrics,
            cache: GlyphCache::new(cache_capacity),
            kerning: HashMap::new(),
            stats: FontStats::default(),
            warned_pinned: false,
        }
    }

    #[inline]
    pub fn line_metrics(&self) -> LineMetrics {
        self.metrics
    }

    #[inline]
    pub fn cache(&self) -> &GlyphCache {
        &self.cache
    }

    #[inline]
    pub fn stats(&self) -> FontStats {
        self.stats
    }

    /// Returns the glyph for `codepoint` at `size` px, rasterizing and packing
    /// it into `atlas` on a miss.
    ///
    /// Always yields a glyph. When the glyph cannot be stored (every cached
    /// entry was used in `frame`, or the atlas is exhausted) a blank advance
    /// is returned uncached and counted as dropped. A rasterization failure
    /// caches a blank glyph with the width of a space.
    pub fn get_glyph(&mut self, codepoint: char, size: f32, atlas: &mut AtlasManager, frame: u64) -> Glyph {
        let key = GlyphKey::new(codepoint, size);
        if let Some(glyph) = self.cache.get(key, frame) {
            self.stats.hits += 1;
            return glyph;
        }
        self.stats.misses += 1;

        if !self.make_room(atlas, frame) {
            self.stats.dropped += 1;
            if !self.warned_pinned {
                log::warn!(
                    "glyph cache full ({} entries all used this frame); drawing {codepoint:?} blank",
                    self.cache.capacity()
                );
                self.warned_pinned = true;
            }
            return Glyph::blank(key, self.rasterizer.advance(codepoint, key.size()), frame);
        }

        let raster = match self.rasterizer.rasterize(codepoint, key.size()) {
            Ok(raster) => raster,
            Err(err) => {
                log::warn!("{err}; using blank placeholder");
                self.stats.rasterize_failures += 1;
                let glyph = Glyph::blank(key, self.space_advance(key.size()), frame);
                self.cache.insert(key, glyph);
                return glyph;
            }
        };

        let glyph = match self.pack(key, &raster, atlas, frame) {
            Some(glyph) => glyph,
            None => {
                self.stats.dropped += 1;
                return Glyph::blank(key, raster.advance, frame);
            }
        };
        self.cache.insert(key, glyph);
        glyph
    }

    /// Kerning adjustment in px between `left` and `right` at `size`.
    pub fn kerning(&mut self, left: char, right: char, size: f32) -> f32 {
        let em = *self
            .kerning
            .entry((left, right))
            .or_insert_with(|| self.rasterizer.kerning(left, right).unwrap_or(0.0));
        em * GlyphKey::new(left, size).size()
    }

    /// Pen advance of `codepoint` at `size`, without rasterizing.
    pub fn advance(&self, codepoint: char, size: f32) -> f32 {
        let key = GlyphKey::new(codepoint, size);
        match self.cache.peek(key) {
            Some(glyph) => glyph.advance,
            None => self.rasterizer.advance(codepoint, key.size()),
        }
    }

    /// Drops every cached glyph and releases its atlas texture.
    pub(crate) fn release(&mut self, atlas: &mut AtlasManager) {
        for glyph in self.cache.drain() {
            release_texture(&glyph, atlas);
        }
        self.kerning.clear();
    }

    /// Re-reads atlas placements after the atlas was defragmented. Glyphs
    /// whose texture is gone become blank.
    pub(crate) fn refresh_placements(&mut self, atlas: &AtlasManager) {
        for glyph in self.cache.iter_mut() {
            let Some(texture) = glyph.texture else { continue };
            match (atlas.texture_surface(texture), atlas.get_uv(texture)) {
                (Ok(surface), Ok(uv)) => {
                    glyph.surface = Some(surface);
                    glyph.uv = uv;
                }
                _ => {
                    glyph.texture = None;
                    glyph.surface = None;
                }
            }
        }
    }

    /// Evicts until one entry fits. Returns `false` if the LRU tail is pinned.
    fn make_room(&mut self, atlas: &mut AtlasManager, frame: u64) -> bool {
        while self.cache.is_full() {
            let Some(evicted) = self.cache.evict_lru(frame) else {
                return false;
            };
            release_texture(&evicted, atlas);
            self.stats.evictions += 1;
        }
        true
    }

    fn pack(&self, key: GlyphKey, raster: &RasterizedGlyph, atlas: &mut AtlasManager, frame: u64) -> Option<Glyph> {
        let mut glyph = Glyph {
            codepoint: key.codepoint,
            size: key.size(),
            advance: raster.advance,
            bearing_x: raster.bearing_x,
            bearing_y: raster.bearing_y,
            width: raster.width,
            height: raster.height,
            texture: None,
            surface: None,
            uv: Default::default(),
            last_used_frame: frame,
        };
        if raster.width == 0 || raster.height == 0 {
            return Some(glyph);
        }

        let texture = match atlas.add_texture(raster.width, raster.height, PixelFormat::R8, &raster.coverage) {
            Ok(texture) => texture,
            Err(err) => {
                log::warn!("glyph {:?} at {}px not cached: {err}", key.codepoint, key.size());
                return None;
            }
        };
        match (atlas.texture_surface(texture), atlas.get_uv(texture)) {
            (Ok(surface), Ok(uv)) => {
                glyph.texture = Some(texture);
                glyph.surface = Some(surface);
                glyph.uv = uv;
                Some(glyph)
            }
            _ => None,
        }
    }

    fn space_advance(&self, px: f32) -> f32 {
        let advance = self.rasterizer.advance(' ', px);
        if advance > 0.0 { advance } else { px * 0.5 }
    }
}

fn release_texture(glyph: &Glyph, atlas: &mut AtlasManager) {
    if let Some(texture) = glyph.texture
        && let Err(err) = atlas.remove_texture(texture)
    {
        log::debug!("glyph {:?} texture already released: {err}", glyph.codepoint);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::config::AtlasConfig;
    use crate::error::RenderError;
    use crate::text::testing::BoxRasterizer;

    fn font(capacity: usize) -> (Font, Rc<Cell<usize>>) {
        let raster = BoxRasterizer::default();
        let calls = raster.calls.clone();
        (Font::new(Box::new(raster), capacity), calls)
    }

    fn atlas() -> AtlasManager {
        AtlasManager::new(AtlasConfig { default_surface_size: 128, max_surface_size: 128, ..AtlasConfig::default() })
    }

    // ── hits / misses ─────────────────────────────────────────────────────

    #[test]
    fn second_request_is_a_cache_hit() {
        let (mut font, calls) = font(8);
        let mut atlas = atlas();
        let a = font.get_glyph('A', 16.0, &mut atlas, 1);
        let b = font.get_glyph('A', 16.0, &mut atlas, 1);
        assert_eq!(calls.get(), 1);
        assert_eq!(a.texture, b.texture);
        assert_eq!(font.stats().hits, 1);
        assert_eq!(font.stats().misses, 1);
    }

    #[test]
    fn glyph_uv_matches_its_atlas_texture() {
        let (mut font, _) = font(8);
        let mut atlas = atlas();
        let g = font.get_glyph('A', 16.0, &mut atlas, 1);
        let texture = g.texture.unwrap();
        assert_eq!(g.uv, atlas.get_uv(texture).unwrap());
        assert_eq!(g.surface, Some(atlas.texture_surface(texture).unwrap()));
        assert_eq!((g.width, g.height), (8, 16));
        for v in [g.uv.u0, g.uv.v0, g.uv.u1, g.uv.v1] {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn whitespace_is_cached_without_texture() {
        let (mut font, _) = font(8);
        let mut atlas = atlas();
        let g = font.get_glyph(' ', 16.0, &mut atlas, 1);
        assert!(!g.has_bitmap());
        assert_eq!(g.advance, 4.0);
        assert_eq!(atlas.stats().textures, 0);
        assert_eq!(font.cache().len(), 1);
    }

    // ── eviction ──────────────────────────────────────────────────────────

    #[test]
    fn eviction_releases_atlas_texture() {
        let (mut font, _) = font(2);
        let mut atlas = atlas();
        let a = font.get_glyph('a', 16.0, &mut atlas, 1);
        font.get_glyph('b', 16.0, &mut atlas, 1);
        font.get_glyph('c', 16.0, &mut atlas, 2);

        assert_eq!(font.cache().len(), 2);
        assert_eq!(font.stats().evictions, 1);
        assert!(matches!(atlas.get_uv(a.texture.unwrap()), Err(RenderError::NotFound(_))));
        assert_eq!(atlas.stats().textures, 2);
    }

    #[test]
    fn working_set_of_the_frame_is_never_evicted() {
        let (mut font, _) = font(2);
        let mut atlas = atlas();
        let a = font.get_glyph('a', 16.0, &mut atlas, 5);
        let b = font.get_glyph('b', 16.0, &mut atlas, 5);
        let c = font.get_glyph('c', 16.0, &mut atlas, 5);

        assert!(!c.has_bitmap());
        assert_eq!(c.advance, 9.6);
        assert_eq!(font.stats().dropped, 1);
        assert!(atlas.get_uv(a.texture.unwrap()).is_ok());
        assert!(atlas.get_uv(b.texture.unwrap()).is_ok());
    }

    #[test]
    fn distinct_requests_never_exceed_the_bound() {
        let (mut font, _) = font(4);
        let mut atlas = atlas();
        for (frame, ch) in ('a'..='z').enumerate() {
            for size in [12.0, 14.0] {
                font.get_glyph(ch, size, &mut atlas, frame as u64);
                assert!(font.cache().len() <= 4);
                assert!(font.cache().textured_len() <= 4);
                assert!(atlas.stats().textures <= 4);
            }
        }
    }

    // ── degradation ───────────────────────────────────────────────────────

    #[test]
    fn rasterization_failure_yields_space_width_placeholder() {
        let (mut font, calls) = font(4);
        let mut atlas = atlas();
        let g = font.get_glyph('\u{fffd}', 16.0, &mut atlas, 1);
        assert!(!g.has_bitmap());
        assert_eq!(g.advance, 4.0);
        assert_eq!(font.stats().rasterize_failures, 1);
        font.get_glyph('\u{fffd}', 16.0, &mut atlas, 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn exhausted_atlas_drops_glyph_uncached() {
        let (mut font, _) = font(4);
        let mut atlas = AtlasManager::new(AtlasConfig {
            default_surface_size: 16,
            max_surface_size: 16,
            padding: 0,
            defrag_threshold: 0.5,
        });
        let g = font.get_glyph('W', 64.0, &mut atlas, 1);
        assert!(!g.has_bitmap());
        assert_eq!(g.advance, 38.4);
        assert_eq!(font.stats().dropped, 1);
        assert!(font.cache().is_empty());
    }

    // ── kerning / release ─────────────────────────────────────────────────

    #[test]
    fn kerning_is_scaled_and_cached() {
        let (mut font, _) = font(4);
        assert_eq!(font.kerning('A', 'V', 20.0), -2.0);
        assert_eq!(font.kerning('V', 'A', 20.0), 0.0);
        assert_eq!(font.kerning.len(), 2);
    }

    #[test]
    fn release_frees_every_texture() {
        let (mut font, _) = font(4);
        let mut atlas = atlas();
        for ch in "abc".chars() {
            font.get_glyph(ch, 16.0, &mut atlas, 1);
        }
        font.release(&mut atlas);
        assert!(font.cache().is_empty());
        assert_eq!(atlas.stats().textures, 0);
    }
}
