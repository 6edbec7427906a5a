use crate::atlas::AtlasManager;
use crate::coords::{Rect, Vec2};
use crate::error::{RenderError, RenderResult};
use crate::render::{quad_vertices, GlyphQuad, GlyphSource};
use crate::scene::TextRunCmd;

use super::font::{Font, FontStats};
use super::glyph_cache::Glyph;
use super::rasterizer::{FontdueRasterizer, LineMetrics, OutlineRasterizer};

/// Opaque handle to a font loaded into a [`FontSystem`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FontId(pub(crate) u32);

/// Owns the loaded fonts and their glyph caches.
///
/// Ids are never reused: unloading leaves an empty slot, so a stale
/// `FontId` resolves to `NotFound` instead of another font.
pub struct FontSystem {
    fonts: Vec<Option<Font>>,
    cache_capacity: usize,
    warned_unknown_font: bool,
}

impl FontSystem {
    /// `cache_capacity` bounds the glyph cache of every font loaded later.
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            fonts: Vec::new(),
            cache_capacity,
            warned_unknown_font: false,
        }
    }

    /// Parses and stores a TrueType or OpenType font from raw bytes.
    ///
    /// Returns the `FontId` that identifies the font in text runs.
    pub fn load_font(&mut self, bytes: &[u8]) -> RenderResult<FontId> {
        let rasterizer = FontdueRasterizer::from_bytes(bytes)?;
        Ok(self.load_font_with(Box::new(rasterizer)))
    }

    /// Stores a font backed by a custom outline rasterizer.
    pub fn load_font_with(&mut self, rasterizer: Box<dyn OutlineRasterizer>) -> FontId {
        let id = FontId(self.fonts.len() as u32);
        self.fonts.push(Some(Font::new(rasterizer, self.cache_capacity)));
        log::debug!("loaded font {id:?}");
        id
    }

    /// Drops the font and releases every atlas texture its glyphs hold.
    pub fn unload_font(&mut self, id: FontId, atlas: &mut AtlasManager) -> RenderResult<()> {
        let mut font = self
            .fonts
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or_else(|| RenderError::not_found(format!("font {id:?}")))?;
        font.release(atlas);
        Ok(())
    }

    pub fn font(&self, id: FontId) -> Option<&Font> {
        self.fonts.get(id.0 as usize)?.as_ref()
    }

    pub fn font_mut(&mut self, id: FontId) -> Option<&mut Font> {
        self.fonts.get_mut(id.0 as usize)?.as_mut()
    }

    pub fn get_glyph(
        &mut self,
        id: FontId,
        codepoint: char,
        size: f32,
        atlas: &mut AtlasManager,
        frame: u64,
    ) -> RenderResult<Glyph> {
        let font = self
            .font_mut(id)
            .ok_or_else(|| RenderError::not_found(format!("font {id:?}")))?;
        Ok(font.get_glyph(codepoint, size, atlas, frame))
    }

    pub fn line_metrics(&self, id: FontId) -> RenderResult<LineMetrics> {
        self.font(id)
            .map(Font::line_metrics)
            .ok_or_else(|| RenderError::not_found(format!("font {id:?}")))
    }

    /// Size of `text` laid out as by [`draw_text`](crate::Renderer::draw_text):
    /// the widest line's kerned advance sum, and one line height per line.
    pub fn measure_text(&mut self, id: FontId, text: &str, size: f32) -> RenderResult<Vec2> {
        let font = self
            .font_mut(id)
            .ok_or_else(|| RenderError::not_found(format!("font {id:?}")))?;
        let line_height = font.line_metrics().line_height(size);

        let mut width = 0.0f32;
        let mut lines = 0;
        for line in text.split('\n') {
            lines += 1;
            let mut pen = 0.0;
            let mut prev = None;
            for ch in line.chars() {
                if let Some(p) = prev {
                    pen += font.kerning(p, ch, size);
                }
                pen += font.advance(ch, size);
                prev = Some(ch);
            }
            width = width.max(pen);
        }
        Ok(Vec2::new(width, line_height * lines as f32))
    }

    /// Updates cached glyph UVs after an atlas defragmentation.
    pub(crate) fn refresh_placements(&mut self, atlas: &AtlasManager) {
        for font in self.fonts.iter_mut().flatten() {
            font.refresh_placements(atlas);
        }
    }

    /// Counters summed over every loaded font.
    pub fn stats(&self) -> FontStats {
        let mut total = FontStats::default();
        for font in self.fonts.iter().flatten() {
            total += font.stats();
        }
        total
    }
}

/// [`GlyphSource`] over a font system, used while a frame is batched.
pub(crate) struct GlyphResolver<'a> {
    pub fonts: &'a mut FontSystem,
    pub atlas: &'a mut AtlasManager,
    pub frame: u64,
}

impl GlyphSource for GlyphResolver<'_> {
    fn layout_run(&mut self, run: &TextRunCmd, text: &str, out: &mut Vec<GlyphQuad>) {
        let Some(font) = self.fonts.fonts.get_mut(run.font.0 as usize).and_then(Option::as_mut) else {
            if !self.fonts.warned_unknown_font {
                log::warn!("text run with unknown font {:?}, skipping", run.font);
                self.fonts.warned_unknown_font = true;
            }
            return;
        };

        let metrics = font.line_metrics();
        let line_height = metrics.line_height(run.size);
        let mut pen_x = run.origin.x;
        let mut baseline = run.origin.y + metrics.ascent * run.size;
        let mut prev = None;

        for ch in text.chars() {
            if ch == '\n' {
                pen_x = run.origin.x;
                baseline += line_height;
                prev = None;
                continue;
            }
            if let Some(p) = prev {
                pen_x += font.kerning(p, ch, run.size);
            }

            let glyph = font.get_glyph(ch, run.size, self.atlas, self.frame);
            if let Some(surface) = glyph.surface {
                // Snap to whole pixels so coverage is sampled texel-exact.
                let rect = Rect::new(
                    (pen_x + glyph.bearing_x).round(),
                    (baseline - glyph.bearing_y).round(),
                    glyph.width as f32,
                    glyph.height as f32,
                );
                out.push(GlyphQuad { surface, vertices: quad_vertices(rect, glyph.uv, run.color) });
            }
            pen_x += glyph.advance;
            prev = Some(ch);
        }
    }
}
