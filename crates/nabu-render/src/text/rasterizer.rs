use crate::error::{RenderError, RenderResult};

/// Coverage bitmap plus placement metrics for one glyph at one pixel size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterizedGlyph {
    pub width: u32,
    pub height: u32,
    /// Horizontal pen advance in px.
    pub advance: f32,
    /// Offset from the pen position to the bitmap's left edge.
    pub bearing_x: f32,
    /// Distance from the baseline up to the bitmap's top edge.
    pub bearing_y: f32,
    /// `width * height` bytes, row-major, top row first.
    pub coverage: Vec<u8>,
}

/// Vertical font metrics in em units (multiply by the pixel size).
///
/// `descent` is negative: it lies below the baseline.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub line_gap: f32,
}

impl LineMetrics {
    /// Baseline-to-baseline distance at `size` px.
    #[inline]
    pub fn line_height(&self, size: f32) -> f32 {
        (self.ascent - self.descent + self.line_gap) * size
    }
}

impl Default for LineMetrics {
    fn default() -> Self {
        Self { ascent: 0.8, descent: -0.2, line_gap: 0.0 }
    }
}

/// Third-party outline rasterizer wrapped behind the glyph cache.
///
/// The cache calls `rasterize` once per miss; everything else is metric
/// lookups that never allocate a bitmap.
pub trait OutlineRasterizer {
    fn rasterize(&self, codepoint: char, px: f32) -> RenderResult<RasterizedGlyph>;

    /// Pen advance of `codepoint` at `px`, without rasterizing.
    fn advance(&self, codepoint: char, px: f32) -> f32;

    /// Pair adjustment in em units, if the font's kerning table has one.
    fn kerning(&self, left: char, right: char) -> Option<f32>;

    fn line_metrics(&self) -> LineMetrics;
}

/// [`OutlineRasterizer`] backed by `fontdue`.
pub struct FontdueRasterizer {
    font: fontdue::Font,
}

impl FontdueRasterizer {
    /// Parses a TrueType or OpenType font from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> RenderResult<Self> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| RenderError::FontLoad(e.to_string()))?;
        Ok(Self { font })
    }
}

impl OutlineRasterizer for FontdueRasterizer {
    fn rasterize(&self, codepoint: char, px: f32) -> RenderResult<RasterizedGlyph> {
        if !px.is_finite() || px <= 0.0 {
            return Err(RenderError::GlyphRasterizationFailed {
                codepoint,
                reason: format!("invalid pixel size {px}"),
            });
        }
        let index = self.font.lookup_glyph_index(codepoint);
        // Index 0 is .notdef; whitespace legitimately maps there in some fonts.
        if index == 0 && !codepoint.is_whitespace() {
            return Err(RenderError::GlyphRasterizationFailed {
                codepoint,
                reason: "font has no glyph for codepoint".to_owned(),
            });
        }

        let (metrics, coverage) = self.font.rasterize_indexed(index, px);
        Ok(RasterizedGlyph {
            width: metrics.width as u32,
            height: metrics.height as u32,
            advance: metrics.advance_width,
            bearing_x: metrics.xmin as f32,
            bearing_y: (metrics.ymin + metrics.height as i32) as f32,
            coverage,
        })
    }

    fn advance(&self, codepoint: char, px: f32) -> f32 {
        self.font.metrics(codepoint, px).advance_width
    }

    fn kerning(&self, left: char, right: char) -> Option<f32> {
        self.font.horizontal_kern(left, right, 1.0)
    }

    fn line_metrics(&self) -> LineMetrics {
        self.font
            .horizontal_line_metrics(1.0)
            .map(|m| LineMetrics { ascent: m.ascent, descent: m.descent, line_gap: m.line_gap })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_a_load_error() {
        assert!(matches!(FontdueRasterizer::from_bytes(b"not a font"), Err(RenderError::FontLoad(_))));
    }

    #[test]
    fn line_height_includes_gap() {
        let m = LineMetrics { ascent: 0.75, descent: -0.25, line_gap: 0.5 };
        assert_eq!(m.line_height(10.0), 15.0);
    }
}
