//! Deterministic outline rasterizer for unit tests.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::{RenderError, RenderResult};

use super::{LineMetrics, OutlineRasterizer, RasterizedGlyph};

/// Produces solid `size/2 x size` bitmaps, advances of `0.6 * size` (a
/// quarter em for spaces) and a single `A`/`V` kerning pair. Counts
/// `rasterize` calls and fails on U+FFFD.
#[derive(Clone, Default)]
pub(crate) struct BoxRasterizer {
    pub calls: Rc<Cell<usize>>,
}

impl OutlineRasterizer for BoxRasterizer {
    fn rasterize(&self, codepoint: char, px: f32) -> RenderResult<RasterizedGlyph> {
        self.calls.set(self.calls.get() + 1);
        if codepoint == '\u{fffd}' {
            return Err(RenderError::GlyphRasterizationFailed { codepoint, reason: "test".into() });
        }
        if codepoint.is_whitespace() {
            return Ok(RasterizedGlyph { advance: self.advance(codepoint, px), ..Default::default() });
        }
        let (w, h) = ((px / 2.0) as u32, px as u32);
        Ok(RasterizedGlyph {
            width: w,
            height: h,
            advance: self.advance(codepoint, px),
            bearing_x: 1.0,
            bearing_y: px * 0.75,
            coverage: vec![255; (w * h) as usize],
        })
    }

    fn advance(&self, codepoint: char, px: f32) -> f32 {
        if codepoint.is_whitespace() { px * 0.25 } else { px * 0.6 }
    }

    fn kerning(&self, left: char, right: char) -> Option<f32> {
        (left == 'A' && right == 'V').then_some(-0.1)
    }

    fn line_metrics(&self) -> LineMetrics {
        LineMetrics { ascent: 0.75, descent: -0.25, line_gap: 0.0 }
    }
}
