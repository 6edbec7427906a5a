//! Fonts and glyph caching.
//!
//! Responsibilities:
//! - wrap the outline rasterizer (`rasterizer`)
//! - cache rasterized glyphs per font with LRU eviction (`glyph_cache`, `font`)
//! - own fonts by id and lay out text runs into glyph quads (`font_system`)

mod font;
mod font_system;
mod glyph_cache;
mod rasterizer;

#[cfg(test)]
pub(crate) mod testing;

pub use font::{Font, FontStats};
pub use font_system::{FontId, FontSystem};
pub use glyph_cache::{Glyph, GlyphCache, GlyphKey};
pub use rasterizer::{FontdueRasterizer, LineMetrics, OutlineRasterizer, RasterizedGlyph};

pub(crate) use font_system::GlyphResolver;
