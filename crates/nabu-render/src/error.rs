use std::fmt;

use crate::scene::TextureRef;

/// Errors produced by the atlas, glyph cache and frame pipeline.
///
/// None of these are fatal: callers degrade the affected draw (uncached
/// texture, blank glyph advance, fallback texture) and keep the frame going.
/// Only `InvalidConfig` is reported before any frame starts.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// No surface, even at the configured maximum size, can hold the request.
    AtlasExhausted { width: u32, height: u32 },
    /// A texture, surface, font or glyph id is unknown or was released.
    NotFound(String),
    /// Pixel buffer length does not match `width * height * bytes_per_pixel`.
    InvalidPixelData { expected: usize, actual: usize },
    /// A batch references a texture that was evicted after the command was recorded.
    StaleTexture(TextureRef),
    /// The outline rasterizer could not produce a bitmap for a codepoint.
    GlyphRasterizationFailed { codepoint: char, reason: String },
    /// Font bytes were rejected by the outline rasterizer.
    FontLoad(String),
    /// Configuration rejected at setup time.
    InvalidConfig(String),
}

impl RenderError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtlasExhausted { width, height } => {
                write!(f, "atlas exhausted: no surface can fit {width}x{height}")
            }
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::InvalidPixelData { expected, actual } => {
                write!(f, "pixel data has {actual} bytes, expected {expected}")
            }
            Self::StaleTexture(texture) => write!(f, "stale texture reference {texture:?}"),
            Self::GlyphRasterizationFailed { codepoint, reason } => {
                write!(f, "failed to rasterize {codepoint:?}: {reason}")
            }
            Self::FontLoad(msg) => write!(f, "font load error: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "invalid renderer config: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {}

pub type RenderResult<T> = Result<T, RenderError>;
