//! Texture atlas.
//!
//! Responsibilities:
//! - pack many small images into a few large surfaces (`packer`)
//! - keep a CPU copy of every surface and queue GPU uploads (`surface`)
//! - hand out stable texture ids and their normalized UVs (`manager`)

mod manager;
mod packer;
mod surface;

pub use manager::{AtlasManager, AtlasStats};
pub use packer::{AtlasRect, NodeHandle, PackTree};
pub use surface::AtlasSurface;

/// Stable id of a texture stored in the atlas. Survives defragmentation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u32);

/// Id of one atlas surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub(crate) u32);

/// Texel layout of an atlas surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Single-channel coverage (glyph bitmaps).
    R8,
    /// Premultiplied RGBA, 8 bits per channel.
    Rgba8,
}

impl PixelFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Normalized texture coordinates of a packed rectangle.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl UvRect {
    /// Normalizes `rect` against a `width` x `height` surface.
    #[inline]
    pub fn from_texels(rect: AtlasRect, width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        Self {
            u0: rect.x as f32 / w,
            v0: rect.y as f32 / h,
            u1: rect.right() as f32 / w,
            v1: rect.bottom() as f32 / h,
        }
    }
}
