//! Nabu render crate.
//!
//! Batched 2D draw pipeline for immediate-mode UI: a command buffer recorded
//! each frame, a batch builder that merges state-compatible draws, a texture
//! atlas and a bounded per-font glyph cache. GPU work goes through the
//! `GraphicsDevice` trait; `WgpuDevice` is the wgpu implementation.

pub mod logging;
pub mod error;
pub mod config;
pub mod coords;
pub mod paint;
pub mod atlas;
pub mod text;
pub mod scene;
pub mod render;
mod renderer;

pub use atlas::{PixelFormat, TextureId, UvRect};
pub use config::{AtlasConfig, RendererConfig};
pub use error::{RenderError, RenderResult};
pub use render::{FrameStats, GraphicsDevice, Vertex};
pub use renderer::Renderer;
pub use scene::{BlendMode, RenderState};
pub use text::FontId;
