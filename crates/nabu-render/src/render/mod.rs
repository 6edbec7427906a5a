//! Frame pipeline back half.
//!
//! The batch builder turns a recorded `CommandBuffer` into state-homogeneous
//! vertex ranges; the executor walks those ranges against a `GraphicsDevice`.
//! `WgpuDevice` is the device implementation used by applications.
//!
//! Convention:
//! - CPU geometry is in logical pixels (top-left origin, +Y down).
//! - The vertex shader converts to NDC using a viewport uniform.

mod batch;
mod ctx;
mod device;
mod executor;
mod vertex;
mod wgpu_device;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchBuilder, DrawBatch, GlyphQuad, GlyphSource};
pub use ctx::{RenderCtx, RenderTarget};
pub use device::{GraphicsDevice, SurfaceHandle};
pub use executor::{FrameExecutor, FrameStats};
pub use vertex::Vertex;
pub use wgpu_device::{WgpuDevice, WgpuFrame};

pub(crate) use vertex::quad_vertices;
