//! Geometry types shared by the command buffer, atlas and renderers.
//!
//! Canonical CPU space:
//! - Logical pixels for vertex positions, origin top-left, +X right, +Y down
//! - Physical pixels (integers) for scissor rectangles
//!
//! The device implementation converts positions to NDC using a viewport uniform.

mod rect;
mod scissor;
mod vec2;
mod viewport;

pub use rect::Rect;
pub use scissor::ScissorRect;
pub use vec2::Vec2;
pub use viewport::Viewport;
