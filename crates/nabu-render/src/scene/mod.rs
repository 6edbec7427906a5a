//! Scene (draw stream) types.
//!
//! Responsibilities:
//! - describe the GPU state a draw needs (`RenderState`)
//! - store per-frame draw commands in submission order (`CommandBuffer`)
//! - own the frame's vertex pool and text pool

mod buffer;
mod cmd;
mod state;

pub use buffer::CommandBuffer;
pub use cmd::{DrawCommand, TextRange, TextRunCmd, VertexRange};
pub use state::{BlendMode, RenderState, ShaderId, TextureRef};
