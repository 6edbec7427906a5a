use core::ops::Range;

use crate::coords::{ScissorRect, Vec2};
use crate::paint::Color;
use crate::text::FontId;

use super::RenderState;

/// Slice of the command buffer's vertex pool.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct VertexRange {
    pub start: u32,
    pub len: u32,
}

impl VertexRange {
    #[inline]
    pub fn range(self) -> Range<usize> {
        self.start as usize..(self.start + self.len) as usize
    }
}

/// Slice of the command buffer's text pool (byte offsets).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TextRange {
    pub start: u32,
    pub len: u32,
}

/// Text run payload. Glyph quads are produced when the frame is batched.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextRunCmd {
    /// Blend, shader and scissor for the run. The texture is chosen per glyph
    /// (the atlas surface holding it), so `state.texture` is ignored.
    pub state: RenderState,
    pub font: FontId,
    /// Font size in pixels.
    pub size: f32,
    /// Top-left of the first line.
    pub origin: Vec2,
    pub color: Color,
    pub text: TextRange,
}

/// Recorded draw operation.
///
/// Commands are immutable once pushed and are consumed in submission order.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Triangles { state: RenderState, vertices: VertexRange },
    TexturedQuad { state: RenderState, vertices: VertexRange },
    TextRun(TextRunCmd),
    /// The scissor changes for subsequent commands. Always a batch boundary.
    SetScissor(ScissorRect),
    /// Clipping is disabled for subsequent commands. Always a batch boundary.
    ResetScissor,
}

impl DrawCommand {
    /// Render state of drawing commands; `None` for scissor changes.
    pub fn state(&self) -> Option<&RenderState> {
        match self {
            DrawCommand::Triangles { state, .. } | DrawCommand::TexturedQuad { state, .. } => Some(state),
            DrawCommand::TextRun(run) => Some(&run.state),
            DrawCommand::SetScissor(_) | DrawCommand::ResetScissor => None,
        }
    }
}
