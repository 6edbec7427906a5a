use crate::atlas::UvRect;
use crate::coords::{Rect, ScissorRect, Vec2};
use crate::paint::Color;
use crate::render::{quad_vertices, Vertex};
use crate::text::FontId;

use super::{DrawCommand, RenderState, TextRange, TextRunCmd, VertexRange};

/// Recorded draw stream for a frame.
///
/// Performance characteristics:
/// - `push_*()` is amortized O(vertices); pools grow by doubling
/// - `clear()` keeps every allocation, so a warmed buffer records a frame
///   without allocating
///
/// Vertex and text data are copied in; nothing borrowed from the caller
/// outlives the push call.
///
/// # Clipping
///
/// Use [`push_scissor`](Self::push_scissor) / [`pop_scissor`](Self::pop_scissor)
/// to scope draw commands to a clip rect. Clips are intersected with the
/// current parent, so nested scroll containers work correctly.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<DrawCommand>,
    vertices: Vec<Vertex>,
    text: String,

    /// Stack of active clips. The top is the effective clip, already
    /// intersected with all parents.
    scissor_stack: Vec<ScissorRect>,

    /// Bumped by `clear()`; vertex ranges are only meaningful within one generation.
    generation: u64,

    warned_partial_triangle: bool,
}

impl CommandBuffer {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(commands: usize, vertices: usize) -> Self {
        Self {
            commands: Vec::with_capacity(commands),
            vertices: Vec::with_capacity(vertices),
            ..Self::default()
        }
    }

    /// Clears recorded commands, pools and the clip stack. Keeps allocated
    /// capacity for reuse.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.vertices.clear();
        self.text.clear();
        self.scissor_stack.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Commands in submission order.
    #[inline]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn vertex_capacity(&self) -> usize {
        self.vertices.capacity()
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Vertices referenced by a Triangles or TexturedQuad command.
    #[inline]
    pub fn vertex_slice(&self, range: VertexRange) -> &[Vertex] {
        &self.vertices[range.range()]
    }

    /// String of a text run.
    #[inline]
    pub fn text(&self, run: &TextRunCmd) -> &str {
        let start = run.text.start as usize;
        &self.text[start..start + run.text.len as usize]
    }

    /// Effective clip for newly pushed commands.
    #[inline]
    pub fn current_scissor(&self) -> Option<ScissorRect> {
        self.scissor_stack.last().copied()
    }

    /// Records a triangle list. The state's scissor is replaced by the active clip.
    ///
    /// Trailing vertices that do not complete a triangle are dropped: batches
    /// concatenate commands, so they would shift every later triangle.
    pub fn push_triangles(&mut self, state: RenderState, vertices: &[Vertex]) {
        let whole = vertices.len() - vertices.len() % 3;
        if whole != vertices.len() && !self.warned_partial_triangle {
            log::warn!(
                "triangle list of {} vertices is not a multiple of 3; dropping the last {}",
                vertices.len(),
                vertices.len() - whole
            );
            self.warned_partial_triangle = true;
        }
        let vertices = &vertices[..whole];
        if vertices.is_empty() {
            return;
        }
        let range = self.push_vertices(vertices);
        let state = state.with_scissor(self.current_scissor());
        self.commands.push(DrawCommand::Triangles { state, vertices: range });
    }

    /// Records a quad (two triangles) sampling `uv`.
    pub fn push_textured_quad(&mut self, state: RenderState, rect: Rect, uv: UvRect, color: Color) {
        let rect = rect.normalized();
        if rect.is_empty() {
            return;
        }
        let range = self.push_vertices(&quad_vertices(rect, uv, color));
        let state = state.with_scissor(self.current_scissor());
        self.commands.push(DrawCommand::TexturedQuad { state, vertices: range });
    }

    /// Records a text run. Glyphs are resolved when the frame is batched.
    pub fn push_text(
        &mut self,
        state: RenderState,
        font: FontId,
        size: f32,
        origin: Vec2,
        color: Color,
        text: &str,
    ) {
        if text.is_empty() {
            return;
        }
        grow(&mut self.text, text.len());
        let start = self.text.len() as u32;
        self.text.push_str(text);

        self.commands.push(DrawCommand::TextRun(TextRunCmd {
            state: state.with_scissor(self.current_scissor()),
            font,
            size,
            origin,
            color,
            text: TextRange { start, len: text.len() as u32 },
        }));
    }

    /// Begins a clip region. Commands pushed until [`pop_scissor`](Self::pop_scissor)
    /// are clipped to `rect` intersected with any parent clip.
    ///
    /// Calls must be balanced with `pop_scissor`.
    pub fn push_scissor(&mut self, rect: ScissorRect) {
        let effective = match self.scissor_stack.last() {
            None => rect,
            // No overlap: a zero-area clip, so the executor skips those draws.
            Some(&parent) => parent.intersect(rect).unwrap_or(ScissorRect::new(rect.x, rect.y, 0, 0)),
        };
        self.scissor_stack.push(effective);
        self.commands.push(DrawCommand::SetScissor(effective));
    }

    /// Ends the most recent clip region, restoring the parent clip.
    pub fn pop_scissor(&mut self) {
        if self.scissor_stack.pop().is_none() {
            log::warn!("pop_scissor called without matching push_scissor");
            return;
        }
        match self.scissor_stack.last() {
            Some(&parent) => self.commands.push(DrawCommand::SetScissor(parent)),
            None => self.commands.push(DrawCommand::ResetScissor),
        }
    }

    /// Drops every active clip.
    pub fn reset_scissor(&mut self) {
        if self.scissor_stack.is_empty() {
            return;
        }
        self.scissor_stack.clear();
        self.commands.push(DrawCommand::ResetScissor);
    }

    fn push_vertices(&mut self, vertices: &[Vertex]) -> VertexRange {
        grow(&mut self.vertices, vertices.len());
        let start = self.vertices.len() as u32;
        self.vertices.extend_from_slice(vertices);
        VertexRange { start, len: vertices.len() as u32 }
    }
}

/// Pools never shrink; on overflow capacity at least doubles.
trait Pool {
    fn len(&self) -> usize;
    fn capacity(&self) -> usize;
    fn reserve_exact(&mut self, additional: usize);
}

impl<T> Pool for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }
    fn capacity(&self) -> usize {
        Vec::capacity(self)
    }
    fn reserve_exact(&mut self, additional: usize) {
        Vec::reserve_exact(self, additional);
    }
}

impl Pool for String {
    fn len(&self) -> usize {
        String::len(self)
    }
    fn capacity(&self) -> usize {
        String::capacity(self)
    }
    fn reserve_exact(&mut self, additional: usize) {
        String::reserve_exact(self, additional);
    }
}

fn grow<P: Pool>(pool: &mut P, additional: usize) {
    let needed = pool.len() + additional;
    if needed <= pool.capacity() {
        return;
    }
    let target = needed.max(pool.capacity() * 2);
    pool.reserve_exact(target - pool.len());
}
