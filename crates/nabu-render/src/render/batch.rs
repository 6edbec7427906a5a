use core::ops::Range;

use crate::atlas::SurfaceId;
use crate::error::{RenderError, RenderResult};
use crate::scene::{CommandBuffer, DrawCommand, RenderState, TextRunCmd, TextureRef};

use super::Vertex;

/// One draw call: a contiguous vertex range drawn with a single state.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawBatch {
    pub state: RenderState,
    /// Range into [`BatchBuilder::vertices`].
    pub vertices: Range<u32>,
    /// Position among the frame's batches.
    pub ordinal: u32,
}

impl DrawBatch {
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertices.end - self.vertices.start
    }
}

/// A laid-out glyph: six vertices sampling one atlas surface.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlyphQuad {
    pub surface: SurfaceId,
    pub vertices: [Vertex; 6],
}

/// Turns text runs into glyph quads while a frame is batched.
pub trait GlyphSource {
    /// Appends the quads of `run` to `out` in reading order. Glyphs without a
    /// bitmap (spaces, placeholders) only advance the pen and emit nothing.
    fn layout_run(&mut self, run: &TextRunCmd, text: &str, out: &mut Vec<GlyphQuad>);
}

/// Partitions a command stream into the fewest batches that preserve
/// submission order.
///
/// A new batch starts when the render state changes, when the running vertex
/// count would exceed the configured maximum, or at any scissor command.
/// Commands are never reordered or merged across a differing command, and a
/// single command is never split on the size limit. Text runs are split only
/// where consecutive glyphs live on different atlas surfaces.
#[derive(Debug)]
pub struct BatchBuilder {
    max_vertices: u32,
    batches: Vec<DrawBatch>,
    vertices: Vec<Vertex>,
    glyph_quads: Vec<GlyphQuad>,
}

impl BatchBuilder {
    pub fn new(max_vertices: u32) -> RenderResult<Self> {
        if max_vertices == 0 {
            return Err(RenderError::invalid_config("max_batch_vertices must be non-zero"));
        }
        Ok(Self {
            max_vertices,
            batches: Vec::new(),
            vertices: Vec::new(),
            glyph_quads: Vec::new(),
        })
    }

    /// Batches of the last `build`, in draw order.
    #[inline]
    pub fn batches(&self) -> &[DrawBatch] {
        &self.batches
    }

    /// Frame vertex buffer the batches index into.
    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Rebuilds the batch list for `commands`. Output of any previous build is
    /// discarded; allocations are kept.
    pub fn build(&mut self, commands: &CommandBuffer, glyphs: &mut dyn GlyphSource) -> &[DrawBatch] {
        self.batches.clear();
        self.vertices.clear();

        let mut open: Option<DrawBatch> = None;
        for cmd in commands.commands() {
            match cmd {
                DrawCommand::SetScissor(_) | DrawCommand::ResetScissor => self.close(&mut open),
                DrawCommand::Triangles { state, vertices } | DrawCommand::TexturedQuad { state, vertices } => {
                    let slice = commands.vertex_slice(*vertices);
                    self.append(&mut open, *state, slice);
                }
                DrawCommand::TextRun(run) => {
                    let mut quads = std::mem::take(&mut self.glyph_quads);
                    quads.clear();
                    glyphs.layout_run(run, commands.text(run), &mut quads);

                    for segment in quads.chunk_by(|a, b| a.surface == b.surface) {
                        let state = run.state.with_texture(TextureRef::Surface(segment[0].surface));
                        self.reserve(&mut open, state, (segment.len() * 6) as u32);
                        self.vertices.extend(segment.iter().flat_map(|q| q.vertices));
                    }
                    self.glyph_quads = quads;
                }
            }
        }
        self.close(&mut open);

        &self.batches
    }

    fn append(&mut self, open: &mut Option<DrawBatch>, state: RenderState, vertices: &[Vertex]) {
        if vertices.is_empty() {
            return;
        }
        self.reserve(open, state, vertices.len() as u32);
        self.vertices.extend_from_slice(vertices);
    }

    /// Extends the open batch by `count` vertices, or closes it and opens a
    /// new one adopting `state`. Must be followed by pushing exactly `count`
    /// vertices.
    fn reserve(&mut self, open: &mut Option<DrawBatch>, state: RenderState, count: u32) {
        if let Some(batch) = open {
            if batch.state == state && batch.vertex_count() + count <= self.max_vertices {
                batch.vertices.end += count;
                return;
            }
        }
        self.close(open);

        let start = self.vertices.len() as u32;
        *open = Some(DrawBatch {
            state,
            vertices: start..start + count,
            ordinal: self.batches.len() as u32,
        });
    }

    fn close(&mut self, open: &mut Option<DrawBatch>) {
        if let Some(batch) = open.take() {
            self.batches.push(batch);
        }
    }
}
