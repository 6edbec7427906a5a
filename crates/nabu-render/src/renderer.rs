use crate::atlas::{AtlasManager, PixelFormat, TextureId, UvRect};
use crate::config::RendererConfig;
use crate::coords::{Rect, ScissorRect, Vec2};
use crate::error::RenderResult;
use crate::paint::Color;
use crate::render::{BatchBuilder, DrawBatch, FrameExecutor, FrameStats, GraphicsDevice, Vertex};
use crate::scene::{BlendMode, CommandBuffer, RenderState};
use crate::text::{FontId, FontSystem, GlyphResolver, OutlineRasterizer};

/// Explicit per-application rendering context.
///
/// Owns the atlas, the fonts and the frame's command buffer. Configuration is
/// fixed at construction. A frame is:
///
/// ```ignore
/// renderer.begin_frame();
/// renderer.draw_text(font, 16.0, Vec2::new(8.0, 8.0), Color::WHITE, "hello");
/// let stats = renderer.end_frame(&mut device);
/// ```
///
/// Single-threaded: nothing here is synchronized, and every call for a frame
/// must come from the thread that owns the graphics context.
pub struct Renderer {
    config: RendererConfig,
    atlas: AtlasManager,
    fonts: FontSystem,
    commands: CommandBuffer,
    builder: BatchBuilder,
    executor: FrameExecutor,
    frame: u64,
}

impl Renderer {
    /// Validates `config` and builds an empty renderer.
    pub fn new(config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        log::debug!("renderer config: {config:?}");
        Ok(Self {
            atlas: AtlasManager::new(config.atlas.clone()),
            fonts: FontSystem::new(config.glyph_cache_capacity),
            commands: CommandBuffer::new(),
            builder: BatchBuilder::new(config.max_batch_vertices)?,
            executor: FrameExecutor::new(),
            frame: 0,
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Number of the frame being recorded. Glyphs used in this frame are
    /// never evicted.
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn atlas(&self) -> &AtlasManager {
        &self.atlas
    }

    #[inline]
    pub fn fonts(&self) -> &FontSystem {
        &self.fonts
    }

    /// Recorded commands, for submissions with a custom [`RenderState`].
    #[inline]
    pub fn commands_mut(&mut self) -> &mut CommandBuffer {
        &mut self.commands
    }

    /// Batches produced by the last [`end_frame`](Self::end_frame).
    #[inline]
    pub fn last_batches(&self) -> &[DrawBatch] {
        self.builder.batches()
    }

    // ── frame lifecycle ────────────────────────────────────────────────────

    /// Starts a new frame: advances the frame number and clears the previous
    /// frame's commands.
    pub fn begin_frame(&mut self) {
        self.frame += 1;
        self.commands.clear();
    }

    /// Batches the recorded commands and flushes them to `device`.
    ///
    /// Glyphs are resolved here, so text drawn this frame is rasterized and
    /// uploaded before the first draw call. Always completes the frame;
    /// failures are reflected in the returned stats.
    pub fn end_frame(&mut self, device: &mut dyn GraphicsDevice) -> FrameStats {
        let dropped_before = self.fonts.stats().dropped;

        let mut glyphs = GlyphResolver {
            fonts: &mut self.fonts,
            atlas: &mut self.atlas,
            frame: self.frame,
        };
        self.builder.build(&self.commands, &mut glyphs);

        let mut stats = self.executor.execute(
            self.builder.batches(),
            self.builder.vertices(),
            &mut self.atlas,
            device,
        );
        stats.dropped_glyphs = (self.fonts.stats().dropped - dropped_before) as usize;
        log::trace!("frame {}: {stats:?}", self.frame);
        stats
    }

    /// Drops everything recorded since `begin_frame` without drawing.
    pub fn discard_frame(&mut self) {
        self.commands.clear();
    }

    /// Repacks atlas surfaces whose freed share exceeds the configured
    /// threshold and updates cached glyph UVs. Returns the number of surfaces
    /// rebuilt.
    ///
    /// Call between frames. Unflushed commands are discarded since their
    /// texture coordinates may no longer be valid.
    pub fn defragment_atlas(&mut self) -> usize {
        let rebuilt = self.atlas.defragment();
        if rebuilt > 0 {
            self.fonts.refresh_placements(&self.atlas);
            self.commands.clear();
        }
        rebuilt
    }

    // ── resources ─────────────────────────────────────────────────────────

    pub fn add_texture(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: &[u8],
    ) -> RenderResult<TextureId> {
        self.atlas.add_texture(width, height, format, pixels)
    }

    pub fn remove_texture(&mut self, id: TextureId) -> RenderResult<()> {
        self.atlas.remove_texture(id)
    }

    pub fn texture_uv(&self, id: TextureId) -> RenderResult<UvRect> {
        self.atlas.get_uv(id)
    }

    pub fn load_font(&mut self, bytes: &[u8]) -> RenderResult<FontId> {
        self.fonts.load_font(bytes)
    }

    pub fn load_font_with(&mut self, rasterizer: Box<dyn OutlineRasterizer>) -> FontId {
        self.fonts.load_font_with(rasterizer)
    }

    pub fn unload_font(&mut self, id: FontId) -> RenderResult<()> {
        self.fonts.unload_font(id, &mut self.atlas)
    }

    pub fn measure_text(&mut self, font: FontId, text: &str, size: f32) -> RenderResult<Vec2> {
        self.fonts.measure_text(font, text, size)
    }

    // ── drawing ───────────────────────────────────────────────────────────

    pub fn draw_triangles(&mut self, state: RenderState, vertices: &[Vertex]) {
        self.commands.push_triangles(state, vertices);
    }

    /// Draws the whole of `texture` stretched over `rect`.
    pub fn draw_textured_quad(
        &mut self,
        texture: TextureId,
        rect: Rect,
        color: Color,
        blend: BlendMode,
    ) -> RenderResult<()> {
        let uv = self.atlas.get_uv(texture)?;
        let state = RenderState::textured(texture).with_blend(blend);
        self.commands.push_textured_quad(state, rect, uv, color);
        Ok(())
    }

    /// Draws `text` with its first line's top at `origin`. `\n` starts a new line.
    pub fn draw_text(&mut self, font: FontId, size: f32, origin: Vec2, color: Color, text: &str) {
        self.commands.push_text(RenderState::solid(), font, size, origin, color, text);
    }

    pub fn push_scissor(&mut self, rect: ScissorRect) {
        self.commands.push_scissor(rect);
    }

    pub fn pop_scissor(&mut self) {
        self.commands.pop_scissor();
    }

    pub fn reset_scissor(&mut self) {
        self.commands.reset_scissor();
    }
}
