use crate::atlas::{SurfaceId, TextureId};
use crate::coords::ScissorRect;

/// Texture a draw samples from.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum TextureRef {
    /// Untextured; the executor binds a 1x1 white texture.
    #[default]
    Solid,
    /// A texture stored in the atlas. Resolved to its surface at flush time.
    Atlas(TextureId),
    /// A whole atlas surface. Used for glyph quads, which carry their own UVs.
    Surface(SurfaceId),
}

/// Fixed-function blend configuration.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Premultiplied source-over.
    #[default]
    Alpha,
    Additive,
    /// Blending disabled.
    Opaque,
}

/// Opaque shader program id. `ShaderId::DEFAULT` is the textured, vertex-colored program.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

impl ShaderId {
    pub const DEFAULT: ShaderId = ShaderId(0);
}

/// Everything that must match for two draws to share one draw call.
///
/// Every field is integer-valued, so equality is bitwise equality.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct RenderState {
    pub texture: TextureRef,
    pub blend: BlendMode,
    pub shader: ShaderId,
    /// `None` = no clipping.
    pub scissor: Option<ScissorRect>,
}

impl RenderState {
    #[inline]
    pub const fn solid() -> Self {
        Self {
            texture: TextureRef::Solid,
            blend: BlendMode::Alpha,
            shader: ShaderId::DEFAULT,
            scissor: None,
        }
    }

    #[inline]
    pub const fn textured(texture: TextureId) -> Self {
        Self { texture: TextureRef::Atlas(texture), ..Self::solid() }
    }

    #[inline]
    pub const fn with_texture(self, texture: TextureRef) -> Self {
        Self { texture, ..self }
    }

    #[inline]
    pub const fn with_blend(self, blend: BlendMode) -> Self {
        Self { blend, ..self }
    }

    #[inline]
    pub const fn with_shader(self, shader: ShaderId) -> Self {
        Self { shader, ..self }
    }

    #[inline]
    pub const fn with_scissor(self, scissor: Option<ScissorRect>) -> Self {
        Self { scissor, ..self }
    }
}
