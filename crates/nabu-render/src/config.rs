use crate::error::{RenderError, RenderResult};

/// Atlas sizing and maintenance parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasConfig {
    /// Edge length (texels) of a newly created surface.
    pub default_surface_size: u32,

    /// Largest edge length a surface may be created with.
    ///
    /// Requests that do not fit a surface of this size fail with
    /// `AtlasExhausted`.
    pub max_surface_size: u32,

    /// Gutter in texels between packed rectangles.
    pub padding: u32,

    /// Fraction of a surface's allocated area that must be freed before
    /// `defragment` rebuilds it.
    pub defrag_threshold: f32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            default_surface_size: 512,
            max_surface_size: 4096,
            padding: 2,
            defrag_threshold: 0.5,
        }
    }
}

/// Load-time configuration for a [`Renderer`](crate::Renderer).
///
/// All values are resolved once at construction; none can change while
/// frames are being recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub atlas: AtlasConfig,

    /// Upper bound on vertices per batch. A single command larger than this
    /// still becomes exactly one batch.
    pub max_batch_vertices: u32,

    /// Maximum number of cached glyphs per font.
    pub glyph_cache_capacity: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            atlas: AtlasConfig::default(),
            max_batch_vertices: 65_536,
            glyph_cache_capacity: 1024,
        }
    }
}

impl RendererConfig {
    /// Rejects configurations that cannot work before any frame begins.
    pub fn validate(&self) -> RenderResult<()> {
        let atlas = &self.atlas;
        if atlas.max_surface_size == 0 {
            return Err(RenderError::invalid_config("max_surface_size must be non-zero"));
        }
        if atlas.default_surface_size == 0 || atlas.default_surface_size > atlas.max_surface_size {
            return Err(RenderError::invalid_config(format!(
                "default_surface_size {} must be in 1..={}",
                atlas.default_surface_size, atlas.max_surface_size
            )));
        }
        if atlas.padding >= atlas.max_surface_size {
            return Err(RenderError::invalid_config("padding must be smaller than max_surface_size"));
        }
        if !atlas.defrag_threshold.is_finite()
            || atlas.defrag_threshold <= 0.0
            || atlas.defrag_threshold > 1.0
        {
            return Err(RenderError::invalid_config(format!(
                "defrag_threshold {} must be in (0, 1]",
                atlas.defrag_threshold
            )));
        }
        if self.max_batch_vertices == 0 {
            return Err(RenderError::invalid_config("max_batch_vertices must be non-zero"));
        }
        if self.glyph_cache_capacity == 0 {
            return Err(RenderError::invalid_config("glyph_cache_capacity must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RendererConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let cfg = RendererConfig { max_batch_vertices: 0, ..RendererConfig::default() };
        assert!(matches!(cfg.validate(), Err(RenderError::InvalidConfig(_))));
    }

    #[test]
    fn default_larger_than_max_is_rejected() {
        let mut cfg = RendererConfig::default();
        cfg.atlas.default_surface_size = 8192;
        assert!(matches!(cfg.validate(), Err(RenderError::InvalidConfig(_))));
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        let mut cfg = RendererConfig::default();
        cfg.atlas.defrag_threshold = 0.0;
        assert!(cfg.validate().is_err());
        cfg.atlas.defrag_threshold = f32::NAN;
        assert!(cfg.validate().is_err());
        cfg.atlas.defrag_threshold = 1.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_glyph_capacity_is_rejected() {
        let cfg = RendererConfig { glyph_cache_capacity: 0, ..RendererConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
